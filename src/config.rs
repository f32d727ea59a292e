use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the home-automation backend.
    pub api_url: String,
    /// Base URL of the weather service. Weather cards are off when unset.
    pub weather_api_url: Option<String>,
    pub weather_group_number: i32,
    pub house_id: String,
    pub request_timeout: Duration,
    /// Delay between the "Loading..." notice and the operate command.
    pub dispatch_delay: Duration,
    /// Lifetime of success / failure notices.
    pub notice_timeout: Duration,
    /// Lifetime of the "no readings" notice.
    pub empty_notice_timeout: Duration,
    /// Temperature refresh period once aligned to the quarter hour.
    pub weather_refresh: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("missing required env var: {key}"))
        };
        let optional = |key: &str, default: &str| -> String {
            lookup(key).unwrap_or_else(|| default.to_owned())
        };
        let millis = |key: &str, default: &str| -> Result<Duration> {
            optional(key, default)
                .parse()
                .map(Duration::from_millis)
                .with_context(|| format!("{key} must be a non-negative integer (milliseconds)"))
        };
        let secs = |key: &str, default: &str| -> Result<Duration> {
            optional(key, default)
                .parse()
                .map(Duration::from_secs)
                .with_context(|| format!("{key} must be a non-negative integer (seconds)"))
        };

        let weather_refresh = secs("WEATHER_REFRESH_SECS", "900")?;
        anyhow::ensure!(!weather_refresh.is_zero(), "WEATHER_REFRESH_SECS must be positive");

        Ok(Self {
            api_url: required("DASHBOARD_API_URL")?,
            weather_api_url: lookup("WEATHER_API_URL").filter(|v| !v.trim().is_empty()),
            weather_group_number: optional("WEATHER_GROUP_NUMBER", "6")
                .parse()
                .context("WEATHER_GROUP_NUMBER must be an integer")?,
            house_id: optional("HOUSE_ID", "TheHouse"),
            request_timeout: secs("REQUEST_TIMEOUT_SECS", "30")?,
            dispatch_delay: millis("DISPATCH_DELAY_MS", "2000")?,
            notice_timeout: millis("NOTICE_TIMEOUT_MS", "2000")?,
            empty_notice_timeout: millis("EMPTY_NOTICE_TIMEOUT_MS", "5000")?,
            weather_refresh,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[("DASHBOARD_API_URL", "http://localhost:8080")]).unwrap();
        assert_eq!(c.api_url, "http://localhost:8080");
        assert_eq!(c.weather_api_url, None);
        assert_eq!(c.weather_group_number, 6);
        assert_eq!(c.house_id, "TheHouse");
        assert_eq!(c.request_timeout, Duration::from_secs(30));
        assert_eq!(c.dispatch_delay, Duration::from_millis(2000));
        assert_eq!(c.notice_timeout, Duration::from_millis(2000));
        assert_eq!(c.empty_notice_timeout, Duration::from_millis(5000));
        assert_eq!(c.weather_refresh, Duration::from_secs(900));
    }

    #[test]
    fn missing_api_url_errors() {
        let err = config(&[]).unwrap_err();
        assert!(err.to_string().contains("DASHBOARD_API_URL"));

        let err = config(&[("DASHBOARD_API_URL", "  ")]).unwrap_err();
        assert!(err.to_string().contains("DASHBOARD_API_URL"));
    }

    #[test]
    fn overrides() {
        let c = config(&[
            ("DASHBOARD_API_URL", "http://10.0.0.2:8080/smarthome"),
            ("WEATHER_API_URL", "http://10.0.0.3:8080"),
            ("WEATHER_GROUP_NUMBER", "5"),
            ("DISPATCH_DELAY_MS", "0"),
        ])
        .unwrap();
        assert_eq!(c.weather_api_url.as_deref(), Some("http://10.0.0.3:8080"));
        assert_eq!(c.weather_group_number, 5);
        assert!(c.dispatch_delay.is_zero());
    }

    #[test]
    fn bad_numbers_name_the_variable() {
        let err = config(&[("DASHBOARD_API_URL", "http://x"), ("NOTICE_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("NOTICE_TIMEOUT_MS"));

        let err = config(&[("DASHBOARD_API_URL", "http://x"), ("WEATHER_REFRESH_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("WEATHER_REFRESH_SECS"));
    }
}
