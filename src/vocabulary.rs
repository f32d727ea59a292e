//! Display labels for backend category codes.
//!
//! Every function is total: codes outside the known set map to the
//! category's "Unknown ..." label.

pub fn sensor_type_label(code: &str) -> &'static str {
    match code {
        "TemperatureCelsius" => "Temperature (ºC)",
        "HumidityPercent" => "Humidity (%)",
        "OnOffNa" => "On/Off (N/A)",
        "ScalePercentagePercentage" => "Percentage (%)",
        "WindSpeedWindDirectionKmHrRadian" => "Wind Speed (Km/h)",
        "SunriseTime" => "Sunrise (Time)",
        "SunsetTime" => "Sunset (Time)",
        "DewPointCelsius" => "Dew Point (%RH)",
        "SolarIrradianceWm2" => "Solar Irradiance (W/m^2)",
        "PowerConsumptionWatts" => "Power Consumption (W)",
        "AveragePowerConsumptionWatts" => "Average Power Consumption (W)",
        "ElectricEnergyConsumptionWh" => "Electric Energy Consumption (Wh)",
        _ => "Unknown Sensor Type",
    }
}

pub fn sensor_model_label(code: &str) -> &'static str {
    match code {
        "SensorOfTemperature" => "Temperature Sensor",
        "SensorOfHumidity" => "Humidity Sensor",
        "SensorOfOnOff" => "On/Off Sensor",
        "SensorOfScalePercentage" => "Position Sensor",
        "SensorOfWind" => "Wind Speed Sensor",
        "SensorOfSunrise" => "Sunrise Sensor",
        "SensorOfSunset" => "Sunset Sensor",
        "SensorOfDewPoint" => "Dew Point Sensor",
        "SensorOfSolarIrradiance" => "Solar Irradiance Sensor",
        "SensorOfPowerConsumption" => "Power Consumption Sensor",
        "SensorOfAveragePowerConsumption" => "Average Power Consumption Sensor",
        "SensorOfElectricEnergyConsumption" => "Electric Energy Consumption Sensor",
        _ => "Unknown Sensor Model",
    }
}

pub fn actuator_type_label(code: &str) -> &'static str {
    match code {
        "BlindsRoller" => "Blinds Roller",
        "DecimalLimiter" => "Decimal Limiter",
        "Limiter" => "Limiter",
        "OnOffSwitch" => "On/Off Switch",
        _ => "Unknown Actuator Type",
    }
}

pub fn actuator_model_label(code: &str) -> &'static str {
    match code {
        "ActuatorOfBlindRoller" => "Blinds Roller Actuator",
        "ActuatorOfDecimalLimiter" => "Decimal Limiter Actuator",
        "ActuatorOfLimiter" => "Limiter Actuator",
        "ActuatorOfOnOffSwitch" => "On/Off Switch",
        _ => "Unknown Actuator Model",
    }
}

pub fn device_type_label(code: &str) -> &'static str {
    match code {
        "GridPowerMeter" => "Grid Power Meter",
        "PowerSourcePowerMeter" => "Power Source Power Meter",
        _ => "Unknown Device Type",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes() {
        assert_eq!(sensor_type_label("TemperatureCelsius"), "Temperature (ºC)");
        assert_eq!(sensor_type_label("DewPointCelsius"), "Dew Point (%RH)");
        assert_eq!(sensor_model_label("SensorOfScalePercentage"), "Position Sensor");
        assert_eq!(actuator_type_label("BlindsRoller"), "Blinds Roller");
        assert_eq!(actuator_model_label("ActuatorOfOnOffSwitch"), "On/Off Switch");
        assert_eq!(device_type_label("PowerSourcePowerMeter"), "Power Source Power Meter");
    }

    #[test]
    fn unknown_codes_fall_back() {
        for code in ["", "temperatureCelsius", "SensorOfTemperature ", "🙂"] {
            assert_eq!(sensor_type_label(code), "Unknown Sensor Type");
        }
        assert_eq!(sensor_model_label("SensorOfRain"), "Unknown Sensor Model");
        assert_eq!(actuator_type_label("Dimmer"), "Unknown Actuator Type");
        assert_eq!(actuator_model_label("ActuatorOfDimmer"), "Unknown Actuator Model");
        assert_eq!(device_type_label("Default"), "Unknown Device Type");
    }
}
