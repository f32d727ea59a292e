use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use smart_home_dashboard::{
    config::Config,
    devices::{AddActuatorForm, AddDeviceForm, AddSensorForm, Choice, FieldErrors, LimitInputs, Submission},
    readings::SortOrder,
    views::{Dashboard, HomeView},
};

#[derive(Debug, Parser)]
#[command(name = "smart_home_dashboard", about = "Terminal dashboard for the home-automation backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// House location with sunrise, sunset and temperature.
    Home {
        /// Keep refreshing the temperature until interrupted.
        #[arg(long)]
        watch: bool,
    },
    /// List rooms.
    Rooms,
    /// Show a room and its devices.
    Room { room_id: String },
    /// Add a device to a room.
    AddDevice {
        room_id: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long = "type", default_value = "")]
        device_type: String,
    },
    /// Show a device with its sensors, actuators and controls.
    Device { device_id: String },
    /// Deactivate a device.
    Deactivate { device_id: String },
    /// Move a blind roller to a position in percent.
    Operate {
        device_id: String,
        actuator_id: String,
        percentage: i32,
    },
    /// Add a sensor to a device.
    AddSensor {
        device_id: String,
        #[arg(long = "type", default_value = "")]
        sensor_type: String,
        #[arg(long, default_value = "")]
        model: String,
    },
    /// Add an actuator to a device.
    AddActuator {
        device_id: String,
        #[arg(long = "type", default_value = "")]
        actuator_type: String,
        #[arg(long, default_value = "")]
        model: String,
        #[arg(long, default_value = "")]
        int_lower: String,
        #[arg(long, default_value = "")]
        int_upper: String,
        #[arg(long, default_value = "")]
        double_lower: String,
        #[arg(long, default_value = "")]
        double_upper: String,
        #[arg(long, default_value = "")]
        precision: String,
    },
    /// Query readings of a device in a time range.
    Readings {
        device_id: String,
        #[arg(long, default_value = "")]
        start: String,
        #[arg(long, default_value = "")]
        end: String,
        /// Newest first.
        #[arg(long)]
        desc: bool,
    },
    /// Category codes with their labels.
    Catalog {
        /// Also list the sensor models of this type.
        #[arg(long)]
        sensor_type: Option<String>,
        /// Also list the actuator models of this type.
        #[arg(long)]
        actuator_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let dashboard = Dashboard::from_config(&config).context("Failed to set up backend clients")?;

    let echo = dashboard.notices().echo(|notice| eprintln!("{notice}"));
    let result = run(&dashboard, cli.command).await;
    echo.finish().await;
    result
}

async fn run(dashboard: &Dashboard, command: Command) -> Result<()> {
    match command {
        Command::Home { watch } => {
            let view = dashboard.home().await;
            println!("{view}");
            if watch {
                watch_weather(dashboard, view).await?;
            }
        }
        Command::Rooms => {
            println!("{}", dashboard.rooms().await);
        }
        Command::Room { room_id } => {
            println!("{}", dashboard.room(&room_id).await);
        }
        Command::AddDevice {
            room_id,
            name,
            device_type,
        } => {
            let mut room = dashboard.room(&room_id).await;
            let mut form = AddDeviceForm::default();
            form.set_name(name);
            form.set_device_type(device_type);
            match room.add_device(dashboard.devices(), &mut form).await? {
                Submission::Created(_) => println!("{room}"),
                Submission::Invalid => report_invalid(form.errors())?,
            }
        }
        Command::Device { device_id } => {
            println!("{}", dashboard.device(&device_id).await?);
        }
        Command::Deactivate { device_id } => {
            let mut view = dashboard.device(&device_id).await?;
            view.deactivate().await?;
            println!("{view}");
        }
        Command::Operate {
            device_id,
            actuator_id,
            percentage,
        } => {
            let mut view = dashboard.device(&device_id).await?;
            let outcome = view.operate(&actuator_id, percentage).await?;
            info!(actuator_id = %actuator_id, outcome = ?outcome, "Operate finished");
            println!("{view}");
        }
        Command::AddSensor {
            device_id,
            sensor_type,
            model,
        } => {
            let mut view = dashboard.device(&device_id).await?;
            let mut form = AddSensorForm::default();
            form.set_sensor_type(sensor_type);
            form.set_sensor_model(model);
            match view.add_sensor(dashboard.devices(), &mut form).await? {
                Submission::Created(_) => println!("{view}"),
                Submission::Invalid => report_invalid(form.errors())?,
            }
        }
        Command::AddActuator {
            device_id,
            actuator_type,
            model,
            int_lower,
            int_upper,
            double_lower,
            double_upper,
            precision,
        } => {
            let mut view = dashboard.device(&device_id).await?;
            let mut form = AddActuatorForm::default();
            form.set_actuator_type(actuator_type);
            form.set_actuator_model(model);
            form.set_limits(LimitInputs {
                integer_lower: int_lower,
                integer_upper: int_upper,
                double_lower,
                double_upper,
                double_precision: precision,
            });
            match view.add_actuator(dashboard.devices(), &mut form).await? {
                Submission::Created(_) => println!("{view}"),
                Submission::Invalid => report_invalid(form.errors())?,
            }
        }
        Command::Readings {
            device_id,
            start,
            end,
            desc,
        } => {
            let mut view = dashboard.readings_view(&device_id);
            view.set_start(start);
            view.set_end(end);
            view.submit(dashboard.readings()).await;
            if desc && view.results().map(|r| r.order()) == Some(SortOrder::Ascending) {
                view.toggle_order();
            }
            println!("{view}");
        }
        Command::Catalog {
            sensor_type,
            actuator_type,
        } => {
            let devices = dashboard.devices();
            print_choices("Device types", &devices.device_types().await?);
            print_choices("Sensor types", &devices.sensor_types().await?);
            print_choices("Actuator types", &devices.actuator_types().await?);
            if let Some(t) = sensor_type {
                print_choices(&format!("Sensor models ({t})"), &devices.sensor_models(&t).await?);
            }
            if let Some(t) = actuator_type {
                print_choices(&format!("Actuator models ({t})"), &devices.actuator_models(&t).await?);
            }
        }
    }
    Ok(())
}

fn print_choices(title: &str, choices: &[Choice]) {
    println!("{title}");
    for choice in choices {
        println!("  {} ({})", choice.label, choice.code);
    }
}

fn report_invalid(errors: &FieldErrors) -> Result<()> {
    for (field, message) in errors.iter() {
        eprintln!("{field:?}: {message}");
    }
    bail!("form is invalid")
}

async fn watch_weather(dashboard: &Dashboard, view: HomeView) -> Result<()> {
    let Some(house) = view.house else {
        bail!("house location unavailable, cannot watch weather");
    };
    let Some(service) = dashboard.weather_service(&house) else {
        bail!("WEATHER_API_URL is not set");
    };

    let mut rx = service.subscribe();
    let refresher = tokio::spawn(service.run());
    info!("Watching weather, press Ctrl+C to stop");

    tokio::select! {
        _ = async {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                println!("{}", HomeView { house: Some(house.clone()), weather: snapshot });
            }
        } => {},
        _ = shutdown_signal() => {},
    }

    refresher.abort();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
