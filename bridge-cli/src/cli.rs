use anyhow::{Context, Result};
use bridge_core::{
    Config, Event, EventBus, JsonLinesChannel, LocationSource, WeatherBridge,
    events::{self, EventSender},
};
use clap::{Args, Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    task::JoinHandle,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-bridge", version, about = "Weather bridge for the watchface")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Fixed coordinates overriding the configured location source.
#[derive(Debug, Clone, Copy, Args)]
pub struct LocationArgs {
    #[arg(long, allow_negative_numbers = true, requires = "longitude")]
    pub latitude: Option<f64>,

    #[arg(long, allow_negative_numbers = true, requires = "latitude")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the weather service credential and location source.
    Configure {
        /// API key; prompted for when absent.
        #[arg(long)]
        api_key: Option<String>,

        #[command(flatten)]
        location: LocationArgs,

        /// Locate by public IP instead of fixed coordinates.
        #[arg(long, conflicts_with_all = ["latitude", "longitude"])]
        ip: bool,
    },

    /// Serve the watch: one cycle at startup, then one per line on stdin.
    Run {
        #[command(flatten)]
        location: LocationArgs,

        /// Also refresh every N minutes.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        refresh_minutes: Option<u64>,
    },

    /// Run a single cycle and exit.
    Once {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Print the config file location.
    ConfigPath,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure {
                api_key,
                location,
                ip,
            } => configure(api_key, location, ip),
            Command::Run {
                location,
                refresh_minutes,
            } => {
                let refresh = refresh_minutes.map(|m| Duration::from_secs(m * 60));
                serve(location, refresh).await
            }
            Command::Once { location } => once(location).await,
            Command::ConfigPath => {
                println!("{}", Config::config_file_path()?.display());
                Ok(())
            }
        }
    }
}

fn load_config(location: LocationArgs) -> Result<Config> {
    let mut config = Config::load()?;
    if let (Some(lat), Some(lon)) = (location.latitude, location.longitude) {
        config.set_static_location(lat, lon);
    }
    Ok(config)
}

fn stdout_bridge(config: &Config) -> Result<Arc<WeatherBridge>> {
    let channel = Arc::new(JsonLinesChannel::new(tokio::io::stdout()));
    Ok(Arc::new(WeatherBridge::from_config(config, channel)?))
}

fn configure(api_key: Option<String>, location: LocationArgs, ip: bool) -> Result<()> {
    let mut config = Config::load()?;

    let api_key = match api_key {
        Some(key) => key,
        None => prompt_api_key(config.api_key().is_ok())?,
    };
    if !api_key.is_empty() {
        config.set_api_key(api_key);
    }

    if ip {
        config.location.source = LocationSource::Ip;
    } else if let (Some(lat), Some(lon)) = (location.latitude, location.longitude) {
        config.set_static_location(lat, lon);
    } else if location_missing(&config) {
        let lat = CustomType::<f64>::new("Latitude:")
            .with_error_message("Please enter a number, e.g. 51.5")
            .prompt()
            .context("Failed to read latitude")?;
        let lon = CustomType::<f64>::new("Longitude:")
            .with_error_message("Please enter a number, e.g. -0.12")
            .prompt()
            .context("Failed to read longitude")?;
        config.set_static_location(lat, lon);
    }

    config.api_key()?;
    if config.location.source == LocationSource::Static {
        config.static_coordinates()?;
    }

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

fn location_missing(config: &Config) -> bool {
    config.location.source == LocationSource::Static && config.static_coordinates().is_err()
}

/// Prompt for the API key. With `keep_existing`, an empty answer keeps the stored key.
fn prompt_api_key(keep_existing: bool) -> Result<String> {
    let label = if keep_existing {
        "Weather service API key (leave empty to keep the current one):"
    } else {
        "Weather service API key:"
    };

    Password::new(label)
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")
}

async fn once(location: LocationArgs) -> Result<()> {
    let config = load_config(location)?;
    let bridge = stdout_bridge(&config)?;

    bridge.run_cycle().await.context("Weather cycle failed")?;
    Ok(())
}

async fn serve(location: LocationArgs, refresh: Option<Duration>) -> Result<()> {
    let config = load_config(location)?;
    let bridge = stdout_bridge(&config)?;

    let mut bus = EventBus::new();
    bridge.register(&mut bus);

    let stdin = BufReader::new(tokio::io::stdin());
    let dispatched = drive(&mut bus, stdin, refresh).await;
    tracing::info!(
        dispatched,
        cycles = bridge.cycles_started(),
        "input closed, bridge stopped"
    );
    Ok(())
}

/// Feed `ready`, one `appmessage` per input line and the optional refresh
/// ticks into `bus`. Returns once the input ends and every cycle settled.
async fn drive<R>(bus: &mut EventBus, input: R, refresh: Option<Duration>) -> usize
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, mut source) = events::channel(16);
    tx.emit(Event::Ready).await;

    let ticker = refresh.map(|period| tokio::spawn(refresh_loop(tx.clone(), period)));
    tokio::spawn(forward_lines(input, tx, ticker));

    bus.run(&mut source).await
}

/// Each input line is a refresh request from the watch. EOF stops the ticker too.
async fn forward_lines<R>(input: R, tx: EventSender, ticker: Option<JoinHandle<()>>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(_)) => {
                if !tx.emit(Event::AppMessage).await {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read watch input: {e}");
                break;
            }
        }
    }

    if let Some(ticker) = ticker {
        ticker.abort();
    }
}

async fn refresh_loop(tx: EventSender, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // The first tick completes immediately; startup is already covered by `ready`.
    interval.tick().await;

    loop {
        interval.tick().await;
        tracing::debug!("refresh timer fired");
        if !tx.emit(Event::AppMessage).await {
            break;
        }
    }
}
