use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tracing::Instrument;

use crate::{
    Config,
    channel::MessageChannel,
    config::LocationSource,
    error::{BridgeError, LocationError},
    events::{Event, EventBus},
    forecast::ForecastClient,
    location::{CachedLocation, IpLocation, LocationProvider, StaticLocation},
    model::{LocationFix, LocationOptions, OutboundMessage},
    transport::ReqwestTransport,
};

/// Runs the locate → fetch → forward cycle for the paired watch.
///
/// Cycles share nothing but the collaborators. A trigger that arrives while
/// another cycle is in flight starts a second, independent cycle.
#[derive(Debug)]
pub struct WeatherBridge {
    locator: Arc<dyn LocationProvider>,
    forecast: ForecastClient,
    channel: Arc<dyn MessageChannel>,
    options: LocationOptions,
    cycles: AtomicU64,
}

impl WeatherBridge {
    pub fn new(
        locator: Arc<dyn LocationProvider>,
        forecast: ForecastClient,
        channel: Arc<dyn MessageChannel>,
        options: LocationOptions,
    ) -> Self {
        Self {
            locator,
            forecast,
            channel,
            options,
            cycles: AtomicU64::new(0),
        }
    }

    /// Wire a bridge from config: location source, forecast endpoint and
    /// credential, request options.
    pub fn from_config(config: &Config, channel: Arc<dyn MessageChannel>) -> anyhow::Result<Self> {
        let locator = locator_from_config(config)?;

        let transport = Arc::new(ReqwestTransport::new()?);
        let mut forecast = ForecastClient::new(transport, config.api_key()?)
            .with_units(config.provider.units.clone());
        if let Some(base_url) = &config.provider.base_url {
            forecast = forecast.with_base_url(base_url.as_str());
        }

        Ok(Self::new(locator, forecast, channel, config.location_options()))
    }

    /// Subscribe to `ready` and `appmessage`; both start a weather cycle.
    pub fn register(self: &Arc<Self>, bus: &mut EventBus) {
        for event in [Event::Ready, Event::AppMessage] {
            let bridge = Arc::clone(self);
            bus.on(event, move |_| {
                let bridge = Arc::clone(&bridge);
                async move { bridge.get_weather().await }
            });
        }
    }

    /// Number of cycles started so far.
    pub fn cycles_started(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Run one cycle and log its outcome. Failures end the cycle; nothing is retried.
    pub async fn get_weather(&self) {
        let id = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let span = tracing::info_span!("cycle", id);

        async {
            match self.run_cycle().await {
                Ok(_) => {}
                Err(BridgeError::Location(e)) => {
                    tracing::error!("Error requesting location: {e}");
                }
                Err(BridgeError::Send(e)) => {
                    tracing::warn!("Error sending weather info to watch: {e}");
                }
                Err(e @ (BridgeError::Transport(_) | BridgeError::Parse(_))) => {
                    tracing::error!(stage = e.stage(), "{e}: {}", source_chain(&e));
                }
            }
        }
        .instrument(span)
        .await
    }

    /// locating → fetching → sending. Returns the message the watch acknowledged.
    pub async fn run_cycle(&self) -> Result<OutboundMessage, BridgeError> {
        tracing::debug!("locating");
        let fix = self.locate().await?;

        tracing::debug!("fetching");
        let reading = self.forecast.fetch(&fix).await?;

        tracing::debug!("sending");
        let message = OutboundMessage::from(reading);
        self.channel.send(&message).await?;
        tracing::info!("Weather info sent to watch successfully");

        Ok(message)
    }

    async fn locate(&self) -> Result<LocationFix, LocationError> {
        let request = self.locator.request_location(&self.options);
        match tokio::time::timeout(self.options.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout(self.options.timeout)),
        }
    }
}

/// Construct the configured location provider.
pub fn locator_from_config(config: &Config) -> anyhow::Result<Arc<dyn LocationProvider>> {
    let locator: Arc<dyn LocationProvider> = match config.location.source {
        LocationSource::Static => {
            let (lat, lon) = config.static_coordinates()?;
            Arc::new(StaticLocation::new(lat, lon))
        }
        LocationSource::Ip => Arc::new(CachedLocation::new(IpLocation::new()?)),
    };

    Ok(locator)
}

fn source_chain(err: &BridgeError) -> String {
    match err {
        BridgeError::Transport(e) => format!("{e:#}"),
        BridgeError::Parse(e) => e.to_string(),
        other => other.to_string(),
    }
}
