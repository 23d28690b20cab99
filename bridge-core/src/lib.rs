//! Core library for the watchface weather bridge.
//!
//! This crate defines:
//! - Collaborator seams: location, HTTP transport, watch message channel
//! - The forecast client and the WeatherBridge cycle (locate → fetch → send)
//! - The event bus that turns `ready` / `appmessage` triggers into cycles
//! - Configuration & credentials handling
//!
//! It is used by `bridge-cli`, but the bridge can be driven by any event source.

pub mod bridge;
pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod forecast;
pub mod location;
pub mod model;
pub mod transport;

pub use bridge::WeatherBridge;
pub use channel::{JsonLinesChannel, MessageChannel};
pub use config::{Config, LocationConfig, LocationSource, ProviderConfig};
pub use error::{BridgeError, LocationError, SendError};
pub use events::{Event, EventBus, EventSource};
pub use forecast::ForecastClient;
pub use location::{CachedLocation, IpLocation, LocationProvider, StaticLocation};
pub use model::{AppMessageValue, LocationFix, LocationOptions, OutboundMessage, WeatherReading};
pub use transport::{HttpTransport, ReqwestTransport};
