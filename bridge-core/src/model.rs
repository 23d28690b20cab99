use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// AppMessage key id the watch reads the temperature from.
pub const KEY_TEMPERATURE: u32 = 0;
/// AppMessage key id the watch reads the conditions text from.
pub const KEY_CONDITIONS: u32 = 1;

/// A single geolocation measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub acquired_at: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            acquired_at: Utc::now(),
        }
    }

    /// Age of the fix relative to `now`; a fix from the future counts as fresh.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.acquired_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Options passed along with every location request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationOptions {
    /// Abandon the request if no fix arrives within this window.
    pub timeout: Duration,
    /// Accept a cached fix up to this old.
    pub maximum_age: Duration,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(15_000),
            maximum_age: Duration::from_millis(60_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherReading {
    pub temperature: i32,
    pub conditions: String,
}

impl WeatherReading {
    /// Build a reading from the provider's raw float temperature.
    pub fn from_raw(temperature: f64, conditions: String) -> Self {
        Self {
            temperature: round_half_up(temperature),
            conditions,
        }
    }
}

/// Round to the nearest integer, ties going towards positive infinity.
///
/// Unlike `f64::round`, -2.5 becomes -2 here.
pub fn round_half_up(value: f64) -> i32 {
    let floor = value.floor();
    // Compare the fraction instead of adding 0.5: 0.49999999999999994 + 0.5 is exactly 1.0.
    if value - floor >= 0.5 {
        (floor + 1.0) as i32
    } else {
        floor as i32
    }
}

/// Value slot of an AppMessage dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMessageValue {
    Int32(i32),
    CString(String),
}

/// Dictionary handed to the paired watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(rename = "KEY_TEMPERATURE")]
    pub temperature: i32,
    #[serde(rename = "KEY_CONDITIONS")]
    pub conditions: String,
}

impl OutboundMessage {
    /// Entries keyed by the numeric ids the watch looks up.
    pub fn to_app_message(&self) -> [(u32, AppMessageValue); 2] {
        [
            (KEY_TEMPERATURE, AppMessageValue::Int32(self.temperature)),
            (
                KEY_CONDITIONS,
                AppMessageValue::CString(self.conditions.clone()),
            ),
        ]
    }
}

impl From<WeatherReading> for OutboundMessage {
    fn from(reading: WeatherReading) -> Self {
        Self {
            temperature: reading.temperature,
            conditions: reading.conditions,
        }
    }
}
