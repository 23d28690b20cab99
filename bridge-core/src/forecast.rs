use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::BridgeError,
    model::{LocationFix, WeatherReading},
    transport::HttpTransport,
};

pub const DEFAULT_BASE_URL: &str = "https://api.forecast.io";

/// Client for the forecast service: one GET per fix, two fields out.
#[derive(Debug, Clone)]
pub struct ForecastClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    api_key: String,
    units: Option<String>,
}

impl ForecastClient {
    pub fn new(transport: Arc<dyn HttpTransport>, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            units: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Unit system requested from the service, e.g. "si". Unset means the
    /// service default (Fahrenheit).
    pub fn with_units(mut self, units: Option<String>) -> Self {
        self.units = units;
        self
    }

    pub fn request_url(&self, fix: &LocationFix) -> String {
        let mut url = format!(
            "{}/forecast/{}/{},{}",
            self.base_url, self.api_key, fix.latitude, fix.longitude
        );
        if let Some(units) = &self.units {
            url.push_str("?units=");
            url.push_str(units);
        }
        url
    }

    pub async fn fetch(&self, fix: &LocationFix) -> Result<WeatherReading, BridgeError> {
        let url = self.request_url(fix);
        tracing::debug!(
            latitude = fix.latitude,
            longitude = fix.longitude,
            "requesting forecast"
        );

        let body = self
            .transport
            .get(&url)
            .await
            .map_err(BridgeError::Transport)?;
        let reading = parse_reading(&body)?;

        tracing::info!("Temperature: {}", reading.temperature);
        tracing::info!("Conditions: {}", reading.conditions);

        Ok(reading)
    }
}

#[derive(Debug, Deserialize)]
struct FioCurrently {
    temperature: f64,
    summary: String,
}

#[derive(Debug, Deserialize)]
struct FioResponse {
    currently: FioCurrently,
}

/// Extract the current temperature and summary from a forecast body.
pub fn parse_reading(body: &str) -> Result<WeatherReading, serde_json::Error> {
    let parsed: FioResponse = serde_json::from_str(body)?;
    Ok(WeatherReading::from_raw(
        parsed.currently.temperature,
        parsed.currently.summary,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl HttpTransport for Unreachable {
        async fn get(&self, _url: &str) -> Result<String> {
            anyhow::bail!("offline")
        }
    }

    fn client() -> ForecastClient {
        ForecastClient::new(Arc::new(Unreachable), "test-key")
    }

    #[test]
    fn url_embeds_fix_and_credential() {
        let fix = LocationFix::new(37.8267, -122.423);
        assert_eq!(
            client().request_url(&fix),
            "https://api.forecast.io/forecast/test-key/37.8267,-122.423"
        );
    }

    #[test]
    fn url_with_custom_base_and_units() {
        let fix = LocationFix::new(40.0, 2.5);
        let client = client()
            .with_base_url("http://localhost:9000/")
            .with_units(Some("si".into()));

        assert_eq!(
            client.request_url(&fix),
            "http://localhost:9000/forecast/test-key/40,2.5?units=si"
        );
    }

    #[test]
    fn parses_current_conditions() {
        let body = r#"{"currently":{"temperature":72.6,"summary":"Clear"}}"#;

        assert_eq!(
            parse_reading(body).unwrap(),
            WeatherReading {
                temperature: 73,
                conditions: "Clear".into(),
            }
        );
    }

    #[test]
    fn near_zero_rounds_to_zero() {
        let body = r#"{"currently":{"temperature":-0.4,"summary":"Cold"}}"#;
        assert_eq!(parse_reading(body).unwrap().temperature, 0);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let body = r#"{
            "latitude": 1,
            "currently": {"time": 0, "temperature": 10, "summary": "Drizzle", "humidity": 0.9},
            "daily": {}
        }"#;
        assert_eq!(parse_reading(body).unwrap().conditions, "Drizzle");
    }

    #[test]
    fn missing_fields_are_rejected() {
        let no_summary = r#"{"currently":{"temperature":3.0}}"#;
        assert!(parse_reading(no_summary).is_err());
        assert!(parse_reading(r#"{"flags":{}}"#).is_err());
        assert!(parse_reading("<html>502</html>").is_err());
    }

    #[tokio::test]
    async fn transport_failure_is_reported() {
        let fix = LocationFix::new(0.0, 0.0);
        let err = client().fetch(&fix).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
    }
}
