use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, sync::Mutex};

use crate::{
    error::LocationError,
    model::{LocationFix, LocationOptions},
    transport::http_client,
};

pub const DEFAULT_IP_LOOKUP_URL: &str = "http://ip-api.com";

/// Source of the device position.
///
/// `options.maximum_age` is advisory for providers that keep a previous
/// fix around. `options.timeout` is enforced by the caller.
#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    async fn request_location(
        &self,
        options: &LocationOptions,
    ) -> Result<LocationFix, LocationError>;
}

/// Always reports the same coordinates, stamped with the request time.
#[derive(Debug, Clone, Copy)]
pub struct StaticLocation {
    latitude: f64,
    longitude: f64,
}

impl StaticLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn request_location(
        &self,
        _options: &LocationOptions,
    ) -> Result<LocationFix, LocationError> {
        Ok(LocationFix::new(self.latitude, self.longitude))
    }
}

/// Coarse position from an IP geolocation service.
#[derive(Debug, Clone)]
pub struct IpLocation {
    base_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    message: Option<String>,
}

impl IpLocation {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(DEFAULT_IP_LOOKUP_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: http_client()?,
        })
    }
}

#[async_trait]
impl LocationProvider for IpLocation {
    async fn request_location(
        &self,
        _options: &LocationOptions,
    ) -> Result<LocationFix, LocationError> {
        let url = format!("{}/json", self.base_url);

        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LocationError::Unavailable(format!("lookup request failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            return Err(LocationError::Unavailable(format!(
                "lookup failed with status {status}"
            )));
        }

        let parsed: IpLookupResponse = res
            .json()
            .await
            .map_err(|e| {
                LocationError::Unavailable(format!("unreadable lookup response: {e}"))
            })?;

        if parsed.status != "success" {
            let reason = parsed.message.unwrap_or_else(|| parsed.status.clone());
            return Err(LocationError::Unavailable(reason));
        }

        match (parsed.lat, parsed.lon) {
            (Some(lat), Some(lon)) => Ok(LocationFix::new(lat, lon)),
            _ => Err(LocationError::Unavailable(
                "lookup response has no coordinates".into(),
            )),
        }
    }
}

/// Reuses the previous fix while it is younger than `maximum_age`.
#[derive(Debug)]
pub struct CachedLocation<P> {
    inner: P,
    last: Mutex<Option<LocationFix>>,
}

impl<P: LocationProvider> CachedLocation<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            last: Mutex::new(None),
        }
    }

    fn cached(&self, options: &LocationOptions) -> Option<LocationFix> {
        let last = self.last.lock().ok()?;
        (*last).filter(|fix| fix.age(Utc::now()) <= options.maximum_age)
    }
}

#[async_trait]
impl<P: LocationProvider> LocationProvider for CachedLocation<P> {
    async fn request_location(
        &self,
        options: &LocationOptions,
    ) -> Result<LocationFix, LocationError> {
        if let Some(fix) = self.cached(options) {
            tracing::debug!("reusing cached location fix");
            return Ok(fix);
        }

        let fix = self.inner.request_location(options).await?;
        if let Ok(mut last) = self.last.lock() {
            *last = Some(fix);
        }
        Ok(fix)
    }
}
