//! Test doubles for the bridge's collaborators.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use bridge_core::{
    ForecastClient, HttpTransport, LocationError, LocationFix, LocationOptions, LocationProvider,
    MessageChannel, OutboundMessage, SendError, WeatherBridge,
};
use std::{
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

pub const CLEAR_BODY: &str = r#"{"currently":{"temperature":72.6,"summary":"Clear"}}"#;

/// Location provider with a scripted outcome.
#[derive(Debug)]
pub enum FakeLocation {
    Fix(f64, f64),
    Denied,
    /// Never answers before the given delay.
    Slow(Duration),
}

#[async_trait]
impl LocationProvider for FakeLocation {
    async fn request_location(
        &self,
        _options: &LocationOptions,
    ) -> Result<LocationFix, LocationError> {
        match self {
            FakeLocation::Fix(lat, lon) => Ok(LocationFix::new(*lat, *lon)),
            FakeLocation::Denied => Err(LocationError::PermissionDenied),
            FakeLocation::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(LocationFix::new(0.0, 0.0))
            }
        }
    }
}

/// Records requested URLs and answers with a fixed body.
#[derive(Debug)]
pub struct FakeTransport {
    body: Option<String>,
    delay: Duration,
    pub urls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeTransport {
    pub fn answering(body: &str) -> Arc<Self> {
        Arc::new(Self::build(Some(body.to_string()), Duration::ZERO))
    }

    pub fn answering_after(body: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(Some(body.to_string()), delay))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::build(None, Duration::ZERO))
    }

    fn build(body: Option<String>, delay: Duration) -> Self {
        Self {
            body,
            delay,
            urls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, url: &str) -> Result<String> {
        self.urls.lock().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.body {
            Some(body) => Ok(body.clone()),
            None => anyhow::bail!("connection refused"),
        }
    }
}

/// Collects sent messages, or rejects them all.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    reject: bool,
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub attempts: AtomicUsize,
}

impl RecordingChannel {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject: true,
            ..Self::default()
        })
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(SendError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "watch disconnected",
            )));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub fn bridge(
    location: FakeLocation,
    transport: Arc<FakeTransport>,
    channel: Arc<RecordingChannel>,
    options: LocationOptions,
) -> WeatherBridge {
    let forecast = ForecastClient::new(transport, "test-key");
    WeatherBridge::new(Arc::new(location), forecast, channel, options)
}

/// Buffer that collects formatted log lines for the current thread.
#[derive(Debug, Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route this thread's tracing output into a fresh buffer until the guard drops.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();

        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

pub struct LogWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter(Arc::clone(&self.0))
    }
}
