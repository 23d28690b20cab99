use async_trait::async_trait;
use std::fmt::{self, Debug};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

use crate::{error::SendError, model::OutboundMessage};

/// Delivers messages to the paired watch. `Ok(())` is the acknowledgement.
#[async_trait]
pub trait MessageChannel: Send + Sync + Debug {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError>;
}

/// Writes each message as one line of JSON and flushes.
pub struct JsonLinesChannel<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesChannel<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> Debug for JsonLinesChannel<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLinesChannel").finish_non_exhaustive()
    }
}

#[async_trait]
impl<W> MessageChannel for JsonLinesChannel<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        // Held across write and flush: lines from overlapping cycles must not interleave.
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}
