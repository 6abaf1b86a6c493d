use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use crate::error::EtlResult;
use crate::sink::Sink;
use crate::types::ChangeEvent;

/// Sink writing each change event as one JSON object per line.
///
/// ```json
/// {"action":"create","doc":{"id":42,"status":"new"}}
/// ```
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Arc<Mutex<W>>,
}

/// [`JsonLinesSink`] writing to the standard output of the process.
pub type StdoutSink = JsonLinesSink<Stdout>;

impl StdoutSink {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }
}

impl<W> JsonLinesSink<W>
where
    W: Clone,
{
    /// Returns a copy of the underlying writer.
    pub async fn writer(&self) -> W {
        self.writer.lock().await.clone()
    }
}

impl<W> Clone for JsonLinesSink<W> {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer.clone(),
        }
    }
}

impl<W> Sink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn name() -> &'static str {
        "stdout"
    }

    async fn write_events(&self, events: Vec<ChangeEvent>) -> EtlResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut buffer = Vec::new();
        for event in &events {
            serde_json::to_writer(&mut buffer, event)?;
            buffer.push(b'\n');
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(&buffer).await?;
        writer.flush().await?;

        Ok(())
    }

    async fn shutdown(&self) -> EtlResult<()> {
        self.writer.lock().await.flush().await?;

        Ok(())
    }
}
