use crate::domain::event::Envelope;
use crate::domain::ports::EventSink;
use crate::error::Result;
use async_trait::async_trait;
use std::io::Write;
use tokio::sync::Mutex;

/// Event sink writing one JSON object per line: `{"channel":..,"key":..,"value":{..}}`.
///
/// Lines are flushed as they are written so a downstream reader sees events promptly.
pub struct JsonLinesSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    async fn publish(&self, envelope: Envelope) -> Result<()> {
        let mut out = self.out.lock().await;
        serde_json::to_writer(&mut *out, &envelope)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}
