//! Frame encoding for the `text/event-stream` wire format.
//!
//! Frames follow the
//! [HTML Living Standard](https://html.spec.whatwg.org/multipage/server-sent-events.html)
//! line protocol:
//!
//! ```text
//! retry: 1000
//! id: 30064771072
//! event: open
//! data: "hello"
//!
//! ```
//!
//! Heartbeats are a bare comment line (`:`), which every client ignores.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, error};

use crate::{
    config::StreamConfig,
    error::SseResult,
    event::{ERROR_EVENT, Event},
    transport::TransportWriter,
};

const HEARTBEAT_FRAME: &[u8] = b":\n\n";

/// Renders protocol frames onto a transport.
#[async_trait]
pub trait FrameEncoder: Send + Sync + 'static {
    /// Write the connection-opening frame.
    async fn write_preamble(&self, transport: &mut dyn TransportWriter) -> SseResult<()>;

    /// Write one event frame. The event may carry an error instead of data.
    async fn write_event(
        &self,
        transport: &mut dyn TransportWriter,
        event: &Event,
    ) -> SseResult<()>;

    /// Write one heartbeat frame.
    async fn write_heartbeat(&self, transport: &mut dyn TransportWriter) -> SseResult<()>;

    /// The reserved event that signals graceful termination.
    fn goodbye(&self) -> Event;
}

/// Standard `text/event-stream` encoder.
#[derive(Clone, Debug)]
pub struct TextEventEncoder {
    hello: Event,
    goodbye: Event,
}

impl Default for TextEventEncoder {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}

impl TextEventEncoder {
    /// Create an encoder using the retry hints from `config`.
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            hello: Event::hello(config.hello_retry),
            goodbye: Event::goodbye(config.goodbye_retry),
        }
    }

    /// The opening event written as the preamble.
    pub fn hello(&self) -> &Event {
        &self.hello
    }
}

#[async_trait]
impl FrameEncoder for TextEventEncoder {
    async fn write_preamble(&self, transport: &mut dyn TransportWriter) -> SseResult<()> {
        transport.write_frame(encode_event(&self.hello)?).await?;
        debug!("SSE preamble written");
        Ok(())
    }

    async fn write_event(
        &self,
        transport: &mut dyn TransportWriter,
        event: &Event,
    ) -> SseResult<()> {
        if let Some(err) = &event.error {
            error!(error = %err, "SSE stream error event");
        }
        transport.write_frame(encode_event(event)?).await
    }

    async fn write_heartbeat(&self, transport: &mut dyn TransportWriter) -> SseResult<()> {
        transport.write_frame(encode_heartbeat()).await
    }

    fn goodbye(&self) -> Event {
        self.goodbye.clone()
    }
}

/// Render one event as a frame.
///
/// An event carrying an error renders as an `error` event whose data is the
/// error message; every other field is ignored.
///
/// # Errors
///
/// Returns an error if the payload cannot be serialized.
pub fn encode_event(event: &Event) -> SseResult<Bytes> {
    let mut buf = BytesMut::with_capacity(64);

    if let Some(err) = &event.error {
        put_field(&mut buf, "event", ERROR_EVENT);
        put_data(&mut buf, err.message());
        buf.put_u8(b'\n');
        return Ok(buf.freeze());
    }

    if let Some(retry) = event.retry {
        put_retry(&mut buf, retry);
    }
    if let Some(id) = &event.id {
        put_field(&mut buf, "id", id);
    }
    if let Some(name) = &event.event {
        put_field(&mut buf, "event", name);
    }

    let json = serde_json::to_string(&event.data)?;
    put_data(&mut buf, &json);
    buf.put_u8(b'\n');

    Ok(buf.freeze())
}

/// The heartbeat frame.
pub fn encode_heartbeat() -> Bytes {
    Bytes::from_static(HEARTBEAT_FRAME)
}

fn put_retry(buf: &mut BytesMut, retry: Duration) {
    buf.put_slice(b"retry: ");
    buf.put_slice(retry.as_millis().to_string().as_bytes());
    buf.put_u8(b'\n');
}

// Single-line fields: a line break would end the field early.
fn put_field(buf: &mut BytesMut, name: &str, value: &str) {
    buf.put_slice(name.as_bytes());
    buf.put_slice(b": ");
    for part in value.split(['\r', '\n']) {
        buf.put_slice(part.as_bytes());
    }
    buf.put_u8(b'\n');
}

// Clients join consecutive data lines with '\n' and end a line at CRLF, LF
// or a bare CR. A trailing line break yields a trailing empty data line.
fn put_data(buf: &mut BytesMut, value: &str) {
    for line in value.split("\r\n").flat_map(|part| part.split(['\r', '\n'])) {
        buf.put_slice(b"data: ");
        buf.put_slice(line.as_bytes());
        buf.put_u8(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::transport::IoTransport;

    fn render(event: &Event) -> String {
        let frame = encode_event(event).expect("encodable");
        String::from_utf8(frame.to_vec()).expect("utf-8 frame")
    }

    #[test]
    fn test_encode_data_only() {
        assert_eq!(render(&Event::new(json!({"a": 1}))), "data: {\"a\":1}\n\n");
    }

    #[test]
    fn test_encode_all_fields() {
        let event = Event::new(json!("x"))
            .with_id("42")
            .with_event("trade")
            .with_retry(Duration::from_millis(1500));
        assert_eq!(
            render(&event),
            "retry: 1500\nid: 42\nevent: trade\ndata: \"x\"\n\n"
        );
    }

    #[test]
    fn test_encode_hello_and_goodbye() {
        assert_eq!(
            render(&Event::hello(Duration::from_secs(1))),
            "retry: 1000\nevent: open\ndata: \"hello\"\n\n"
        );
        assert_eq!(
            render(&Event::goodbye(Duration::from_millis(10))),
            "retry: 10\nevent: close\ndata: \"byebye\"\n\n"
        );
    }

    #[test]
    fn test_encode_error_ignores_other_fields() {
        let mut event = Event::error("ledger not found").with_id("7");
        event.data = json!({"ignored": true});
        assert_eq!(render(&event), "event: error\ndata: ledger not found\n\n");
    }

    #[test]
    fn test_encode_multiline_error() {
        let event = Event::error("first line\nsecond line");
        assert_eq!(
            render(&event),
            "event: error\ndata: first line\ndata: second line\n\n"
        );
    }

    #[test]
    fn test_encode_error_with_bare_cr() {
        let event = Event::error("boom\revent: close");
        assert_eq!(
            render(&event),
            "event: error\ndata: boom\ndata: event: close\n\n"
        );
    }

    #[test]
    fn test_encode_error_line_endings() {
        let event = Event::error("a\r\nb\rc\nd");
        assert_eq!(
            render(&event),
            "event: error\ndata: a\ndata: b\ndata: c\ndata: d\n\n"
        );
    }

    #[test]
    fn test_encode_error_keeps_trailing_line_break() {
        assert_eq!(
            render(&Event::error("a\n")),
            "event: error\ndata: a\ndata: \n\n"
        );
    }

    #[test]
    fn test_encode_empty_error_message() {
        assert_eq!(render(&Event::error("")), "event: error\ndata: \n\n");
    }

    #[test]
    fn test_encode_strips_line_breaks_from_fields() {
        let event = Event::new(json!(null)).with_id("a\nb").with_event("c\r\nd");
        assert_eq!(render(&event), "id: ab\nevent: cd\ndata: null\n\n");
    }

    #[test]
    fn test_encode_heartbeat() {
        assert_eq!(encode_heartbeat(), Bytes::from_static(b":\n\n"));
    }

    #[tokio::test]
    async fn test_encoder_writes_frames() {
        let encoder = TextEventEncoder::from_config(
            &StreamConfig::new().hello_retry(Duration::from_secs(2)),
        );
        let mut transport = IoTransport::new(Vec::new());

        encoder.write_preamble(&mut transport).await.expect("preamble");
        encoder
            .write_event(&mut transport, &Event::new(1))
            .await
            .expect("event");
        encoder.write_heartbeat(&mut transport).await.expect("heartbeat");
        encoder
            .write_event(&mut transport, &encoder.goodbye())
            .await
            .expect("goodbye");

        let written = String::from_utf8(transport.into_inner()).expect("utf-8");
        assert_eq!(
            written,
            "retry: 2000\nevent: open\ndata: \"hello\"\n\n\
             data: 1\n\n\
             :\n\n\
             retry: 10\nevent: close\ndata: \"byebye\"\n\n"
        );
    }
}
