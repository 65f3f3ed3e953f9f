//! # hpx-sse
//!
//! Outbound Server-Sent Events for long-lived HTTP responses.
//!
//! One [`Stream`] per request multiplexes application events, keep-alive
//! heartbeats and a final goodbye frame onto a single transport, framed as
//! `text/event-stream`.
//!
//! ## Features
//!
//! - **Lazy preamble**: the opening frame is written by the first send,
//!   heartbeat or finish; if it cannot be written the stream is done before a
//!   single event goes out.
//! - **Heartbeats**: [`Stream::try_send_heartbeat`] only writes when the
//!   stream has been idle for the heartbeat interval.
//! - **Limits**: clients can cap the number of events; [`Stream::is_done`]
//!   reports when the cap is reached.
//! - **Disconnects**: [`drive`] stops as soon as the transport reports that
//!   the client went away, so an idle producer is not kept alive.
//! - **Pluggable edges**: [`TransportWriter`], [`FrameEncoder`] and [`Clock`]
//!   are traits, with ready implementations for async writers, hyper-style
//!   response bodies and the standard line protocol.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures_util::stream;
//! use hpx_sse::{DriveOutcome, Event, StreamConfig, drive, open_response};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StreamConfig::new().limit(100);
//! let (mut sse, response) = open_response(&config)?;
//!
//! // Hand `response` to the HTTP server, then feed the stream.
//! tokio::spawn(async move {
//!     let events = stream::iter((1..=3).map(|n| Event::new(n).with_id(n.to_string())));
//!     let outcome = drive(&mut sse, events).await;
//!     assert_eq!(outcome, DriveOutcome::Finished);
//! });
//! # drop(response);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Index
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`stream`] | [`Stream`] state machine and [`SharedStream`] |
//! | [`driver`] | [`drive`] loop combining producer and heartbeat ticker |
//! | [`encoder`] | [`FrameEncoder`] trait and [`TextEventEncoder`] |
//! | [`transport`] | [`TransportWriter`], [`IoTransport`], [`ChannelTransport`] |
//! | [`event`] | [`Event`] and [`EventError`] |
//! | [`clock`] | [`Clock`], [`TokioClock`], [`ManualClock`] |
//! | `config` | [`StreamConfig`] builder |
//! | [`response`] | Response headers and [`open_response`] |

pub mod clock;
mod config;
pub mod driver;
pub mod encoder;
pub mod error;
pub mod event;
pub mod response;
pub mod stream;
pub mod transport;

pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{DEFAULT_HEARTBEAT_INTERVAL, StreamConfig};
pub use driver::{DriveOutcome, drive, drive_results};
pub use encoder::{FrameEncoder, TextEventEncoder};
pub use error::{SseError, SseResult};
pub use event::{Event, EventError};
pub use response::{open_response, sse_headers, sse_response};
pub use stream::{SharedStream, Stream, StreamState};
pub use transport::{ChannelTransport, IoTransport, SseBody, TransportWriter};
