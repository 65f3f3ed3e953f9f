//! Driving a stream from an event producer.
//!
//! [`drive`] runs the producer and the heartbeat ticker in one
//! `tokio::select!` loop, so the stream has a single writer:
//!
//! ```text
//! drive(stream, events)
//!   loop ─┬─ events.next()    ──► Stream::send / Stream::err / Stream::finish
//!         ├─ ticker.tick()     ──► Stream::try_send_heartbeat
//!         └─ stream.closed()   ──► stop
//! ```
//!
//! The loop ends when the producer is exhausted or yields an error, when the
//! stream reaches its limit, when the preamble fails, or when the transport
//! reports that the peer went away. Dropping the returned future cancels the
//! loop without writing anything further.

use std::{convert::Infallible, fmt, pin::pin, time::Duration};

use futures_util::{Stream as FuturesStream, StreamExt};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use crate::{
    encoder::FrameEncoder,
    event::{Event, EventError},
    stream::Stream,
    transport::TransportWriter,
};

/// How a [`drive`] loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveOutcome {
    /// The producer ran out of events; the goodbye frame was written.
    Finished,
    /// The event limit was reached; the goodbye frame was written.
    LimitReached,
    /// The producer yielded an error; an error event was written.
    Errored,
    /// The stream died without the driver finishing it: the preamble failed
    /// or the peer went away.
    Aborted,
}

impl fmt::Display for DriveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished => write!(f, "Finished"),
            Self::LimitReached => write!(f, "LimitReached"),
            Self::Errored => write!(f, "Errored"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Forward `events` to `stream`, heartbeating while the producer is idle.
pub async fn drive<T, E, S>(stream: &mut Stream<T, E>, events: S) -> DriveOutcome
where
    T: TransportWriter,
    E: FrameEncoder,
    S: FuturesStream<Item = Event>,
{
    drive_results(stream, events.map(Ok::<_, Infallible>)).await
}

/// Like [`drive`], for producers that can fail.
///
/// The first `Err` is written as an error event and ends the stream.
pub async fn drive_results<T, E, S, Er>(stream: &mut Stream<T, E>, events: S) -> DriveOutcome
where
    T: TransportWriter,
    E: FrameEncoder,
    S: FuturesStream<Item = Result<Event, Er>>,
    Er: Into<EventError>,
{
    let mut events = pin!(events);
    // `interval_at` rejects a zero period.
    let period = stream.heartbeat_interval().max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = loop {
        if stream.is_done() {
            if stream.is_established() && !stream.is_terminated() {
                stream.finish().await;
                break DriveOutcome::LimitReached;
            }
            break DriveOutcome::Aborted;
        }
        // Before the preamble, the first write reports a dead peer itself.
        let established = stream.is_established();
        if established && stream.is_closed() {
            debug!("SSE transport closed");
            break DriveOutcome::Aborted;
        }

        tokio::select! {
            item = events.next() => match item {
                Some(Ok(event)) => stream.send(event).await,
                Some(Err(err)) => {
                    stream.err(err).await;
                    break DriveOutcome::Errored;
                }
                None => {
                    stream.finish().await;
                    break DriveOutcome::Finished;
                }
            },
            _ = ticker.tick() => {
                debug!("SSE heartbeat tick");
                stream.try_send_heartbeat().await;
            }
            () = stream.closed(), if established => {
                debug!("SSE transport closed while idle");
                break DriveOutcome::Aborted;
            }
        }
    };

    info!(
        outcome = %outcome,
        sent = stream.sent_count(),
        established = stream.is_established(),
        "SSE stream ended"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use futures_util::stream;
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::{
        config::StreamConfig,
        transport::{ChannelTransport, IoTransport},
    };

    fn output(stream: Stream<IoTransport<Vec<u8>>>) -> String {
        String::from_utf8(stream.into_transport().into_inner()).expect("utf-8")
    }

    #[tokio::test]
    async fn test_drive_finishes_when_producer_ends() {
        let mut sse = Stream::new(IoTransport::new(Vec::new()));
        let events = stream::iter(vec![Event::new(1).with_id("1"), Event::new(2).with_id("2")]);

        let outcome = drive(&mut sse, events).await;

        assert_eq!(outcome, DriveOutcome::Finished);
        assert_eq!(sse.sent_count(), 2);
        assert!(sse.is_done());
        assert_eq!(
            output(sse),
            "retry: 1000\nevent: open\ndata: \"hello\"\n\n\
             id: 1\ndata: 1\n\n\
             id: 2\ndata: 2\n\n\
             retry: 10\nevent: close\ndata: \"byebye\"\n\n"
        );
    }

    #[tokio::test]
    async fn test_drive_stops_at_limit() {
        let config = StreamConfig::new().limit(2);
        let mut sse =
            Stream::with_config(IoTransport::new(Vec::new()), &config).expect("valid config");
        let events = stream::iter((0..10).map(Event::new));

        let outcome = drive(&mut sse, events).await;

        assert_eq!(outcome, DriveOutcome::LimitReached);
        assert_eq!(sse.sent_count(), 2);
        let written = output(sse);
        assert!(written.ends_with("event: close\ndata: \"byebye\"\n\n"));
        assert!(!written.contains("data: 2\n"));
    }

    #[tokio::test]
    async fn test_drive_writes_producer_error() {
        let mut sse = Stream::new(IoTransport::new(Vec::new()));
        let events = stream::iter(vec![
            Ok(Event::new("a")),
            Err(EventError::new("cursor out of range")),
            Ok(Event::new("never sent")),
        ]);

        let outcome = drive_results(&mut sse, events).await;

        assert_eq!(outcome, DriveOutcome::Errored);
        assert_eq!(sse.sent_count(), 1);
        let written = output(sse);
        assert!(written.ends_with("event: error\ndata: cursor out of range\n\n"));
        assert!(!written.contains("never sent"));
        assert!(!written.contains("byebye"));
    }

    #[tokio::test]
    async fn test_drive_aborts_when_preamble_fails() {
        let (transport, body) = ChannelTransport::new(4);
        drop(body);
        let mut sse = Stream::new(transport);

        let outcome = drive(&mut sse, stream::iter(vec![Event::new(1), Event::new(2)])).await;

        assert_eq!(outcome, DriveOutcome::Aborted);
        assert!(!sse.is_established());
        assert!(sse.is_done());
        assert_eq!(sse.sent_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_heartbeats_while_idle() {
        let mut sse = Stream::new(IoTransport::new(Vec::new()));
        let events = stream::iter(vec![Event::new("first")]).chain(stream::pending());

        let result = tokio::time::timeout(Duration::from_secs(35), drive(&mut sse, events)).await;
        assert!(result.is_err(), "idle producer keeps the stream open");

        assert!(!sse.is_done());
        let written = output(sse);
        assert_eq!(written.matches(":\n\n").count(), 3);
        assert!(written.starts_with("retry: 1000\nevent: open"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_stops_when_body_dropped() {
        let (transport, mut body) = ChannelTransport::new(8);
        let mut sse = Stream::new(transport);
        let events = stream::iter(vec![Event::new(1)]).chain(stream::pending());

        let client = async move {
            assert!(body.next_frame().await.is_some(), "preamble");
            assert!(body.next_frame().await.is_some(), "first event");
            drop(body);
        };
        let (outcome, ()) = tokio::join!(
            tokio::time::timeout(Duration::from_secs(3600), drive(&mut sse, events)),
            client,
        );

        assert_eq!(outcome.expect("driver exits"), DriveOutcome::Aborted);
        assert!(sse.is_established());
        assert!(sse.is_closed());
        assert_eq!(sse.sent_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_stops_after_heartbeat_hits_broken_pipe() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut sse = Stream::new(IoTransport::new(server));
        let events = stream::iter(vec![Event::new("first")]).chain(stream::pending());

        let reader = async move {
            let mut seen = Vec::new();
            let mut chunk = [0u8; 256];
            while !String::from_utf8_lossy(&seen).contains("data: \"first\"") {
                let n = client.read(&mut chunk).await.expect("read");
                assert_ne!(n, 0, "writer closed early");
                seen.extend_from_slice(&chunk[..n]);
            }
            drop(client);
        };
        let (outcome, ()) = tokio::join!(
            tokio::time::timeout(Duration::from_secs(3600), drive(&mut sse, events)),
            reader,
        );

        assert_eq!(outcome.expect("driver exits"), DriveOutcome::Aborted);
        assert!(sse.is_closed());
        assert!(!sse.is_done());
    }
}
