//! HTTP response plumbing for serving a stream.
//!
//! The headers below are negotiated once, before the preamble frame. With a
//! [`ChannelTransport`] the response head is handed to the HTTP server right
//! away while the stream keeps writing into the body.

use http::{
    HeaderMap, HeaderValue, Response, StatusCode,
    header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONNECTION, CONTENT_TYPE},
};

use crate::{
    config::StreamConfig,
    error::{SseError, SseResult},
    stream::Stream,
    transport::{ChannelTransport, SseBody},
};

/// Media type of the stream.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

/// Headers sent with every event stream response.
pub fn sse_headers() -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(4);
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(EVENT_STREAM_CONTENT_TYPE),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers
}

/// Wrap `body` in a `200 OK` event stream response.
pub fn sse_response<B>(body: B) -> Response<B> {
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    *response.headers_mut() = sse_headers();
    response
}

/// Create a stream writing into the body of a ready-to-serve response.
///
/// # Errors
///
/// Returns an error if configuration validation fails.
pub fn open_response(
    config: &StreamConfig,
) -> SseResult<(Stream<ChannelTransport>, Response<SseBody>)> {
    // Checked before the channel is sized.
    config.validate().map_err(SseError::config)?;

    let (transport, body) = ChannelTransport::new(config.channel_capacity);
    let stream = Stream::with_config(transport, config)?;
    Ok((stream, sse_response(body)))
}
