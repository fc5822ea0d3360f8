use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::StreamExt;
use std::pin::Pin;

use thumb_core::CasResult;

/// Stream of bytes for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Wrap an in-memory payload as a single-chunk stream
pub fn stream_from_bytes(data: impl Into<Bytes>) -> ByteStream {
    let data = data.into();
    Box::pin(futures_util::stream::once(async move {
        Ok::<_, std::io::Error>(data)
    }))
}

/// Drain a stream into one contiguous buffer.
///
/// Only for callers that genuinely need the whole payload (tests, small
/// sinks); the ingestion path never calls this.
pub async fn collect_stream(mut stream: ByteStream) -> CasResult<Bytes> {
    let mut data = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        data.extend_from_slice(&chunk?);
    }
    Ok(data.freeze())
}
