//! Streaming content identity.
//!
//! [`DigestTee`] hands a source stream to a [`BlobStore`] sink through a
//! [`DigestStream`], which hashes, counts and keeps a bounded prefix of every
//! chunk as the sink pulls it. The attributes are only known once the sink has
//! consumed the whole source.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use pin_project::pin_project;
use sha1::{Digest, Sha1};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use thumb_core::{Attributes, CasError, CasResult};

use crate::{sniff, BlobConfig, BlobStore, ByteStream};

type Outcome = Result<Attributes, io::Error>;

/// Stream adapter that computes [`Attributes`] for the bytes flowing through it.
///
/// The outcome is sent exactly once: the final attributes when the source
/// ends, or the first error. Nothing is forwarded after an error.
#[pin_project]
pub struct DigestStream<S> {
    #[pin]
    source: S,
    hasher: Sha1,
    size: u64,
    prefix: Vec<u8>,
    prefix_limit: usize,
    max_bytes: u64,
    done: bool,
    outcome: Option<oneshot::Sender<Outcome>>,
}

impl<S> DigestStream<S>
where
    S: Stream<Item = Result<Bytes, io::Error>>,
{
    /// Wrap `source`; the receiver yields the outcome once the stream finishes.
    pub fn new(
        source: S,
        prefix_limit: usize,
        max_bytes: u64,
    ) -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let stream = Self {
            source,
            hasher: Sha1::new(),
            size: 0,
            prefix: Vec::with_capacity(prefix_limit.min(8192)),
            prefix_limit,
            max_bytes,
            done: false,
            outcome: Some(tx),
        };
        (stream, rx)
    }
}

fn settle(outcome: &mut Option<oneshot::Sender<Outcome>>, result: Outcome) {
    if let Some(tx) = outcome.take() {
        // The receiver is gone only if the tee itself was dropped.
        let _ = tx.send(result);
    }
}

impl<S> Stream for DigestStream<S>
where
    S: Stream<Item = Result<Bytes, io::Error>>,
{
    type Item = Result<Bytes, io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        match ready!(this.source.poll_next(cx)) {
            Some(Ok(chunk)) => {
                *this.size += chunk.len() as u64;
                if *this.size > *this.max_bytes {
                    *this.done = true;
                    let message = format!("blob exceeds max size of {} bytes", this.max_bytes);
                    settle(
                        this.outcome,
                        Err(io::Error::new(io::ErrorKind::InvalidData, message.clone())),
                    );
                    return Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        message,
                    ))));
                }

                this.hasher.update(&chunk);
                if this.prefix.len() < *this.prefix_limit {
                    let take = (*this.prefix_limit - this.prefix.len()).min(chunk.len());
                    this.prefix.extend_from_slice(&chunk[..take]);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                *this.done = true;
                settle(this.outcome, Err(io::Error::new(e.kind(), e.to_string())));
                Poll::Ready(Some(Err(e)))
            }
            None => {
                *this.done = true;
                let hash = hex::encode(std::mem::take(this.hasher).finalize());
                let content_type = sniff::sniff(&this.prefix[..]).to_string();
                settle(
                    this.outcome,
                    Ok(Attributes::new(hash, *this.size, Some(content_type))),
                );
                Poll::Ready(None)
            }
        }
    }
}

/// Single-use tee from a source stream into a blob sink.
///
/// `tee` consumes the tee, so each instance ingests exactly one stream.
#[derive(Debug, Clone)]
pub struct DigestTee {
    prefix_limit: usize,
    max_bytes: u64,
}

impl DigestTee {
    pub fn new(config: &BlobConfig) -> Self {
        Self {
            prefix_limit: config.sniff_prefix_bytes,
            max_bytes: config.max_blob_bytes,
        }
    }

    /// Stream `source` into `sink` under `key`, returning the content attributes.
    ///
    /// The source is only polled when the sink asks for the next chunk. Fails
    /// with the source error, the sink error, or an `Io` error when the sink
    /// returns before the source is exhausted.
    #[tracing::instrument(skip(self, source, sink))]
    pub async fn tee<B>(self, source: ByteStream, sink: &B, key: &str) -> CasResult<Attributes>
    where
        B: BlobStore + ?Sized,
    {
        let (stream, outcome) = DigestStream::new(source, self.prefix_limit, self.max_bytes);
        let put = sink.put(key, Box::pin(stream)).await;

        match (put, outcome.await) {
            (Err(e), _) => {
                warn!(key, error = %e, "sink failed while ingesting");
                Err(e)
            }
            (Ok(_), Ok(Err(e))) => Err(CasError::from(e)),
            (Ok(_), Err(_)) => Err(CasError::io(
                io::ErrorKind::UnexpectedEof,
                format!("sink for {key} finished before the source was exhausted"),
            )),
            (Ok(put), Ok(Ok(attributes))) => {
                if put.size_bytes != attributes.size {
                    warn!(
                        key,
                        streamed = attributes.size,
                        stored = put.size_bytes,
                        "sink reported a different size"
                    );
                }
                debug!(
                    key,
                    size = attributes.size,
                    hash = attributes.hash.as_deref().unwrap_or_default(),
                    "digest complete"
                );
                Ok(attributes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{collect_stream, MemoryBlobStore, PutResult};
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn chunks(parts: &[&'static [u8]]) -> ByteStream {
        Box::pin(stream::iter(
            parts.iter().map(|p| Ok::<_, io::Error>(Bytes::from_static(*p))).collect::<Vec<_>>(),
        ))
    }

    fn tee() -> DigestTee {
        DigestTee::new(&BlobConfig::default())
    }

    #[tokio::test]
    async fn empty_stream_has_well_known_digest() {
        let store = MemoryBlobStore::new();
        let attrs = tee().tee(chunks(&[]), &store, "k").await.unwrap();

        assert_eq!(attrs.size, 0);
        assert_eq!(
            attrs.hash.as_deref(),
            Some("da39a3ee5e6b4b0d3255bfef95601890afd80709")
        );
        assert_eq!(attrs.content_type.as_deref(), Some(sniff::OCTET_STREAM));
    }

    #[tokio::test]
    async fn chunking_does_not_change_identity() {
        let store = MemoryBlobStore::new();
        let whole = tee()
            .tee(chunks(&[b"hello, world"]), &store, "a")
            .await
            .unwrap();
        let split = tee()
            .tee(chunks(&[b"hel", b"lo, ", b"world"]), &store, "b")
            .await
            .unwrap();

        assert_eq!(whole, split);
        assert_eq!(
            whole.hash.as_deref(),
            Some("b7e23ec29af22b0b4e41da31e868d57226121c84")
        );
        assert_eq!(whole.content_type.as_deref(), Some("text/plain"));

        let stored = collect_stream(store.get("b").await.unwrap()).await.unwrap();
        assert_eq!(&stored[..], b"hello, world");
    }

    #[tokio::test]
    async fn sniffing_only_sees_the_bounded_prefix() {
        let store = MemoryBlobStore::new();
        let config = BlobConfig::default().with_sniff_prefix_bytes(3);
        let attrs = DigestTee::new(&config)
            .tee(chunks(&[b"GI", b"F89a", b"rest"]), &store, "k")
            .await
            .unwrap();

        // "GIF" alone is not a full signature but is valid text
        assert_eq!(attrs.content_type.as_deref(), Some("text/plain"));
        assert_eq!(attrs.size, 10);
    }

    #[tokio::test]
    async fn source_error_fails_the_tee() {
        let store = MemoryBlobStore::new();
        let source: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "upstream hung up")),
        ]));

        let err = tee().tee(source, &store, "k").await.unwrap_err();
        assert_eq!(err.kind(), thumb_core::ErrorKind::Io);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn oversized_stream_is_rejected() {
        let store = MemoryBlobStore::new();
        let config = BlobConfig::default().with_max_blob_bytes(4);
        let err = DigestTee::new(&config)
            .tee(chunks(&[b"abc", b"def"]), &store, "k")
            .await
            .unwrap_err();

        match err {
            CasError::Io { source } => assert_eq!(source.kind(), io::ErrorKind::InvalidData),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// Sink that stops reading after the first chunk.
    struct ShortSink;

    #[async_trait]
    impl BlobStore for ShortSink {
        async fn put(&self, _key: &str, mut stream: ByteStream) -> CasResult<PutResult> {
            let first = stream.next().await.transpose()?.unwrap_or_default();
            Ok(PutResult {
                size_bytes: first.len() as u64,
            })
        }

        async fn get(&self, key: &str) -> CasResult<ByteStream> {
            Err(CasError::not_found(key))
        }

        async fn delete(&self, key: &str) -> CasResult<()> {
            Err(CasError::not_found(key))
        }

        async fn exists(&self, _key: &str) -> CasResult<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn sink_returning_early_is_an_error() {
        let err = tee()
            .tee(chunks(&[b"one", b"two"]), &ShortSink, "k")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), thumb_core::ErrorKind::Io);
    }

    /// Sink whose backend fails after accepting the first chunk.
    struct FailingSink;

    #[async_trait]
    impl BlobStore for FailingSink {
        async fn put(&self, _key: &str, mut stream: ByteStream) -> CasResult<PutResult> {
            stream.next().await.transpose()?;
            Err(CasError::backend(io::Error::new(
                io::ErrorKind::Other,
                "no space left on blob volume",
            )))
        }

        async fn get(&self, key: &str) -> CasResult<ByteStream> {
            Err(CasError::not_found(key))
        }

        async fn delete(&self, key: &str) -> CasResult<()> {
            Err(CasError::not_found(key))
        }

        async fn exists(&self, _key: &str) -> CasResult<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn sink_error_is_reported_as_is() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        let source: ByteStream = Box::pin(stream::iter(0..8).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, io::Error>(Bytes::from(vec![i as u8; 32]))
        }));

        let err = tee().tee(source, &FailingSink, "k").await.unwrap_err();
        assert_eq!(err.kind(), thumb_core::ErrorKind::Backend);
        assert_eq!(produced.load(Ordering::SeqCst), 1);
    }

    /// Sink that checks the source never runs ahead of it.
    struct PacedSink {
        produced: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BlobStore for PacedSink {
        async fn put(&self, _key: &str, mut stream: ByteStream) -> CasResult<PutResult> {
            let mut consumed = 0usize;
            let mut size_bytes = 0u64;
            while let Some(chunk) = stream.next().await {
                consumed += 1;
                assert!(self.produced.load(Ordering::SeqCst) <= consumed);
                size_bytes += chunk?.len() as u64;
                tokio::task::yield_now().await;
            }
            Ok(PutResult { size_bytes })
        }

        async fn get(&self, key: &str) -> CasResult<ByteStream> {
            Err(CasError::not_found(key))
        }

        async fn delete(&self, key: &str) -> CasResult<()> {
            Err(CasError::not_found(key))
        }

        async fn exists(&self, _key: &str) -> CasResult<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn source_is_pulled_at_the_sink_pace() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        let source: ByteStream = Box::pin(stream::iter(0..16).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, io::Error>(Bytes::from(vec![i as u8; 64]))
        }));

        let attrs = tee()
            .tee(source, &PacedSink { produced: produced.clone() }, "k")
            .await
            .unwrap();
        assert_eq!(attrs.size, 16 * 64);
        assert_eq!(produced.load(Ordering::SeqCst), 16);
    }
}
