//! Handles to instances that are still being built.
//!
//! A [`ForwardHandle`] lets dependants hold a cache or descriptor store while
//! its producer (opening a database, warming a cache) is still running. Calls
//! made in the meantime are queued and replayed in order once the instance
//! exists.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use thumb_core::{CasError, CasResult, ContentId, DeleteOutcome, Descriptor};
use thumb_store::DescriptorStore;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::ExpirableCache;

type Outcome<T> = Result<Arc<T>, Arc<CasError>>;
type Deferred<T> = Box<dyn FnOnce(Outcome<T>) -> BoxFuture<'static, ()> + Send>;

enum State<T> {
    Pending(VecDeque<Deferred<T>>),
    Resolved(Arc<T>),
    Failed(Arc<CasError>),
}

/// Observable state of a [`ForwardHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardState {
    Pending,
    Resolved,
    Failed,
}

/// Stand-in for a `T` that a producer future will deliver.
///
/// Operations submitted while the producer runs are deferred and executed
/// one at a time, in submission order, once it succeeds. If it fails every
/// deferred and later operation fails with [`CasError::Producer`] carrying
/// the producer's error. Both outcomes are final.
pub struct ForwardHandle<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for ForwardHandle<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> ForwardHandle<T>
where
    T: Send + Sync + 'static,
{
    /// Spawn `producer` on the current tokio runtime and return its handle
    pub fn new<F>(producer: F) -> Self
    where
        F: Future<Output = CasResult<T>> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(State::Pending(VecDeque::new())));
        tokio::spawn(resolve(state.clone(), producer));
        Self { state }
    }

    /// A handle whose instance already exists
    pub fn resolved(instance: T) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::Resolved(Arc::new(instance)))),
        }
    }

    pub fn state(&self) -> ForwardState {
        match &*self.state.lock() {
            State::Pending(_) => ForwardState::Pending,
            State::Resolved(_) => ForwardState::Resolved,
            State::Failed(_) => ForwardState::Failed,
        }
    }

    /// Run `op` against the instance, waiting for the producer if needed
    pub async fn call<R, F>(&self, op: F) -> CasResult<R>
    where
        R: Send + 'static,
        F: FnOnce(Arc<T>) -> BoxFuture<'static, CasResult<R>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Deferred<T> = Box::new(move |outcome| {
            async move {
                let result = match outcome {
                    Ok(instance) => op(instance).await,
                    Err(error) => Err(CasError::producer(error)),
                };
                let _ = tx.send(result);
            }
            .boxed()
        });

        let ready = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Pending(queue) => {
                    queue.push_back(job);
                    None
                }
                State::Resolved(instance) => Some((job, Ok(instance.clone()))),
                State::Failed(error) => Some((job, Err(error.clone()))),
            }
        };
        if let Some((job, outcome)) = ready {
            job(outcome).await;
        }

        rx.await.map_err(|_| {
            CasError::io(
                std::io::ErrorKind::Interrupted,
                "forward handle call ended without a result",
            )
        })?
    }

    /// Wait for the producer and return the instance
    pub async fn instance(&self) -> CasResult<Arc<T>> {
        self.call(|instance| async move { Ok(instance) }.boxed()).await
    }
}

async fn resolve<T, F>(state: Arc<Mutex<State<T>>>, producer: F)
where
    T: Send + Sync + 'static,
    F: Future<Output = CasResult<T>> + Send + 'static,
{
    let outcome: Outcome<T> = match AssertUnwindSafe(producer).catch_unwind().await {
        Ok(Ok(instance)) => {
            debug!("Forward handle resolved");
            Ok(Arc::new(instance))
        }
        Ok(Err(error)) => {
            warn!(error = %error, "Forward handle producer failed");
            Err(Arc::new(error))
        }
        Err(_) => {
            warn!("Forward handle producer panicked");
            Err(Arc::new(CasError::invalid("forward handle producer panicked")))
        }
    };

    // Calls keep queueing while the backlog drains, so order is preserved
    // until the state flips.
    loop {
        let job = {
            let mut guard = state.lock();
            let State::Pending(queue) = &mut *guard else {
                return;
            };
            match queue.pop_front() {
                Some(job) => job,
                None => {
                    *guard = match &outcome {
                        Ok(instance) => State::Resolved(instance.clone()),
                        Err(error) => State::Failed(error.clone()),
                    };
                    return;
                }
            }
        };
        // A panicking call drops its sender; its caller sees the error.
        if AssertUnwindSafe(job(outcome.clone())).catch_unwind().await.is_err() {
            warn!("Deferred forward handle call panicked");
        }
    }
}

#[async_trait]
impl<C> ExpirableCache for ForwardHandle<C>
where
    C: ExpirableCache + 'static,
{
    type Key = C::Key;
    type Value = C::Value;
    type Hit = C::Hit;

    async fn get_if_present(&self, key: &C::Key) -> CasResult<Option<C::Hit>> {
        let key = key.clone();
        self.call(move |cache| async move { cache.get_if_present(&key).await }.boxed())
            .await
    }

    async fn put(
        &self,
        key: C::Key,
        value: C::Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> CasResult<()> {
        self.call(move |cache| async move { cache.put(key, value, expires_at).await }.boxed())
            .await
    }

    async fn invalidate(&self, key: &C::Key) -> CasResult<()> {
        let key = key.clone();
        self.call(move |cache| async move { cache.invalidate(&key).await }.boxed())
            .await
    }

    async fn invalidate_all(&self, keys: &[C::Key]) -> CasResult<()> {
        let keys = keys.to_vec();
        self.call(move |cache| async move { cache.invalidate_all(&keys).await }.boxed())
            .await
    }

    async fn clean_up(&self) -> CasResult<usize> {
        self.call(|cache| async move { cache.clean_up().await }.boxed())
            .await
    }
}

#[async_trait]
impl<D> DescriptorStore for ForwardHandle<D>
where
    D: DescriptorStore + 'static,
{
    async fn create(&self, id: &ContentId, descriptor: Descriptor) -> CasResult<u64> {
        let id = id.clone();
        self.call(move |store| async move { store.create(&id, descriptor).await }.boxed())
            .await
    }

    async fn read(&self, id: &ContentId) -> CasResult<Descriptor> {
        let id = id.clone();
        self.call(move |store| async move { store.read(&id).await }.boxed())
            .await
    }

    async fn exists(&self, id: &ContentId) -> CasResult<bool> {
        let id = id.clone();
        self.call(move |store| async move { store.exists(&id).await }.boxed())
            .await
    }

    async fn duplicate(&self, id: &ContentId) -> CasResult<u64> {
        let id = id.clone();
        self.call(move |store| async move { store.duplicate(&id).await }.boxed())
            .await
    }

    async fn delete(&self, id: &ContentId) -> CasResult<DeleteOutcome> {
        let id = id.clone();
        self.call(move |store| async move { store.delete(&id).await }.boxed())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolved_handles_run_calls_directly() {
        let handle = ForwardHandle::resolved(41u32);
        assert_eq!(handle.state(), ForwardState::Resolved);

        let answer = handle
            .call(|n| async move { Ok(*n + 1) }.boxed())
            .await
            .unwrap();
        assert_eq!(answer, 42);
    }

    #[tokio::test]
    async fn panicking_producer_fails_the_handle() {
        let handle: ForwardHandle<u32> = ForwardHandle::new(async {
            let value: Option<u32> = None;
            Ok(value.expect("producer had nothing to return"))
        });

        let err = handle.instance().await.unwrap_err();
        assert_eq!(err.kind(), thumb_core::ErrorKind::Producer);
        assert_eq!(handle.state(), ForwardState::Failed);
    }
}
