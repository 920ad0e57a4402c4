//! Readiness slot for the answer service and its background constructor.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::answer::AnswerService;
use crate::config::InitConfig;
use crate::error::ConfigError;

pub type InitFuture = Pin<Box<dyn Future<Output = Result<AnswerService, ConfigError>> + Send>>;
type InitFn = dyn Fn() -> InitFuture + Send + Sync;

/// Shared, lazily filled holder of the [`AnswerService`].
///
/// Construction attempts are not serialized. The first instance stored wins;
/// instances built by slower concurrent attempts are dropped.
pub struct ServiceSlot {
    instance: RwLock<Option<Arc<AnswerService>>>,
    init: Box<InitFn>,
}

impl std::fmt::Debug for ServiceSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceSlot")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl ServiceSlot {
    /// Empty slot filled by calling `init`.
    pub fn new(init: impl Fn() -> InitFuture + Send + Sync + 'static) -> Self {
        Self {
            instance: RwLock::new(None),
            init: Box::new(init),
        }
    }

    /// Slot that is ready from the start and never calls an initializer.
    #[must_use]
    pub fn ready(service: AnswerService) -> Self {
        let slot = Self::new(|| {
            Box::pin(async {
                Err::<AnswerService, _>(ConfigError::Invalid(
                    "pre-filled service slot has no initializer".into(),
                ))
            })
        });
        slot.store(Arc::new(service));
        slot
    }

    #[must_use]
    pub fn get(&self) -> Option<Arc<AnswerService>> {
        self.instance
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.get().is_some()
    }

    /// Return the stored service, or run one construction attempt now.
    ///
    /// # Errors
    ///
    /// Returns the construction error when the slot is empty and the attempt
    /// fails.
    pub async fn get_or_init(&self) -> Result<Arc<AnswerService>, ConfigError> {
        if let Some(service) = self.get() {
            return Ok(service);
        }
        self.try_init().await
    }

    /// Run one construction attempt and store the result if the slot is
    /// still empty.
    ///
    /// # Errors
    ///
    /// Returns the construction error.
    pub async fn try_init(&self) -> Result<Arc<AnswerService>, ConfigError> {
        let service = Arc::new((self.init)().await?);
        Ok(self.store(service))
    }

    fn store(&self, service: Arc<AnswerService>) -> Arc<AnswerService> {
        let mut guard = self
            .instance
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match guard.as_ref() {
            Some(existing) => Arc::clone(existing),
            None => {
                *guard = Some(Arc::clone(&service));
                tracing::info!("answer service ready");
                service
            }
        }
    }
}

/// Retry construction in the background with exponential backoff until the
/// slot is filled or `shutdown` flips to `true`.
pub fn spawn_supervisor(
    slot: Arc<ServiceSlot>,
    init: &InitConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let initial = Duration::from_millis(init.retry_initial_ms);
    let max = Duration::from_millis(init.retry_max_ms).max(initial);

    tokio::spawn(async move {
        let mut delay = initial;
        let mut attempt: u32 = 0;
        loop {
            if slot.is_ready() {
                return;
            }
            attempt += 1;
            match slot.try_init().await {
                Ok(_) => return,
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "failed to initialize answer service: {e}"
                    );
                }
            }

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("service supervisor shutting down");
                        return;
                    }
                }
            }
            delay = (delay * 2).min(max);
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use vidhi_index::{InMemoryVectorStore, Retriever};
    use vidhi_llm::mock::{MockEmbedder, MockProvider};
    use vidhi_llm::{AnyEmbedder, AnyProvider};

    use super::*;

    fn service() -> AnswerService {
        let retriever = Retriever::new(
            AnyEmbedder::Mock(MockEmbedder::new(8)),
            Arc::new(InMemoryVectorStore::new()),
            "legal-bot",
        );
        AnswerService::new(retriever, AnyProvider::Mock(MockProvider::default()), 2)
    }

    /// Initializer that fails `failures` times, then succeeds.
    fn flaky(failures: usize) -> (ServiceSlot, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let slot = ServiceSlot::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n < failures {
                    Err(ConfigError::MissingCredential("GROQ_API_KEY".into()))
                } else {
                    Ok(service())
                }
            })
        });
        (slot, calls)
    }

    fn fast_backoff() -> InitConfig {
        InitConfig {
            retry_initial_ms: 1,
            retry_max_ms: 4,
        }
    }

    #[tokio::test]
    async fn get_or_init_reports_construction_error() {
        let (slot, calls) = flaky(usize::MAX);
        let err = slot.get_or_init().await.unwrap_err();
        assert_eq!(err.to_string(), "GROQ_API_KEY not found in environment");
        assert!(!slot.is_ready());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_or_init_retries_on_each_call_until_success() {
        let (slot, calls) = flaky(1);
        assert!(slot.get_or_init().await.is_err());
        assert!(slot.get_or_init().await.is_ok());
        assert!(slot.get_or_init().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(slot.is_ready());
    }

    #[tokio::test]
    async fn first_stored_instance_wins() {
        let (slot, _) = flaky(0);
        let first = slot.try_init().await.unwrap();
        let second = slot.try_init().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn ready_slot_skips_initializer() {
        let slot = ServiceSlot::ready(service());
        assert!(slot.is_ready());
        assert!(slot.get_or_init().await.is_ok());
    }

    #[tokio::test]
    async fn supervisor_fills_slot_after_failures() {
        let (slot, calls) = flaky(3);
        let slot = Arc::new(slot);
        let (_tx, rx) = watch::channel(false);

        spawn_supervisor(Arc::clone(&slot), &fast_backoff(), rx)
            .await
            .unwrap();
        assert!(slot.is_ready());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn supervisor_stops_on_shutdown() {
        let (slot, _) = flaky(usize::MAX);
        let slot = Arc::new(slot);
        let (tx, rx) = watch::channel(false);
        let backoff = InitConfig {
            retry_initial_ms: 60_000,
            retry_max_ms: 60_000,
        };

        let handle = spawn_supervisor(Arc::clone(&slot), &backoff, rx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!slot.is_ready());
    }

    #[tokio::test]
    async fn supervisor_exits_immediately_when_ready() {
        let slot = Arc::new(ServiceSlot::ready(service()));
        let (_tx, rx) = watch::channel(false);
        spawn_supervisor(slot, &fast_backoff(), rx).await.unwrap();
    }
}
