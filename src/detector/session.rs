//! The one detector the whole process shares.
//!
//! Creating a detector is slow (model download, network construction) and the
//! shell may ask for it from several places while it is still being built.
//! Every request either gets the ready detector or attaches to the single
//! creation in flight. A failed creation is reported to everyone attached to
//! it and then cleared, so the next request starts a fresh attempt.

use super::SharedDetector;
use crate::error::DetectorError;
use log::{error, info};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio::sync::watch;

type Outcome = Option<Result<SharedDetector, DetectorError>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Failed(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "waiting for face model"),
            SessionState::Initializing => write!(f, "loading face model..."),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Failed(reason) => write!(f, "failed to load model ({reason})"),
        }
    }
}

enum Slot {
    Empty,
    Pending(watch::Receiver<Outcome>),
    Ready(SharedDetector),
}

struct SessionInner {
    slot: Mutex<Slot>,
    state: watch::Sender<SessionState>,
}

impl SessionInner {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, outcome: &Result<SharedDetector, DetectorError>) {
        let mut slot = self.lock_slot();
        match outcome {
            Ok(detector) => {
                *slot = Slot::Ready(detector.clone());
                self.state.send_replace(SessionState::Ready);
                info!("Face detector ready");
            }
            Err(e) => {
                *slot = Slot::Empty;
                self.state.send_replace(SessionState::Failed(e.to_string()));
                error!("Face detector creation failed: {}", e);
            }
        }
    }
}

#[derive(Clone)]
pub struct DetectorSession {
    inner: Arc<SessionInner>,
}

impl Default for DetectorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorSession {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            inner: Arc::new(SessionInner {
                slot: Mutex::new(Slot::Empty),
                state,
            }),
        }
    }

    /// Process wide session.
    pub fn shared() -> &'static DetectorSession {
        static SHARED: OnceLock<DetectorSession> = OnceLock::new();
        SHARED.get_or_init(DetectorSession::new)
    }

    /// The detector if it is ready, without waiting.
    pub fn get(&self) -> Option<SharedDetector> {
        match &*self.inner.lock_slot() {
            Slot::Ready(detector) => Some(detector.clone()),
            _ => None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Get the detector, creating it with `create` if nobody has yet.
    ///
    /// `create` is only called when no detector exists and no creation is in
    /// flight. The creation runs in its own task so it completes even if
    /// this caller stops waiting.
    pub async fn ensure_ready<F, Fut>(&self, create: F) -> Result<SharedDetector, DetectorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<SharedDetector>> + Send + 'static,
    {
        let mut pending = {
            let mut slot = self.inner.lock_slot();
            match &*slot {
                Slot::Ready(detector) => return Ok(detector.clone()),
                Slot::Pending(pending) => pending.clone(),
                Slot::Empty => {
                    let (sender, pending) = watch::channel(None);
                    *slot = Slot::Pending(pending.clone());
                    self.inner.state.send_replace(SessionState::Initializing);
                    info!("Creating face detector");

                    let creation = create();
                    let inner = self.inner.clone();
                    tokio::spawn(async move {
                        let outcome = creation
                            .await
                            .map_err(|e| DetectorError::Initialization(format!("{e:#}")));
                        inner.finish(&outcome);
                        sender.send_replace(Some(outcome));
                    });
                    pending
                }
            }
        };

        let outcome = match pending.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        match outcome {
            Some(outcome) => outcome,
            None => {
                // creation task died without reporting
                self.clear_abandoned();
                Err(DetectorError::Abandoned)
            }
        }
    }

    fn clear_abandoned(&self) {
        let mut slot = self.inner.lock_slot();
        if let Slot::Pending(pending) = &*slot {
            if pending.has_changed().is_err() {
                *slot = Slot::Empty;
                self.inner
                    .state
                    .send_replace(SessionState::Failed(DetectorError::Abandoned.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{EstimateOptions, FaceLandmarkDetector};
    use crate::face::{EyeAnchors, Face};
    use opencv::core::Mat;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubDetector;

    impl FaceLandmarkDetector for StubDetector {
        fn eye_anchors(&self) -> EyeAnchors {
            EyeAnchors::new(0, 1)
        }

        fn estimate_faces(
            &self,
            _frame: &Mat,
            _options: EstimateOptions,
        ) -> Result<Vec<Face>, DetectorError> {
            Ok(Vec::new())
        }
    }

    type Creation = std::pin::Pin<Box<dyn Future<Output = anyhow::Result<SharedDetector>> + Send>>;

    fn creator(calls: &Arc<AtomicUsize>, succeed: bool) -> impl FnOnce() -> Creation {
        let calls = calls.clone();
        move || {
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                if succeed {
                    Ok(Arc::new(StubDetector) as SharedDetector)
                } else {
                    Err(anyhow::anyhow!("model download failed"))
                }
            })
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_detector() {
        let session = DetectorSession::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (first, second) = tokio::join!(
            session.ensure_ready(creator(&calls, true)),
            session.ensure_ready(creator(&calls, true)),
        );
        let first = first.unwrap();
        let second = second.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let later = session.ensure_ready(creator(&calls, true)).await.unwrap();
        assert!(Arc::ptr_eq(&first, &later));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.get().is_some());
    }

    #[tokio::test]
    async fn clones_attach_to_the_same_creation() {
        let session = DetectorSession::new();
        let other_owner = session.clone();
        let calls = Arc::new(AtomicUsize::new(0));

        let waiting = tokio::spawn({
            let calls = calls.clone();
            async move { other_owner.ensure_ready(creator(&calls, true)).await }
        });
        let direct = session.ensure_ready(creator(&calls, true)).await.unwrap();
        let spawned = waiting.await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&direct, &spawned));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter_then_clears() {
        let session = DetectorSession::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (first, second) = tokio::join!(
            session.ensure_ready(creator(&calls, false)),
            session.ensure_ready(creator(&calls, false)),
        );
        assert!(matches!(first, Err(DetectorError::Initialization(_))));
        assert!(matches!(second, Err(DetectorError::Initialization(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(session.state(), SessionState::Failed(_)));
        assert!(session.get().is_none());

        session.ensure_ready(creator(&calls, true)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn state_is_observable_while_loading() {
        let session = DetectorSession::new();
        let mut states = session.subscribe();
        assert_eq!(session.state(), SessionState::Uninitialized);

        let calls = Arc::new(AtomicUsize::new(0));
        let loading = tokio::spawn({
            let session = session.clone();
            async move { session.ensure_ready(creator(&calls, true)).await }
        });

        states
            .wait_for(|state| *state == SessionState::Initializing)
            .await
            .unwrap();
        loading.await.unwrap().unwrap();
        assert_eq!(session.state().to_string(), "ready");
    }

    #[test]
    fn shared_session_is_a_singleton() {
        assert!(std::ptr::eq(
            DetectorSession::shared(),
            DetectorSession::shared()
        ));
    }
}
