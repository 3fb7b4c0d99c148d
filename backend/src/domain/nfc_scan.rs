//! NFC scan session.
//!
//! Wraps a [`TagReader`] behind a single session with a coarse state
//! (`Idle`, `Requesting`, `Reading`, `Error`). Callers subscribe with a tag
//! observer and get back a [`ScanSubscription`] handle they can cancel.
//!
//! Only one hardware subscription exists at a time. Starting while a scan is
//! requesting or reading reuses it; the newest observer replaces the old one.
//! A start that joins a pending request waits for that request's outcome.
//! A generation counter ties handles and the tag pump to the session they were
//! created for, so a stale handle cannot cancel a newer scan and tags from a
//! cancelled reader are never delivered.

use async_trait::async_trait;
use shared::{NfcScanStatus, ScanState};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::errors::ScanError;

/// Tag identifiers delivered by a reader, one per detection
pub type TagStream = mpsc::Receiver<String>;

/// Callback invoked for every observed tag
pub type TagObserver = Arc<dyn Fn(String) + Send + Sync>;

/// Outcome of a pending access request, `None` until the reader answers
type StartOutcome = Option<Result<(), ScanError>>;

/// Access to a tag-reading capability that may not exist on this device
#[async_trait]
pub trait TagReader: Send + Sync {
    /// Static capability check
    fn is_supported(&self) -> bool;

    /// Negotiate access and start listening. Dropping the returned stream
    /// releases the reader.
    async fn start_reading(&self) -> Result<TagStream, ScanError>;
}

#[derive(Clone)]
pub struct NfcScanSession {
    reader: Arc<dyn TagReader>,
    supported: bool,
    inner: Arc<Mutex<SessionInner>>,
}

#[derive(Default)]
struct SessionInner {
    state: ScanState,
    last_error: Option<String>,
    scanned_tag_id: Option<String>,
    generation: u64,
    observer: Option<TagObserver>,
    pump: Option<JoinHandle<()>>,
    pending: Option<watch::Receiver<StartOutcome>>,
}

enum StartPlan {
    Reuse(u64),
    Join(u64, Option<watch::Receiver<StartOutcome>>),
    Request(u64, watch::Sender<StartOutcome>),
}

/// Handle to a running scan
pub struct ScanSubscription {
    generation: u64,
    inner: Arc<Mutex<SessionInner>>,
}

impl NfcScanSession {
    pub fn new(reader: Arc<dyn TagReader>) -> Self {
        let supported = reader.is_supported();
        info!("NFC scan session ready (supported: {})", supported);

        Self {
            reader,
            supported,
            inner: Arc::new(Mutex::new(SessionInner::default())),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn status(&self) -> NfcScanStatus {
        let inner = lock(&self.inner);
        NfcScanStatus {
            is_supported: self.supported,
            is_reading: inner.state == ScanState::Reading,
            last_error: inner.last_error.clone(),
            scanned_tag_id: inner.scanned_tag_id.clone(),
            state: inner.state.clone(),
        }
    }

    /// Start scanning, delivering every detected tag to `on_tag`
    ///
    /// Tags are not de-duplicated: a tag that stays in range may be reported
    /// more than once.
    pub async fn start<F>(&self, on_tag: F) -> Result<ScanSubscription, ScanError>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        if !self.supported {
            warn!("NFC scan requested but not supported on this device");
            return Err(ScanError::Unsupported);
        }

        let observer: TagObserver = Arc::new(on_tag);
        let plan = {
            let mut inner = lock(&self.inner);
            let generation = inner.generation;
            let active = inner.state.clone();
            inner.observer = Some(observer);
            match active {
                ScanState::Reading => {
                    info!("NFC scan already active, reusing session {}", generation);
                    StartPlan::Reuse(generation)
                }
                ScanState::Requesting => {
                    info!("NFC access already requested, joining session {}", generation);
                    StartPlan::Join(generation, inner.pending.clone())
                }
                _ => {
                    let (outcome_tx, outcome_rx) = watch::channel(None);
                    inner.generation += 1;
                    inner.state = ScanState::Requesting;
                    inner.last_error = None;
                    inner.pending = Some(outcome_rx);
                    StartPlan::Request(inner.generation, outcome_tx)
                }
            }
        };

        let (generation, outcome_tx) = match plan {
            StartPlan::Reuse(generation) => return Ok(self.subscription(generation)),
            StartPlan::Join(generation, pending) => return self.join_pending(generation, pending).await,
            StartPlan::Request(generation, outcome_tx) => (generation, outcome_tx),
        };

        info!("Requesting NFC reader access (session {})", generation);
        let result = self.reader.start_reading().await;

        let outcome = {
            let mut inner = lock(&self.inner);
            if inner.generation != generation {
                info!("NFC session {} was cancelled while requesting access", generation);
                Err(ScanError::Cancelled)
            } else {
                inner.pending = None;
                match result {
                    Ok(stream) => {
                        inner.state = ScanState::Reading;
                        inner.pump = Some(tokio::spawn(pump_tags(stream, Arc::clone(&self.inner), generation)));
                        info!("NFC reader listening (session {})", generation);
                        Ok(())
                    }
                    Err(err) => {
                        error!("Failed to start NFC reader: {}", err);
                        let message = err.to_string();
                        inner.state = ScanState::Error(message.clone());
                        inner.last_error = Some(message);
                        inner.observer = None;
                        Err(err)
                    }
                }
            }
        };

        // Nobody may be waiting; a closed channel is fine
        let _ = outcome_tx.send(Some(outcome.clone()));
        outcome.map(|()| self.subscription(generation))
    }

    async fn join_pending(
        &self,
        generation: u64,
        pending: Option<watch::Receiver<StartOutcome>>,
    ) -> Result<ScanSubscription, ScanError> {
        let Some(mut pending) = pending else {
            return Err(ScanError::Cancelled);
        };

        let outcome = match pending.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone().unwrap_or(Err(ScanError::Cancelled)),
            // The requesting caller went away without an answer
            Err(_) => Err(ScanError::Cancelled),
        };
        outcome.map(|()| self.subscription(generation))
    }

    fn subscription(&self, generation: u64) -> ScanSubscription {
        ScanSubscription {
            generation,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Cancel whatever scan is active. Returns `false` if nothing was running.
    pub fn stop(&self) -> bool {
        cancel(&self.inner, None)
    }
}

impl ScanSubscription {
    /// Whether this handle still refers to the running scan
    pub fn is_active(&self) -> bool {
        let inner = lock(&self.inner);
        inner.generation == self.generation
            && matches!(inner.state, ScanState::Requesting | ScanState::Reading)
    }

    /// Stop listening and release the reader. A handle from a superseded
    /// session does nothing.
    pub fn cancel(self) -> bool {
        cancel(&self.inner, Some(self.generation))
    }
}

fn lock(inner: &Mutex<SessionInner>) -> MutexGuard<'_, SessionInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn cancel(inner: &Mutex<SessionInner>, generation: Option<u64>) -> bool {
    let mut inner = lock(inner);
    if generation.is_some_and(|g| g != inner.generation) {
        debug!("Ignoring cancel from stale NFC session handle");
        return false;
    }
    if !matches!(inner.state, ScanState::Requesting | ScanState::Reading) {
        return false;
    }

    inner.generation += 1;
    inner.state = ScanState::Idle;
    inner.observer = None;
    inner.pending = None;
    if let Some(pump) = inner.pump.take() {
        pump.abort();
    }

    info!("NFC scan stopped");
    true
}

async fn pump_tags(mut stream: TagStream, inner: Arc<Mutex<SessionInner>>, generation: u64) {
    while let Some(tag_id) = stream.recv().await {
        let observer = {
            let mut inner = lock(&inner);
            if inner.generation != generation {
                return;
            }
            debug!("Tag observed: {}", tag_id);
            inner.scanned_tag_id = Some(tag_id.clone());
            inner.observer.clone()
        };

        if let Some(observer) = observer {
            observer(tag_id);
        }
    }

    let mut inner = lock(&inner);
    if inner.generation == generation {
        info!("NFC reader stream ended (session {})", generation);
        inner.state = ScanState::Idle;
        inner.observer = None;
        inner.pump = None;
    }
}
