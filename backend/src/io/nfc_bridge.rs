//! Tag reader fed by an external NFC bridge.
//!
//! The server has no radio of its own. A phone or USB reader forwards every
//! tag it sees to `POST /api/nfc/readings`, which lands in [`BridgeTagReader::push`].
//! Readings are only delivered while a scan session is listening.

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::{ScanError, TagReader, TagStream};

const READING_BUFFER: usize = 32;

pub struct BridgeTagReader {
    enabled: bool,
    listener: Mutex<Option<mpsc::Sender<String>>>,
}

impl BridgeTagReader {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            listener: Mutex::new(None),
        }
    }

    /// Forward a tag reading. Returns `false` when no scan is listening.
    pub async fn push(&self, tag_id: &str) -> bool {
        let sender = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let Some(sender) = sender else {
            debug!("Ignoring tag {} with no active scan", tag_id);
            return false;
        };

        if sender.send(tag_id.to_string()).await.is_err() {
            debug!("Scan stopped listening, dropping tag {}", tag_id);
            let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
            if listener.as_ref().is_some_and(|current| current.same_channel(&sender)) {
                *listener = None;
            }
            return false;
        }
        true
    }
}

#[async_trait]
impl TagReader for BridgeTagReader {
    fn is_supported(&self) -> bool {
        self.enabled
    }

    async fn start_reading(&self) -> Result<TagStream, ScanError> {
        if !self.enabled {
            warn!("NFC bridge is disabled");
            return Err(ScanError::Unsupported);
        }

        let (sender, receiver) = mpsc::channel(READING_BUFFER);
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);
        info!("NFC bridge listening for readings");
        Ok(receiver)
    }
}
