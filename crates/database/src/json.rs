use crate::error::DbError;
use crate::store::{ScanStateStore, SignalStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{ScanState, Signal, SignalResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const SIGNALS_FILE: &str = "signals.json";
const SCAN_STATE_FILE: &str = "scan_state.json";

/// A store that keeps everything in JSON files under one data directory.
///
/// Every read-modify-write cycle runs under a single async mutex, which makes
/// the conditional resolution update atomic within the process.
#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    /// Opens (and creates if needed) the data directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, DbError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>, DbError> {
        match tokio::fs::read(self.dir.join(file)).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes through a temporary file and a rename so readers never see a
    /// half-written document.
    async fn write<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<(), DbError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let target = self.dir.join(file);
        let tmp = self.dir.join(format!("{file}.tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &target).await?;
        Ok(())
    }

    async fn read_signals(&self) -> Result<Vec<Signal>, DbError> {
        Ok(self.read::<Vec<Signal>>(SIGNALS_FILE).await?.unwrap_or_default())
    }
}

#[async_trait]
impl SignalStore for JsonStore {
    async fn list_signals(&self) -> Result<Vec<Signal>, DbError> {
        let _guard = self.lock.lock().await;
        let mut signals = self.read_signals().await?;
        signals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(signals)
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<(), DbError> {
        let _guard = self.lock.lock().await;
        let mut signals = self.read_signals().await?;
        match signals.iter_mut().find(|s| s.id == signal.id) {
            // mirroring the same signal twice must not duplicate it
            Some(existing) => *existing = signal.clone(),
            None => signals.push(signal.clone()),
        }
        self.write(SIGNALS_FILE, &signals).await
    }

    async fn update_signal_resolution(
        &self,
        id: &str,
        result: SignalResult,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let _guard = self.lock.lock().await;
        let mut signals = self.read_signals().await?;
        let changed = signals
            .iter_mut()
            .find(|s| s.id == id)
            .is_some_and(|s| s.close(result, closed_at));
        if changed {
            self.write(SIGNALS_FILE, &signals).await?;
        }
        Ok(changed)
    }
}

#[async_trait]
impl ScanStateStore for JsonStore {
    async fn load_scan_state(&self) -> Result<ScanState, DbError> {
        let _guard = self.lock.lock().await;
        Ok(self.read::<ScanState>(SCAN_STATE_FILE).await?.unwrap_or_default())
    }

    async fn save_scan_state(&self, state: &ScanState) -> Result<(), DbError> {
        let _guard = self.lock.lock().await;
        self.write(SCAN_STATE_FILE, state).await
    }
}
