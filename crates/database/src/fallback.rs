use crate::error::DbError;
use crate::store::{ScanStateStore, SignalStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{ScanState, Signal, SignalResult};
use std::collections::HashSet;

/// Pairs an optional primary store with an always-present secondary one.
///
/// Signal reads merge both sides by id, keeping the primary's copy, so records
/// written only to the secondary during a primary outage stay visible. Writes
/// go to both, so the secondary stays a usable mirror whenever the primary
/// disappears. An operation only fails when both sides fail.
pub struct FallbackStore<P, S> {
    primary: Option<P>,
    secondary: S,
}

impl<P, S> FallbackStore<P, S> {
    pub fn new(primary: Option<P>, secondary: S) -> Self {
        Self { primary, secondary }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }
}

fn both_failed(operation: &str, primary: Option<&DbError>, secondary: &DbError) -> DbError {
    match primary {
        Some(p) => DbError::Unavailable(format!(
            "{operation}: primary: {p}; secondary: {secondary}"
        )),
        None => DbError::Unavailable(format!("{operation}: {secondary}")),
    }
}

/// Primary records first, then secondary-only ones, newest first overall.
fn merge_by_id(primary: Vec<Signal>, secondary: Vec<Signal>) -> Vec<Signal> {
    let known: HashSet<String> = primary.iter().map(|s| s.id.clone()).collect();
    let mut merged = primary;
    merged.extend(secondary.into_iter().filter(|s| !known.contains(&s.id)));
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged
}

#[async_trait]
impl<P, S> SignalStore for FallbackStore<P, S>
where
    P: SignalStore,
    S: SignalStore,
{
    async fn list_signals(&self) -> Result<Vec<Signal>, DbError> {
        let Some(primary) = &self.primary else {
            return self.secondary.list_signals().await;
        };
        match (primary.list_signals().await, self.secondary.list_signals().await) {
            (Ok(p), Ok(s)) => Ok(merge_by_id(p, s)),
            (Ok(p), Err(e)) => {
                tracing::warn!(error = %e, "Fallback store unreadable, using primary only.");
                Ok(p)
            }
            (Err(e), Ok(s)) => {
                tracing::warn!(error = %e, "Primary store unreadable, using fallback.");
                Ok(s)
            }
            (Err(p), Err(s)) => Err(both_failed("list", Some(&p), &s)),
        }
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<(), DbError> {
        let primary = match &self.primary {
            Some(primary) => primary.insert_signal(signal).await.err(),
            None => None,
        };
        if let Some(e) = &primary {
            tracing::warn!(id = %signal.id, error = %e, "Primary insert failed.");
        }
        match self.secondary.insert_signal(signal).await {
            Ok(()) => Ok(()),
            Err(e) if primary.is_none() && self.primary.is_some() => {
                tracing::warn!(id = %signal.id, error = %e, "Fallback mirror failed.");
                Ok(())
            }
            Err(e) => Err(both_failed("insert", primary.as_ref(), &e)),
        }
    }

    async fn update_signal_resolution(
        &self,
        id: &str,
        result: SignalResult,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let primary = match &self.primary {
            Some(primary) => Some(primary.update_signal_resolution(id, result, closed_at).await),
            None => None,
        };
        let secondary = self.secondary.update_signal_resolution(id, result, closed_at).await;

        match (primary, secondary) {
            (Some(Ok(p)), Ok(s)) => Ok(p || s),
            (Some(Ok(p)), Err(e)) => {
                tracing::warn!(%id, error = %e, "Fallback resolution failed.");
                Ok(p)
            }
            (Some(Err(e)), Ok(s)) => {
                tracing::warn!(%id, error = %e, "Primary resolution failed.");
                Ok(s)
            }
            (Some(Err(p)), Err(s)) => Err(both_failed("resolve", Some(&p), &s)),
            (None, secondary) => secondary,
        }
    }
}

#[async_trait]
impl<P, S> ScanStateStore for FallbackStore<P, S>
where
    P: ScanStateStore,
    S: ScanStateStore,
{
    async fn load_scan_state(&self) -> Result<ScanState, DbError> {
        if let Some(primary) = &self.primary {
            match primary.load_scan_state().await {
                Ok(state) => return Ok(state),
                Err(e) => tracing::warn!(error = %e, "Primary scan state unreadable, using fallback."),
            }
        }
        self.secondary.load_scan_state().await
    }

    async fn save_scan_state(&self, state: &ScanState) -> Result<(), DbError> {
        let primary = match &self.primary {
            Some(primary) => primary.save_scan_state(state).await.err(),
            None => None,
        };
        match self.secondary.save_scan_state(state).await {
            Ok(()) => Ok(()),
            Err(e) if primary.is_none() && self.primary.is_some() => {
                tracing::warn!(error = %e, "Fallback scan state write failed.");
                Ok(())
            }
            Err(e) => Err(both_failed("save scan state", primary.as_ref(), &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::tests::signal;
    use crate::json::JsonStore;
    use chrono::TimeZone;

    /// A primary that is configured but unreachable.
    struct DownStore;

    #[async_trait]
    impl SignalStore for DownStore {
        async fn list_signals(&self) -> Result<Vec<Signal>, DbError> {
            Err(DbError::Unavailable("down".to_string()))
        }
        async fn insert_signal(&self, _: &Signal) -> Result<(), DbError> {
            Err(DbError::Unavailable("down".to_string()))
        }
        async fn update_signal_resolution(
            &self,
            _: &str,
            _: SignalResult,
            _: DateTime<Utc>,
        ) -> Result<bool, DbError> {
            Err(DbError::Unavailable("down".to_string()))
        }
    }

    #[async_trait]
    impl ScanStateStore for DownStore {
        async fn load_scan_state(&self) -> Result<ScanState, DbError> {
            Err(DbError::Unavailable("down".to_string()))
        }
        async fn save_scan_state(&self, _: &ScanState) -> Result<(), DbError> {
            Err(DbError::Unavailable("down".to_string()))
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn unreachable_primary_falls_back_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = FallbackStore::new(Some(DownStore), JsonStore::open(dir.path()).await.unwrap());
        let s = signal(at(1));

        store.insert_signal(&s).await.unwrap();
        assert_eq!(store.list_signals().await.unwrap(), vec![s.clone()]);
        assert!(store.update_signal_resolution(&s.id, SignalResult::Loss, at(2)).await.unwrap());
        assert!(!store.update_signal_resolution(&s.id, SignalResult::Win, at(3)).await.unwrap());
        assert!(store.list_active_signals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn both_primaries_mirror_into_the_secondary() {
        let primary_dir = tempfile::tempdir().unwrap();
        let secondary_dir = tempfile::tempdir().unwrap();
        let store = FallbackStore::new(
            Some(JsonStore::open(primary_dir.path()).await.unwrap()),
            JsonStore::open(secondary_dir.path()).await.unwrap(),
        );
        let s = signal(at(1));
        store.insert_signal(&s).await.unwrap();

        let mirror = JsonStore::open(secondary_dir.path()).await.unwrap();
        assert_eq!(mirror.list_signals().await.unwrap().len(), 1);

        assert!(store.update_signal_resolution(&s.id, SignalResult::Win, at(2)).await.unwrap());
        let mirrored = &mirror.list_signals().await.unwrap()[0];
        assert_eq!(mirrored.result, Some(SignalResult::Win));
    }

    #[tokio::test]
    async fn records_written_during_an_outage_stay_visible() {
        let primary_dir = tempfile::tempdir().unwrap();
        let secondary_dir = tempfile::tempdir().unwrap();
        let primary = JsonStore::open(primary_dir.path()).await.unwrap();
        let secondary = JsonStore::open(secondary_dir.path()).await.unwrap();

        let (s0, s1, s2) = (signal(at(1)), signal(at(2)), signal(at(3)));
        primary.insert_signal(&s0).await.unwrap();
        for s in [&s0, &s1, &s2] {
            secondary.insert_signal(s).await.unwrap();
        }
        // the primary closed s0 but the mirror missed it
        primary.update_signal_resolution(&s0.id, SignalResult::Win, at(4)).await.unwrap();

        let store = FallbackStore::new(Some(primary), secondary);
        let all = store.list_signals().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, s2.id);
        assert_eq!(all[2].result, Some(SignalResult::Win));

        let active: Vec<String> = store
            .list_active_signals()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(active, vec![s2.id.clone(), s1.id.clone()]);
    }

    #[tokio::test]
    async fn scan_state_survives_a_down_primary() {
        let dir = tempfile::tempdir().unwrap();
        let store = FallbackStore::new(Some(DownStore), JsonStore::open(dir.path()).await.unwrap());
        assert_eq!(store.load_scan_state().await.unwrap(), ScanState::default());

        let state = ScanState {
            next_scan_at: at(4),
            last_generated_at: None,
            last_id: None,
        };
        store.save_scan_state(&state).await.unwrap();
        assert_eq!(store.load_scan_state().await.unwrap(), state);
    }

    #[tokio::test]
    async fn no_primary_behaves_like_the_secondary() {
        let dir = tempfile::tempdir().unwrap();
        let store: FallbackStore<DownStore, JsonStore> =
            FallbackStore::new(None, JsonStore::open(dir.path()).await.unwrap());
        assert!(!store.has_primary());
        assert!(store.list_signals().await.unwrap().is_empty());
    }
}
