use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PlannerError;
use crate::models::{TrackId, Usage};

/// Read/write interface onto the Usage Store. Reads happen once at pool
/// build time; writes happen once, in a single batch, after a publish
/// succeeds.
pub trait UsageStore {
    fn load_all(&self) -> Result<Vec<Usage>, PlannerError>;
    fn upsert_many(&self, rows: &[Usage]) -> Result<(), PlannerError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsageFile {
    usages: Vec<Usage>,
}

/// A JSON-file-backed Usage Store.
pub struct JsonFileUsageStore {
    pub path: String,
}

impl UsageStore for JsonFileUsageStore {
    fn load_all(&self) -> Result<Vec<Usage>, PlannerError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let file: UsageFile = serde_json::from_str(&content).map_err(|e| {
                    PlannerError::CatalogUnavailable(format!("{}: {}", self.path, e))
                })?;
                Ok(file.usages)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(PlannerError::CatalogUnavailable(format!(
                "{}: {}",
                self.path, e
            ))),
        }
    }

    fn upsert_many(&self, rows: &[Usage]) -> Result<(), PlannerError> {
        let mut existing: HashMap<TrackId, Usage> = self
            .load_all()?
            .into_iter()
            .map(|u| (u.track_id.clone(), u))
            .collect();

        for row in rows {
            existing.insert(row.track_id.clone(), row.clone());
        }

        let file = UsageFile {
            usages: existing.into_values().collect(),
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| PlannerError::PublishFailed(e.to_string()))?;
        if let Some(parent) = std::path::Path::new(&self.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PlannerError::PublishFailed(e.to_string()))?;
            }
        }
        std::fs::write(&self.path, content).map_err(|e| PlannerError::PublishFailed(e.to_string()))
    }
}

/// In-memory store, for tests.
#[derive(Default)]
pub struct InMemoryUsageStore {
    pub rows: std::sync::Mutex<HashMap<TrackId, Usage>>,
}

impl UsageStore for InMemoryUsageStore {
    fn load_all(&self) -> Result<Vec<Usage>, PlannerError> {
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }

    fn upsert_many(&self, rows: &[Usage]) -> Result<(), PlannerError> {
        let mut guard = self.rows.lock().unwrap();
        for row in rows {
            guard.insert(row.track_id.clone(), row.clone());
        }
        Ok(())
    }
}

/// An in-memory index of usage rows, snapshotted at pool-build time.
pub struct UsageIndex {
    pub by_track: HashMap<TrackId, Usage>,
}

impl UsageIndex {
    pub fn build(store: &dyn UsageStore) -> Result<UsageIndex, PlannerError> {
        let rows = store.load_all()?;
        Ok(UsageIndex {
            by_track: rows.into_iter().map(|u| (u.track_id.clone(), u)).collect(),
        })
    }

    pub fn last_used_at(&self, track_id: &str) -> Option<DateTime<Utc>> {
        self.by_track.get(track_id).and_then(|u| u.last_used_at)
    }

    /// Build the batch of `Usage` rows to upsert for a finalized selection:
    /// `lastUsedAt := now`, `usedCount += 1`.
    pub fn bump(&self, track_ids: &[TrackId], now: DateTime<Utc>) -> Vec<Usage> {
        track_ids
            .iter()
            .map(|id| {
                let used_count = self.by_track.get(id).map(|u| u.used_count).unwrap_or(0) + 1;
                Usage {
                    track_id: id.clone(),
                    last_used_at: Some(now),
                    used_count,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn bump_increments_existing_count() {
        let store = InMemoryUsageStore::default();
        store
            .upsert_many(&[Usage {
                track_id: "t1".to_string(),
                last_used_at: Some(Utc::now() - Duration::days(20)),
                used_count: 3,
            }])
            .unwrap();

        let index = UsageIndex::build(&store).unwrap();
        let now = Utc::now();
        let rows = index.bump(&["t1".to_string(), "t2".to_string()], now);

        let t1 = rows.iter().find(|r| r.track_id == "t1").unwrap();
        let t2 = rows.iter().find(|r| r.track_id == "t2").unwrap();
        assert_eq!(t1.used_count, 4);
        assert_eq!(t2.used_count, 1);
        assert_eq!(t1.last_used_at, Some(now));
    }
}
