use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Company, ScrapeTarget, TargetStatus};
use crate::traits::TargetStore;

/// One entry of a targets file. Only `company` is required.
#[derive(Debug, Deserialize)]
struct TargetRecord {
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    job_board_id: Option<Uuid>,
    company: Company,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TargetsFile {
    List(Vec<TargetRecord>),
    Wrapped { targets: Vec<TargetRecord> },
}

/// Latest status recorded for a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStatus {
    pub status: TargetStatus,
    pub message: Option<String>,
}

/// A [`TargetStore`] held in memory, typically loaded from a JSON file.
///
/// Targets without a `job_board_id` belong to the nil board; asking for the
/// nil board returns every enabled target.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTargetStore {
    targets: Arc<Vec<(ScrapeTarget, bool)>>,
    statuses: Arc<Mutex<HashMap<Uuid, RecordedStatus>>>,
}

impl InMemoryTargetStore {
    pub fn new(targets: Vec<ScrapeTarget>) -> Self {
        Self {
            targets: Arc::new(targets.into_iter().map(|t| (t, true)).collect()),
            statuses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Parse a JSON array of targets, or an object with a `targets` array.
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let file: TargetsFile = serde_json::from_str(json)
            .map_err(|e| AppError::ConfigError(format!("Invalid targets file: {e}")))?;
        let records = match file {
            TargetsFile::List(records) | TargetsFile::Wrapped { targets: records } => records,
        };

        let targets = records
            .into_iter()
            .map(|r| {
                let target = ScrapeTarget {
                    id: r.id.unwrap_or_else(Uuid::new_v4),
                    job_board_id: r.job_board_id.unwrap_or(Uuid::nil()),
                    company: r.company,
                    source_url: r.source_url.filter(|u| !u.trim().is_empty()),
                };
                (target, r.enabled)
            })
            .collect();

        Ok(Self {
            targets: Arc::new(targets),
            statuses: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!(
                "Failed to read targets file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn status_of(&self, target_id: Uuid) -> Option<RecordedStatus> {
        self.statuses
            .lock()
            .ok()
            .and_then(|map| map.get(&target_id).cloned())
    }

    /// Snapshot of every recorded status, keyed by target id.
    pub fn statuses(&self) -> HashMap<Uuid, RecordedStatus> {
        self.statuses
            .lock()
            .map(|map| map.clone())
            .unwrap_or_default()
    }
}

impl TargetStore for InMemoryTargetStore {
    async fn enabled_targets_for(&self, job_board_id: Uuid) -> Result<Vec<ScrapeTarget>, AppError> {
        Ok(self
            .targets
            .iter()
            .filter(|(target, enabled)| {
                *enabled && (job_board_id.is_nil() || target.job_board_id == job_board_id)
            })
            .map(|(target, _)| target.clone())
            .collect())
    }

    async fn update_status(
        &self,
        target_id: Uuid,
        status: TargetStatus,
        message: Option<&str>,
    ) -> Result<(), AppError> {
        let mut map = self
            .statuses
            .lock()
            .map_err(|_| AppError::Generic("target status map poisoned".into()))?;
        map.insert(
            target_id,
            RecordedStatus {
                status,
                message: message.map(String::from),
            },
        );
        Ok(())
    }
}
