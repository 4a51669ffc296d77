//! The storage collaborator the pipeline appends to and reports read from.
//!
//! [`RecordStore`] is the narrow interface the core depends on; the storage
//! engine behind it is not the core's concern. [`MemoryStore`] is the
//! in-process implementation: one bounded ring per project, oldest evicted
//! first. Queries return a snapshot taken under a read lock, so a report never
//! blocks ingestion for longer than the copy.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::types::{LogRecord, ProjectId, WebhookConfig};

/// Append-only record storage.
pub trait RecordStore: Send + Sync {
    fn append(&self, record: LogRecord);

    /// Records of `project` with `start <= timestamp < end`, in no particular order.
    fn query(
        &self,
        project: ProjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Box<dyn Iterator<Item = LogRecord> + Send + '_>;
}

/// Read-only source of per-project webhook configuration.
pub trait WebhookConfigSource: Send + Sync {
    fn webhook_config(&self, project: ProjectId) -> Option<WebhookConfig>;
}

/// In-memory store with per-project retention.
#[derive(Debug)]
pub struct MemoryStore {
    capacity: usize,
    projects: RwLock<HashMap<ProjectId, VecDeque<LogRecord>>>,
}

impl MemoryStore {
    pub fn new(capacity_per_project: usize) -> Self {
        Self {
            capacity: capacity_per_project.max(1),
            projects: RwLock::new(HashMap::new()),
        }
    }

    /// Records currently retained for `project`.
    pub fn len(&self, project: ProjectId) -> usize {
        self.projects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&project)
            .map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, project: ProjectId) -> bool {
        self.len(project) == 0
    }
}

impl RecordStore for MemoryStore {
    fn append(&self, record: LogRecord) {
        let mut projects = self.projects.write().unwrap_or_else(|e| e.into_inner());
        let ring = projects.entry(record.project_id).or_default();
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(record);
    }

    fn query(
        &self,
        project: ProjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Box<dyn Iterator<Item = LogRecord> + Send + '_> {
        let snapshot: Vec<LogRecord> = self
            .projects
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&project)
            .map(|ring| {
                ring.iter()
                    .filter(|r| r.timestamp >= start && r.timestamp < end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Box::new(snapshot.into_iter())
    }
}

/// Webhook configuration held in memory, typically from the `[[webhooks]]`
/// config section.
#[derive(Debug, Default)]
pub struct StaticWebhookConfigs {
    by_project: HashMap<ProjectId, WebhookConfig>,
}

impl StaticWebhookConfigs {
    pub fn new(configs: impl IntoIterator<Item = WebhookConfig>) -> Self {
        Self {
            by_project: configs.into_iter().map(|c| (c.project_id, c)).collect(),
        }
    }
}

impl WebhookConfigSource for StaticWebhookConfigs {
    fn webhook_config(&self, project: ProjectId) -> Option<WebhookConfig> {
        self.by_project.get(&project).cloned()
    }
}
