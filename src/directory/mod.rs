// SPDX-License-Identifier: GPL-3.0-only

//! Stream directory: the externally visible list of broadcasts
//!
//! The session never calls into the directory while running; callers register
//! a broadcast after going live and remove it after ending.

pub mod url;

pub use url::{ParsedStreamUrl, Platform, parse_stream_url};

use crate::errors::DirectoryError;
use crate::session::LiveBroadcast;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

/// Result type alias for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// A published stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub platform: Option<Platform>,
    pub embed_url: Option<String>,
    /// Native in-app broadcast rather than an external URL
    pub live: bool,
    pub owner_id: String,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Data for a new record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStreamRecord {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub live: bool,
}

impl NewStreamRecord {
    /// Record for an in-app broadcast
    pub fn from_broadcast(broadcast: &LiveBroadcast) -> Self {
        Self {
            title: broadcast.title.clone(),
            description: broadcast.description.clone(),
            url: None,
            live: true,
        }
    }

    /// Record for an external YouTube/Twitch stream
    pub fn external(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            url: Some(url.into()),
            live: false,
        }
    }
}

/// Catalog collaborator holding the directory of streams
#[async_trait]
pub trait StreamDirectory: Send + Sync {
    /// Approved streams, newest first; `limit == 0` means no limit
    async fn list_approved_sessions(&self, limit: usize) -> DirectoryResult<Vec<StreamRecord>>;

    /// Store a record and return its id
    async fn create_session_record(&self, owner_id: &str, data: NewStreamRecord) -> DirectoryResult<String>;

    async fn delete_session_record(&self, id: &str) -> DirectoryResult<()>;
}

/// Process-local directory; records are auto-approved
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    records: Mutex<Vec<StreamRecord>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<StreamRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &str) -> Option<StreamRecord> {
        self.records().iter().find(|r| r.id == id).cloned()
    }

    /// Moderation hook: hide or re-show a record
    pub fn set_approval(&self, id: &str, approved: bool) -> DirectoryResult<()> {
        let mut records = self.records();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;
        record.approved = approved;
        debug!(id, approved, "Stream approval updated");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

#[async_trait]
impl StreamDirectory for InMemoryDirectory {
    async fn list_approved_sessions(&self, limit: usize) -> DirectoryResult<Vec<StreamRecord>> {
        // Reverse insertion order breaks timestamp ties newest-first
        let mut approved: Vec<StreamRecord> = self
            .records()
            .iter()
            .rev()
            .filter(|r| r.approved)
            .cloned()
            .collect();
        approved.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if limit > 0 {
            approved.truncate(limit);
        }
        Ok(approved)
    }

    async fn create_session_record(&self, owner_id: &str, data: NewStreamRecord) -> DirectoryResult<String> {
        if owner_id.trim().is_empty() {
            return Err(DirectoryError::MissingField("owner id"));
        }
        let title = data.title.trim();
        if title.is_empty() {
            return Err(DirectoryError::MissingField("title"));
        }

        let url = data.url.as_deref().map(str::trim).filter(|u| !u.is_empty());
        let parsed = match url {
            Some(url) => Some(parse_stream_url(url)?),
            None if data.live => None,
            None => return Err(DirectoryError::MissingField("url")),
        };

        let record = StreamRecord {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: data.description.trim().to_string(),
            url: url.map(str::to_string),
            platform: parsed.as_ref().map(|p| p.platform),
            embed_url: parsed.map(|p| p.embed_url),
            live: data.live,
            owner_id: owner_id.to_string(),
            approved: true,
            created_at: Utc::now(),
        };

        info!(id = %record.id, title = %record.title, live = record.live, "Stream record created");
        let id = record.id.clone();
        self.records().push(record);
        Ok(id)
    }

    async fn delete_session_record(&self, id: &str) -> DirectoryResult<()> {
        let mut records = self.records();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(DirectoryError::NotFound(id.to_string()));
        }
        info!(id, "Stream record deleted");
        Ok(())
    }
}
