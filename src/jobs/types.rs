use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::jobs::keys::WorkKey;

/// External systems that can own permission groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    GoogleDrive,
    Confluence,
    Jira,
    Slack,
    Github,
    Sharepoint,
    Teams,
    Gmail,
}

impl SourceType {
    pub const ALL: [SourceType; 8] = [
        SourceType::GoogleDrive,
        SourceType::Confluence,
        SourceType::Jira,
        SourceType::Slack,
        SourceType::Github,
        SourceType::Sharepoint,
        SourceType::Teams,
        SourceType::Gmail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::GoogleDrive => "google_drive",
            SourceType::Confluence => "confluence",
            SourceType::Jira => "jira",
            SourceType::Slack => "slack",
            SourceType::Github => "github",
            SourceType::Sharepoint => "sharepoint",
            SourceType::Teams => "teams",
            SourceType::Gmail => "gmail",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceType::ALL
            .into_iter()
            .find(|source| source.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown source type '{}'", s))
    }
}

/// Lifecycle state of a sync entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Active,
    Paused,
    Deleting,
}

/// How documents of an entity are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    #[default]
    Sync,
    Public,
    Private,
}

/// A unit of work the scheduler may sync: one connection to one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEntity {
    pub id: i64,
    pub source: SourceType,
    pub status: EntityStatus,
    pub access_type: AccessType,
    pub last_synced_at: Option<Timestamp>,
}

impl SyncEntity {
    pub fn is_deleting(&self) -> bool {
        self.status == EntityStatus::Deleting
    }
}

/// One permission group reported by a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalGroup {
    pub id: String,
    #[serde(default)]
    pub user_emails: Vec<String>,
    #[serde(default)]
    pub gives_anyone_access: bool,
}

/// Everything a job body gets to see for one run.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub work_key: WorkKey,
    pub entity: SyncEntity,
    pub payload_id: String,
    pub cancellation_token: CancellationToken,
}
