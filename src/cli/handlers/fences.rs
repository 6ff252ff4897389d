//! Fences command handler
//!
//! Prints the active fence index and what each member currently points at.

use crate::AppState;
use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::jobs::{FenceRecord, JobError, SyncFence, WorkKey};

/// What an index member resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenceEntry {
    Active(FenceRecord),
    /// Listed in the index but the fence is gone.
    Missing,
    /// The stored record does not decode.
    Corrupt,
    /// A member of another fence kind.
    Other,
}

/// Handler for the fences command
pub struct FencesCommandHandler {
    config: Settings,
}

impl FencesCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(self) -> AppResult<()> {
        let state = AppState::new(self.config).await?;
        let entries = list_fences(&state).await?;

        if entries.is_empty() {
            println!("No active fences for tenant '{}'", state.tenant().tenant_id());
            return Ok(());
        }

        for (member, entry) in entries {
            match entry {
                FenceEntry::Active(record) => println!(
                    "{}  payload={} submitted={} started={} task={}",
                    member,
                    record.id,
                    record.submitted_at,
                    record
                        .started_at
                        .map(|at| at.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    record.task_id.as_deref().unwrap_or("-"),
                ),
                FenceEntry::Missing => println!("{}  (fence missing)", member),
                FenceEntry::Corrupt => println!("{}  (record does not decode)", member),
                FenceEntry::Other => println!("{}  (other fence kind)", member),
            }
        }
        Ok(())
    }
}

/// Index members in sorted order with their resolved state.
pub(crate) async fn list_fences(state: &AppState) -> AppResult<Vec<(String, FenceEntry)>> {
    let mut members: Vec<String> = state
        .store
        .set_members(&state.tenant().active_fences())
        .await?
        .into_iter()
        .collect();
    members.sort();

    let mut entries = Vec::with_capacity(members.len());
    for member in members {
        let entry = match WorkKey::from_fence_key(&member) {
            Some(key) => {
                match SyncFence::new(state.store.clone(), key).payload().await {
                    Ok(Some(record)) => FenceEntry::Active(record),
                    Ok(None) => FenceEntry::Missing,
                    Err(JobError::FenceSchema { .. }) => FenceEntry::Corrupt,
                    Err(e) => return Err(e.into()),
                }
            }
            None => FenceEntry::Other,
        };
        entries.push((member, entry));
    }
    Ok(entries)
}
