use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;

use crate::config::settings::SourceSettings;
use crate::jobs::bodies::HttpDirectoryBody;
use crate::jobs::error::JobResult;
use crate::jobs::types::{ExternalGroup, JobContext, SourceType};

/// Lazily produced groups. Dropping the stream stops the fetch.
pub type GroupStream = BoxStream<'static, JobResult<ExternalGroup>>;

/// The source-specific part of a group sync.
pub trait JobBody: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn run(&self, ctx: JobContext) -> GroupStream;
}

/// How and how often a source is synced.
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    pub sync_frequency: Duration,
    /// At most one entity of the source is scheduled per tenant per pass.
    pub single_flight: bool,
    pub body: Arc<dyn JobBody>,
}

/// Registry mapping source types to their sync policy
#[derive(Debug, Default)]
pub struct SourceRegistry {
    policies: HashMap<SourceType, SyncPolicy>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds HTTP directory policies for every source with a directory url.
    /// Sources without one have no policy and are never scheduled.
    pub fn from_settings(sources: &[SourceSettings]) -> JobResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        let mut registry = Self::new();
        for source in sources {
            let Some(url) = &source.directory_url else {
                tracing::debug!(source = %source.source, "No directory url, group sync disabled");
                continue;
            };

            registry.register(
                source.source,
                SyncPolicy {
                    sync_frequency: Duration::from_secs(source.sync_frequency),
                    single_flight: source.single_flight,
                    body: Arc::new(HttpDirectoryBody::new(client.clone(), url.clone())),
                },
            );
        }

        Ok(registry)
    }

    pub fn register(&mut self, source: SourceType, policy: SyncPolicy) -> &mut Self {
        self.policies.insert(source, policy);
        self
    }

    pub fn policy(&self, source: SourceType) -> Option<&SyncPolicy> {
        self.policies.get(&source)
    }

    pub fn is_single_flight(&self, source: SourceType) -> bool {
        self.policy(source).is_some_and(|policy| policy.single_flight)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
