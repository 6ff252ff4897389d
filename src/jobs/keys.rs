//! Store key layout for group sync coordination.
//!
//! Every key is scoped by tenant as `{tenant}:{name}`. Per-entity keys end in
//! `_{entity_id}`.

use uuid::Uuid;

pub const FENCE_PREFIX: &str = "groupsync_fence";
pub const ACTIVE_PREFIX: &str = "groupsync_active";
pub const GENERATOR_PREFIX: &str = "groupsync_generator";
pub const TASKSET_PREFIX: &str = "groupsync_taskset";
pub const LOCK_PREFIX: &str = "groupsync_lock";

pub const ACTIVE_FENCES: &str = "active_fences";
pub const BEAT_LOCK: &str = "check_groupsync_beat_lock";
pub const BLOCK_VALIDATE: &str = "block_validate_groupsync_fences";

/// Identity of one unit of work: a sync entity within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkKey {
    pub tenant_id: String,
    pub entity_id: i64,
}

impl WorkKey {
    pub fn new(tenant_id: impl Into<String>, entity_id: i64) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            entity_id,
        }
    }

    fn scoped(&self, prefix: &str) -> String {
        format!("{}:{}_{}", self.tenant_id, prefix, self.entity_id)
    }

    pub fn fence_key(&self) -> String {
        self.scoped(FENCE_PREFIX)
    }

    pub fn active_key(&self) -> String {
        self.scoped(ACTIVE_PREFIX)
    }

    pub fn generator_key(&self) -> String {
        self.scoped(GENERATOR_PREFIX)
    }

    pub fn taskset_key(&self) -> String {
        self.scoped(TASKSET_PREFIX)
    }

    pub fn lock_key(&self) -> String {
        self.scoped(LOCK_PREFIX)
    }

    /// A fresh task id, unique per dispatch.
    pub fn new_task_id(&self) -> String {
        format!("{}_{}", self.taskset_key(), Uuid::new_v4())
    }

    /// Recover the work key from a fence key. `None` when the key is not a
    /// group sync fence or its entity id does not parse.
    pub fn from_fence_key(key: &str) -> Option<Self> {
        let (tenant, name) = key.rsplit_once(':')?;
        let id = name.strip_prefix(FENCE_PREFIX)?.strip_prefix('_')?;
        Some(Self::new(tenant, id.parse().ok()?))
    }
}

impl std::fmt::Display for WorkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.entity_id)
    }
}

/// Whether an index member names a group sync fence at all.
pub fn is_group_sync_fence(key: &str) -> bool {
    key.rsplit_once(':')
        .is_some_and(|(_, name)| name.starts_with(FENCE_PREFIX))
}

/// Tenant-wide coordination keys.
#[derive(Debug, Clone)]
pub struct TenantKeys {
    tenant_id: String,
}

impl TenantKeys {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn active_fences(&self) -> String {
        format!("{}:{}", self.tenant_id, ACTIVE_FENCES)
    }

    pub fn beat_lock(&self) -> String {
        format!("{}:{}", self.tenant_id, BEAT_LOCK)
    }

    pub fn block_validate(&self) -> String {
        format!("{}:{}", self.tenant_id, BLOCK_VALIDATE)
    }

    pub fn work_key(&self, entity_id: i64) -> WorkKey {
        WorkKey::new(self.tenant_id.clone(), entity_id)
    }
}
