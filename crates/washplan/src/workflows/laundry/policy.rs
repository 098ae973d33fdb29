use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{PolicyId, PolicySnapshot, WeightCapOutOfRange};

/// A wash policy template: how many washes a yearly plan grants and how much
/// weight a single wash may carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub name: String,
    pub total_washes: u32,
    pub max_weight_per_wash: f64,
    pub is_active: bool,
    pub archived: bool,
}

impl Policy {
    /// The values an allowance freezes at provisioning time.
    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            total_washes: self.total_washes,
            max_weight_per_wash: self.max_weight_per_wash,
        }
    }
}

/// Inbound fields for creating a policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDraft {
    pub name: String,
    pub total_washes: u32,
    pub max_weight_per_wash: f64,
}

/// Partial update applied to an existing policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyUpdate {
    pub name: Option<String>,
    pub total_washes: Option<u32>,
    pub max_weight_per_wash: Option<f64>,
}

/// Error enumeration for the policy registry and its stores.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error(transparent)]
    WeightCap(#[from] WeightCapOutOfRange),
    #[error("policy not found")]
    NotFound,
    #[error("policy is archived")]
    Archived,
    #[error("policy store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for policies.
///
/// `swap_active` must deactivate whichever policy currently holds the active
/// flag and activate the target inside a single critical section, so the
/// at-most-one-active invariant holds under concurrent callers. A
/// read-then-write sequence over `fetch`/`update` is not an acceptable
/// implementation.
pub trait PolicyStore: Send + Sync {
    fn insert(&self, policy: Policy) -> Result<Policy, PolicyError>;
    fn fetch(&self, id: &PolicyId) -> Result<Option<Policy>, PolicyError>;
    fn update(&self, policy: Policy) -> Result<(), PolicyError>;
    fn list(&self) -> Result<Vec<Policy>, PolicyError>;
    /// Atomic swap of the active flag onto `id`; fails with [`PolicyError::Archived`]
    /// when the target is archived.
    fn swap_active(&self, id: &PolicyId) -> Result<Policy, PolicyError>;
    fn active(&self) -> Result<Option<Policy>, PolicyError>;
}

/// Result of archiving a policy; archiving the active policy is permitted
/// and simply leaves the registry without an active policy.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveOutcome {
    pub policy: Policy,
    pub left_without_active: bool,
}

static POLICY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_policy_id() -> PolicyId {
    let id = POLICY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PolicyId(format!("pol-{id:06}"))
}

/// Registry owning policy lifecycle and the single-active invariant.
pub struct PolicyRegistry<P> {
    store: Arc<P>,
}

impl<P: PolicyStore> PolicyRegistry<P> {
    pub fn new(store: Arc<P>) -> Self {
        Self { store }
    }

    pub fn create(&self, draft: PolicyDraft) -> Result<Policy, PolicyError> {
        let snapshot = PolicySnapshot::validated(draft.total_washes, draft.max_weight_per_wash)?;
        let policy = Policy {
            id: next_policy_id(),
            name: draft.name,
            total_washes: snapshot.total_washes,
            max_weight_per_wash: snapshot.max_weight_per_wash,
            is_active: false,
            archived: false,
        };

        let stored = self.store.insert(policy)?;
        info!(policy_id = %stored.id.0, "wash policy created");
        Ok(stored)
    }

    pub fn update(&self, id: &PolicyId, changes: PolicyUpdate) -> Result<Policy, PolicyError> {
        let mut policy = self.store.fetch(id)?.ok_or(PolicyError::NotFound)?;
        if policy.archived {
            return Err(PolicyError::Archived);
        }

        if let Some(name) = changes.name {
            policy.name = name;
        }
        if let Some(total_washes) = changes.total_washes {
            policy.total_washes = total_washes;
        }
        if let Some(max_weight_per_wash) = changes.max_weight_per_wash {
            policy.max_weight_per_wash = max_weight_per_wash;
        }
        PolicySnapshot::validated(policy.total_washes, policy.max_weight_per_wash)?;

        self.store.update(policy.clone())?;
        Ok(policy)
    }

    /// Archive a policy. Archiving the active policy is reported, not
    /// blocked: allowances already provisioned keep their snapshot.
    pub fn archive(&self, id: &PolicyId) -> Result<ArchiveOutcome, PolicyError> {
        let mut policy = self.store.fetch(id)?.ok_or(PolicyError::NotFound)?;
        let left_without_active = policy.is_active;

        policy.archived = true;
        policy.is_active = false;
        self.store.update(policy.clone())?;

        if left_without_active {
            warn!(policy_id = %id.0, "archived the active policy; no active policy remains");
        }

        Ok(ArchiveOutcome {
            policy,
            left_without_active,
        })
    }

    /// Restore an archived policy. The policy comes back inactive.
    pub fn restore(&self, id: &PolicyId) -> Result<Policy, PolicyError> {
        let mut policy = self.store.fetch(id)?.ok_or(PolicyError::NotFound)?;
        policy.archived = false;
        self.store.update(policy.clone())?;
        Ok(policy)
    }

    pub fn activate(&self, id: &PolicyId) -> Result<Policy, PolicyError> {
        let policy = self.store.swap_active(id)?;
        info!(policy_id = %policy.id.0, "wash policy activated");
        Ok(policy)
    }

    pub fn deactivate(&self, id: &PolicyId) -> Result<Policy, PolicyError> {
        let mut policy = self.store.fetch(id)?.ok_or(PolicyError::NotFound)?;
        if policy.is_active {
            policy.is_active = false;
            self.store.update(policy.clone())?;
            info!(policy_id = %policy.id.0, "wash policy deactivated");
        }
        Ok(policy)
    }

    pub fn get_active(&self) -> Result<Option<Policy>, PolicyError> {
        self.store.active()
    }

    pub fn active_snapshot(&self) -> Result<Option<PolicySnapshot>, PolicyError> {
        Ok(self.get_active()?.map(|policy| policy.snapshot()))
    }

    pub fn list(&self, include_archived: bool) -> Result<Vec<Policy>, PolicyError> {
        let mut policies = self.store.list()?;
        if !include_archived {
            policies.retain(|policy| !policy.archived);
        }
        Ok(policies)
    }
}
