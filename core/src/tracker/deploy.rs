//! The account-deployment state machine.
//!
//! Per-address status, four states:
//!
//! ```text
//! Unknown ──check──▶ NotDeployed ──submit──▶ Deploying ──confirm──▶ Deployed
//!    ▲                    ▲                      │
//!    └── check failed     └──── confirm failed ──┘
//! ```
//!
//! `Unknown` is not a euphemism for "not deployed": it means the check
//! itself failed, and deploying on top of it could double-deploy or burn
//! fees on an account that already exists. Only a definitive
//! `ContractNotFound` answer downgrades to `NotDeployed`; every other
//! RPC failure parks the address at `Unknown` and blocks deployment
//! until a fresh check resolves it.
//!
//! Confirmed deployments are persisted as an address → class-hash map in
//! the key-value store, so a cache hit answers later checks with zero
//! RPC traffic.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::account::{Address, ClassHash};
use crate::collaborators::chain::{ChainClient, ChainError};
use crate::collaborators::kv::{self, KvStore};
use crate::config::KV_CLASS_HASHES;
use crate::error::{CoreError, CoreResult};

// ---------------------------------------------------------------------------
// DeployStatus
// ---------------------------------------------------------------------------

/// Deployment state of one account address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeployStatus {
    /// Never checked, or the last check failed. Blocks deployment.
    Unknown,
    /// The chain definitively reported no contract at the address.
    NotDeployed,
    /// A deploy transaction is submitted and awaiting confirmation.
    Deploying,
    Deployed,
}

// ---------------------------------------------------------------------------
// DeployTracker
// ---------------------------------------------------------------------------

/// Tracks per-address deploy status and the persisted class-hash cache.
pub struct DeployTracker {
    chain: Arc<dyn ChainClient>,
    kv: Arc<dyn KvStore>,
    statuses: RwLock<HashMap<Address, DeployStatus>>,
}

impl DeployTracker {
    pub fn new(chain: Arc<dyn ChainClient>, kv: Arc<dyn KvStore>) -> Self {
        Self {
            chain,
            kv,
            statuses: RwLock::new(HashMap::new()),
        }
    }

    /// The last known status of `address`. Never hits the network.
    pub fn status(&self, address: &Address) -> DeployStatus {
        self.statuses
            .read()
            .get(address)
            .copied()
            .unwrap_or(DeployStatus::Unknown)
    }

    /// Resolves the deploy status of each given address.
    ///
    /// Consults the persisted class-hash cache first; only cache misses
    /// issue a `class_hash_at` RPC. Check failures are isolated per
    /// address — one failed lookup yields `Unknown` for that address
    /// while the rest of the batch resolves normally.
    pub async fn check_accounts_deployed(
        &self,
        addresses: &[Address],
    ) -> HashMap<Address, DeployStatus> {
        // A cache read failure degrades to an empty cache: the RPC path
        // below still answers correctly, just slower.
        let mut cached: HashMap<Address, ClassHash> =
            match kv::get(self.kv.as_ref(), KV_CLASS_HASHES).await {
                Ok(map) => map.unwrap_or_default(),
                Err(e) => {
                    warn!(error = %e, "class-hash cache unreadable; checking over rpc");
                    HashMap::new()
                }
            };

        let mut results = HashMap::new();
        let mut cache_dirty = false;

        for address in addresses {
            if cached.contains_key(address) {
                results.insert(address.clone(), DeployStatus::Deployed);
                continue;
            }
            let status = match self.chain.class_hash_at(address).await {
                Ok(class_hash) => {
                    cached.insert(address.clone(), class_hash);
                    cache_dirty = true;
                    DeployStatus::Deployed
                }
                Err(ChainError::ContractNotFound(_)) => DeployStatus::NotDeployed,
                Err(e) => {
                    warn!(account = %address, error = %e, "deploy check failed; status ambiguous");
                    DeployStatus::Unknown
                }
            };
            results.insert(address.clone(), status);
        }

        if cache_dirty {
            if let Err(e) = kv::set(self.kv.as_ref(), KV_CLASS_HASHES, &cached).await {
                warn!(error = %e, "failed to persist class-hash cache");
            }
        }

        let mut statuses = self.statuses.write();
        for (address, status) in &results {
            // An in-flight deploy outranks a concurrent check's answer.
            if statuses.get(address) == Some(&DeployStatus::Deploying)
                && *status != DeployStatus::Deployed
            {
                continue;
            }
            statuses.insert(address.clone(), *status);
        }
        drop(statuses);

        debug!(checked = addresses.len(), "deploy statuses resolved");
        results
    }

    /// Optimistically transitions `address` into `Deploying`.
    ///
    /// Refuses unless the current status is definitively `NotDeployed`:
    /// `Unknown` is [`CoreError::DeployAmbiguous`], anything further
    /// along is [`CoreError::AlreadyDeployed`].
    pub fn mark_deploying(&self, address: &Address) -> CoreResult<()> {
        let mut statuses = self.statuses.write();
        match statuses.get(address).copied().unwrap_or(DeployStatus::Unknown) {
            DeployStatus::NotDeployed => {
                statuses.insert(address.clone(), DeployStatus::Deploying);
                Ok(())
            }
            DeployStatus::Unknown => Err(CoreError::DeployAmbiguous(address.clone())),
            DeployStatus::Deploying | DeployStatus::Deployed => {
                Err(CoreError::AlreadyDeployed(address.clone()))
            }
        }
    }

    /// Confirms a deployment: status becomes `Deployed` and the class
    /// hash lands in the persisted cache.
    pub async fn confirm_deployed(&self, address: &Address, class_hash: ClassHash) {
        self.statuses
            .write()
            .insert(address.clone(), DeployStatus::Deployed);

        let mut cached: HashMap<Address, ClassHash> = kv::get(self.kv.as_ref(), KV_CLASS_HASHES)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        cached.insert(address.clone(), class_hash);
        if let Err(e) = kv::set(self.kv.as_ref(), KV_CLASS_HASHES, &cached).await {
            warn!(account = %address, error = %e, "failed to persist confirmed class hash");
        }
        info!(account = %address, "account deployed");
    }

    /// Drops every volatile status. The persisted class-hash cache is
    /// untouched, so deployed accounts still resolve without RPC on the
    /// next check.
    pub fn clear(&self) {
        self.statuses.write().clear();
    }

    /// Rolls a failed deployment back to `NotDeployed`. Only touches the
    /// entry if it is still `Deploying`.
    pub fn revert_deploying(&self, address: &Address) {
        let mut statuses = self.statuses.write();
        if statuses.get(address) == Some(&DeployStatus::Deploying) {
            statuses.insert(address.clone(), DeployStatus::NotDeployed);
            warn!(account = %address, "deployment failed; status reverted");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
