//! Resolution engine: answers `check`, `trace`, and permission views
//!
//! Orchestrates the group graph and the pattern matcher over documents
//! loaded from the policy store, with per-role memoization of flattened
//! permission sets. Read-only: every operation takes a shared store lock
//! at most once, and an unknown role resolves to DENY rather than an error
//! so a misconfigured or deleted role fails closed.

pub mod decision;

pub use decision::{Candidate, ResolutionTrace};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{CacheStats, PermissionSource, RolePermissionCache, RolePermissions};
use crate::error::Result;
use crate::graph::GroupGraph;
use crate::node;
use crate::store::PolicyStore;
use crate::types::{Group, GroupId};

/// Narrow capability interface mapping a user id to a role.
///
/// The engine never mutates user records and is not coupled to any user
/// storage technology; callers inject whatever backs this.
pub trait RoleLookup: Send + Sync {
    /// The role assigned to `user_id`, or `None` when unassigned
    fn role(&self, user_id: &str) -> Option<String>;
}

/// Map-backed [`RoleLookup`] for tests and embedded use
#[derive(Debug, Clone, Default)]
pub struct StaticRoles {
    roles: HashMap<String, String>,
}

impl StaticRoles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a role, builder-style
    pub fn with_role(mut self, user_id: impl Into<String>, role: impl Into<String>) -> Self {
        self.roles.insert(user_id.into(), role.into());
        self
    }
}

impl RoleLookup for StaticRoles {
    fn role(&self, user_id: &str) -> Option<String> {
        self.roles.get(user_id).cloned()
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Role used when the lookup has no assignment for a user
    pub default_role: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_role: "guest".to_string(),
        }
    }
}

/// Read-side permission resolution over a shared policy store
pub struct ResolutionEngine {
    store: Arc<PolicyStore>,
    roles: Arc<dyn RoleLookup>,
    cache: RolePermissionCache,
    config: EngineConfig,
}

impl ResolutionEngine {
    /// Create an engine with the default configuration
    pub fn new(store: Arc<PolicyStore>, roles: Arc<dyn RoleLookup>) -> Self {
        Self::with_config(store, roles, EngineConfig::default())
    }

    pub fn with_config(
        store: Arc<PolicyStore>,
        roles: Arc<dyn RoleLookup>,
        config: EngineConfig,
    ) -> Self {
        info!("ResolutionEngine ready, default role '{}'", config.default_role);
        Self {
            store,
            roles,
            cache: RolePermissionCache::new(),
            config,
        }
    }

    /// Decide access for a user: resolve the role, then [`Self::check_role`]
    pub fn check(&self, user_id: &str, requested: &str) -> Result<bool> {
        let role = self.role_of(user_id);
        self.check_role(&role, requested)
    }

    /// Decide access for a role directly.
    ///
    /// The requested node must be concrete (wildcards are a validation
    /// error). Collects every matching grant along the role's inheritance
    /// chain and applies the tie-break: specificity, then weight, then
    /// deny-wins. No match, or an unknown role, is an implicit DENY.
    pub fn check_role(&self, role: &str, requested: &str) -> Result<bool> {
        node::validate_node(requested)?;

        let perms = self.collect(role)?;
        let mut candidates = candidates_for(&perms, requested);
        decision::rank(&mut candidates);

        let result = match decision::winner(&candidates) {
            Some(win) => {
                debug!(
                    "check_role({role}, {requested}) -> {} via '{}' in '{}'",
                    win.value, win.pattern, win.group_id
                );
                win.value
            }
            None => {
                debug!("check_role({role}, {requested}) -> false (no matching pattern)");
                false
            }
        };
        Ok(result)
    }

    /// Materialized allow/deny view across a role's whole chain.
    ///
    /// For each distinct pattern, the value from the highest-weight owning
    /// group wins; equal weights prefer deny. Display/audit only: `check`
    /// always re-runs the node-specific algorithm.
    pub fn role_permissions(&self, role: &str) -> Result<BTreeMap<String, bool>> {
        let perms = self.collect(role)?;

        let mut best: BTreeMap<String, (bool, i64)> = BTreeMap::new();
        for source in perms.sources.iter() {
            match best.get(&source.pattern) {
                Some(&(value, weight))
                    if weight > source.weight
                        || (weight == source.weight && !value) => {}
                _ => {
                    best.insert(source.pattern.clone(), (source.value, source.weight));
                }
            }
        }

        Ok(best.into_iter().map(|(p, (v, _))| (p, v)).collect())
    }

    /// Full diagnostic trace for a user's resolution
    pub fn trace(&self, user_id: &str, requested: &str) -> Result<ResolutionTrace> {
        let role = self.role_of(user_id);
        let mut trace = self.trace_role(&role, requested)?;
        trace.user_id = Some(user_id.to_string());
        Ok(trace)
    }

    /// Full diagnostic trace for a role's resolution: every candidate in
    /// tie-break order, the decision, and the chain that was walked
    pub fn trace_role(&self, role: &str, requested: &str) -> Result<ResolutionTrace> {
        node::validate_node(requested)?;

        let perms = self.collect(role)?;
        let mut candidates = candidates_for(&perms, requested);
        decision::rank(&mut candidates);
        let result = decision::winner(&candidates).map(|w| w.value).unwrap_or(false);

        Ok(ResolutionTrace {
            user_id: None,
            role: role.to_string(),
            node: requested.to_string(),
            result,
            inheritance_chain: perms.chain.to_vec(),
            matches: candidates,
        })
    }

    /// Look up one group
    pub fn group(&self, id: &str) -> Result<Option<Group>> {
        Ok(self.store.load()?.groups.remove(id))
    }

    /// Snapshot of every group
    pub fn groups(&self) -> Result<BTreeMap<GroupId, Group>> {
        Ok(self.store.load()?.groups)
    }

    pub fn group_exists(&self, id: &str) -> Result<bool> {
        Ok(self.store.load()?.groups.contains_key(id))
    }

    /// Drop all memoized role permissions
    pub fn invalidate_cache(&self) {
        self.cache.clear();
        debug!("Role permission cache invalidated");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn role_of(&self, user_id: &str) -> String {
        match self.roles.role(user_id) {
            Some(role) => role,
            None => {
                debug!(
                    "No role for user '{user_id}', using default '{}'",
                    self.config.default_role
                );
                self.config.default_role.clone()
            }
        }
    }

    /// Flattened chain and permission sources for a role, memoized against
    /// the store's staleness stamp.
    fn collect(&self, role: &str) -> Result<RolePermissions> {
        let stamp = self.store.stamp();
        if let Some(perms) = self.cache.get(role, stamp) {
            return Ok(perms);
        }

        let doc = self.store.load()?;
        let chain = GroupGraph::new(&doc.groups).flatten_chain(role);
        if chain.is_empty() {
            warn!("Unknown role '{role}', resolving fail-closed");
        }

        let mut sources = Vec::new();
        for group_id in &chain {
            // flatten_chain only yields known ids
            let group = &doc.groups[group_id];
            for (pattern, &value) in &group.permissions {
                sources.push(PermissionSource {
                    pattern: pattern.clone(),
                    value,
                    group_id: group_id.clone(),
                    weight: group.weight,
                });
            }
        }

        let perms = RolePermissions {
            chain: Arc::from(chain.into_boxed_slice()),
            sources: Arc::from(sources.into_boxed_slice()),
        };
        self.cache.put(role, stamp, perms.clone());
        Ok(perms)
    }
}

fn candidates_for(perms: &RolePermissions, requested: &str) -> Vec<Candidate> {
    perms
        .sources
        .iter()
        .filter(|s| node::matches(&s.pattern, requested))
        .map(|s| Candidate {
            pattern: s.pattern.clone(),
            group_id: s.group_id.clone(),
            value: s.value,
            specificity: node::specificity(&s.pattern),
            weight: s.weight,
        })
        .collect()
}
