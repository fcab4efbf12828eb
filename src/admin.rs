//! Policy mutation API
//!
//! Every operation loads the current document under the store's exclusive
//! lock, mutates an in-memory copy, validates it, and persists atomically.
//! A failed validation aborts with nothing written; a no-op mutation skips
//! the write so caches are not invalidated for nothing.

use std::sync::Arc;

use tracing::info;

use crate::error::{Result, ValidationError};
use crate::graph::GroupGraph;
use crate::node;
use crate::store::PolicyStore;
use crate::types::{Group, PolicyDocument};

/// Minimum group weight for wildcard grants without `force`.
///
/// A guard against accidental over-privileging of low-trust groups, not a
/// security boundary: `force` bypasses it, and later weight changes do not
/// revisit grants that already passed the gate.
pub const WILDCARD_WEIGHT_GATE: i64 = 50;

/// Administrative write access to the policy document
pub struct PolicyAdmin {
    store: Arc<PolicyStore>,
}

impl PolicyAdmin {
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }

    /// Create a new empty group
    pub fn create_group(&self, id: &str, weight: i64) -> Result<()> {
        if id.is_empty() {
            return Err(ValidationError::EmptyGroupId.into());
        }
        self.store.update(|doc| {
            if doc.groups.contains_key(id) {
                return Err(ValidationError::DuplicateGroup(id.to_string()).into());
            }
            doc.groups.insert(id.to_string(), Group::with_weight(weight));
            info!("Created group '{id}' with weight {weight}");
            Ok(true)
        })
    }

    /// Delete a group nothing inherits from.
    ///
    /// Groups still referencing it are reported; remove those edges first.
    pub fn delete_group(&self, id: &str) -> Result<()> {
        self.store.update(|doc| {
            if !doc.groups.contains_key(id) {
                return Err(ValidationError::UnknownGroup(id.to_string()).into());
            }
            let referenced_by = doc.referencing(id);
            if !referenced_by.is_empty() {
                return Err(ValidationError::GroupInUse {
                    id: id.to_string(),
                    referenced_by,
                }
                .into());
            }
            doc.groups.remove(id);
            info!("Deleted group '{id}'");
            Ok(true)
        })
    }

    /// Rename a group, updating every `inherits` entry that references it,
    /// in one atomic document write
    pub fn rename_group(&self, old_id: &str, new_id: &str) -> Result<()> {
        if new_id.is_empty() {
            return Err(ValidationError::EmptyGroupId.into());
        }
        self.store.update(|doc| {
            if doc.groups.contains_key(new_id) {
                return Err(ValidationError::DuplicateGroup(new_id.to_string()).into());
            }
            let Some(group) = doc.groups.remove(old_id) else {
                return Err(ValidationError::UnknownGroup(old_id.to_string()).into());
            };
            doc.groups.insert(new_id.to_string(), group);

            for other in doc.groups.values_mut() {
                for parent in other.inherits.iter_mut() {
                    if parent == old_id {
                        *parent = new_id.to_string();
                    }
                }
            }
            info!("Renamed group '{old_id}' to '{new_id}'");
            Ok(true)
        })
    }

    /// Set a group's weight.
    ///
    /// Dropping a group below [`WILDCARD_WEIGHT_GATE`] leaves wildcard
    /// grants it already holds intact; the gate applies at grant time only.
    pub fn set_group_weight(&self, id: &str, weight: i64) -> Result<()> {
        self.store.update(|doc| {
            let Some(group) = doc.groups.get_mut(id) else {
                return Err(ValidationError::UnknownGroup(id.to_string()).into());
            };
            if group.weight == weight {
                return Ok(false);
            }
            group.weight = weight;
            info!("Set weight of group '{id}' to {weight}");
            Ok(true)
        })
    }

    /// Add an inheritance parent. Adding an existing edge is a no-op;
    /// a cycle introduced by the new edge rejects the mutation.
    pub fn add_parent(&self, id: &str, parent_id: &str) -> Result<()> {
        self.store.update(|doc| {
            if !doc.groups.contains_key(parent_id) {
                return Err(ValidationError::UnknownGroup(parent_id.to_string()).into());
            }
            let Some(group) = doc.groups.get_mut(id) else {
                return Err(ValidationError::UnknownGroup(id.to_string()).into());
            };
            if group.inherits.iter().any(|p| p == parent_id) {
                return Ok(false);
            }
            group.inherits.push(parent_id.to_string());

            if let Some(cycle) = GroupGraph::new(&doc.groups).detect_cycle() {
                return Err(ValidationError::CycleDetected(cycle.join(" -> ")).into());
            }
            info!("Group '{id}' now inherits '{parent_id}'");
            Ok(true)
        })
    }

    /// Remove an inheritance parent. Removing an absent edge is a no-op.
    pub fn remove_parent(&self, id: &str, parent_id: &str) -> Result<()> {
        self.store.update(|doc| {
            if !doc.groups.contains_key(parent_id) {
                return Err(ValidationError::UnknownGroup(parent_id.to_string()).into());
            }
            let Some(group) = doc.groups.get_mut(id) else {
                return Err(ValidationError::UnknownGroup(id.to_string()).into());
            };
            let before = group.inherits.len();
            group.inherits.retain(|p| p != parent_id);
            if group.inherits.len() == before {
                return Ok(false);
            }
            info!("Group '{id}' no longer inherits '{parent_id}'");
            Ok(true)
        })
    }

    /// Grant a pattern to a group, `allow` or explicit deny.
    ///
    /// Wildcard patterns on groups below [`WILDCARD_WEIGHT_GATE`] require
    /// `force`.
    pub fn grant(&self, group_id: &str, pattern: &str, allow: bool, force: bool) -> Result<()> {
        node::validate_pattern(pattern)?;
        self.store.update(|doc| {
            let Some(group) = doc.groups.get_mut(group_id) else {
                return Err(ValidationError::UnknownGroup(group_id.to_string()).into());
            };
            if node::is_wildcard(pattern) && group.weight < WILDCARD_WEIGHT_GATE && !force {
                return Err(ValidationError::WildcardWeight {
                    group: group_id.to_string(),
                    weight: group.weight,
                    pattern: pattern.to_string(),
                    gate: WILDCARD_WEIGHT_GATE,
                }
                .into());
            }
            if group.permissions.get(pattern) == Some(&allow) {
                return Ok(false);
            }
            group.permissions.insert(pattern.to_string(), allow);
            info!(
                "Granted '{pattern}' = {} on group '{group_id}'",
                if allow { "allow" } else { "deny" }
            );
            Ok(true)
        })
    }

    /// Remove a pattern from a group; idempotent
    pub fn revoke(&self, group_id: &str, pattern: &str) -> Result<()> {
        self.store.update(|doc| {
            let Some(group) = doc.groups.get_mut(group_id) else {
                return Err(ValidationError::UnknownGroup(group_id.to_string()).into());
            };
            if group.permissions.remove(pattern).is_none() {
                return Ok(false);
            }
            info!("Revoked '{pattern}' from group '{group_id}'");
            Ok(true)
        })
    }

    /// Full-document health check: cycles, stored-pattern format, dangling
    /// `inherits` references, and groups resolving to no permissions at
    /// all. Findings are reported, never auto-repaired.
    pub fn validate(&self) -> Result<Vec<ValidationError>> {
        let doc = self.store.load()?;
        Ok(validate_document(&doc))
    }
}

/// Health-check a document in memory; see [`PolicyAdmin::validate`]
pub fn validate_document(doc: &PolicyDocument) -> Vec<ValidationError> {
    let mut findings = Vec::new();
    let graph = GroupGraph::new(&doc.groups);

    if let Some(cycle) = graph.detect_cycle() {
        findings.push(ValidationError::CycleDetected(cycle.join(" -> ")));
    }

    for (id, group) in &doc.groups {
        for pattern in group.permissions.keys() {
            if let Err(e) = node::validate_pattern(pattern) {
                findings.push(ValidationError::BadStoredPattern {
                    group: id.clone(),
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                });
            }
        }
        for parent in &group.inherits {
            if !doc.groups.contains_key(parent) {
                findings.push(ValidationError::DanglingParent {
                    group: id.clone(),
                    parent: parent.clone(),
                });
            }
        }
    }

    // Inert groups: nothing grantable anywhere along the chain. Skipped
    // when a cycle is present, chains are not meaningful then.
    if !findings
        .iter()
        .any(|f| matches!(f, ValidationError::CycleDetected(_)))
    {
        for id in doc.groups.keys() {
            let inert = graph
                .flatten_chain(id)
                .iter()
                .all(|gid| doc.groups[gid].permissions.is_empty());
            if inert {
                findings.push(ValidationError::InertGroup(id.clone()));
            }
        }
    }

    findings
}
