//! Group inheritance graph: chain flattening and cycle detection
//!
//! The graph is a read-only view over a document's groups. Mutations that
//! change `inherits` run [`GroupGraph::detect_cycle`] on the mutated copy
//! and reject it before anything is persisted.

use crate::types::{Group, GroupId};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Read-only inheritance view over a policy document's groups
pub struct GroupGraph<'a> {
    groups: &'a BTreeMap<GroupId, Group>,
}

impl<'a> GroupGraph<'a> {
    pub fn new(groups: &'a BTreeMap<GroupId, Group>) -> Self {
        Self { groups }
    }

    /// Flatten a group's inheritance chain: self first, then ancestors,
    /// breadth-first over `inherits` left to right, deduplicated in
    /// first-seen order. Diamond ancestry contributes each group once.
    ///
    /// An unknown root yields an empty chain; unknown parents encountered
    /// mid-traversal are skipped (the health check reports them).
    pub fn flatten_chain(&self, id: &str) -> Vec<GroupId> {
        if !self.groups.contains_key(id) {
            return Vec::new();
        }

        let mut chain = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        queue.push_back(id);
        seen.insert(id);

        while let Some(current) = queue.pop_front() {
            let Some(group) = self.groups.get(current) else {
                continue;
            };
            chain.push(current.to_string());

            for parent in &group.inherits {
                if self.groups.contains_key(parent.as_str()) && seen.insert(parent.as_str()) {
                    queue.push_back(parent.as_str());
                }
            }
        }

        chain
    }

    /// Detect an inheritance cycle anywhere in the graph.
    ///
    /// DFS with three states per node (unvisited / on the current path /
    /// done). Returns the first cycle found as the path of group ids,
    /// closing on the repeated id, or `None` when the graph is acyclic.
    pub fn detect_cycle(&self) -> Option<Vec<GroupId>> {
        // 0 = unvisited, 1 = on path, 2 = done
        let mut state: HashMap<&str, u8> = HashMap::new();

        for start in self.groups.keys() {
            if state.get(start.as_str()).copied().unwrap_or(0) == 0 {
                let mut path = Vec::new();
                if let Some(cycle) = self.dfs(start, &mut state, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    fn dfs<'g>(
        &'g self,
        node: &'g str,
        state: &mut HashMap<&'g str, u8>,
        path: &mut Vec<&'g str>,
    ) -> Option<Vec<GroupId>> {
        match state.get(node).copied().unwrap_or(0) {
            1 => {
                // Back edge: the cycle is the path suffix from the repeat
                let start = path.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<GroupId> =
                    path[start..].iter().map(|n| (*n).to_string()).collect();
                cycle.push(node.to_string());
                return Some(cycle);
            }
            2 => return None,
            _ => {}
        }

        state.insert(node, 1);
        path.push(node);

        if let Some(group) = self.groups.get(node) {
            for parent in &group.inherits {
                if let Some((key, _)) = self.groups.get_key_value(parent.as_str()) {
                    if let Some(cycle) = self.dfs(key.as_str(), state, path) {
                        return Some(cycle);
                    }
                }
            }
        }

        path.pop();
        state.insert(node, 2);
        None
    }
}
