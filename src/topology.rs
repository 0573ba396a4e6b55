//! Rebuilds the agent hierarchy from a flat topology snapshot.
//!
//! The backend sends every agent as a node carrying an optional `parent_id`.
//! [`reconstruct`] groups the nodes into breadth-first levels starting from
//! the agents that have no parent. Malformed snapshots (cycles, duplicated
//! ids, parents that are not in the snapshot) never fail: the affected nodes
//! are simply left out of the levels.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentNode {
    #[serde(default, deserialize_with = "null_as_default")]
    pub agent_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_usage: u64,
}

impl AgentNode {
    fn parent_key(&self) -> ParentKey<'_> {
        match self.parent_id.as_deref() {
            None | Some("") => ParentKey::Root,
            Some(id) => ParentKey::Agent(id),
        }
    }

    pub fn task_label(&self) -> &str {
        self.task_id.as_deref().unwrap_or("-")
    }
}

/// One dispatch of a task from one agent to another. Display only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default, deserialize_with = "null_as_default")]
    pub from: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub to: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub task_id: String,
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.task_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<AgentNode>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub edges: Vec<Edge>,
}

/// Key of the children index. `Root` is synthetic, so no agent id can
/// collide with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ParentKey<'a> {
    Root,
    Agent(&'a str),
}

/// Rendering rows for one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyLayout {
    pub levels: Vec<Vec<AgentNode>>,
    pub edges: Vec<Edge>,
}

impl TopologyLayout {
    pub fn node_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Nodes of `snapshot` that no level shows: orphans, cycles, duplicates.
    pub fn hidden_count(&self, snapshot: &TopologySnapshot) -> usize {
        snapshot.nodes.len().saturating_sub(self.node_count())
    }
}

/// Group a snapshot into breadth-first levels.
///
/// Level 0 holds the nodes without a parent, in snapshot order. Each further
/// level walks the previous one in order and collects children not placed
/// yet. A node is emitted at most once. Nodes whose parent is missing from
/// the snapshot are never reached and are dropped.
pub fn reconstruct(snapshot: &TopologySnapshot) -> TopologyLayout {
    let mut children: HashMap<ParentKey<'_>, Vec<&AgentNode>> = HashMap::new();
    for node in &snapshot.nodes {
        children.entry(node.parent_key()).or_default().push(node);
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut current: Vec<&AgentNode> = Vec::new();
    for &node in children.get(&ParentKey::Root).into_iter().flatten() {
        if visited.insert(node.agent_id.as_str()) {
            current.push(node);
        }
    }

    let mut levels = Vec::new();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &node in &current {
            let kids = children.get(&ParentKey::Agent(node.agent_id.as_str()));
            for &kid in kids.into_iter().flatten() {
                if visited.insert(kid.agent_id.as_str()) {
                    next.push(kid);
                }
            }
        }
        levels.push(current.into_iter().cloned().collect());
        current = next;
    }

    TopologyLayout {
        levels,
        edges: snapshot.edges.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str, parent: Option<&str>) -> AgentNode {
        AgentNode {
            agent_id: id.to_string(),
            parent_id: parent.map(str::to_string),
            role: "worker".to_string(),
            status: "running".to_string(),
            ..Default::default()
        }
    }

    fn snapshot(nodes: Vec<AgentNode>) -> TopologySnapshot {
        TopologySnapshot {
            nodes,
            edges: Vec::new(),
        }
    }

    fn ids(layout: &TopologyLayout) -> Vec<Vec<&str>> {
        layout
            .levels
            .iter()
            .map(|level| level.iter().map(|n| n.agent_id.as_str()).collect())
            .collect()
    }

    #[test]
    fn breadth_first_levels() {
        let snap = snapshot(vec![
            node("a", None),
            node("b", Some("a")),
            node("c", Some("a")),
            node("d", Some("b")),
        ]);
        let layout = reconstruct(&snap);
        assert_eq!(ids(&layout), vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
    }

    #[test]
    fn self_cycle_renders_nothing() {
        let snap = snapshot(vec![node("a", Some("a"))]);
        let layout = reconstruct(&snap);
        assert!(layout.levels.is_empty());
        assert_eq!(layout.hidden_count(&snap), 1);
    }

    #[test]
    fn two_node_cycle_is_unreachable() {
        let snap = snapshot(vec![node("r", None), node("x", Some("y")), node("y", Some("x"))]);
        assert_eq!(ids(&reconstruct(&snap)), vec![vec!["r"]]);
    }

    #[test]
    fn orphan_with_missing_parent_is_dropped() {
        let snap = snapshot(vec![node("a", None), node("lost", Some("ghost"))]);
        let layout = reconstruct(&snap);
        assert_eq!(ids(&layout), vec![vec!["a"]]);
        assert_eq!(layout.hidden_count(&snap), 1);
    }

    #[test]
    fn children_of_orphans_are_dropped_too() {
        let snap = snapshot(vec![
            node("a", None),
            node("lost", Some("ghost")),
            node("lost-child", Some("lost")),
        ]);
        assert_eq!(ids(&reconstruct(&snap)), vec![vec!["a"]]);
    }

    #[test]
    fn every_parentless_node_is_in_level_zero() {
        let snap = snapshot(vec![
            node("b", Some("a")),
            node("a", None),
            node("z", None),
            node("e", Some("")),
        ]);
        let layout = reconstruct(&snap);
        assert_eq!(layout.levels[0].iter().map(|n| n.agent_id.as_str()).collect::<Vec<_>>(), vec!["a", "z", "e"]);
    }

    #[test]
    fn literal_root_parent_is_not_the_sentinel() {
        let snap = snapshot(vec![node("a", None), node("b", Some("root"))]);
        assert_eq!(ids(&reconstruct(&snap)), vec![vec!["a"]]);
    }

    #[test]
    fn duplicate_ids_are_emitted_once() {
        let snap = snapshot(vec![
            node("a", None),
            node("b", Some("a")),
            node("b", Some("a")),
            node("a", None),
        ]);
        let layout = reconstruct(&snap);
        assert_eq!(ids(&layout), vec![vec!["a"], vec!["b"]]);

        let mut seen = HashSet::new();
        for n in layout.levels.iter().flatten() {
            assert!(seen.insert(n.agent_id.clone()), "{} emitted twice", n.agent_id);
        }
    }

    #[test]
    fn child_order_follows_snapshot_order() {
        let snap = snapshot(vec![
            node("root", None),
            node("z", Some("root")),
            node("m", Some("root")),
            node("a", Some("root")),
            node("z1", Some("z")),
            node("a1", Some("a")),
        ]);
        assert_eq!(
            ids(&reconstruct(&snap)),
            vec![vec!["root"], vec!["z", "m", "a"], vec!["z1", "a1"]]
        );
    }

    #[test]
    fn reconstruction_is_deterministic_and_pure() {
        let snap = snapshot(vec![
            node("a", None),
            node("b", Some("a")),
            node("c", None),
            node("d", Some("c")),
            node("e", Some("b")),
        ]);
        let before = snap.clone();
        let first = reconstruct(&snap);
        let second = reconstruct(&snap);
        assert_eq!(first, second);
        assert_eq!(snap, before);
    }

    #[test]
    fn edges_pass_through_unvalidated() {
        let mut snap = snapshot(vec![node("a", None)]);
        snap.edges.push(Edge {
            from: "a".into(),
            to: "nobody".into(),
            task_id: "t-1".into(),
        });
        let layout = reconstruct(&snap);
        assert_eq!(layout.edges, snap.edges);
        assert_eq!(layout.edges[0].to_string(), "a -> nobody (t-1)");
    }

    #[test]
    fn empty_snapshot_has_no_levels() {
        let layout = reconstruct(&TopologySnapshot::default());
        assert!(layout.levels.is_empty());
        assert_eq!(layout.node_count(), 0);
    }

    #[test]
    fn snapshot_decodes_with_missing_and_null_fields() {
        let snap: TopologySnapshot = serde_json::from_value(json!({
            "nodes": [
                {"agent_id": "a", "parent_id": null, "role": "planner", "status": "running", "task_id": null},
                {"agent_id": "b", "parent_id": "a", "token_usage": null},
                {"agent_id": "c", "parent_id": "a", "token_usage": 42}
            ],
            "edges": null
        }))
        .unwrap();
        assert_eq!(snap.nodes[1].token_usage, 0);
        assert_eq!(snap.nodes[2].token_usage, 42);
        assert_eq!(snap.nodes[0].task_label(), "-");
        assert!(snap.edges.is_empty());
        assert_eq!(ids(&reconstruct(&snap)), vec![vec!["a"], vec!["b", "c"]]);
    }
}
