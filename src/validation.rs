use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::models::{GraphDocument, NodeId, Verdict};

/// Checks node uniqueness, then computes whether the graph is acyclic.
///
/// Edges may name identifiers that were never declared in `nodes`; those
/// endpoints join the graph as implicit vertices rather than being rejected.
pub fn validate(nodes: &[NodeId], edges: &[(NodeId, NodeId)]) -> Result<Verdict> {
    ensure_unique_nodes(nodes)?;
    Ok(Verdict {
        is_acyclic: !has_cycle(nodes, edges),
    })
}

pub fn validate_document(document: &GraphDocument) -> Result<Verdict> {
    validate(&document.node_ids(), &document.arcs())
}

fn ensure_unique_nodes(nodes: &[NodeId]) -> Result<()> {
    let mut seen = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !seen.insert(node) {
            return Err(LibError::duplicate_node(anyhow!(
                "duplicate node id {}",
                node
            )));
        }
    }
    Ok(())
}

pub fn adjacency_map<'a>(
    nodes: &'a [NodeId],
    edges: &'a [(NodeId, NodeId)],
) -> HashMap<&'a NodeId, Vec<&'a NodeId>> {
    let mut adjacency: HashMap<&NodeId, Vec<&NodeId>> =
        HashMap::with_capacity(nodes.len() + edges.len());
    for node in nodes {
        adjacency.entry(node).or_default();
    }
    for (source, target) in edges {
        adjacency.entry(source).or_default().push(target);
        adjacency.entry(target).or_default();
    }
    adjacency
}

/// Kahn's algorithm: a vertex left with a non-zero in-degree after draining
/// every source sits on, or downstream of, a cycle. Self-loops count.
pub fn has_cycle(nodes: &[NodeId], edges: &[(NodeId, NodeId)]) -> bool {
    let adjacency = adjacency_map(nodes, edges);
    let mut indegree: HashMap<&NodeId, usize> =
        adjacency.keys().map(|node_id| (*node_id, 0)).collect();
    for (_, target) in edges {
        if let Some(degree) = indegree.get_mut(target) {
            *degree += 1;
        }
    }

    let mut queue: VecDeque<&NodeId> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(node_id, _)| *node_id)
        .collect();

    let mut ordered = 0usize;
    while let Some(node_id) = queue.pop_front() {
        ordered += 1;
        let Some(children) = adjacency.get(node_id) else {
            continue;
        };
        for child in children {
            if let Some(child_degree) = indegree.get_mut(*child) {
                *child_degree -= 1;
                if *child_degree == 0 {
                    queue.push_back(*child);
                }
            }
        }
    }

    ordered != adjacency.len()
}
