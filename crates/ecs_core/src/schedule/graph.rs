//! Schedule build algorithm: lifting parent-set edges to members,
//! topological ordering, and the cache the runner walks (spec §4.4).

use indexmap::IndexMap;

use crate::error::BuildError;
use crate::label::InternedSystemSetLabel;

use super::set::SetNode;

/// Cached per-node scheduling info, populated by [`build`] (spec §3
/// Schedule's "lazily built cache").
#[derive(Debug, Clone, Default)]
pub struct NodeCache {
    /// Indices of nodes that must finish before this one may start.
    pub parents: Vec<usize>,
    /// Indices of nodes waiting on this one.
    pub successors: Vec<usize>,
    /// Runtime countdown, reset from `parents.len()` each run.
    pub depends_count: usize,
    /// Direct set-membership parents (`in_set`), for completion cascade.
    pub in_set_parents: Vec<usize>,
    /// Number of direct members, reset each run; reaching zero marks a
    /// pure-group node finished (spec §4.6 "children_count").
    pub children_count: usize,
    pub direct_children: usize,
}

/// A built, run-ready schedule graph: the ordered node list plus cache.
pub struct Graph {
    pub nodes: Vec<SetNode>,
    pub cache: Vec<NodeCache>,
    /// Stable topological order (node indices), per spec §4.6 "Deterministic
    /// ordering".
    pub topo_order: Vec<usize>,
}

fn effective_edges(
    label: InternedSystemSetLabel,
    index_of: &IndexMap<InternedSystemSetLabel, usize>,
    nodes: &[SetNode],
    get: impl Fn(&SetNode) -> &[InternedSystemSetLabel] + Copy,
    seen: &mut Vec<InternedSystemSetLabel>,
) -> Vec<InternedSystemSetLabel> {
    if seen.contains(&label) {
        // Membership cycle; build()'s topo sort will report it as a cycle.
        return Vec::new();
    }
    seen.push(label.clone());

    let Some(&idx) = index_of.get(&label) else {
        return Vec::new();
    };
    let node = &nodes[idx];
    let mut out: Vec<InternedSystemSetLabel> = get(node).to_vec();
    for parent in &node.in_sets {
        out.extend(effective_edges(parent.clone(), index_of, nodes, get, seen));
    }
    seen.pop();
    out
}

/// Runs the build algorithm of spec §4.4 over a flat node list (pending
/// mutations are assumed already applied by the caller).
pub fn build(nodes: Vec<SetNode>) -> Result<Graph, BuildError> {
    let index_of: IndexMap<InternedSystemSetLabel, usize> =
        nodes.iter().enumerate().map(|(i, n)| (n.label.clone(), i)).collect();

    let mut cache = vec![NodeCache::default(); nodes.len()];

    // Lift parent-set ordering edges to members (step 2).
    for (i, node) in nodes.iter().enumerate() {
        let mut depends = node.depends_on.clone();
        let mut precedes = node.precedes.clone();
        for parent in &node.in_sets {
            let mut seen = vec![node.label.clone()];
            depends.extend(effective_edges(parent.clone(), &index_of, &nodes, |n| &n.depends_on, &mut seen));
            let mut seen = vec![node.label.clone()];
            precedes.extend(effective_edges(parent.clone(), &index_of, &nodes, |n| &n.precedes, &mut seen));
        }

        for dep in depends {
            match index_of.get(&dep) {
                Some(&dep_idx) => {
                    cache[dep_idx].successors.push(i);
                    cache[i].parents.push(dep_idx);
                }
                None => log::warn!("ordering edge referenced unknown set label, dropped"),
            }
        }
        for pre in precedes {
            match index_of.get(&pre) {
                Some(&pre_idx) => {
                    cache[i].successors.push(pre_idx);
                    cache[pre_idx].parents.push(i);
                }
                None => log::warn!("ordering edge referenced unknown set label, dropped"),
            }
        }

        for parent in &node.in_sets {
            if let Some(&parent_idx) = index_of.get(parent) {
                cache[i].in_set_parents.push(parent_idx);
                cache[parent_idx].direct_children += 1;
            }
        }
    }

    for c in &mut cache {
        c.parents.sort_unstable();
        c.parents.dedup();
        c.successors.sort_unstable();
        c.successors.dedup();
        c.depends_count = c.parents.len();
        c.children_count = c.direct_children;
    }

    let topo_order = topological_sort(&cache)?;

    Ok(Graph { nodes, cache, topo_order })
}

/// Kahn's algorithm, stable with respect to node insertion order (spec
/// §4.6 "Deterministic ordering").
fn topological_sort(cache: &[NodeCache]) -> Result<Vec<usize>, BuildError> {
    let mut in_degree: Vec<usize> = cache.iter().map(|c| c.parents.len()).collect();
    let mut ready: Vec<usize> = (0..cache.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(cache.len());

    let mut cursor = 0;
    while cursor < ready.len() {
        let n = ready[cursor];
        cursor += 1;
        order.push(n);
        for &succ in &cache[n].successors {
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                ready.push(succ);
            }
        }
    }

    if order.len() != cache.len() {
        let remaining = cache.len() - order.len();
        return Err(BuildError::Cycle(remaining));
    }

    Ok(order)
}
