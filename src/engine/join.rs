//! Binding join.
//!
//! Relations are evaluated pairwise, so a rule with three nodes and three
//! relations first yields three independent seed lists. This module merges
//! those pairwise bindings into complete n-ary bindings:
//!
//! - one token per declared node index,
//! - shared node indices agree on the concrete token,
//! - every declared relation is covered.
//!
//! ## Algorithm
//!
//! ```text
//! seeds ──▶ grow bins ──▶ collect solutions ──▶ fuse ──▶ prune
//!            │              │                    │
//!            │              │                    └─ overlapping solutions with
//!            │              │                       disjoint relation sets
//!            │              └─ bins covering all nodes; missing relations are
//!            │                 topped up from seeds that agree on tokens
//!            └─ a seed merges into a bin when they share a node index bound
//!               to the same token and the seed brings a new node index
//! ```
//!
//! Bins are value types: merging never mutates an existing bin, and the
//! output order is a deterministic function of seed order. The node count per
//! rule is tiny in practice (≤ ~5), so the cubic worst case never bites.

use super::parser::{Match, Seed};
use std::collections::BTreeMap;

/// A partial or complete n-ary binding. `nodes` maps node index to token
/// index; `rels` lists covered relation ordinals; `matchers` carries
/// `(def_index, arena_id)` pairs so capture groups can be assembled later.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Bin {
    pub nodes: BTreeMap<usize, usize>,
    pub rels: Vec<usize>,
    pub matchers: Vec<(usize, usize)>,
    pub groups: Vec<String>,
}

impl Bin {
    fn from_seed(seed: &Seed) -> Bin {
        let mut nodes = BTreeMap::new();
        for &(node, token) in &seed.nodes {
            nodes.insert(node, token);
        }
        Bin { nodes, rels: vec![seed.rel], matchers: seed.matchers.clone(), groups: Vec::new() }
    }
}

/// Merge a seed bin into an existing bin if they are compatible: they share
/// at least one node index bound to the same token, and the seed introduces a
/// node index the existing bin lacks. On conflicting shared indices the
/// existing bin's token wins. Matchers are deduplicated by node index.
fn merge_compatible(seed: &Bin, existing: &Bin) -> Option<Bin> {
    let overlap = seed.nodes.iter().any(|(node, token)| existing.nodes.get(node) == Some(token));
    let progress = seed.nodes.keys().any(|node| !existing.nodes.contains_key(node));
    if !overlap || !progress {
        return None;
    }
    let mut merged = existing.clone();
    for (&node, &token) in &seed.nodes {
        merged.nodes.entry(node).or_insert(token);
    }
    for &(def_index, mid) in &seed.matchers {
        if !merged.matchers.iter().any(|&(d, _)| d == def_index) {
            merged.matchers.push((def_index, mid));
        }
    }
    merged.rels.extend(seed.rels.iter().copied());
    Some(merged)
}

/// Build every complete binding for a rule with `node_count` nodes and
/// `rel_count` relations from the pairwise `seeds`.
pub(crate) fn merge_sets(seeds: &[Seed], node_count: usize, rel_count: usize) -> Vec<Bin> {
    // Grow bins: each seed is merged against a snapshot of the bins known
    // before it arrived, then appended as a bin of its own.
    let mut bins: Vec<Bin> = Vec::new();
    for seed in seeds {
        let seed_bin = Bin::from_seed(seed);
        let snapshot = bins.len();
        for i in 0..snapshot {
            if let Some(merged) = merge_compatible(&seed_bin, &bins[i]) {
                bins.push(merged);
            }
        }
        bins.push(seed_bin);
    }

    // Collect solutions: a bin covering every node is a structural candidate.
    // Relations it is still missing can be topped up from seeds whose node
    // bindings it already agrees with. Solutions are canonicalized (sorted
    // rels and matchers) so that different derivations of the same binding
    // compare equal and deduplicate.
    let mut solutions: Vec<Bin> = Vec::new();
    for bin in &bins {
        if bin.nodes.len() != node_count {
            continue;
        }
        let mut candidate = bin.clone();
        if candidate.rels.len() != rel_count {
            for seed in seeds {
                if candidate.rels.contains(&seed.rel) {
                    continue;
                }
                let agrees =
                    seed.nodes.iter().all(|(node, token)| candidate.nodes.get(node) == Some(token));
                if agrees {
                    candidate.rels.push(seed.rel);
                }
            }
        }
        if candidate.rels.len() == rel_count {
            candidate.rels.sort_unstable();
            candidate.matchers.sort_unstable();
            solutions.push(candidate);
        }
    }

    // Fuse overlapping solutions with disjoint relation sets, dedup, prune.
    let mut merged: Vec<Bin> = Vec::new();
    for solution in solutions {
        merge_solution(solution, &mut merged, rel_count);
    }
    merged.retain(|bin| bin.rels.len() >= rel_count);
    merged
}

/// Add `solution` to the merged list (deduplicated by value). An incomplete
/// solution may fuse with an already-merged one when they share a node index
/// bound to the same token and their relation sets are disjoint.
fn merge_solution(solution: Bin, merged: &mut Vec<Bin>, rel_count: usize) {
    let mut fusions: Vec<Bin> = Vec::new();
    if !merged.contains(&solution) {
        merged.push(solution.clone());
    }
    if solution.rels.len() != rel_count {
        for candidate in merged.iter() {
            if *candidate == solution {
                continue;
            }
            let shared =
                solution.nodes.iter().any(|(node, token)| candidate.nodes.get(node) == Some(token));
            if !shared {
                continue;
            }
            if solution.rels.iter().any(|rel| candidate.rels.contains(rel)) {
                continue;
            }
            let mut fused = solution.clone();
            for (&node, &token) in &candidate.nodes {
                fused.nodes.insert(node, token);
            }
            fused.rels.extend(candidate.rels.iter().copied());
            for matcher in &candidate.matchers {
                if !fused.matchers.contains(matcher) {
                    fused.matchers.push(*matcher);
                }
            }
            fused.rels.sort_unstable();
            fused.matchers.sort_unstable();
            fusions.push(fused);
        }
    }
    merged.extend(fusions);
}

/// Assemble each binding's capture groups: matchers sorted by node index, the
/// first element of every capture tuple, concatenated. Actions address the
/// result as `$1`, `$2`, ...
pub(crate) fn add_groups(bins: &mut [Bin], arena: &[Match]) {
    for bin in bins {
        let mut matchers = bin.matchers.clone();
        matchers.sort_by_key(|&(def_index, _)| def_index);
        let mut groups = Vec::new();
        for (_, mid) in matchers {
            for tuple in &arena[mid].groups {
                if let Some(first) = tuple.first() {
                    groups.push(first.clone());
                }
            }
        }
        bin.groups = groups;
    }
}
