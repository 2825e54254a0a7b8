//! Per-sentence matching.
//!
//! This module is the operational core of the engine:
//!
//! - Collect, for every node clause of a rule, the candidate tokens of the
//!   current sentence (super-tokens are never candidates).
//! - Evaluate each declared relation over the candidate pools, producing
//!   pairwise bindings (seeds) tagged with the relation that produced them.
//! - Hand the seeds to the joiner (`join.rs`) and the resulting complete
//!   bindings to the executor (`actions.rs`).
//!
//! ## Candidate pruning
//!
//! After a binary relation is evaluated, candidates of the two implicated
//! node positions that never participated in a successful pairing are dropped
//! from their pools. Later relations only see survivors, which keeps the
//! pairwise products small. A relation with zero pairings clears the seed
//! list; the rule can then no longer fire on this sentence.
//!
//! ## Determinism
//!
//! Candidates are collected in token order and relations evaluated in
//! declaration order, so seeds, bindings, and action executions follow a
//! stable order for a fixed input.
//!
//! ## Debugging
//!
//! Set `DEPEDIT_DEBUG_RULES=1` to print per-rule candidate and binding
//! counts.

use super::actions::{self, Outcome};
use super::compiled_rules::{Relation, RuleFlags, Transformation};
use super::join;
use crate::conll::int_value;
use crate::{RunError, Sentence, Token};
use std::collections::HashMap;

/// One candidate pairing of a node clause with a concrete token, carrying the
/// capture tuples its regex tests produced. `token` indexes into the
/// sentence's token vector.
#[derive(Debug, Clone)]
pub(crate) struct Match {
    pub def_index: usize,
    pub token: usize,
    pub groups: Vec<Vec<String>>,
}

/// A pairwise binding produced by one relation: a small node-index to token
/// mapping plus the relation ordinal and the matchers involved, as
/// `(def_index, arena_id)` pairs.
#[derive(Debug, Clone)]
pub(crate) struct Seed {
    pub nodes: Vec<(usize, usize)>,
    pub rel: usize,
    pub matchers: Vec<(usize, usize)>,
}

pub(crate) fn debug_enabled() -> bool {
    std::env::var_os("DEPEDIT_DEBUG_RULES").is_some()
}

/// Applies a compiled rule set to sentences, one at a time.
pub(crate) struct Parser<'a> {
    rules: &'a [Transformation],
}

impl<'a> Parser<'a> {
    pub fn new(rules: &'a [Transformation]) -> Self {
        Parser { rules }
    }

    /// Run every rule against `sentence`, mutating its tokens and annotations
    /// in place. A `last` action stops all remaining rules for this sentence.
    pub fn process_sentence(&self, sentence: &mut Sentence) -> Result<(), RunError> {
        let debug = debug_enabled();
        for rule in self.rules {
            let (arena, mut node_matches) = collect_candidates(rule, sentence);
            if debug {
                eprintln!(
                    "[rule:candidates] line={} flags={:?} per_node={:?}",
                    rule.line,
                    rule.flags,
                    rule.defs.iter().map(|d| node_matches.get(&d.def_index).map_or(0, Vec::len)).collect::<Vec<_>>(),
                );
            }

            let mut seeds: Vec<Seed> = Vec::new();
            for (rel_index, relation) in rule.relations.iter().enumerate() {
                if !matches_relation(sentence, &arena, &mut node_matches, relation, rel_index, &mut seeds) {
                    seeds.clear();
                }
            }

            let mut bindings = join::merge_sets(&seeds, rule.defs.len(), rule.relations.len());
            if rule.flags.contains(RuleFlags::CAPTURES) {
                join::add_groups(&mut bindings, &arena);
            }
            if debug {
                eprintln!("[rule:bindings] line={} seeds={} complete={}", rule.line, seeds.len(), bindings.len());
            }

            if !bindings.is_empty()
                && actions::execute(&rule.actions, &bindings, sentence)? == Outcome::Last
            {
                return Ok(());
            }
        }
        Ok(())
    }
}

/// Test every non-super token of the sentence against every node clause of
/// the rule. Returns the match arena and, per node index, the candidate
/// matcher ids in token order.
fn collect_candidates(
    rule: &Transformation,
    sentence: &Sentence,
) -> (Vec<Match>, HashMap<usize, Vec<usize>>) {
    let mut arena = Vec::new();
    let mut node_matches: HashMap<usize, Vec<usize>> = HashMap::new();
    for def in &rule.defs {
        for (index, token) in sentence.tokens.iter().enumerate() {
            if token.is_super_tok {
                continue;
            }
            if let Some(groups) = def.match_token(token) {
                arena.push(Match { def_index: def.def_index, token: index, groups });
                node_matches.entry(def.def_index).or_default().push(arena.len() - 1);
            }
        }
    }
    (arena, node_matches)
}

fn test_relation(left: &Token, right: &Token, relation: &Relation) -> bool {
    match relation {
        Relation::Dominates { .. } => int_value(&right.head) == int_value(&left.id),
        Relation::Adjacent { min, max, .. } => {
            let distance = int_value(&right.id) - int_value(&left.id);
            *min <= distance && distance <= *max
        }
        Relation::FieldEq { field, .. } => left.get(*field) == right.get(*field),
        Relation::Unary { .. } => true,
    }
}

/// Evaluate one relation over the current candidate pools, appending a seed
/// for every successful pairing, then prune candidates that never paired.
/// Returns whether the relation produced at least one seed.
fn matches_relation(
    sentence: &Sentence,
    arena: &[Match],
    node_matches: &mut HashMap<usize, Vec<usize>>,
    relation: &Relation,
    rel_index: usize,
    seeds: &mut Vec<Seed>,
) -> bool {
    let mut hits = 0usize;

    if let Relation::Unary { node } = relation {
        for &mid in node_matches.get(node).map(Vec::as_slice).unwrap_or(&[]) {
            seeds.push(Seed {
                nodes: vec![(*node, arena[mid].token)],
                rel: rel_index,
                matchers: vec![(arena[mid].def_index, mid)],
            });
            hits += 1;
        }
        return hits > 0;
    }

    let (left_node, right_node) = match relation {
        Relation::Dominates { parent, child } => (*parent, *child),
        Relation::Adjacent { left, right, .. } => (*left, *right),
        Relation::FieldEq { left, right, .. } => (*left, *right),
        Relation::Unary { .. } => unreachable!(),
    };

    let left_pool: Vec<usize> = node_matches.get(&left_node).cloned().unwrap_or_default();
    let right_pool: Vec<usize> = node_matches.get(&right_node).cloned().unwrap_or_default();
    let mut left_used: Vec<usize> = Vec::new();
    let mut right_used: Vec<usize> = Vec::new();

    for &m1 in &left_pool {
        let tok1 = arena[m1].token;
        for &m2 in &right_pool {
            let tok2 = arena[m2].token;
            if test_relation(&sentence.tokens[tok1], &sentence.tokens[tok2], relation) {
                // Later insertion wins if both sides name the same node index.
                let mut nodes = vec![(left_node, tok1)];
                if right_node == left_node {
                    nodes[0] = (right_node, tok2);
                } else {
                    nodes.push((right_node, tok2));
                }
                seeds.push(Seed {
                    nodes,
                    rel: rel_index,
                    matchers: vec![(arena[m1].def_index, m1), (arena[m2].def_index, m2)],
                });
                left_used.push(tok1);
                right_used.push(tok2);
                hits += 1;
            }
        }
    }

    for (node, used) in [(left_node, &left_used), (right_node, &right_used)] {
        if let Some(pool) = node_matches.get_mut(&node) {
            pool.retain(|&mid| used.contains(&arena[mid].token));
        }
    }

    hits > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;

    fn token(num: usize, text: &str, pos: &str, head: usize, func: &str) -> Token {
        Token {
            id: format!("{}.0", num),
            text: text.to_string(),
            lemma: "_".to_string(),
            pos: pos.to_string(),
            cpos: "_".to_string(),
            morph: "_".to_string(),
            head: format!("{}.0", head),
            func: func.to_string(),
            head2: "_".to_string(),
            func2: "_".to_string(),
            num: num.to_string(),
            position: Position::Mid,
            is_super_tok: false,
        }
    }

    fn sentence(tokens: Vec<Token>) -> Sentence {
        Sentence { tokens, annotations: Vec::new(), sent_num: 1 }
    }

    fn rule(text: &str) -> Transformation {
        Transformation::parse(text, "1").unwrap()
    }

    #[test]
    fn super_tokens_are_never_candidates() {
        let mut sup = token(0, "don't", "X", 0, "_");
        sup.id = "1-2".to_string();
        sup.is_super_tok = true;
        let sent = sentence(vec![sup, token(1, "do", "X", 0, "root"), token(2, "n't", "X", 1, "dep")]);
        let r = rule("text=/.*/\t#1\t#1:func=x");
        let (arena, node_matches) = collect_candidates(&r, &sent);
        assert_eq!(node_matches[&1].len(), 2);
        assert!(arena.iter().all(|m| m.token != 0));
    }

    #[test]
    fn dominance_compares_head_against_id() {
        let sent = sentence(vec![
            token(1, "a", "X", 0, "root"),
            token(2, "b", "X", 1, "dep"),
            token(3, "c", "X", 2, "dep"),
        ]);
        let r = rule("text=/a/;text=/b/\t#1>#2\t#1:func=x");
        let (arena, mut node_matches) = collect_candidates(&r, &sent);
        let mut seeds = Vec::new();
        assert!(matches_relation(&sent, &arena, &mut node_matches, &r.relations[0], 0, &mut seeds));
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].nodes, vec![(1, 0), (2, 1)]);
    }

    #[test]
    fn adjacency_distance_bounds_are_inclusive() {
        let sent = sentence(vec![
            token(1, "a", "X", 0, "root"),
            token(2, "b", "X", 1, "dep"),
            token(3, "c", "X", 1, "dep"),
            token(4, "d", "X", 1, "dep"),
        ]);
        let r = rule("text=/a/;text=/.*/\t#1.2,3#2\t#1:func=x");
        let (arena, mut node_matches) = collect_candidates(&r, &sent);
        let mut seeds = Vec::new();
        assert!(matches_relation(&sent, &arena, &mut node_matches, &r.relations[0], 0, &mut seeds));
        let partners: Vec<usize> = seeds.iter().map(|s| s.nodes[1].1).collect();
        assert_eq!(partners, vec![2, 3]);
    }

    #[test]
    fn ellipsis_ids_truncate_in_distance_tests() {
        let mut ellipsis = token(5, "gone", "V", 0, "orphan");
        ellipsis.id = "5.1".to_string();
        ellipsis.num = "5.1".to_string();
        let sent = sentence(vec![token(5, "walked", "V", 0, "root"), ellipsis, token(6, "home", "N", 5, "obl")]);
        let r = rule("text=/walked/;text=/gone/\t#1.0#2\t#1:func=x");
        let (arena, mut node_matches) = collect_candidates(&r, &sent);
        let mut seeds = Vec::new();
        // int(5.1) - int(5.0) == 0
        assert!(matches_relation(&sent, &arena, &mut node_matches, &r.relations[0], 0, &mut seeds));
    }

    #[test]
    fn field_equality_compares_values() {
        let sent = sentence(vec![
            token(1, "a", "P", 0, "root"),
            token(2, "b", "Q", 1, "dep"),
            token(3, "c", "P", 2, "dep"),
        ]);
        let r = rule("text=/a/;text=/c/\t#1:pos==#2\t#1:func=x");
        let (arena, mut node_matches) = collect_candidates(&r, &sent);
        let mut seeds = Vec::new();
        assert!(matches_relation(&sent, &arena, &mut node_matches, &r.relations[0], 0, &mut seeds));
        assert_eq!(seeds.len(), 1);
    }

    #[test]
    fn failed_candidates_are_pruned_for_later_relations() {
        let sent = sentence(vec![
            token(1, "a", "X", 0, "root"),
            token(2, "b", "X", 1, "dep"),
            token(3, "b", "X", 5, "dep"),
            token(4, "c", "X", 2, "dep"),
        ]);
        // Both "b" tokens are candidates for #2; only token 2 is governed by
        // "a", so token 3 must drop out before the second relation runs.
        let r = rule("text=/a/;text=/b/;text=/c/\t#1>#2;#2>#3\t#1:func=x");
        let (arena, mut node_matches) = collect_candidates(&r, &sent);
        let mut seeds = Vec::new();
        assert!(matches_relation(&sent, &arena, &mut node_matches, &r.relations[0], 0, &mut seeds));
        assert_eq!(node_matches[&2].len(), 1);
        assert_eq!(arena[node_matches[&2][0]].token, 1);
        assert!(matches_relation(&sent, &arena, &mut node_matches, &r.relations[1], 1, &mut seeds));
        assert_eq!(seeds.len(), 2);
    }

    #[test]
    fn relation_with_no_pairs_reports_failure() {
        let sent = sentence(vec![token(1, "a", "X", 0, "root"), token(2, "b", "X", 0, "root")]);
        let r = rule("text=/a/;text=/b/\t#1>#2\t#1:func=x");
        let (arena, mut node_matches) = collect_candidates(&r, &sent);
        let mut seeds = Vec::new();
        assert!(!matches_relation(&sent, &arena, &mut node_matches, &r.relations[0], 0, &mut seeds));
        assert!(seeds.is_empty());
    }

    #[test]
    fn relation_referencing_undeclared_node_yields_nothing() {
        let sent = sentence(vec![token(1, "a", "X", 0, "root")]);
        let r = rule("text=/a/\t#1>#5\t#1:func=x");
        let (arena, mut node_matches) = collect_candidates(&r, &sent);
        let mut seeds = Vec::new();
        assert!(!matches_relation(&sent, &arena, &mut node_matches, &r.relations[0], 0, &mut seeds));
    }
}
