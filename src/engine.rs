//! Matching and rewriting engine.
//!
//! This module is the *public entry point* for the rule engine. The engine is
//! split into focused submodules under `src/engine/` while keeping paths
//! stable (for example `crate::engine::Parser`).
//!
//! ## How the parts work together
//!
//! Applying a rule set to one sentence is a pipeline:
//!
//! ```text
//! rule file ──┐
//!             │  Transformation::parse        (compiled_rules.rs)
//!             └───────────────┬──────────────
//!                             │
//! sentence ───────────────────┼─ per-node candidate collection
//!                             │
//!                             v
//!                 relation evaluation (parser.rs)
//!                   - pairwise bindings per relation
//!                   - prune candidates that never bound
//!                             │
//!                             v
//!                 merge_sets (join.rs)
//!                   - grow bins from pairwise seeds
//!                   - collect / top-up / fuse solutions
//!                   - prune incomplete bins
//!                   - assemble capture groups
//!                             │
//!                             v
//!                 execute (actions.rs)
//!                   - field assignment with $n expansion
//!                   - head rewiring, sentence annotation
//!                   - `last` short-circuits the sentence
//! ```
//!
//! ## Responsibilities by module
//!
//! - `compiled_rules.rs`: compiles rule lines into `Transformation`s
//!   (definitions, relations, actions) and validates them, accumulating all
//!   defects for a single report.
//! - `parser.rs`: matches node definitions against a sentence's tokens and
//!   evaluates structural relations into pairwise bindings.
//! - `join.rs`: merges pairwise bindings into complete, consistent n-ary
//!   bindings covering every declared relation.
//! - `actions.rs`: applies the ordered action list to each complete binding.
//!
//! ## Debugging
//!
//! Set `DEPEDIT_DEBUG_RULES=1` to print rule activation and binding traces.

#[path = "engine/actions.rs"]
mod actions;
#[path = "engine/compiled_rules.rs"]
mod compiled_rules;
#[path = "engine/join.rs"]
mod join;
#[path = "engine/parser.rs"]
mod parser;

#[allow(unused_imports)]
pub(crate) use actions::Outcome;
#[allow(unused_imports)]
pub(crate) use compiled_rules::{RuleFlags, Transformation};
#[allow(unused_imports)]
pub(crate) use parser::Parser;
