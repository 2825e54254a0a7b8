//! Rule compilation and validation.
//!
//! This module holds the *static* side of the engine: everything derived from
//! a rule line before any input is seen. A rule line has three tab-separated
//! segments:
//!
//! ```text
//! NODES <tab> RELATIONS <tab> ACTIONS
//! ```
//!
//! - NODES: `;`-separated node clauses, each a `&`-conjunction of field tests
//!   `field[!]=/pattern/`. Splitting respects `/.../` regex boundaries.
//! - RELATIONS: `;`-separated clauses: `none`, `#n`, `#i>#j`, `#i.#j`,
//!   `#i.k#j`, `#i.k,m#j`, or `#i:field==#j`. Chains (`#1>#2>#3`) and the
//!   `.*` wildcard are rewritten before parsing.
//! - ACTIONS: `;`-separated clauses: `#i:field=value`, `#i>#j`,
//!   `#S:key=value`, or `last`.
//!
//! Patterns compile once here; the hot path never sees a field name string.
//! All defects in a rule are accumulated rather than reported one at a time.

use crate::{Field, RuleError, Token};
use regex::Regex;

bitflags::bitflags! {
    /// Cheap per-rule metadata so the engine can skip work: capture groups
    /// are only assembled for rules whose actions reference `$n`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RuleFlags: u8 {
        const CAPTURES        = 1 << 0;
        const SENT_ANNOTATION = 1 << 1;
        const LAST            = 1 << 2;
        const HEAD_REWIRE     = 1 << 3;
    }
}

/// One compiled rule: node matchers, structural relations, and actions, plus
/// the source line label used in diagnostics.
#[derive(Debug)]
pub(crate) struct Transformation {
    pub line: String,
    pub defs: Vec<DefinitionMatcher>,
    pub relations: Vec<Relation>,
    pub actions: Vec<Action>,
    pub flags: RuleFlags,
}

/// A structural predicate between declared nodes. Node indices are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Relation {
    /// Unary: every candidate of the node is a binding on its own.
    Unary { node: usize },
    /// `#i>#j`: token bound to `child` has the token bound to `parent` as its
    /// head.
    Dominates { parent: usize, child: usize },
    /// `#i.k,m#j`: the id distance from `left` to `right` is within
    /// `min..=max`. Plain `.` is distance exactly 1.
    Adjacent { left: usize, right: usize, min: i64, max: i64 },
    /// `#i:field==#j`: both tokens carry the same value in `field`.
    FieldEq { left: usize, right: usize, field: Field },
}

/// An effect to apply once a complete binding exists.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action {
    /// Stop all further rule processing for the current sentence.
    Last,
    /// `#S:key=value`: annotate the sentence.
    Annotate { key: String, value: String },
    /// `#i:field=value`: assign to a bound token's field. The value may
    /// reference capture groups (`$1`, `$2L`, `$3U`).
    Assign { node: usize, field: Field, value: String },
    /// `#i>#j`: make the token bound to `parent` the head of the token bound
    /// to `child`.
    Rewire { parent: usize, child: usize },
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Last => write!(f, "last"),
            Action::Annotate { key, value } => write!(f, "#S:{}={}", key, value),
            Action::Assign { node, field, value } => {
                write!(f, "#{}:{}={}", node, field.canonical_name(), value)
            }
            Action::Rewire { parent, child } => write!(f, "#{}>#{}", parent, child),
        }
    }
}

/// All field tests of one node clause, in declaration order.
#[derive(Debug)]
pub(crate) struct DefinitionMatcher {
    pub def_index: usize,
    pub defs: Vec<Definition>,
}

/// A single compiled field test.
#[derive(Debug)]
pub(crate) struct Definition {
    pub field: Field,
    pub test: MatchTest,
}

/// How a pattern is evaluated against a field value. Anchored patterns with
/// no regex metacharacters are stored as plain strings for fast equality.
#[derive(Debug)]
pub(crate) enum MatchTest {
    Always,
    Exact(String),
    ExactNot(String),
    Matches(Regex),
    MatchesNot(Regex),
}

impl DefinitionMatcher {
    /// Test a token against this node clause. On success, returns the capture
    /// tuples produced by positive regex tests, one tuple per such test, in
    /// declaration order. Non-participating groups yield empty strings.
    pub fn match_token(&self, token: &Token) -> Option<Vec<Vec<String>>> {
        let mut groups = Vec::new();
        for def in &self.defs {
            let value = token.get(def.field);
            match &def.test {
                MatchTest::Always => {}
                MatchTest::Exact(s) => {
                    if value != s {
                        return None;
                    }
                }
                MatchTest::ExactNot(s) => {
                    if value == s {
                        return None;
                    }
                }
                MatchTest::Matches(re) => match re.captures(value) {
                    None => return None,
                    Some(caps) => {
                        if caps.len() > 1 {
                            let tuple: Vec<String> = (1..caps.len())
                                .map(|i| caps.get(i).map(|g| g.as_str().to_string()).unwrap_or_default())
                                .collect();
                            groups.push(tuple);
                        }
                    }
                },
                MatchTest::MatchesNot(re) => {
                    if re.is_match(value) {
                        return None;
                    }
                }
            }
        }
        Some(groups)
    }
}

/// Split on `sep`, treating `/.../` spans as opaque. Every slash toggles the
/// inside state; separators inside a span stay in the current part.
fn split_outside_regex(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut inside = false;
    for ch in s.chars() {
        if ch == '/' {
            inside = !inside;
        }
        if ch == sep && !inside {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    parts.push(current);
    parts
}

/// Rewrite shorthand before clause parsing: the `.*` adjacency wildcard
/// becomes `.1,1000`, and chains like `#1>#2>#3` are split into explicit
/// pairs (`#1>#2;#2>#3`) until a fixed point is reached.
fn normalize_shorthand(segment: &str) -> String {
    let mut out = segment.replace(".*", ".1,1000");
    let chain = regex!(r"(#[0-9]+)(>|\.(?:[0-9]+(?:,[0-9]+)?)?)(#[0-9]+)(>|\.(?:[0-9]+(?:,[0-9]+)?)?)");
    loop {
        let next = chain.replace_all(&out, "${1}${2}${3};${3}${4}").into_owned();
        if next == out {
            return out;
        }
        out = next;
    }
}

fn parse_node_clause(clause: &str, def_index: usize) -> Result<DefinitionMatcher, String> {
    let mut defs = Vec::new();
    for item in split_outside_regex(clause, '&') {
        let Some((criterion_raw, rest)) = item.split_once('=') else {
            return Err(item);
        };
        let (criterion, negative) = match criterion_raw.strip_suffix('!') {
            Some(c) => (c, true),
            None => (criterion_raw, false),
        };
        let Some(field) = Field::from_name(criterion) else {
            return Err(item);
        };
        let Some(pattern) = rest.strip_prefix('/').and_then(|r| r.strip_suffix('/')) else {
            return Err(item);
        };
        if field == Field::Position && !matches!(pattern, "first" | "last" | "mid") {
            return Err(item);
        }
        let Ok(test) = compile_test(pattern, negative) else {
            return Err(item);
        };
        defs.push(Definition { field, test });
    }
    Ok(DefinitionMatcher { def_index, defs })
}

/// Anchor a pattern and pick its evaluation strategy.
fn compile_test(pattern: &str, negative: bool) -> Result<MatchTest, regex::Error> {
    let mut anchored = pattern.to_string();
    if !anchored.starts_with('^') {
        anchored.insert(0, '^');
    }
    if !anchored.ends_with('$') {
        anchored.push('$');
    }
    if anchored == "^.*$" && !negative {
        return Ok(MatchTest::Always);
    }
    let inner = &anchored[1..anchored.len() - 1];
    if regex::escape(inner) == inner {
        // No regex operators in the pattern: plain string comparison.
        return Ok(if negative {
            MatchTest::ExactNot(inner.to_string())
        } else {
            MatchTest::Exact(inner.to_string())
        });
    }
    let re = Regex::new(&anchored)?;
    Ok(if negative { MatchTest::MatchesNot(re) } else { MatchTest::Matches(re) })
}

fn parse_relation(clause: &str) -> Option<Relation> {
    if let Some(caps) = regex!(r"^#([0-9]+)$").captures(clause) {
        return Some(Relation::Unary { node: caps[1].parse().ok()? });
    }
    if let Some(caps) = regex!(r"^#([0-9]+):([A-Za-z0-9_]+)==#([0-9]+)$").captures(clause) {
        let field = Field::from_name(&caps[2])?;
        if field == Field::Position {
            return None;
        }
        return Some(Relation::FieldEq {
            left: caps[1].parse().ok()?,
            right: caps[3].parse().ok()?,
            field,
        });
    }
    let caps = regex!(r"^#([0-9]+)(>|\.(?:[0-9]+(?:,[0-9]+)?)?)#([0-9]+)$").captures(clause)?;
    let left: usize = caps[1].parse().ok()?;
    let right: usize = caps[3].parse().ok()?;
    let op = &caps[2];
    if op == ">" {
        return Some(Relation::Dominates { parent: left, child: right });
    }
    if op == "." {
        return Some(Relation::Adjacent { left, right, min: 1, max: 1 });
    }
    let spec = &op[1..];
    let (min, max) = match spec.split_once(',') {
        Some((lo, hi)) => (lo.parse().ok()?, hi.parse().ok()?),
        None => {
            let k: i64 = spec.parse().ok()?;
            (k, k)
        }
    };
    Some(Relation::Adjacent { left, right, min, max })
}

fn parse_action(clause: &str) -> Option<Action> {
    if clause == "last" {
        return Some(Action::Last);
    }
    if let Some(caps) = regex!(r"^#S:([A-Za-z_]+)=([A-Za-z_]+)$").captures(clause) {
        return Some(Action::Annotate { key: caps[1].to_string(), value: caps[2].to_string() });
    }
    if let Some(caps) = regex!(r"^#([0-9]+)>#([0-9]+)$").captures(clause) {
        return Some(Action::Rewire { parent: caps[1].parse().ok()?, child: caps[2].parse().ok()? });
    }
    let caps = regex!(r"^#([0-9]+):([A-Za-z0-9_]+)=([^;]*)$").captures(clause)?;
    let field = Field::from_name(&caps[2])?;
    if field == Field::Position {
        return None;
    }
    Some(Action::Assign {
        node: caps[1].parse().ok()?,
        field,
        value: caps[3].trim().to_string(),
    })
}

impl Transformation {
    /// Compile one rule line. `line` is the source line label used in
    /// diagnostics (`"7"`, or `"u3"` for rules added through the API).
    pub fn parse(text: &str, line: &str) -> Result<Transformation, Vec<RuleError>> {
        let segments: Vec<&str> = text.split('\t').collect();
        if segments.len() != 3 {
            return Err(vec![RuleError::MalformedRule { line: line.to_string() }]);
        }
        let node_segment = segments[0];
        let relation_segment = normalize_shorthand(segments[1]);
        let action_segment = normalize_shorthand(segments[2]);

        let mut errors = Vec::new();

        let mut defs = Vec::new();
        for (i, clause) in split_outside_regex(node_segment, ';').into_iter().enumerate() {
            match parse_node_clause(&clause, i + 1) {
                Ok(def) => defs.push(def),
                Err(criterion) => {
                    errors.push(RuleError::InvalidNode { line: line.to_string(), clause: criterion })
                }
            }
        }

        let rel_clauses: Vec<String> =
            relation_segment.split(';').map(|s| s.trim().to_string()).collect();
        let mut relations = Vec::new();
        for clause in &rel_clauses {
            if clause == "none" {
                if rel_clauses.len() > 1 {
                    errors.push(RuleError::InvalidRelation {
                        line: line.to_string(),
                        message: "setting 'none' invalid when multiple relations are defined".to_string(),
                    });
                } else {
                    if defs.len() > 1 {
                        errors.push(RuleError::InvalidRelation {
                            line: line.to_string(),
                            message: "setting 'none' invalid with more than one definition in column 1"
                                .to_string(),
                        });
                    }
                    relations.push(Relation::Unary { node: 1 });
                }
            } else {
                match parse_relation(clause) {
                    Some(rel) => relations.push(rel),
                    None => errors.push(RuleError::InvalidRelation {
                        line: line.to_string(),
                        message: format!("relation setting invalid criterion: {}.", clause),
                    }),
                }
            }
        }

        let mut actions = Vec::new();
        for clause in action_segment.trim().split(';') {
            match parse_action(clause) {
                Some(action) => actions.push(action),
                None => errors.push(RuleError::InvalidAction {
                    line: line.to_string(),
                    clause: clause.to_string(),
                }),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let mut flags = RuleFlags::empty();
        for action in &actions {
            match action {
                Action::Last => flags |= RuleFlags::LAST,
                Action::Annotate { .. } => flags |= RuleFlags::SENT_ANNOTATION,
                Action::Rewire { .. } => flags |= RuleFlags::HEAD_REWIRE,
                Action::Assign { value, .. } => {
                    if regex!(r"\$[0-9]+[LU]?").is_match(value) {
                        flags |= RuleFlags::CAPTURES;
                    }
                }
            }
        }

        Ok(Transformation { line: line.to_string(), defs, relations, actions, flags })
    }
}
