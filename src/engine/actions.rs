//! Action execution.
//!
//! Once the joiner has produced complete bindings, this module applies the
//! rule's ordered action list to each of them:
//!
//! ```text
//! binding ──┬─ #i:field=value  -> assign (with $n / $nL / $nU expansion)
//!           ├─ #i>#j           -> rewire head (self-loops are skipped)
//!           ├─ #S:key=value    -> annotate the owning sentence
//!           └─ last            -> Outcome::Last, sentence processing stops
//! ```
//!
//! `last` is an explicit return value, not a flag: the per-sentence driver
//! inspects the outcome and skips every remaining rule for the sentence.
//! Actions never feed back into matching of the current rule; bindings are
//! fixed before the first action runs.

use super::compiled_rules::Action;
use super::join::Bin;
use crate::{RunError, Sentence};

/// What the executor decided about the rest of the sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Continue,
    Last,
}

/// Apply `actions` to every binding, in binding order, actions in declaration
/// order within each binding.
pub(crate) fn execute(
    actions: &[Action],
    bindings: &[Bin],
    sentence: &mut Sentence,
) -> Result<Outcome, RunError> {
    for binding in bindings {
        for action in actions {
            match action {
                Action::Last => return Ok(Outcome::Last),
                Action::Annotate { key, value } => sentence.annotate(key, value),
                Action::Assign { node, field, value } => {
                    let expanded = expand_backrefs(value, &binding.groups, action)?;
                    if let Some(&token) = binding.nodes.get(node) {
                        sentence.tokens[token].set(*field, expanded);
                    }
                }
                Action::Rewire { parent, child } => {
                    if let (Some(&p), Some(&c)) = (binding.nodes.get(parent), binding.nodes.get(child))
                    {
                        if p != c {
                            let head = sentence.tokens[p].id.clone();
                            sentence.tokens[c].head = head;
                        }
                    }
                }
            }
        }
    }
    Ok(Outcome::Continue)
}

/// Replace `$n`, `$nL`, `$nU` in an assignment value with the binding's
/// capture groups (1-based), lower- or upper-cased per the suffix. A
/// reference outside the group list is fatal.
fn expand_backrefs(value: &str, groups: &[String], action: &Action) -> Result<String, RunError> {
    let re = regex!(r"\$([0-9]+)([LU]?)");
    let mut out = String::new();
    let mut last = 0;
    for caps in re.captures_iter(value) {
        let whole = caps.get(0).unwrap();
        let number: usize = caps[1].parse().unwrap_or(0);
        if number == 0 || number > groups.len() {
            return Err(RunError::MissingCaptureGroup { action: action.to_string(), group: number });
        }
        let group = match &caps[2] {
            "L" => groups[number - 1].to_lowercase(),
            "U" => groups[number - 1].to_uppercase(),
            _ => groups[number - 1].clone(),
        };
        out.push_str(&value[last..whole.start()]);
        out.push_str(&group);
        last = whole.end();
    }
    out.push_str(&value[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Field, Position, Token};
    use std::collections::BTreeMap;

    fn token(num: usize, text: &str) -> Token {
        Token {
            id: format!("{}.0", num),
            text: text.to_string(),
            lemma: "_".to_string(),
            pos: "X".to_string(),
            cpos: "_".to_string(),
            morph: "_".to_string(),
            head: "0.0".to_string(),
            func: "dep".to_string(),
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

    fn binding(nodes: &[(usize, usize)], groups: &[&str]) -> Bin {
        Bin {
            nodes: BTreeMap::from_iter(nodes.iter().copied()),
            rels: vec![0],
            matchers: Vec::new(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn assignment_writes_the_named_field() {
        let mut sent = sentence(vec![token(1, "a"), token(2, "b")]);
        let actions = vec![Action::Assign { node: 2, field: Field::Func, value: "NEW".to_string() }];
        let outcome = execute(&actions, &[binding(&[(1, 0), (2, 1)], &[])], &mut sent).unwrap();
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(sent.tokens[1].func, "NEW");
        assert_eq!(sent.tokens[0].func, "dep");
    }

    #[test]
    fn backrefs_expand_with_case_folding() {
        let mut sent = sentence(vec![token(1, "a")]);
        let actions = vec![Action::Assign {
            node: 1,
            field: Field::Lemma,
            value: "$1L-$2U-$1".to_string(),
        }];
        execute(&actions, &[binding(&[(1, 0)], &["Walk", "ed"])], &mut sent).unwrap();
        assert_eq!(sent.tokens[0].lemma, "walk-ED-Walk");
    }

    #[test]
    fn missing_group_reference_is_fatal() {
        let mut sent = sentence(vec![token(1, "a")]);
        let actions =
            vec![Action::Assign { node: 1, field: Field::Lemma, value: "$2".to_string() }];
        let err = execute(&actions, &[binding(&[(1, 0)], &["only"])], &mut sent).unwrap_err();
        assert_eq!(
            err,
            RunError::MissingCaptureGroup { action: "#1:lemma=$2".to_string(), group: 2 }
        );
    }

    #[test]
    fn rewire_sets_child_head_to_parent_id() {
        let mut sent = sentence(vec![token(1, "a"), token(2, "b")]);
        let actions = vec![Action::Rewire { parent: 1, child: 2 }];
        execute(&actions, &[binding(&[(1, 0), (2, 1)], &[])], &mut sent).unwrap();
        assert_eq!(sent.tokens[1].head, "1.0");
    }

    #[test]
    fn rewire_to_self_is_skipped() {
        let mut sent = sentence(vec![token(1, "a")]);
        let actions = vec![Action::Rewire { parent: 1, child: 2 }];
        execute(&actions, &[binding(&[(1, 0), (2, 0)], &[])], &mut sent).unwrap();
        assert_eq!(sent.tokens[0].head, "0.0");
    }

    #[test]
    fn last_stops_before_later_actions() {
        let mut sent = sentence(vec![token(1, "a")]);
        let actions = vec![
            Action::Annotate { key: "seen".to_string(), value: "yes".to_string() },
            Action::Last,
            Action::Assign { node: 1, field: Field::Func, value: "NOPE".to_string() },
        ];
        let outcome = execute(&actions, &[binding(&[(1, 0)], &[])], &mut sent).unwrap();
        assert_eq!(outcome, Outcome::Last);
        assert_eq!(sent.annotations, vec![("seen".to_string(), "yes".to_string())]);
        assert_eq!(sent.tokens[0].func, "dep");
    }

    #[test]
    fn annotation_updates_in_place() {
        let mut sent = sentence(vec![token(1, "a")]);
        sent.annotate("first", "one");
        sent.annotate("second", "two");
        sent.annotate("first", "changed");
        assert_eq!(
            sent.print_annos(),
            vec!["# first=changed".to_string(), "# second=two".to_string()]
        );
    }

    #[test]
    fn actions_apply_per_binding_in_order() {
        let mut sent = sentence(vec![token(1, "a"), token(2, "b")]);
        let actions =
            vec![Action::Assign { node: 1, field: Field::Lemma, value: "$1".to_string() }];
        let bindings =
            vec![binding(&[(1, 0)], &["one"]), binding(&[(1, 1)], &["two"])];
        execute(&actions, &bindings, &mut sent).unwrap();
        assert_eq!(sent.tokens[0].lemma, "one");
        assert_eq!(sent.tokens[1].lemma, "two");
    }
}
