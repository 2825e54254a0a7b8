//! CoNLL row boundary: token-row parsing and tree serialization.
//!
//! Rows are 10-column CoNLL-U (`id form lemma upos xpos feats head deprel
//! deps misc`) or 8-column Malt fallback. Token and head ids are stored as
//! document-global float strings (the running offset of all preceding
//! sentences is added on read and subtracted again on write), so that rules
//! and relations can compare ids numerically across the whole run.

use crate::{Position, Token};

/// Render a numeric id the way it is stored on tokens: integral values keep
/// one decimal (`"4.0"`), fractional values use the shortest form (`"13.1"`).
pub(crate) fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 { format!("{:.1}", v) } else { format!("{}", v) }
}

/// Numeric coercion used by relation tests: parse as float, truncate toward
/// zero. Unparseable values coerce to 0.
pub(crate) fn int_value(s: &str) -> i64 {
    s.trim().parse::<f64>().map(|v| v as i64).unwrap_or(0)
}

pub(crate) struct ParsedRow {
    pub token: Token,
    pub eight_col: bool,
    pub missing_head: bool,
}

/// Parse one tab-split token row. `tokoffset` is the count of non-super
/// tokens in all preceding sentences.
///
/// Returns `None` for rows that cannot form a token (fewer than eight
/// columns, or an unparseable id on a non-super row).
pub(crate) fn parse_token_row(cols: &[&str], tokoffset: usize) -> Option<ParsedRow> {
    if cols.len() < 8 {
        return None;
    }
    let super_tok = cols[0].contains('-');
    let mut missing_head = false;

    let (id, head) = if super_tok {
        (cols[0].to_string(), cols[6].to_string())
    } else {
        let raw_id: f64 = cols[0].parse().ok()?;
        let id = fmt_num(raw_id + tokoffset as f64);
        let head = match cols[6].parse::<f64>() {
            Ok(h) if cols[6] != "_" => fmt_num(h + tokoffset as f64),
            _ => {
                missing_head = true;
                tokoffset.to_string()
            }
        };
        (id, head)
    };

    let eight_col = cols.len() < 10;
    let (head2, func2) = if eight_col {
        (cols[6].to_string(), cols[7].to_string())
    } else {
        (cols[8].to_string(), cols[9].to_string())
    };

    let position = if cols[0] == "1" && !super_tok { Position::First } else { Position::Mid };

    let token = Token {
        id,
        text: cols[1].to_string(),
        lemma: cols[2].to_string(),
        pos: cols[3].to_string(),
        cpos: cols[4].to_string(),
        morph: cols[5].to_string(),
        head,
        func: cols[7].to_string(),
        head2,
        func2,
        num: cols[0].to_string(),
        position,
        is_super_tok: super_tok,
    };

    Some(ParsedRow { token, eight_col, missing_head })
}

/// Subtract the sentence offset from a stored id string. Values that are not
/// numeric (a head overwritten by an action, for example) pass through raw.
fn sub_offset(s: &str, tokoffset: usize) -> String {
    match s.parse::<f64>() {
        Ok(v) => fmt_num(v - tokoffset as f64),
        Err(_) => s.to_string(),
    }
}

/// Serialize a sentence's tokens back to CoNLL rows, renumbering ids so the
/// sentence restarts at 1. Super-tokens pass their id and head through
/// verbatim; ellipsis tokens (id containing `.`) always serialize with head
/// `_`.
pub(crate) fn serialize_tree(tokens: &[Token], tokoffset: usize, eight_col: bool) -> Vec<String> {
    let mut lines = Vec::with_capacity(tokens.len());
    for tok in tokens {
        let (raw_id, raw_head) = if tok.is_super_tok {
            (tok.id.clone(), tok.head.clone())
        } else if tok.head == "0" {
            (sub_offset(&tok.id, tokoffset), "0".to_string())
        } else {
            (sub_offset(&tok.id, tokoffset), sub_offset(&tok.head, tokoffset))
        };
        let id = raw_id.replace(".0", "");
        let mut head = raw_head.replace(".0", "");
        if id.contains('.') {
            head = "_".to_string();
        }
        let mut fields =
            vec![id, tok.text.clone(), tok.lemma.clone(), tok.pos.clone(), tok.cpos.clone(), tok.morph.clone(), head, tok.func.clone()];
        if !eight_col {
            fields.push(tok.head2.clone());
            fields.push(tok.func2.clone());
        }
        lines.push(fields.join("\t"));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(line: &str, tokoffset: usize) -> ParsedRow {
        let cols: Vec<&str> = line.split('\t').collect();
        parse_token_row(&cols, tokoffset).unwrap()
    }

    #[test]
    fn fmt_num_keeps_one_decimal_for_integral_values() {
        assert_eq!(fmt_num(4.0), "4.0");
        assert_eq!(fmt_num(0.0), "0.0");
        assert_eq!(fmt_num(13.1), "13.1");
    }

    #[test]
    fn int_value_truncates() {
        assert_eq!(int_value("4.0"), 4);
        assert_eq!(int_value("10.1"), 10);
        assert_eq!(int_value("0"), 0);
        assert_eq!(int_value("junk"), 0);
    }

    #[test]
    fn parses_ten_column_row() {
        let parsed = row("1\tthe\tthe\tDET\tDT\t_\t2\tdet\t_\t_", 0);
        assert_eq!(parsed.token.id, "1.0");
        assert_eq!(parsed.token.head, "2.0");
        assert_eq!(parsed.token.text, "the");
        assert_eq!(parsed.token.func, "det");
        assert_eq!(parsed.token.head2, "_");
        assert_eq!(parsed.token.num, "1");
        assert_eq!(parsed.token.position, Position::First);
        assert!(!parsed.eight_col);
        assert!(!parsed.missing_head);
    }

    #[test]
    fn eight_column_fallback_copies_head_and_deprel() {
        let parsed = row("2\tdog\tdog\tNOUN\tNN\t_\t0\troot", 0);
        assert!(parsed.eight_col);
        assert_eq!(parsed.token.head2, "0");
        assert_eq!(parsed.token.func2, "root");
        assert_eq!(parsed.token.position, Position::Mid);
    }

    #[test]
    fn offset_is_applied_to_id_and_head() {
        let parsed = row("2\tb\t_\tX\t_\t_\t1\tdep\t_\t_", 3);
        assert_eq!(parsed.token.id, "5.0");
        assert_eq!(parsed.token.head, "4.0");
        assert_eq!(parsed.token.num, "2");
    }

    #[test]
    fn missing_head_defaults_to_offset() {
        let parsed = row("3\tx\t_\tX\t_\t_\t_\tdep\t_\t_", 3);
        assert!(parsed.missing_head);
        assert_eq!(parsed.token.head, "3");
    }

    #[test]
    fn super_token_keeps_raw_id_and_head() {
        let parsed = row("1-2\tdon't\t_\t_\t_\t_\t_\t_\t_\t_", 5);
        assert!(parsed.token.is_super_tok);
        assert_eq!(parsed.token.id, "1-2");
        assert_eq!(parsed.token.head, "_");
        assert!(!parsed.missing_head);
    }

    #[test]
    fn short_rows_are_rejected() {
        let cols: Vec<&str> = "1\tonly\tthree".split('\t').collect();
        assert!(parse_token_row(&cols, 0).is_none());
    }

    #[test]
    fn serialization_renumbers_within_sentence() {
        let tokens = vec![
            row("1\ta\t_\tX\t_\t_\t0\troot\t_\t_", 3).token,
            row("2\tb\t_\tX\t_\t_\t1\tdep\t_\t_", 3).token,
        ];
        let lines = serialize_tree(&tokens, 3, false);
        assert_eq!(lines[0], "1\ta\t_\tX\t_\t_\t0\troot\t_\t_");
        assert_eq!(lines[1], "2\tb\t_\tX\t_\t_\t1\tdep\t_\t_");
    }

    #[test]
    fn ellipsis_token_serializes_with_placeholder_head() {
        let tokens = vec![row("5.1\tgone\t_\tVERB\t_\t_\t_\torphan\t_\t_", 0).token];
        let lines = serialize_tree(&tokens, 0, false);
        let cols: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(cols[0], "5.1");
        assert_eq!(cols[6], "_");
    }

    #[test]
    fn super_token_round_trips_verbatim() {
        let tokens = vec![row("1-2\tdon't\t_\t_\t_\t_\t_\t_\t_\t_", 7).token];
        let lines = serialize_tree(&tokens, 7, false);
        let cols: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(cols[0], "1-2");
        assert_eq!(cols[6], "_");
    }

    #[test]
    fn eight_col_output_has_eight_fields() {
        let tokens = vec![row("1\ta\t_\tX\t_\t_\t0\troot", 0).token];
        let lines = serialize_tree(&tokens, 0, true);
        assert_eq!(lines[0].split('\t').count(), 8);
    }
}
