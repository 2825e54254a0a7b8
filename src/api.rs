use crate::engine::{Parser, Transformation};
use crate::{ConfigError, Error, Position, RunError, Sentence, conll};
use std::path::Path;

/// Driver-level output decorations.
///
/// `docname` prepends a single `# newdoc id = <doc>` line; `sent_id` emits a
/// running `# sent_id = <doc>-<n>` comment after each sentence.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub sent_id: bool,
    pub docname: bool,
}

/// The rewriting engine: a compiled rule set applied sentence by sentence.
///
/// Rules are loaded once (from a config string, a file, or the
/// `add_transformation*` methods) and only read afterwards, so one `DepEdit`
/// can process any number of inputs.
///
/// # Example
/// ```
/// use depedit::DepEdit;
///
/// let engine = DepEdit::from_config("func=/dobj/\t#1\t#1:func=obj").unwrap();
/// let out = engine
///     .run("1\tit\tit\tPRON\t_\t_\t0\tdobj\t_\t_", "file", &Default::default())
///     .unwrap();
/// assert!(out.ends_with("\tobj\t_\t_"));
/// ```
#[derive(Debug, Default)]
pub struct DepEdit {
    transformations: Vec<Transformation>,
    user_transformation_counter: usize,
    quiet: bool,
}

impl DepEdit {
    /// Create an engine with no rules. Input passes through unchanged (modulo
    /// id renumbering) until rules are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a rule file from a string.
    pub fn from_config(text: &str) -> Result<Self, ConfigError> {
        let mut engine = Self::new();
        engine.read_config(text, false)?;
        Ok(engine)
    }

    /// Compile a rule file from disk.
    pub fn from_config_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_config(&text)?)
    }

    /// Suppress warnings (missing heads, skipped rows) on the diagnostic
    /// channel.
    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    /// Read rule lines, appending to the current rule set (or replacing it
    /// when `clear` is set). Blank lines and lines starting with `;` or `#`
    /// are ignored. All defects across the whole text are collected into one
    /// error; on error no rules from this call are installed.
    pub fn read_config(&mut self, text: &str, clear: bool) -> Result<(), ConfigError> {
        if clear {
            self.transformations.clear();
            self.user_transformation_counter = 0;
        }
        let mut errors = Vec::new();
        let mut parsed = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            match Transformation::parse(line, &(index + 1).to_string()) {
                Ok(rule) => parsed.push(rule),
                Err(errs) => errors.extend(errs),
            }
        }
        if !errors.is_empty() {
            return Err(ConfigError { errors });
        }
        self.transformations.extend(parsed);
        Ok(())
    }

    /// Append a single rule line. Rules added this way get synthetic line
    /// labels `u1`, `u2`, ... in diagnostics.
    pub fn add_transformation(&mut self, line: &str) -> Result<(), ConfigError> {
        self.user_transformation_counter += 1;
        let label = format!("u{}", self.user_transformation_counter);
        match Transformation::parse(line, &label) {
            Ok(rule) => {
                self.transformations.push(rule);
                Ok(())
            }
            Err(errors) => Err(ConfigError { errors }),
        }
    }

    /// Append a single rule from its three clause lists, joined with `;`.
    pub fn add_transformation_parts(
        &mut self,
        nodes: &[&str],
        rels: &[&str],
        actions: &[&str],
    ) -> Result<(), ConfigError> {
        let line = format!("{}\t{}\t{}", nodes.join(";"), rels.join(";"), actions.join(";"));
        self.add_transformation(&line)
    }

    /// Process a whole input stream and return the transformed CoNLL text.
    ///
    /// Sentences are blank-line separated; any line without a tab terminates
    /// the current sentence. Comment lines pass through at the position
    /// encountered. `filename` is used in diagnostics and in the `docname` /
    /// `sent_id` decorations.
    pub fn run(&self, input: &str, filename: &str, opts: &RunOptions) -> Result<String, RunError> {
        let parser = Parser::new(&self.transformations);
        let mut out: Vec<String> = Vec::new();
        let mut sentence = Sentence::new(1);
        let mut tokoffset = 0usize;
        let mut sentlength = 0usize;
        let mut eight_col = false;

        for raw in input.lines() {
            let line = raw.trim();
            if sentlength > 0 && !line.contains('\t') {
                flush_sentence(
                    &parser,
                    &mut sentence,
                    &mut out,
                    &mut tokoffset,
                    &mut sentlength,
                    eight_col,
                    opts,
                    filename,
                )?;
            }
            if line.starts_with('#') {
                out.push(line.to_string());
            } else if line.is_empty() {
                out.push(String::new());
            } else if line.contains('\t') {
                let cols: Vec<&str> = line.split('\t').collect();
                match conll::parse_token_row(&cols, tokoffset) {
                    Some(row) => {
                        if row.missing_head && !self.quiet {
                            eprintln!(
                                "DepEdit WARN: head not set for token {} in {}",
                                row.token.id, filename
                            );
                        }
                        if row.eight_col {
                            eight_col = true;
                        }
                        if !row.token.is_super_tok {
                            sentlength += 1;
                        }
                        sentence.tokens.push(row.token);
                    }
                    None => {
                        if !self.quiet {
                            eprintln!(
                                "DepEdit WARN: skipping malformed token line in {}: {}",
                                filename, line
                            );
                        }
                    }
                }
            }
        }
        if sentlength > 0 {
            flush_sentence(
                &parser,
                &mut sentence,
                &mut out,
                &mut tokoffset,
                &mut sentlength,
                eight_col,
                opts,
                filename,
            )?;
        }

        if opts.docname {
            out.insert(0, format!("# newdoc id = {}", filename));
        }
        Ok(out.join("\n"))
    }
}

/// Finish the current sentence: fix the `last` position, apply every rule,
/// then emit annotations and the renumbered tree.
#[allow(clippy::too_many_arguments)]
fn flush_sentence(
    parser: &Parser<'_>,
    sentence: &mut Sentence,
    out: &mut Vec<String>,
    tokoffset: &mut usize,
    sentlength: &mut usize,
    eight_col: bool,
    opts: &RunOptions,
    docname: &str,
) -> Result<(), RunError> {
    if let Some(last) = sentence.tokens.iter_mut().rev().find(|tok| !tok.is_super_tok) {
        last.position = Position::Last;
    }
    parser.process_sentence(sentence)?;
    out.extend(sentence.print_annos());
    out.extend(conll::serialize_tree(&sentence.tokens, *tokoffset, eight_col));
    if opts.sent_id {
        out.push(format!("# sent_id = {}-{}", docname, sentence.sent_num));
    }
    *tokoffset += *sentlength;
    let next = sentence.sent_num + 1;
    *sentence = Sentence::new(next);
    *sentlength = 0;
    Ok(())
}

/// Compile `config` and run it over `input` in one call.
pub fn process(config: &str, input: &str) -> Result<String, Error> {
    let engine = DepEdit::from_config(config)?;
    Ok(engine.run(input, "file", &RunOptions::default())?)
}
