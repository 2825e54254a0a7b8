use std::fmt;

#[macro_use]
mod macros;
mod api;
mod conll;
mod engine;

pub use api::{DepEdit, RunOptions, process};

// --- Core data model --------------------------------------------------------

/// Canonical token fields addressable from rule definitions and actions.
///
/// Input aliases (`form`, `upostag`, `xpostag`, `feats`, `deprel`, `deps`,
/// `misc`) resolve to these via [`Field::from_name`]. `Position` is a
/// pseudo-field: matchable, never assignable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Field {
    Text,
    Pos,
    Cpos,
    Lemma,
    Morph,
    Head,
    Func,
    Head2,
    Func2,
    Num,
    Position,
}

impl Field {
    /// Resolve a field name from a rule file, accepting CoNLL-U aliases.
    pub fn from_name(name: &str) -> Option<Field> {
        Some(match name {
            "text" | "form" => Field::Text,
            "pos" | "upostag" => Field::Pos,
            "cpos" | "xpostag" => Field::Cpos,
            "lemma" => Field::Lemma,
            "morph" | "feats" => Field::Morph,
            "head" => Field::Head,
            "func" | "deprel" => Field::Func,
            "head2" | "deps" => Field::Head2,
            "func2" | "misc" => Field::Func2,
            "num" => Field::Num,
            "position" => Field::Position,
            _ => return None,
        })
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            Field::Text => "text",
            Field::Pos => "pos",
            Field::Cpos => "cpos",
            Field::Lemma => "lemma",
            Field::Morph => "morph",
            Field::Head => "head",
            Field::Func => "func",
            Field::Head2 => "head2",
            Field::Func2 => "func2",
            Field::Num => "num",
            Field::Position => "position",
        }
    }
}

/// Linear position of a token within its sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Position {
    First,
    Mid,
    Last,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::First => "first",
            Position::Mid => "mid",
            Position::Last => "last",
        }
    }

    pub fn parse(value: &str) -> Position {
        match value {
            "first" => Position::First,
            "last" => Position::Last,
            _ => Position::Mid,
        }
    }
}

/// One parsed CoNLL token.
///
/// `id` and `head` hold float renderings of the running, document-global ids
/// (`"4.0"`, `"13.1"`); `num` keeps the raw id string from the input row.
/// Super-tokens (`id` like `1-2`) keep their raw `id`/`head` strings and are
/// never offered to the matcher.
#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub id: String,
    pub text: String,
    pub lemma: String,
    pub pos: String,
    pub cpos: String,
    pub morph: String,
    pub head: String,
    pub func: String,
    pub head2: String,
    pub func2: String,
    pub num: String,
    pub position: Position,
    pub is_super_tok: bool,
}

impl Token {
    /// Fetch the string value of a canonical field.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Text => &self.text,
            Field::Pos => &self.pos,
            Field::Cpos => &self.cpos,
            Field::Lemma => &self.lemma,
            Field::Morph => &self.morph,
            Field::Head => &self.head,
            Field::Func => &self.func,
            Field::Head2 => &self.head2,
            Field::Func2 => &self.func2,
            Field::Num => &self.num,
            Field::Position => self.position.as_str(),
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        match field {
            Field::Text => self.text = value,
            Field::Pos => self.pos = value,
            Field::Cpos => self.cpos = value,
            Field::Lemma => self.lemma = value,
            Field::Morph => self.morph = value,
            Field::Head => self.head = value,
            Field::Func => self.func = value,
            Field::Head2 => self.head2 = value,
            Field::Func2 => self.func2 = value,
            Field::Num => self.num = value,
            Field::Position => self.position = Position::parse(&value),
        }
    }
}

/// An ordered sequence of tokens plus sentence-level annotations.
///
/// Annotations are keyed, insertion-ordered, and emitted as `# key=value`
/// lines before the sentence's token rows. Re-annotating an existing key
/// updates it in place.
#[derive(Debug, Clone)]
pub(crate) struct Sentence {
    pub tokens: Vec<Token>,
    pub annotations: Vec<(String, String)>,
    pub sent_num: usize,
}

impl Sentence {
    pub fn new(sent_num: usize) -> Self {
        Sentence { tokens: Vec::new(), annotations: Vec::new(), sent_num }
    }

    pub fn annotate(&mut self, key: &str, value: &str) {
        match self.annotations.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.annotations.push((key.to_string(), value.to_string())),
        }
    }

    pub fn print_annos(&self) -> Vec<String> {
        self.annotations.iter().map(|(k, v)| format!("# {}={}", k, v)).collect()
    }
}

// --- Errors ------------------------------------------------------------------

/// A single defect found while compiling one rule line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// The line did not split into exactly three tab-separated segments.
    MalformedRule { line: String },
    /// A node clause in column 1 failed to parse.
    InvalidNode { line: String, clause: String },
    /// A relation clause in column 2 failed to parse.
    InvalidRelation { line: String, message: String },
    /// An action clause in column 3 failed to parse.
    InvalidAction { line: String, clause: String },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::MalformedRule { line } => write!(
                f,
                "malformed instruction on line {} (instruction lines must contain exactly two tabs)",
                line
            ),
            RuleError::InvalidNode { line, clause } => {
                write!(f, "on line {}: invalid node definition in column 1: {}", line, clause)
            }
            RuleError::InvalidRelation { line, message } => {
                write!(f, "on line {}: column 2 {}", line, message)
            }
            RuleError::InvalidAction { line, clause } => {
                write!(f, "on line {}: column 3 invalid action definition: {}", line, clause)
            }
        }
    }
}

/// All defects found in a rule file, reported together. Any defect aborts
/// loading; no rules from the offending call are installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub errors: Vec<RuleError>,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error in configuration file")?;
        for err in &self.errors {
            writeln!(f)?;
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

/// A fatal condition hit while applying rules to input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// An action value referenced a regex capture group the binding does not
    /// have.
    MissingCaptureGroup { action: String, group: usize },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::MissingCaptureGroup { action, group } => write!(
                f,
                "the action '{}' refers to a missing regex bracket group '${}'",
                action, group
            ),
        }
    }
}

impl std::error::Error for RunError {}

/// Crate-level error union for the convenience entry points.
#[derive(Debug)]
pub enum Error {
    Config(ConfigError),
    Run(RunError),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(err) => write!(f, "{}", err),
            Error::Run(err) => write!(f, "{}", err),
            Error::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::Run(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<RunError> for Error {
    fn from(err: RunError) -> Self {
        Error::Run(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
