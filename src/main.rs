use depedit::{DepEdit, RunOptions};
use std::io::{self, Read};

const DEFAULT_CONFIG: &str = "config.ini";

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let rule_text = match std::fs::read_to_string(&config.config) {
        Ok(text) => text,
        Err(_) => {
            eprintln!(
                "error: configuration file '{}' not found (specify with -c or use the default '{}')",
                config.config, DEFAULT_CONFIG
            );
            std::process::exit(2);
        }
    };

    let engine = match DepEdit::from_config(&rule_text) {
        Ok(mut engine) => {
            engine.set_quiet(config.quiet);
            engine
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let input = match read_input(&config.file) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let docname = document_name(&config);
    let opts = RunOptions { sent_id: config.sent_id, docname: config.docname };
    match engine.run(&input, &docname, &opts) {
        Ok(out) => print!("{out}"),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

struct CliConfig {
    file: String,
    config: String,
    quiet: bool,
    docname: bool,
    sent_id: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut file: Option<String> = None;
    let mut config = DEFAULT_CONFIG.to_string();
    let mut quiet = false;
    let mut docname = false;
    let mut sent_id = false;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("depedit {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "-q" | "--quiet" => quiet = true,
            "-d" | "--docname" => docname = true,
            "-s" | "--sent-id" => sent_id = true,
            "-c" | "--config" => {
                let value = args.next().ok_or_else(|| "error: --config expects a value".to_string())?;
                config = value;
            }
            _ if arg.starts_with("--config=") => {
                config = arg.trim_start_matches("--config=").to_string();
            }
            _ if arg.starts_with('-') && arg != "-" => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                if file.is_some() {
                    return Err("error: input file provided multiple times".to_string());
                }
                file = Some(arg);
            }
        }
    }

    let file = file.ok_or_else(|| format!("error: no input file provided\n\n{}", help_text()))?;
    Ok(CliConfig { file, config, quiet, docname, sent_id })
}

fn read_input(file: &str) -> Result<String, String> {
    if file == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|err| format!("error: failed to read stdin: {err}"))?;
        return Ok(buffer);
    }
    std::fs::read_to_string(file).map_err(|err| format!("error: failed to read '{file}': {err}"))
}

/// With a decoration flag, the document name is the input's basename without
/// its extension; otherwise the filename as given.
fn document_name(config: &CliConfig) -> String {
    if !(config.docname || config.sent_id) || config.file == "-" {
        return config.file.clone();
    }
    let base = std::path::Path::new(&config.file)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.file.clone());
    match base.rfind('.') {
        Some(dot) => base[..dot].to_string(),
        None => base,
    }
}

fn help_text() -> String {
    format!(
        "depedit {version}

Rule-driven rewriter for dependency trees in CoNLL format.

Usage:
  depedit [OPTIONS] <file>
  depedit [OPTIONS] -          Read input from stdin.

Options:
  -c, --config <file>        Rule file defining transformations.
                             Default: {default_config}
  -d, --docname              Begin output with '# newdoc id = ...'.
  -s, --sent-id              Add running sentence id comments.
  -q, --quiet                Do not output warnings.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Exit codes:
  0  Success.
  1  Runtime error while applying rules.
  2  Invalid arguments or configuration.
",
        version = env!("CARGO_PKG_VERSION"),
        default_config = DEFAULT_CONFIG
    )
}
