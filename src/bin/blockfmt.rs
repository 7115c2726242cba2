//! Command-line interface for blockfmt
//!
//! Usage:
//!   blockfmt [--insert-end|--ignore-indent|--strip-end] [options] [path]
//!
//! Reads from `path`, `-` for stdin, or the clipboard (`--clipboard`, requires the
//! `clipboard` feature); writes to `--out <path>`, stdout, or back to the clipboard.

use blockfmt::config::{FormatOptions, DEFAULT_END_MARK};
use blockfmt::{format, FormatError};
use clap::{Arg, ArgAction, Command};
use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

fn cli() -> Command {
    Command::new("blockfmt")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reflow formatter for indentation-sensitive source with an optional block end mark")
        .arg(
            Arg::new("path")
                .help("Path to the source file, or '-' for stdin (default: stdin)")
                .index(1),
        )
        .arg(
            Arg::new("insert-end")
                .long("insert-end")
                .short('e')
                .help("Synthesize end-mark lines from existing indentation")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ignore-indent")
                .long("ignore-indent")
                .short('i')
                .help("Re-derive indentation from existing end-marks, ignoring input whitespace")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("strip-end")
                .long("strip-end")
                .short('s')
                .help("Remove end-mark lines, preserving trailing comments")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("indent-with")
                .long("indent-with")
                .help("String repeated per optical indent step (default: a tab)")
                .conflicts_with("spaces"),
        )
        .arg(
            Arg::new("spaces")
                .long("spaces")
                .help("Indent with this many spaces instead of a tab")
                .value_parser(clap::value_parser!(usize))
                .conflicts_with("indent-with"),
        )
        .arg(
            Arg::new("clipboard")
                .long("clipboard")
                .short('c')
                .help("Read from and write to the system clipboard instead of a file/stdio")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("validate")
                .long("validate")
                .help("Perform the post-emit equivalence check (default)")
                .action(ArgAction::SetTrue)
                .conflicts_with("no-validate"),
        )
        .arg(
            Arg::new("no-validate")
                .long("no-validate")
                .help("Skip the post-emit equivalence check")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Render INDENT/DEDENT/space/newline as visible glyphs; suppresses validation")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("define-end")
                .long("define-end")
                .help("Preamble text to inject when --insert-end defines a previously-unbound end mark")
                .default_value(format!("{DEFAULT_END_MARK} = None")),
        )
        .arg(
            Arg::new("end-is-none")
                .long("end-is-none")
                .help("Shorthand for --define-end '<end-mark> = None'")
                .action(ArgAction::SetTrue)
                .conflicts_with("define-end"),
        )
        .arg(
            Arg::new("end-mark")
                .long("end-mark")
                .help("The identifier recognized as the block end mark (default: 'end')")
                .default_value(DEFAULT_END_MARK),
        )
        .arg(
            Arg::new("out")
                .long("out")
                .short('o')
                .help("Write the result to this path instead of stdout"),
        )
        .arg(
            Arg::new("dump-tokens")
                .long("dump-tokens")
                .help("Print the formatted document's lexeme stream as JSON instead of text")
                .action(ArgAction::SetTrue),
        )
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let insert_end = matches.get_flag("insert-end");
    let ignore_indent = matches.get_flag("ignore-indent");
    let strip_end = matches.get_flag("strip-end");
    let is_clipboard = matches.get_flag("clipboard");
    let debug = matches.get_flag("debug");
    let no_validate = matches.get_flag("no-validate");
    let end_mark = matches.get_one::<String>("end-mark").unwrap().clone();

    let indent_with = if let Some(n) = matches.get_one::<usize>("spaces") {
        " ".repeat(*n)
    } else if let Some(s) = matches.get_one::<String>("indent-with") {
        s.clone()
    } else {
        "\t".to_string()
    };

    let define_end = if matches.get_flag("end-is-none") {
        format!("{end_mark} = None")
    } else {
        matches.get_one::<String>("define-end").unwrap().clone()
    };

    let opts = FormatOptions {
        insert_end,
        ignore_indent,
        strip_end,
        end_mark,
        indent_with,
        is_clipboard,
        validate: !no_validate && !debug,
        debug,
    };

    if let Err(e) = opts.validate_options() {
        eprintln!("Error: {e}");
        return ExitCode::from(2);
    }

    let source = match read_input(matches.get_one::<String>("path"), is_clipboard) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Error: {msg}");
            return ExitCode::from(2);
        }
    };

    let result = match format(&source, &opts) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    let mut text = result.text;
    if opts.insert_end && !result.end_mark_already_defined && !opts.is_clipboard {
        text = format!("{define_end}\n{text}");
    }

    if matches.get_flag("dump-tokens") {
        match dump_tokens(&text, &opts) {
            Ok(json) => {
                println!("{json}");
            }
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::from(1);
            }
        }
        return ExitCode::SUCCESS;
    }

    if let Err(msg) = write_output(matches.get_one::<String>("out"), is_clipboard, &text) {
        eprintln!("Error: {msg}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

fn exit_code_for(err: &FormatError) -> ExitCode {
    match err {
        FormatError::ConflictingOptions { .. } => ExitCode::from(2),
        FormatError::InvalidSource { .. }
        | FormatError::UnbalancedScope { .. }
        | FormatError::ValidationFailed { .. } => ExitCode::from(1),
    }
}

fn read_input(path: Option<&String>, is_clipboard: bool) -> Result<String, String> {
    if is_clipboard {
        return read_clipboard();
    }
    match path.map(String::as_str) {
        None | Some("-") => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            Ok(buf)
        }
        Some(p) => fs::read_to_string(p).map_err(|e| format!("failed to read '{p}': {e}")),
    }
}

fn write_output(path: Option<&String>, is_clipboard: bool, text: &str) -> Result<(), String> {
    if is_clipboard {
        return write_clipboard(text);
    }
    match path {
        Some(p) => fs::write(p, text).map_err(|e| format!("failed to write '{p}': {e}")),
        None => io::stdout()
            .write_all(text.as_bytes())
            .map_err(|e| format!("failed to write stdout: {e}")),
    }
}

#[cfg(feature = "clipboard")]
fn read_clipboard() -> Result<String, String> {
    arboard::Clipboard::new()
        .and_then(|mut cb| cb.get_text())
        .map_err(|e| format!("failed to read clipboard: {e}"))
}

#[cfg(not(feature = "clipboard"))]
fn read_clipboard() -> Result<String, String> {
    Err("this build was compiled without the 'clipboard' feature".to_string())
}

#[cfg(feature = "clipboard")]
fn write_clipboard(text: &str) -> Result<(), String> {
    arboard::Clipboard::new()
        .and_then(|mut cb| cb.set_text(text.to_string()))
        .map_err(|e| format!("failed to write clipboard: {e}"))
}

#[cfg(not(feature = "clipboard"))]
fn write_clipboard(_text: &str) -> Result<(), String> {
    Err("this build was compiled without the 'clipboard' feature".to_string())
}

fn dump_tokens(text: &str, opts: &FormatOptions) -> Result<String, FormatError> {
    let doc = blockfmt::whitespace::build_document(text, opts.is_clipboard)?;
    serde_json::to_string_pretty(&doc.lexemes).map_err(|e| FormatError::ValidationFailed {
        detail: format!("failed to serialize lexeme stream: {e}"),
    })
}
