use clap::Parser;
use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};

use patrex::extensions::with_default_registry;
use patrex::{CharSource, Regex, Text};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pattern to search for
    #[arg(value_name = "PATTERN")]
    pattern: String,

    /// File to search (standard input when absent)
    #[arg(value_name = "FILE")]
    file: Option<String>,

    /// Print only the matched text, one match per line
    #[arg(short = 'o', long)]
    only_matching: bool,

    /// Replace every match using this template
    #[arg(short = 's', long, value_name = "TEMPLATE")]
    substitute: Option<String>,

    /// PATTERN is s/pattern/replacement/flags or m/pattern/flags
    #[arg(short = 'p', long)]
    perl: bool,

    /// Ignore case
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// `^` and `$` match at line breaks
    #[arg(short = 'm', long)]
    multiline: bool,

    /// Never match inside quoted strings
    #[arg(short = 'Q', long)]
    dont_match_in_quotes: bool,

    /// Optimize the pattern before searching
    #[arg(short = 'O', long)]
    optimize: bool,

    /// Escape character used in PATTERN
    #[arg(short = 'e', long, value_name = "CHAR")]
    escape: Option<char>,

    /// Replace only the first match
    #[arg(long)]
    first: bool,
}

fn read_input(file: Option<&str>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read {path}")),
        None => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}

fn build_regex(args: &Args) -> Result<Regex> {
    let mut regex = if args.perl {
        if args.escape.is_some() {
            bail!("--escape cannot be combined with --perl");
        }
        Regex::perl_code(&args.pattern)
    } else {
        let esc = args.escape.unwrap_or('\\');
        with_default_registry(|registry| Regex::compile_with(&args.pattern, esc, registry))
    }
    .with_context(|| format!("Cannot compile {:?}", args.pattern))?;

    if args.ignore_case {
        regex.set_ignore_case(true);
    }
    if args.multiline {
        regex.set_multiline(true);
    }
    if args.dont_match_in_quotes {
        regex.set_dont_match_in_quotes(true);
    }
    if args.optimize {
        regex.optimize();
    }
    if let Some(template) = &args.substitute {
        regex
            .set_replacement(template)
            .with_context(|| format!("Cannot compile replacement {template:?}"))?;
    }
    Ok(regex)
}

/// Every match in `line`, left to right.
fn matches_in(regex: &mut Regex, line: &str) -> Vec<String> {
    let text = Text::from(line);
    let mut found = Vec::new();
    let mut from = 0;
    while from <= text.len() && regex.search_from(&text, from) {
        let res = regex.result();
        let (Some(start), Some(end)) = (res.matched_from(), res.matched_to()) else {
            break;
        };
        found.extend(res.string_matched());
        from = if start == end { end + 1 } else { end };
    }
    found
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let args = Args::parse();
    let mut regex = build_regex(&args)?;
    let input = read_input(args.file.as_deref())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let substituting = args.substitute.is_some() || (args.perl && args.pattern.starts_with('s'));
    if substituting {
        let replaced = if args.first {
            regex.replace_first(input.as_str())
        } else {
            regex.replace_all(input.as_str())
        };
        out.write_all(replaced.as_bytes())?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut any = false;
    for line in input.lines() {
        if args.only_matching {
            for m in matches_in(&mut regex, line) {
                any = true;
                writeln!(out, "{m}")?;
            }
        } else if regex.search(line) {
            any = true;
            writeln!(out, "{line}")?;
        }
    }
    Ok(if any { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
