#![forbid(unsafe_code)]

//! Command-line argument parsing for the demo.
//!
//! Parses args by hand; `RSEL_DEMO_SCRIPT` overrides the default keystroke
//! script when `--script` is absent.

use std::env;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
rsel-demo: scripted bus-station lookup

USAGE:
    rsel-demo [OPTIONS]

OPTIONS:
    --script=KEYS    Comma-separated successive inputs (default: m,ma,mar,mari)
    --gap-ms=N       Simulated time between inputs (default: 120)
    --pick=N         Row to select after the results arrive, 0-indexed (default: 0)
    --fail=TERM      Make the source fail once for TERM, then retry
    --help, -h       Show this help message
    --version, -V    Show version

ENVIRONMENT:
    RSEL_DEMO_SCRIPT            Default for --script
    RSEL_DEBOUNCE_MS etc.       Selector tunables (see SelectorConfig)
    RUST_LOG                    Log filter (default: info)";

const DEFAULT_SCRIPT: &str = "m,ma,mar,mari";

/// Parsed options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    pub script: Vec<String>,
    pub gap_ms: u64,
    pub pick: usize,
    pub fail: Option<String>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            script: split_script(DEFAULT_SCRIPT),
            gap_ms: 120,
            pick: 0,
            fail: None,
        }
    }
}

/// What `main` should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Opts),
    Help,
    Version,
}

impl Opts {
    /// Parse the process arguments.
    pub fn parse() -> Result<Command, String> {
        let script = env::var("RSEL_DEMO_SCRIPT").ok();
        Self::parse_from(env::args().skip(1), script.as_deref())
    }

    /// Parse `args` (program name excluded) with an optional env script.
    pub fn parse_from<I>(args: I, env_script: Option<&str>) -> Result<Command, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut opts = Opts::default();
        if let Some(script) = env_script {
            opts.script = split_script(script);
        }
        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Command::Help),
                "--version" | "-V" => return Ok(Command::Version),
                _ => {}
            }
            let Some((flag, value)) = arg.split_once('=') else {
                return Err(format!("unknown argument: {arg}"));
            };
            match flag {
                "--script" => opts.script = split_script(value),
                "--gap-ms" => {
                    opts.gap_ms = value
                        .parse()
                        .map_err(|_| format!("--gap-ms expects an integer, got '{value}'"))?;
                }
                "--pick" => {
                    opts.pick = value
                        .parse()
                        .map_err(|_| format!("--pick expects an integer, got '{value}'"))?;
                }
                "--fail" => opts.fail = Some(value.to_string()),
                _ => return Err(format!("unknown argument: {arg}")),
            }
        }
        Ok(Command::Run(opts))
    }
}

pub fn help() -> &'static str {
    HELP_TEXT
}

pub fn version() -> &'static str {
    VERSION
}

fn split_script(script: &str) -> Vec<String> {
    script.split(',').map(str::to_string).collect()
}
