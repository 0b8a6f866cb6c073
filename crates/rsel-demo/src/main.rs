#![forbid(unsafe_code)]

//! Scripted station lookup.
//!
//! Replays a burst of keystrokes against a [`RemoteSelect`] on simulated
//! time, prints the rows the renderer would draw, then picks one.

mod cli;
mod stations;

use std::process;
use std::time::{Duration, Instant};

use rsel_core::{QueryInput, SelectorConfig};
use rsel_runtime::ItemSource;
use rsel_widgets::{Affordance, RemoteSelect};
use tracing::{info, warn};

use cli::{Command, Opts};
use stations::{FlakySource, station_source};

fn init_logging() {
    #[cfg(feature = "json-logs")]
    {
        if let Err(e) = rsel_core::logging::init_json_logging("info") {
            eprintln!("Failed to initialize logging: {e}");
        }
    }
    #[cfg(not(feature = "json-logs"))]
    {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

fn print_rows<S: ItemSource<String>>(select: &RemoteSelect<String, S>) {
    match select.affordance() {
        Some(Affordance::Loading) => println!("  (loading)"),
        Some(Affordance::Empty) => println!("  (no stations match)"),
        Some(Affordance::Error) => println!("  (lookup failed, retry available)"),
        Some(Affordance::Results) => {
            for row in select.rows() {
                let marker = match (row.selected, row.highlighted) {
                    (true, _) => '*',
                    (false, true) => '>',
                    (false, false) => ' ',
                };
                println!("  {marker} {:>4}  {}", row.start, row.item.label());
            }
        }
        None => println!("  (idle)"),
    }
}

fn run(opts: Opts) -> Result<(), String> {
    let parse = SelectorConfig::from_env_with_diagnostics();
    for error in &parse.errors {
        warn!(%error, "ignoring invalid selector setting");
    }
    let config = parse.config;
    let source = FlakySource::new(station_source(config.page_limit), opts.fail.clone());
    let mut select = RemoteSelect::new(source, QueryInput::new("bus-stations"), config)
        .map_err(|errors| {
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        })?;

    let t0 = Instant::now();
    let gap = Duration::from_millis(opts.gap_ms);
    let mut now = t0;
    for keys in &opts.script {
        println!("> {keys:?}");
        if let Err(error) = select.handle_input_at(keys, now) {
            println!("  rejected: {error}");
        }
        select.tick_at(now);
        now += gap;
    }
    now += select.next_deadline(now).unwrap_or_default();
    select.tick_at(now);
    println!("results for {:?}:", select.input());
    print_rows(&select);

    if select.affordance() == Some(Affordance::Error) {
        select.retry();
        select.tick_at(now);
        println!("after retry:");
        print_rows(&select);
    }

    for _ in 0..=opts.pick {
        select.highlight_next();
    }
    print_rows(&select);
    if select.select_highlighted() {
        info!(value = ?select.selection().selected_value(), "selection committed");
    }
    println!("trigger: {}", select.trigger_label("Choose a station"));

    let stats = select.cache_stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        joins = stats.joins,
        stale = stats.stale_discards,
        "cache summary"
    );
    select.dispose();
    Ok(())
}

fn main() {
    init_logging();
    let opts = match Opts::parse() {
        Ok(Command::Run(opts)) => opts,
        Ok(Command::Help) => {
            println!("{}", cli::help());
            return;
        }
        Ok(Command::Version) => {
            println!("rsel-demo {}", cli::version());
            return;
        }
        Err(message) => {
            eprintln!("{message}\n\n{}", cli::help());
            process::exit(2);
        }
    };
    if let Err(e) = run(opts) {
        eprintln!("Failed to start selector: {e}");
        process::exit(1);
    }
}
