//! Application definition.

extern crate simplelog;

use std::env;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

use nocsweep::{Campaign, CampaignManifest, CampaignSummary, PausePoint};

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &'static str = env!("CARGO_PKG_AUTHORS");

pub fn app<'a, 'b>() -> App<'a, 'b> {
    App::new("nocsweep")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .version(VERSION)
        .author(AUTHORS)
        .about(
            "Run parametric sweep campaigns against a NoC testbench simulator.\n\
             Sweeps traffic-mix weight pairs against injection rates and renders \n\
             one report workbook per weight scenario.",
        )
        .arg(
            Arg::with_name("verbosity")
                .long("verbosity")
                .short("v")
                .takes_value(true)
                .default_value("info")
                .value_name("verb")
                .global(true)
                .help("Set the verbosity of the log output"),
        )
        // run subcommand
        .subcommand(
            SubCommand::with_name("run")
                .display_order(10)
                .about("Run the full sweep campaign")
                .arg(
                    Arg::with_name("path")
                        .value_name("path")
                        .help("Path to the project root (defaults to the working directory)"),
                )
                .arg(
                    Arg::with_name("rates")
                        .long("rates")
                        .takes_value(true)
                        .value_name("path")
                        .help("Injection rates file, one fractional value per line"),
                )
                .arg(
                    Arg::with_name("weights")
                        .long("weights")
                        .takes_value(true)
                        .value_name("path")
                        .help("Weight pairs file, one `accurate,approximate` pair per line"),
                )
                .arg(
                    Arg::with_name("policy")
                        .long("policy")
                        .takes_value(true)
                        .value_name("policy")
                        .possible_values(&["fail-fast", "continue"])
                        .help("What to do when a single sweep point fails"),
                )
                .arg(
                    Arg::with_name("timeout")
                        .long("timeout")
                        .takes_value(true)
                        .value_name("seconds")
                        .help("Kill a simulator run that exceeds this many seconds"),
                )
                .arg(
                    Arg::with_name("no-pause")
                        .long("no-pause")
                        .help("Disable the interactive confirmation gates"),
                ),
        )
        // check subcommand
        .subcommand(
            SubCommand::with_name("check")
                .display_order(11)
                .about("Validate inputs and discover network parameters without simulating")
                .arg(
                    Arg::with_name("path")
                        .value_name("path")
                        .help("Path to the project root (defaults to the working directory)"),
                ),
        )
}

pub fn init() -> ArgMatches<'static> {
    app().get_matches()
}

/// Runs based on specified subcommand.
pub fn start(matches: ArgMatches) -> Result<()> {
    match matches.subcommand() {
        ("run", Some(m)) => start_run(m),
        ("check", Some(m)) => start_check(m),
        _ => Ok(()),
    }
}

fn project_path(matches: &ArgMatches) -> Result<PathBuf> {
    let mut path = env::current_dir()?;
    if let Some(p_str) = matches.value_of("path") {
        let p = PathBuf::from(p_str);
        if p.is_relative() {
            path = path.join(p);
        } else {
            path = p;
        }
    }
    Ok(path.canonicalize().unwrap_or(path))
}

fn load_manifest(matches: &ArgMatches, path: &PathBuf) -> Result<CampaignManifest> {
    let mut manifest = CampaignManifest::load_or_default(path)?;
    if let Some(rates) = matches.value_of("rates") {
        manifest.rates_file = rates.to_string();
    }
    if let Some(weights) = matches.value_of("weights") {
        manifest.weights_file = weights.to_string();
    }
    if let Some(policy) = matches.value_of("policy") {
        manifest.on_point_failure = policy.parse()?;
    }
    if let Some(timeout) = matches.value_of("timeout") {
        manifest.timeout_secs = Some(timeout.parse()?);
    }
    Ok(manifest)
}

fn start_run(matches: &ArgMatches) -> Result<()> {
    setup_log_verbosity(matches);
    let path = project_path(matches)?;
    let manifest = load_manifest(matches, &path)?;

    info!("starting campaign at: {}", path.to_string_lossy());
    let mut campaign = Campaign::new(&path, manifest);
    if !matches.is_present("no-pause") {
        campaign.set_pause_hook(Box::new(prompt_pause));
    }

    let summary = campaign.run()?;
    print_summary(&summary);
    Ok(())
}

fn start_check(matches: &ArgMatches) -> Result<()> {
    setup_log_verbosity(matches);
    let path = project_path(matches)?;
    let manifest = load_manifest(matches, &path)?;

    let campaign = Campaign::new(&path, manifest);
    let (space, params) = campaign.inspect()?;

    println!("**** Test Parameters ****");
    println!("Test type: Weighted Random");
    println!("X Size of Network: {}", params.x_size);
    println!("Y Size of Network: {}", params.y_size);
    println!("Number of Packets to Inject: {}", params.packet_qty);
    println!("Number of Ticks Per Period: {}", params.period_size);
    println!("Number of injection rates to test: {}", space.rates.len());
    println!("Number of weighted scenarios: {}", space.weights.len());
    Ok(())
}

fn print_summary(summary: &CampaignSummary) {
    println!(
        "{} points completed, {} reports written",
        summary.points_completed,
        summary.reports_written.len()
    );
    if !summary.failures.is_empty() {
        println!("{} points failed:", summary.failures.len());
        for failure in &summary.failures {
            println!(
                "  weight scenario {}, rate index {}: {}",
                failure.weight_idx, failure.rate_idx, failure.error
            );
        }
    }
}

fn prompt_pause(point: PausePoint) {
    match point {
        PausePoint::CampaignStart => print!("Press enter to start the campaign..."),
        PausePoint::SaturationRate => print!("At injection rate 1.00, press enter to continue..."),
    }
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
}

fn setup_log_verbosity(matches: &ArgMatches) {
    use self::simplelog::{LevelFilter, TermLogger};
    let level_filter = match matches.value_of("verbosity") {
        Some(s) => match s {
            "0" | "none" => LevelFilter::Off,
            "1" | "err" | "error" | "min" => LevelFilter::Error,
            "2" | "warn" | "warning" | "default" => LevelFilter::Warn,
            "3" | "info" => LevelFilter::Info,
            "4" | "debug" => LevelFilter::Debug,
            "5" | "trace" | "max" | "all" => LevelFilter::Trace,
            _ => LevelFilter::Warn,
        },
        _ => LevelFilter::Warn,
    };
    let mut config_builder = simplelog::ConfigBuilder::new();
    let logger_conf = config_builder
        .set_time_level(LevelFilter::Error)
        .set_target_level(LevelFilter::Debug)
        .set_location_level(LevelFilter::Error)
        .set_time_format_str("%H:%M:%S%.6f")
        .build();
    TermLogger::init(level_filter, logger_conf, simplelog::TerminalMode::Mixed);
}
