use clap::Parser;
use eduprobe::bootstrap::MysqlCliElevator;
use eduprobe::cli::{Cli, Command};
use eduprobe::config::Config;
use eduprobe::fixture::{random_suffix, validate_suffix};
use eduprobe::http::UreqTransport;
use eduprobe::readiness::{Readiness, wait_until_ready};
use eduprobe::report::{self, Report};
use eduprobe::runner::Runner;
use eduprobe::scenario::Scenario;
use eduprobe::{logging, scenarios};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

type CmdResult = Result<i32, Box<dyn std::error::Error>>;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match &cli.command {
        Some(Command::Run {
            scenarios,
            suffix,
            no_wait,
        }) => run_scenarios(&cli, scenarios, suffix.as_deref(), *no_wait),
        Some(Command::List) => run_list(cli.json),
        Some(Command::Wait { attempts, interval }) => run_wait(&cli, *attempts, *interval),
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            std::process::exit(1);
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Config file plus flag and environment overrides
fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_seconds = timeout;
    }
    Ok(config)
}

/// Resolve scenario names, all of them when none are given
fn select(names: &[String]) -> Result<Vec<Scenario>, String> {
    if names.is_empty() {
        return Ok(scenarios::all());
    }
    names
        .iter()
        .map(|name| {
            scenarios::find(name).ok_or_else(|| {
                format!(
                    "Unknown scenario '{}'. Available: {}",
                    name,
                    scenarios::names().join(", ")
                )
            })
        })
        .collect()
}

fn run_scenarios(cli: &Cli, names: &[String], suffix: Option<&str>, no_wait: bool) -> CmdResult {
    let selected = select(names)?;
    if let Some(suffix) = suffix {
        if selected.len() != 1 {
            return Err("--suffix requires exactly one scenario".into());
        }
        validate_suffix(suffix)?;
    }

    let config = load_config(cli)?;
    let transport = UreqTransport::new(&config.base_url, config.timeout());

    if !no_wait {
        let readiness = &config.readiness;
        wait_until_ready(
            &transport,
            &readiness.probe_path,
            readiness.max_attempts,
            readiness.interval(),
        );
    }

    let elevator = MysqlCliElevator::new(config.admin_bootstrap_credentials.clone());
    let runner = Runner::new(&transport, &elevator);

    let mut records = Vec::new();
    for scenario in &selected {
        let suffix = suffix.map(str::to_string).unwrap_or_else(random_suffix);
        info!(scenario = scenario.name, %suffix, "starting scenario");
        records.extend(runner.run(scenario, &suffix));
    }

    let report = Report::new(&records);
    if cli.json {
        report::print_json(&report);
    } else {
        print!("{}", report.render_text());
    }
    Ok(report.exit_code())
}

#[derive(Serialize)]
struct ScenarioEntry {
    name: &'static str,
    description: &'static str,
    steps: usize,
}

fn run_list(json_output: bool) -> CmdResult {
    let entries: Vec<ScenarioEntry> = scenarios::all()
        .into_iter()
        .map(|s| ScenarioEntry {
            name: s.name,
            description: s.description,
            steps: s.steps.len(),
        })
        .collect();

    if json_output {
        report::print_json(&entries);
    } else {
        for entry in &entries {
            println!("{:<20} {}", entry.name, entry.description);
        }
    }
    Ok(0)
}

fn run_wait(cli: &Cli, attempts: Option<u32>, interval: Option<u64>) -> CmdResult {
    let config = load_config(cli)?;
    let transport = UreqTransport::new(&config.base_url, config.timeout());
    let readiness = wait_until_ready(
        &transport,
        &config.readiness.probe_path,
        attempts.unwrap_or(config.readiness.max_attempts),
        interval.map_or(config.readiness.interval(), Duration::from_secs),
    );

    if cli.json {
        report::print_json(&readiness);
    } else {
        match readiness {
            Readiness::Ready { attempts } => {
                println!("{} is ready (attempt {})", config.base_url, attempts)
            }
            Readiness::TimedOut { attempts } => println!(
                "{} did not respond after {} attempts",
                config.base_url, attempts
            ),
        }
    }
    Ok(if readiness.is_ready() { 0 } else { 1 })
}
