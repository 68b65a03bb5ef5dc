//! Flash Flood Risk Service
//!
//! Estimates the probability that a USGS streamflow station is in, or
//! about to enter, a flash-flood state, from the last week of discharge
//! readings and a pre-trained classifier.
//!
//! Usage:
//!   cargo run --release -- --site 08166250                    # Risk right now
//!   cargo run --release -- --site 08166250 --date 2025-07-04  # Risk as of a past day
//!   cargo run --release -- --all [--date 2025-07-04]          # Every registered station
//!   cargo run --release -- --endpoint 8080                    # Serve HTTP API
//!
//! Options:
//!   --config PATH  configuration file (default: flood_risk.toml, or FLOOD_CONFIG)
//!
//! Environment:
//!   FLOOD_LOG_LEVEL, FLOOD_LOG_FORMAT - logging (see logging.rs)
//!   FLOOD_* overrides for the configuration file (see config.rs)

use flashflood_service::acquire::Acquirer;
use flashflood_service::config::ServiceConfig;
use flashflood_service::endpoint::{self, EndpointState};
use flashflood_service::inference::shared_artifacts;
use flashflood_service::ingest::source::UsgsSource;
use flashflood_service::logging::{self, LoggingConfig};
use flashflood_service::model::Prediction;
use flashflood_service::pipeline::{self, parse_target_date, Pipeline};
use flashflood_service::stations::StationRegistry;
use chrono::NaiveDate;
use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

enum Mode {
    Site(String),
    All,
    Endpoint(u16),
}

struct Args {
    config: Option<PathBuf>,
    mode: Mode,
    date: Option<NaiveDate>,
}

fn usage(program: &str) -> String {
    format!(
        "Usage: {} [--config PATH] (--site CODE [--date YYYY-MM-DD] | --all [--date YYYY-MM-DD] | --endpoint PORT)",
        program
    )
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let program = args.first().map(String::as_str).unwrap_or("flashflood_service");
    let mut config = None;
    let mut mode = None;
    let mut date = None;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = || {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| format!("{} requires a value\n{}", flag, usage(program)))
        };
        match flag {
            "--config" => {
                config = Some(PathBuf::from(value()?));
                i += 2;
            }
            "--site" => {
                mode = Some(Mode::Site(value()?));
                i += 2;
            }
            "--date" => {
                let raw = value()?;
                date = Some(parse_target_date(&raw).map_err(|e| e.to_string())?);
                i += 2;
            }
            "--all" => {
                mode = Some(Mode::All);
                i += 1;
            }
            "--endpoint" => {
                let raw = value()?;
                let port = raw
                    .parse()
                    .map_err(|_| format!("--endpoint requires a port number, got '{}'", raw))?;
                mode = Some(Mode::Endpoint(port));
                i += 2;
            }
            other => return Err(format!("Unknown argument: {}\n{}", other, usage(program))),
        }
    }

    let mode = mode.ok_or_else(|| usage(program))?;
    if date.is_some() && matches!(mode, Mode::Endpoint(_)) {
        return Err("--date applies to --site and --all only".to_string());
    }
    Ok(Args { config, mode, date })
}

fn print_prediction(site_code: &str, label: &str, prediction: &Prediction) {
    match prediction {
        Prediction::Probability {
            probability,
            risk,
            as_of,
        } => println!(
            "   ✓ {} {} - {:.1}% ({}) as of {}",
            site_code,
            label,
            probability * 100.0,
            risk,
            as_of.format("%Y-%m-%d %H:%M UTC")
        ),
        Prediction::Undetermined(reason) => {
            println!("   ? {} {} - undetermined: {}", site_code, label, reason)
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let args = match parse_args(&args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let config = match ServiceConfig::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = logging::init_logging(&LoggingConfig::from_env()) {
        eprintln!("⚠ Logging not initialized: {}", e);
    }

    println!("🌊 Flash Flood Risk Service");
    println!("===========================\n");

    println!("📦 Loading model artifacts...");
    let artifacts = match shared_artifacts(&config.artifacts.scaler_path, &config.artifacts.classifier_path) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("\n❌ Refusing to start: {}\n", e);
            process::exit(1);
        }
    };
    println!("✓ Scaler and classifier agree on {} features\n", artifacts.scaler().dim());

    let source = match UsgsSource::new() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to build USGS client: {}", e);
            process::exit(1);
        }
    };
    let acquirer = Acquirer::new(Arc::new(source), config.fallback_policy());
    let pipeline = Arc::new(Pipeline::new(acquirer, artifacts, config.pipeline_config()));

    // Single-site requests don't need a registry; only use it for names.
    let load_registry = |required: bool| match StationRegistry::load(&config.service.stations_path) {
        Ok(r) => r,
        Err(e) if required => {
            eprintln!("❌ Failed to load stations: {}", e);
            process::exit(1);
        }
        Err(_) => StationRegistry::default(),
    };

    match args.mode {
        Mode::Site(site_code) => {
            let registry = load_registry(false);
            let label = registry.find(&site_code).map(|s| s.name.as_str()).unwrap_or("");
            println!("🔎 Predicting flash-flood risk...");
            let prediction = pipeline.predict(&site_code, args.date);
            print_prediction(&site_code, label, &prediction);
        }
        Mode::All => {
            let registry = load_registry(true);
            println!(
                "🔎 Predicting flash-flood risk for {} stations ({} workers)...",
                registry.stations().len(),
                config.service.workers
            );
            let results = pipeline::predict_batch(&pipeline, &registry.site_codes(), args.date, config.service.workers);
            let mut undetermined = 0;
            for (site_code, prediction) in &results {
                let label = registry.find(site_code).map(|s| s.name.as_str()).unwrap_or("");
                print_prediction(site_code, label, prediction);
                if prediction.is_undetermined() {
                    undetermined += 1;
                }
            }
            println!("\n   {} stations, {} undetermined", results.len(), undetermined);
        }
        Mode::Endpoint(port) => {
            let registry = load_registry(true);
            println!("🚀 Starting HTTP endpoint server...");
            println!("   Serving {} registered stations", registry.stations().len());
            let state = EndpointState {
                pipeline,
                registry: Arc::new(registry),
                batch_workers: config.service.workers,
            };
            if let Err(e) = endpoint::start_endpoint_server(port, state, config.service.workers) {
                eprintln!("❌ Endpoint server error: {}", e);
                process::exit(1);
            }
        }
    }
}
