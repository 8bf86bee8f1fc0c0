extern crate brstm_gen;
use log::{error, info, LevelFilter};

#[path = "generator_modules/report.rs"]
mod report;

use brstm_gen::logging;
use brstm_gen::{GeneratorConfig, SystemRunner};
use std::process::ExitCode;

fn main() -> ExitCode {
    // Load or ignore .env file
    let _ = dotenvy::dotenv();

    // Settings first: `verbose` decides the default log level.
    let config = GeneratorConfig::load();
    let verbose = config.as_ref().map(|c| c.verbose).unwrap_or(false);
    logging::init_logger(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    let crash_log = logging::CrashLog::install();

    // Held until exit; dropping it flushes pending events
    let dsn = std::env::var("BRSTMGEN_SENTRY_DSN").ok();
    let environment = std::env::var("SENTRY_ENVIRONMENT").ok();
    let _sentry = logging::init_sentry(dsn.as_deref(), environment.as_deref());

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("[GENERATOR] Invalid settings: {}", e);
            crash_log.record_critical("Configuration", &e.to_string());
            return ExitCode::FAILURE;
        }
    };

    info!("[GENERATOR] Race course BRSTM generator");
    info!(
        "[GENERATOR] Working directory: {}",
        config.working_dir.display()
    );

    let mut runner = SystemRunner;
    match brstm_gen::open_and_run(&config, &mut runner) {
        Ok(session) => {
            report::print_summary(&session, config.sample_rate);
            ExitCode::SUCCESS
        }
        Err(e) => {
            crash_log.record_critical("Session", &e.to_string());
            report::print_failure(&e, crash_log.path());
            ExitCode::FAILURE
        }
    }
}
