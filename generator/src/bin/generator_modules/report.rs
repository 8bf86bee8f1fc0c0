// Console summary printed after a session.

use brstm_gen::{SessionError, SessionReport};
use std::path::Path;

/// Print what the session produced.
pub fn print_summary(session: &SessionReport, sample_rate: u32) {
    let bounds = session.loop_bounds;
    println!();
    println!(
        "Loop: samples {}-{} ({:.3}s - {:.3}s at {} Hz)",
        bounds.start,
        bounds.end,
        bounds.start as f64 / sample_rate as f64,
        bounds.end_seconds(sample_rate),
        sample_rate
    );
    println!("Tracks exported: {}", session.exported.len());
    println!("Normal BRSTM:    {}", session.normal_output.display());
    match &session.fast_output {
        Some(path) => println!("Final lap BRSTM: {}", path.display()),
        None => println!("Final lap BRSTM: skipped"),
    }
    println!("Done!");
}

/// Print a short failure notice pointing at the crash log.
pub fn print_failure(error: &SessionError, crash_log: &Path) {
    eprintln!();
    eprintln!("Generation failed: {}", error);
    if let SessionError::Pipe(_) = error {
        eprintln!("Is Audacity running with mod-script-pipe enabled?");
    }
    eprintln!("Details were written to {}", crash_log.display());
}
