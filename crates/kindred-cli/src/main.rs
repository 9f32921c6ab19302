//! `kindred-cli` – Kindred Command Line Interface
//!
//! This binary is the primary entry point for the Kindred companion-agent
//! stack.  It:
//!
//! 1. Initialises structured logging (optionally OTLP-exported).
//! 2. Loads `~/.kindred/config.toml`, writing defaults on first run.
//! 3. Builds the gated interaction pipeline over a simulated sensor hub.
//! 4. Drops the user into an **interactive REPL** with slash-commands
//!    (`/capture`, `/remember`, `/forget`, `/status`, `/modules`, …).
//! 5. Intercepts **Ctrl-C** to flush snapshots and exit cleanly.
//!
//! Exit status: `0` normally; [`repl::TAMPER_EXIT`] when the policy ruleset
//! integrity check fails: the one condition that must halt the process.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use kindred_hal::SimHub;
use kindred_perception::ThresholdClassifier;
use kindred_runtime::CycleOrchestrator;

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG controls the filter; KINDRED_LOG_FORMAT=json switches to
    // newline-delimited JSON; OTEL_EXPORTER_OTLP_ENDPOINT activates span
    // export.  The CLI's user-facing output still uses println! for UX
    // consistency.
    let _telemetry_guard = kindred_runtime::telemetry::init_tracing("kindred");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} First run: defaults written to {}",
                    "✓".green(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Could not write config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    // ── Pipeline construction ─────────────────────────────────────────────
    // The simulated hub stands in for real hardware: two scalar sensors and
    // one camera whose fixed payload models a single recurring visitor.
    let hub = SimHub::builder()
        .with_sensor("ambient_light", vec![0.6, 0.7, 0.6, 0.8])
        .with_sensor("noise_level", vec![0.1, 0.2, 0.1, 0.3])
        .with_camera("front_rgb", b"simulated-visitor-frame".to_vec())
        .build();

    let data_dir = config::data_dir();
    let orch = match CycleOrchestrator::new(
        cfg.orchestrator_config(&data_dir),
        hub,
        Box::new(ThresholdClassifier::default()),
    ) {
        Ok(orch) => orch,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start the pipeline".red().bold(), e);
            std::process::exit(1);
        }
    };

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    let code = repl::run(&orch, shutdown);

    if code != 0 {
        // Fatal path (ruleset tamper): no flush, distinct exit status.
        drop(_telemetry_guard);
        std::process::exit(code);
    }

    // ── Shutdown flush ────────────────────────────────────────────────────
    match orch.flush() {
        Ok(()) => println!("  {} Snapshots flushed.", "✓".green()),
        Err(e) => warn!(error = %e, "shutdown flush failed"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __ __ _         __             __"#.bold().cyan());
    println!("{}", r#"  / //_/(_)__  ___/ /______ ___  / /"#.bold().cyan());
    println!("{}", r#" / ,<  / / _ \/ _  / __/ -_) _ \/ / "#.bold().cyan());
    println!("{}", r#"/_/|_|/_/_//_/\_,_/_/  \__/_//_/_/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Kindred".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Gated Companion-Agent Pipeline");
    println!();
}
