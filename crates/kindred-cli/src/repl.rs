//! REPL – Read-Eval-Print Loop for the Kindred interactive shell.
//!
//! Supported slash-commands:
//!   /help                    – show this list
//!   /capture                 – consent-gated camera capture (sets the active identity)
//!   /remember <name>         – pin the active identity under a display name
//!   /forget                  – erase the active identity (pinned or not)
//!   /status                  – relationship report for the active identity
//!   /modules                 – list modulation units
//!   /enable | /disable <m>   – toggle a modulation unit
//!   /sensors                 – list registered sensors
//!   /addsensor <name> <val>  – register a fixed-value sensor
//!   /calibrate <s> <factor>  – calibrate a sensor (factor in [0.1, 2.0])
//!   /fact <imp> <text>       – retain a fact with importance in [0, 1]
//!   /recall <query>          – recall matching facts, most important first
//!   /violations              – show the policy violation log
//!   /quit | /exit            – gracefully exit the CLI
//!
//! Any other line runs one full pipeline cycle.  A detected ruleset tamper
//! aborts the REPL immediately with [`TAMPER_EXIT`].

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kindred_hal::ConstantSensor;
use kindred_runtime::CycleOrchestrator;
use kindred_types::{Fingerprint, KindredError};

/// Distinct non-zero exit status for the fatal tamper path.
pub const TAMPER_EXIT: i32 = 70;

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
/// Returns the process exit code: `0` normally, [`TAMPER_EXIT`] when the
/// policy ruleset integrity check fails.
pub fn run(orch: &CycleOrchestrator, shutdown: Arc<AtomicBool>) -> i32 {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    // The identity most recently captured; commands act on it.
    let mut active: Option<Fingerprint> = None;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "kindred>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }

        let outcome = match cmd.split_once(' ') {
            Some(("/remember", name)) => cmd_remember(orch, &active, name.trim()),
            Some(("/enable", name)) => cmd_toggle(orch, name.trim(), true),
            Some(("/disable", name)) => cmd_toggle(orch, name.trim(), false),
            Some(("/addsensor", rest)) => cmd_addsensor(orch, rest.trim()),
            Some(("/calibrate", rest)) => cmd_calibrate(orch, rest.trim()),
            Some(("/fact", rest)) => cmd_fact(orch, rest.trim()),
            Some(("/recall", query)) => cmd_recall(orch, query.trim()),
            _ => match cmd {
                "/help" => {
                    cmd_help();
                    Ok(())
                }
                "/capture" => cmd_capture(orch, &mut active),
                "/forget" => cmd_forget(orch, &mut active),
                "/status" => cmd_status(orch, &active),
                "/modules" => cmd_modules(orch),
                "/sensors" => cmd_sensors(orch),
                "/violations" => {
                    cmd_violations(orch);
                    Ok(())
                }
                "/quit" | "/exit" => {
                    println!("{}", "Goodbye.".green());
                    shutdown.store(true, Ordering::SeqCst);
                    break;
                }
                other if other.starts_with('/') => {
                    println!(
                        "{} '{}'. Type {} for available commands.",
                        "Unknown command:".red(),
                        other.yellow(),
                        "/help".bold()
                    );
                    Ok(())
                }
                input => cmd_cycle(orch, input, &active),
            },
        };

        match outcome {
            Ok(()) => {}
            Err(KindredError::TamperDetected) => {
                eprintln!(
                    "{}",
                    "FATAL: policy ruleset integrity check failed. Refusing to continue."
                        .red()
                        .bold()
                );
                return TAMPER_EXIT;
            }
            Err(e) => println!("  {}: {}", "Error".red(), e),
        }
    }
    0
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Kindred Commands".bold().underline());
    println!("  {}              – consent-gated camera capture", "/capture".bold().cyan());
    println!("  {}      – pin the active identity", "/remember <name>".bold().cyan());
    println!("  {}               – erase the active identity", "/forget".bold().cyan());
    println!("  {}               – relationship report", "/status".bold().cyan());
    println!("  {}              – list modulation units", "/modules".bold().cyan());
    println!("  {}  – toggle a unit", "/enable  /disable <m>".bold().cyan());
    println!("  {}              – list sensors", "/sensors".bold().cyan());
    println!("  {} – register a fixed-value sensor", "/addsensor <name> <val>".bold().cyan());
    println!("  {} – calibrate a sensor", "/calibrate <s> <factor>".bold().cyan());
    println!("  {}     – retain a fact", "/fact <imp> <text>".bold().cyan());
    println!("  {}        – recall matching facts", "/recall <query>".bold().cyan());
    println!("  {}           – show the violation log", "/violations".bold().cyan());
    println!("  {}          – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
    println!("  Anything else runs one pipeline cycle.");
    println!();
}

fn cmd_cycle(
    orch: &CycleOrchestrator,
    input: &str,
    active: &Option<Fingerprint>,
) -> Result<(), KindredError> {
    let report = orch.run_cycle(input, active.as_ref())?;
    println!("{}", report.response);
    Ok(())
}

fn cmd_capture(
    orch: &CycleOrchestrator,
    active: &mut Option<Fingerprint>,
) -> Result<(), KindredError> {
    let consent = prompt_yes_no("  Has the subject given explicit consent? [y/N]: ");
    match orch.capture("front_rgb", consent) {
        Ok(fp) => {
            println!("  {} identity {}", "✓ Observed".green(), short(&fp).bold());
            *active = Some(fp);
            Ok(())
        }
        Err(KindredError::TamperDetected) => Err(KindredError::TamperDetected),
        Err(e) => {
            println!("  {}: {}", "Capture refused".yellow(), e);
            Ok(())
        }
    }
}

fn cmd_remember(
    orch: &CycleOrchestrator,
    active: &Option<Fingerprint>,
    name: &str,
) -> Result<(), KindredError> {
    let Some(fp) = active else {
        println!("  No active identity. Run {} first.", "/capture".bold());
        return Ok(());
    };
    if name.is_empty() {
        println!("  Usage: {}", "/remember <name>".bold());
        return Ok(());
    }
    match orch.pin(fp, name, Default::default()) {
        Ok(()) => {
            println!("  {} {} is now remembered.", "✓".green(), name.bold());
            Ok(())
        }
        Err(KindredError::TamperDetected) => Err(KindredError::TamperDetected),
        Err(e) => {
            println!("  {}: {}", "Could not remember".yellow(), e);
            Ok(())
        }
    }
}

fn cmd_forget(
    orch: &CycleOrchestrator,
    active: &mut Option<Fingerprint>,
) -> Result<(), KindredError> {
    let Some(fp) = active.take() else {
        println!("  No active identity to forget.");
        return Ok(());
    };
    match orch.erase(&fp) {
        Ok(()) => {
            println!("  {} identity {} erased.", "✓".green(), short(&fp));
            Ok(())
        }
        Err(KindredError::TamperDetected) => Err(KindredError::TamperDetected),
        Err(e) => {
            println!("  {}: {}", "Could not forget".yellow(), e);
            Ok(())
        }
    }
}

fn cmd_status(
    orch: &CycleOrchestrator,
    active: &Option<Fingerprint>,
) -> Result<(), KindredError> {
    let Some(fp) = active else {
        println!("  No active identity. Run {} first.", "/capture".bold());
        return Ok(());
    };
    match orch.relationship(fp)? {
        Some(view) => {
            println!();
            println!("{}", "Relationship".bold().underline());
            println!("  Fingerprint : {}", short(fp));
            println!("  Tier        : {}", view.tier.to_string().bold());
            if let Some(name) = &view.display_name {
                println!("  Name        : {}", name);
            }
            if let Some(label) = &view.context_label {
                println!("  Context     : {}", label);
            }
            println!("  Encounters  : {}", view.encounter_count);
            println!("  Positive    : {}", view.positive_interactions);
            println!("  Pinned      : {}", view.pinned);
            println!();
        }
        None => println!("  Identity {} is not (or no longer) known.", short(fp)),
    }
    Ok(())
}

fn cmd_modules(orch: &CycleOrchestrator) -> Result<(), KindredError> {
    let units = orch.units()?;
    println!();
    println!("{}", "Modulation Units".bold().underline());
    for (name, _, enabled) in units {
        let state = if enabled { "enabled ".green() } else { "disabled".yellow() };
        println!("  [{}] {}", state, name);
    }
    println!();
    Ok(())
}

fn cmd_toggle(orch: &CycleOrchestrator, name: &str, enabled: bool) -> Result<(), KindredError> {
    match orch.set_unit_enabled(name, enabled) {
        Ok(()) => {
            let verb = if enabled { "enabled" } else { "disabled" };
            println!("  {} unit '{}' {}.", "✓".green(), name, verb);
            Ok(())
        }
        Err(KindredError::TamperDetected) => Err(KindredError::TamperDetected),
        Err(e) => {
            println!("  {}: {}", "Could not toggle".yellow(), e);
            Ok(())
        }
    }
}

fn cmd_sensors(orch: &CycleOrchestrator) -> Result<(), KindredError> {
    println!();
    println!("{}", "Sensors".bold().underline());
    for name in orch.list_sensors()? {
        println!("  • {}", name);
    }
    println!();
    Ok(())
}

fn cmd_addsensor(orch: &CycleOrchestrator, rest: &str) -> Result<(), KindredError> {
    let Some((name, value_str)) = rest.split_once(' ') else {
        println!("  Usage: {}", "/addsensor <name> <value>".bold());
        return Ok(());
    };
    let Ok(value) = value_str.trim().parse::<f32>() else {
        println!("  '{}' is not a number.", value_str.trim().yellow());
        return Ok(());
    };
    match orch.register_sensor(Box::new(ConstantSensor::new(name.trim(), value))) {
        Ok(()) => {
            println!("  {} sensor '{}' registered at {}.", "✓".green(), name.trim(), value);
            Ok(())
        }
        Err(KindredError::TamperDetected) => Err(KindredError::TamperDetected),
        Err(e) => {
            println!("  {}: {}", "Could not add sensor".yellow(), e);
            Ok(())
        }
    }
}

fn cmd_calibrate(orch: &CycleOrchestrator, rest: &str) -> Result<(), KindredError> {
    let Some((name, factor_str)) = rest.split_once(' ') else {
        println!("  Usage: {}", "/calibrate <sensor> <factor>".bold());
        return Ok(());
    };
    let Ok(factor) = factor_str.trim().parse::<f32>() else {
        println!("  '{}' is not a number.", factor_str.trim().yellow());
        return Ok(());
    };
    match orch.calibrate_sensor(name.trim(), factor) {
        Ok(()) => {
            println!("  {} '{}' calibrated to {}.", "✓".green(), name.trim(), factor);
            Ok(())
        }
        Err(KindredError::TamperDetected) => Err(KindredError::TamperDetected),
        Err(e) => {
            println!("  {}: {}", "Could not calibrate".yellow(), e);
            Ok(())
        }
    }
}

fn cmd_fact(orch: &CycleOrchestrator, rest: &str) -> Result<(), KindredError> {
    let Some((imp_str, content)) = rest.split_once(' ') else {
        println!("  Usage: {}", "/fact <importance> <text>".bold());
        return Ok(());
    };
    let Ok(importance) = imp_str.trim().parse::<f32>() else {
        println!("  '{}' is not a number.", imp_str.trim().yellow());
        return Ok(());
    };
    match orch.store_fact(content.trim(), importance) {
        Ok(true) => {
            println!("  {} fact retained.", "✓".green());
            Ok(())
        }
        Ok(false) => {
            println!("  {} the fact was not retained (policy).", "✗".yellow());
            Ok(())
        }
        Err(KindredError::TamperDetected) => Err(KindredError::TamperDetected),
        Err(e) => {
            println!("  {}: {}", "Could not retain".yellow(), e);
            Ok(())
        }
    }
}

fn cmd_recall(orch: &CycleOrchestrator, query: &str) -> Result<(), KindredError> {
    match orch.recall_facts(query, 5) {
        Ok(hits) if hits.is_empty() => {
            println!("  Nothing retained matches '{}'.", query);
            Ok(())
        }
        Ok(hits) => {
            for hit in hits {
                println!("  • {}", hit);
            }
            Ok(())
        }
        Err(KindredError::TamperDetected) => Err(KindredError::TamperDetected),
        Err(e) => {
            println!("  {}: {}", "Could not recall".yellow(), e);
            Ok(())
        }
    }
}

fn cmd_violations(orch: &CycleOrchestrator) {
    let log = orch.violations();
    if log.is_empty() {
        println!("  The violation log is empty.");
        return;
    }
    println!();
    println!("{}", "Violation Log".bold().underline());
    for v in log {
        println!(
            "  [{}] {} ({}): {}",
            v.timestamp.format("%Y-%m-%d %H:%M:%S"),
            v.reason.yellow(),
            v.channel,
            v.content
        );
    }
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn short(fp: &Fingerprint) -> String {
    fp.as_str().chars().take(12).collect()
}

fn prompt_yes_no(msg: &str) -> bool {
    print!("{}", msg);
    io::stdout().flush().ok();
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}
