//! REPL – interactive shell over a booted [`HostRuntime`].
//!
//! Supported slash-commands:
//!   /help                           – show this list
//!   /features                       – print the current host feature set
//!   /reload                         – reload all subsystems
//!   /status                         – load state and capability cache
//!   /devices                        – list attached devices
//!   /plug <name> <subsystem> [major] – attach a simulated device
//!   /unplug <name>                  – detach a device
//!   /quit | /exit                   – leave the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hostcore_hal::{CgroupPolicy, PolicyMatcher};
use hostcore_runtime::{HostRuntime, StepOutcome};
use hostcore_types::{Device, PolicyGroup};
use tokio::runtime::Runtime;

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(rt: &Runtime, host: &mut HostRuntime, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "hostcore>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();

        match cmd {
            "/help" => cmd_help(),
            "/features" => print_features(host),
            "/reload" => cmd_reload(rt, host),
            "/status" => cmd_status(host),
            "/devices" => cmd_devices(host),
            "/plug" => cmd_plug(host, &args),
            "/unplug" => cmd_unplug(host, &args),
            "/quit" | "/exit" => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            other => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "hostcore Commands".bold().underline());
    println!("  {}                        – current host features", "/features".bold().cyan());
    println!("  {}                          – reload all subsystems", "/reload".bold().cyan());
    println!("  {}                          – load state and cache", "/status".bold().cyan());
    println!("  {}                         – list attached devices", "/devices".bold().cyan());
    println!("  {} – attach a simulated device", "/plug <name> <subsystem> [major]".bold().cyan());
    println!("  {}                  – detach a device", "/unplug <name>".bold().cyan());
    println!("  {}                    – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

pub fn print_features(host: &HostRuntime) {
    let features = host.manager.features();
    if features.is_empty() {
        println!("  Features: {}", "none".yellow());
        return;
    }
    let names: Vec<String> = features.iter().map(ToString::to_string).collect();
    println!("  Features: {}", names.join(", ").green());
}

fn cmd_reload(rt: &Runtime, host: &HostRuntime) {
    match rt.block_on(host.manager.reload()) {
        Ok(report) => {
            println!("{}", "Reload".bold().underline());
            for (step, outcome) in report.steps() {
                let shown = match outcome {
                    StepOutcome::Refreshed => outcome.to_string().green(),
                    StepOutcome::Skipped => outcome.to_string().dimmed(),
                    StepOutcome::Failed(_) => outcome.to_string().red(),
                };
                println!("  {:<10} {}", step, shown);
            }
            print_features(host);
        }
        Err(e) => println!("{}: {}", "Reload failed".red(), e),
    }
}

fn cmd_status(host: &HostRuntime) {
    let caps = host.manager.capabilities();
    println!("{}", "Status".bold().underline());
    println!("  Load state   : {:?}", host.manager.state());
    println!(
        "  Feature cache: {} ({} evaluation(s))",
        if caps.is_valid() { "valid".green() } else { "invalid".yellow() },
        caps.evaluations()
    );
    println!("  Devices      : {}", host.registry.len());
    println!("  Sound updates: {}", host.host.sound.update_count());
}

fn cmd_devices(host: &HostRuntime) {
    if host.registry.is_empty() {
        println!("  {}", "No devices attached.".dimmed());
        return;
    }
    for device in host.registry.devices() {
        let tag = if CgroupPolicy.is_match(PolicyGroup::Audio, device) {
            " [audio]".cyan().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} ({}) {}{}",
            device.name.bold(),
            device.subsystem,
            device.sysfs.display().to_string().dimmed(),
            tag
        );
    }
}

fn cmd_plug(host: &mut HostRuntime, args: &[&str]) {
    let (name, subsystem) = match args {
        [name, subsystem, ..] => (*name, *subsystem),
        _ => {
            println!("  Usage: /plug <name> <subsystem> [major]");
            return;
        }
    };
    let mut device = Device::new(name, format!("/sys/class/{subsystem}/{name}"), subsystem);
    if let Some(raw) = args.get(2) {
        match raw.parse::<u32>() {
            Ok(major) => device = device.with_numbers(major, 0),
            Err(_) => {
                println!("  {} '{}' is not a valid major number", "Warning:".yellow(), raw);
                return;
            }
        }
    }
    let notified = host.registry.add_device(device);
    println!("  {} {} attached ({} listener(s) notified)", "✓".green(), name.bold(), notified);
}

fn cmd_unplug(host: &mut HostRuntime, args: &[&str]) {
    let Some(name) = args.first() else {
        println!("  Usage: /unplug <name>");
        return;
    };
    let Some(sysfs) = host.registry.find_by_name(name).map(|d| d.sysfs.clone()) else {
        println!("  {} '{}'", "Unknown device:".red(), name.yellow());
        return;
    };
    match host.registry.remove_device(&sysfs) {
        Ok(device) => println!("  {} {} detached", "✓".green(), device.name.bold()),
        Err(e) => println!("  {}: {}", "Error".red(), e),
    }
}
