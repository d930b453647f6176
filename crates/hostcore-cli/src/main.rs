//! `hostcore-cli` – hostcore Command Line Interface
//!
//! This binary drives the host capability core against a simulated host.
//! It:
//!
//! 1. Loads `~/.hostcore/config.toml`, writing the defaults on first run.
//! 2. Boots the host runtime: event bus, hardware registry, simulated host,
//!    and the host manager's startup sequence.
//! 3. Drops the user into an **interactive REPL** to inspect features,
//!    trigger reloads and simulate hot-plug events.
//! 4. Intercepts **Ctrl-C** to leave the REPL cleanly.

mod config;
mod repl;

use colored::Colorize;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use hostcore_runtime::HostRuntime;

fn main() {
    let _telemetry = hostcore_runtime::init_tracing("hostcore");

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => first_run(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    print!("  Booting host runtime … ");
    std::io::stdout().flush().ok();
    let mut host = rt.block_on(HostRuntime::boot(&cfg.host, cfg.bus_capacity));
    println!("{}", "OK".green());
    repl::print_features(&host);

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(&rt, &mut host, shutdown);
}

fn first_run() -> config::Config {
    let cfg = config::Config::default();
    match config::save(&cfg) {
        Ok(()) => println!(
            "  {} No config found, defaults written to {}",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

fn print_banner() {
    println!();
    println!("  {} {}",
        "hostcore".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Host capability supervisor");
    println!();
}
