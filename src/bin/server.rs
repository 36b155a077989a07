//! simbridge Server Binary
//!
//! Starts the co-simulation bridge on the given port.

use std::io::BufRead;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use simbridge::network::SessionRegistry;
use simbridge::{Config, FaultPolicy, Server, ServerMode, ShutdownSignal};
use tracing_subscriber::{fmt, EnvFilter};

/// simbridge Server
#[derive(Parser, Debug)]
#[command(name = "simbridge-server")]
#[command(about = "Co-simulation bridge server (one session per simulated instance)")]
#[command(version)]
struct Args {
    /// Port to listen on
    port: Option<String>,

    /// Serve a single instance and exit when its session ends
    #[arg(long)]
    single: bool,

    /// Shut the whole server down when any session sends a bad message
    #[arg(long)]
    fail_fast: bool,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Accept/read polling interval in milliseconds
    #[arg(long, default_value = "1000")]
    poll_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,simbridge=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    // A missing or invalid port is not an error: print usage and leave
    let port = match args.port.as_deref().map(str::parse::<u16>) {
        Some(Ok(port)) => port,
        Some(Err(_)) => {
            eprintln!(
                "Invalid port \"{}\" -- canceling server start.",
                args.port.as_deref().unwrap_or_default()
            );
            print_usage();
            return;
        }
        None => {
            print_usage();
            return;
        }
    };

    tracing::info!("simbridge Server v{}", simbridge::VERSION);

    let config = Config::builder()
        .port(port)
        .max_connections(args.max_connections)
        .poll_interval_ms(args.poll_ms)
        .mode(if args.single {
            ServerMode::Single
        } else {
            ServerMode::Multi
        })
        .fault_policy(if args.fail_fast {
            FaultPolicy::ShutdownServer
        } else {
            FaultPolicy::IsolateSession
        })
        .build();

    let mut server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    watch_console(server.shutdown_signal(), server.registry());
    tracing::info!("Type \"quit\" and press Enter to stop");

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server shutdown complete");
}

fn print_usage() {
    println!("{}", Args::command().render_usage());
}

/// Trip the shutdown signal when the console sends "quit"
///
/// End of input is ignored so the server keeps running when started
/// without a console.
fn watch_console(shutdown: ShutdownSignal, registry: Arc<SessionRegistry>) {
    let spawned = std::thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if matches!(line.trim(), "q" | "quit") {
                    tracing::info!(
                        "Shutdown requested from console ({} session(s) open)",
                        registry.len()
                    );
                    shutdown.trigger();
                    break;
                }
            }
        });

    if let Err(e) = spawned {
        tracing::warn!("Console watcher unavailable: {}", e);
    }
}
