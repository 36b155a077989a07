//! simbridge CLI Client
//!
//! Drives a bridge server the way a simulation engine would.

use clap::{Parser, Subcommand};
use simbridge::{BridgeClient, Result};

/// simbridge CLI
#[derive(Parser, Debug)]
#[command(name = "simbridge-cli")]
#[command(about = "CLI for a simbridge co-simulation server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:1024")]
    server: String,

    /// Gain sent before the command
    #[arg(short, long, default_value = "1")]
    gain: i32,

    /// Instance name sent before the command
    #[arg(short, long)]
    instance: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate the instance output
    Eval {
        time: f64,
        input: f64,
        /// Output is zero unless enable > 0
        #[arg(default_value = "1")]
        enable: f64,
    },

    /// Ask for the maximum timestep
    MaxStep { time: f64 },

    /// Propose a timestep and print the server's answer
    Truncate {
        time: f64,
        input: f64,
        enable: f64,
        timestep: f64,
    },

    /// Print the port number the server reports for this connection
    Port,

    /// Run a full multi-step simulation lifecycle
    Simulate {
        /// Log file the server writes for this instance
        #[arg(short, long, default_value = "simbridge.log")]
        log: String,

        /// Number of steps
        #[arg(long, default_value = "2")]
        steps: i32,

        /// Input value fed to every evaluation
        #[arg(long, default_value = "1")]
        input: f64,
    },
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut client = BridgeClient::connect(args.server.as_str())?;
    client.set_gain(args.gain)?;
    if let Some(name) = &args.instance {
        client.set_instance_name(name)?;
    }

    match args.command {
        Commands::Eval {
            time,
            input,
            enable,
        } => println!("{}", client.evaluate(time, input, enable)?),
        Commands::MaxStep { time } => println!("{:e}", client.max_step_size(time)?),
        Commands::Truncate {
            time,
            input,
            enable,
            timestep,
        } => println!("{:e}", client.truncate(time, input, enable, timestep)?),
        Commands::Port => println!("{}", client.port_number()?),
        Commands::Simulate { log, steps, input } => {
            client.set_log_name(&log)?;
            for step in 1..=steps {
                client.set_step_number(step)?;
                client.initialize()?;
                let time = f64::from(step - 1);
                let output = client.evaluate(time, input, 1.0)?;
                println!("step {}: t={} out={}", step, time, output);
                if step == steps {
                    client.post_process()?;
                }
                client.destroy()?;
            }
        }
    }

    client.close_session()
}
