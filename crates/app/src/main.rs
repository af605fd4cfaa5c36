//! icb - terminal client for ICB chat servers
//!
//! Reads lines from stdin and prints session events to stdout. Logs go to
//! stderr.

use clap::Parser;
use icb_core::ServerConfig;
use icb_net::{Client, Event};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod input;
mod render;

use input::Input;

fn main() {
    let args = cli::Args::parse();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("icb: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| args.log_filter(&config).and_then(|f| EnvFilter::try_new(f).ok()))
        .unwrap_or_else(|| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let server = match args.server_config(&config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Invalid server configuration: {}", e);
            eprintln!("icb: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(address = %server.socket_addr(), nick = %server.nick, "Starting icb");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(server)) {
        tracing::error!("Session failed: {}", e);
        eprintln!("icb: {}", e);
        std::process::exit(1);
    }
}

async fn run(server: ServerConfig) -> icb_net::Result<()> {
    let mut client = Client::connect(server).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = client.next_event() => {
                let Some(event) = event else { break };
                if let Some(line) = render::render(&event) {
                    println!("{}", line);
                }
                if matches!(event, Event::Disconnected { .. }) {
                    break;
                }
            }

            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        if let Some(feedback) = handle_line(&client, &line).await {
                            println!("{}", feedback);
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("stdin closed");
                        stdin_open = false;
                        client.disconnect().await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read stdin");
                        stdin_open = false;
                        client.disconnect().await;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Act on one typed line. Returns an error line to show, if any.
async fn handle_line(client: &Client, line: &str) -> Option<String> {
    let result = match input::parse(line) {
        Ok(Some(input)) => send(client, input).await,
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };
    result.err().map(|e| format!("! {}", e))
}

async fn send(client: &Client, input: Input) -> icb_net::Result<()> {
    match input {
        Input::Open(text) => client.send_open(&text).await,
        Input::Private { target, text } => client.send_private(&target, &text).await,
        Input::Command { name, args } => client.command(&name, &args, None).await,
        Input::Who(args) => client.who(&args).await,
        Input::Nick(nick) => client.change_nick(&nick).await,
        Input::Group(group) => client.change_group(&group).await,
        Input::Boot(args) => client.boot(&args).await,
        Input::Beep(nick) => client.beep(&nick).await,
        Input::Ping(id) => client.ping(&id).await,
        Input::Quit => {
            client.disconnect().await;
            Ok(())
        }
    }
}
