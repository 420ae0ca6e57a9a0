//! rho - chat with your documents from the terminal

mod commands;
mod config;
mod utils;

use clap::Parser;
use std::io::{self, Write};
use std::sync::Arc;

use rho_api::{ApiClient, ClientConfig, ConversationId};
use rho_session::{Client, HttpTransport, SendOutcome, SessionEvent};
use tokio::task::JoinHandle;

/// rho - document-grounded chat
#[derive(Parser, Debug)]
#[command(name = "rho")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Conversation to open
    #[arg(long)]
    conversation: Option<ConversationId>,

    /// Backend API base URL (default: http://localhost:8000/api/v1)
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token (default: from config or RHO_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Ask a single question and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("rho=debug")
            .with_writer(io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();

    // Merge config with CLI args (CLI takes precedence)
    let base_url = args
        .base_url
        .or(cfg.base_url.clone())
        .unwrap_or_else(|| rho_api::client::DEFAULT_BASE_URL.to_string());

    let Some(token) = args.token.or_else(|| cfg.token()) else {
        eprintln!("Error: No access token found");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  1. Set it in the environment: export RHO_TOKEN=your-token");
        eprintln!("  2. Pass it on the command line: rho --token your-token");
        eprintln!("  3. Add it to the config file: rho --init-config");
        std::process::exit(1);
    };

    let api = ApiClient::new(ClientConfig {
        base_url,
        token,
        ..ClientConfig::default()
    })?;
    tracing::debug!("Using backend at {}", api.base_url());

    let transport = Arc::new(HttpTransport::new(api));
    let mut client = Client::new(transport, cfg.session_config());

    let conversation = args
        .conversation
        .or(cfg.default_conversation.map(ConversationId));

    // Non-interactive mode
    if let Some(command) = args.command {
        let Some(conversation) = conversation else {
            anyhow::bail!("--conversation is required with -c");
        };
        return run_command(&mut client, conversation, &command).await;
    }

    run_interactive(&mut client, conversation).await
}

/// Print session events as they arrive
fn spawn_printer(client: &Client) -> JoinHandle<()> {
    let mut receiver = client.subscribe();
    let is_tty = std::io::IsTerminal::is_terminal(&io::stderr());

    tokio::spawn(async move {
        let mut last_status = None;
        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event printer lagged by {} events", n);
                    continue;
                }
                Err(_) => break,
            };

            match event {
                SessionEvent::Fragment { delta, .. } => {
                    print!("{}", delta);
                    io::stdout().flush().ok();
                }
                SessionEvent::ExchangeEnd { outcome, .. } => match outcome {
                    SendOutcome::Completed => println!(),
                    SendOutcome::Cancelled => println!("\n[stopped]"),
                    SendOutcome::Failed(reason) => {
                        println!();
                        eprintln!("Error: {}", reason);
                    }
                    SendOutcome::Rejected(_) => {}
                },
                SessionEvent::ReadinessChanged { status, .. } => {
                    if is_tty && last_status.as_ref() != Some(&status) {
                        eprintln!("[documents: {}]", utils::readiness_str(&status));
                    }
                    last_status = Some(status);
                }
                SessionEvent::ConversationClosed { .. } => last_status = None,
                SessionEvent::HistoryLoaded { count, .. } if is_tty && count > 0 => {
                    eprintln!("[{} earlier messages]", count);
                }
                _ => {}
            }
        }
    })
}

/// Send a question; Ctrl-C stops the answer instead of killing the process.
async fn send_interruptible(client: &mut Client, text: &str) -> SendOutcome {
    let handle = client.handle();
    let send = client.send(text);
    tokio::pin!(send);

    loop {
        tokio::select! {
            outcome = &mut send => return outcome,
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                    return send.await;
                }
                if let Some(ref handle) = handle {
                    handle.stop();
                }
            }
        }
    }
}

async fn open(client: &mut Client, conversation: ConversationId) {
    if let Err(e) = client.select(conversation).await {
        eprintln!(
            "Warning: could not load history of conversation {}: {}",
            conversation, e
        );
    }
}

async fn run_command(
    client: &mut Client,
    conversation: ConversationId,
    command: &str,
) -> anyhow::Result<()> {
    let printer = spawn_printer(client);
    open(client, conversation).await;

    let settled = client.wait_settled().await;
    if let Some(reason) = utils::unqueryable_reason(settled.as_ref()) {
        anyhow::bail!("Conversation {}: {}", conversation, reason);
    }

    println!("rho> {}", command);
    println!();

    let outcome = send_interruptible(client, command).await;

    // Wait a bit for final events
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    printer.abort();

    match outcome {
        SendOutcome::Completed | SendOutcome::Cancelled => Ok(()),
        SendOutcome::Rejected(reason) => anyhow::bail!("{}", utils::rejection_str(&reason)),
        SendOutcome::Failed(reason) => anyhow::bail!("{}", reason),
    }
}

async fn run_interactive(
    client: &mut Client,
    conversation: Option<ConversationId>,
) -> anyhow::Result<()> {
    let printer = spawn_printer(client);

    if std::io::IsTerminal::is_terminal(&io::stderr()) {
        eprintln!("rho - type /help for commands");
        eprintln!();
    }

    if let Some(id) = conversation {
        open(client, id).await;
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim_end_matches(['\r', '\n']);
        if input.trim().is_empty() {
            continue;
        }

        // Handle slash commands
        if let Some(result) = commands::execute_command(input, client) {
            match result {
                commands::CommandResult::Open(id) => {
                    open(client, id).await;
                    println!("Opened conversation {}.", id);
                }
                commands::CommandResult::Close => {
                    client.deselect();
                    println!("Closed conversation.");
                }
                commands::CommandResult::Reload => match client.reload_history().await {
                    Ok(count) => println!("Loaded {} messages.", count),
                    Err(e) => println!("Reload failed: {}", e),
                },
                commands::CommandResult::Message(msg) => {
                    println!("{}", msg);
                }
                commands::CommandResult::Exit => {
                    break;
                }
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        println!();
        if let SendOutcome::Rejected(reason) = send_interruptible(client, input).await {
            println!("{}", utils::rejection_str(&reason));
        }
        println!();
    }

    client.deselect();
    printer.abort();
    Ok(())
}
