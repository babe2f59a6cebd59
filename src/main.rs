//! queuedesk - Shared-state ticket queue
//!
//! Main entry point for the queuedesk CLI.

use clap::{Parser, Subcommand};
use queuedesk::config::{validate_config_result, QueueConfig};
use queuedesk::ledger::{ActiveView, TicketLedger};
use queuedesk::model::{CompanyProfile, TicketId, WindowId};
use queuedesk::registry::{CompanySetup, WindowRegistry};
use queuedesk::server::QueueServer;
use queuedesk::store::{self, SharedStore};
use queuedesk::style;
use queuedesk::sync::{QueueEvent, QueueSnapshot, QueueSync, QueueSyncConfig};
use queuedesk::{notify, QueueError};
use std::future::Future;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// queuedesk - ticket queue for kiosks, operator consoles and public displays
#[derive(Parser, Debug)]
#[command(name = "queuedesk")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/queuedesk/config.yaml)
    #[arg(short, long, env = "QUEUEDESK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration and create the shared store
    Init,

    /// Serve the kiosk, console and display over HTTP
    Serve {
        /// Listen address (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Poll the queue and print the public board, chiming on new calls
    Display {
        /// Print the board once and exit
        #[arg(long)]
        once: bool,
    },

    /// Customer kiosk
    #[command(subcommand)]
    Kiosk(KioskCommands),

    /// Operator console
    #[command(subcommand)]
    Console(ConsoleCommands),

    /// Manage service-window categories
    #[command(subcommand)]
    Windows(WindowCommands),

    /// Company profile
    #[command(subcommand)]
    Company(CompanyCommands),

    /// Show store and queue status
    Status,
}

#[derive(Subcommand, Debug)]
enum KioskCommands {
    /// List categories a ticket can be taken for
    Categories,

    /// Take a ticket
    Take {
        /// Category name
        category: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConsoleCommands {
    /// Call a ticket to a window
    Call {
        /// Ticket id (e.g., T12)
        ticket_id: String,

        /// Window number
        window: i64,
    },

    /// List every retained ticket
    Tickets,

    /// List tickets past the most recent ones
    History,
}

#[derive(Subcommand, Debug)]
enum WindowCommands {
    /// Add a category
    Add {
        /// Category name (e.g., Cashier)
        name: String,

        /// Window number the category is served at
        #[arg(allow_negative_numbers = true)]
        window_number: i64,
    },

    /// Remove a category by id
    Remove {
        /// Category id
        id: String,
    },

    /// List categories
    List,
}

#[derive(Subcommand, Debug)]
enum CompanyCommands {
    /// Set the company profile
    Set {
        /// Company name
        name: String,

        /// Logo URL (http or https)
        #[arg(short, long, default_value = "")]
        logo: String,
    },

    /// Show the company profile
    Show,
}

fn main() {
    // Initialize logging
    if let Err(e) = queuedesk::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> queuedesk::Result<()> {
    // Handle init command first (creates config)
    if let Commands::Init = cli.command {
        return handle_init_command(cli.config);
    }

    let config = QueueConfig::resolve(cli.config.as_deref())?;
    validate_config_result(&config)?;

    let store = store::open(&config.store)?;
    tracing::debug!(backend = store.backend(), "Shared store opened");

    match cli.command {
        Commands::Serve { bind } => handle_serve(config, store, bind),
        Commands::Display { once } => handle_display(config, store, once),
        Commands::Kiosk(cmd) => handle_kiosk_command(cmd, &config, store),
        Commands::Console(cmd) => handle_console_command(cmd, &config, store),
        Commands::Windows(cmd) => handle_window_command(cmd, store),
        Commands::Company(cmd) => handle_company_command(cmd, store),
        Commands::Status => handle_status(&config, store),
        Commands::Init => unreachable!("Init is handled before the store is opened"),
    }
}

fn block_on<F: Future<Output = queuedesk::Result<()>>>(future: F) -> queuedesk::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(future)
}

fn handle_init_command(config_path: Option<PathBuf>) -> queuedesk::Result<()> {
    let config_file = config_path.unwrap_or_else(QueueConfig::default_path);

    let config = if config_file.exists() {
        println!("Configuration already exists at {}", config_file.display());
        QueueConfig::load(&config_file)?
    } else {
        let config = QueueConfig::new();
        config.save(&config_file)?;
        println!(
            "{} Created configuration at {}",
            style::success("✓"),
            style::path(&config_file.display().to_string())
        );
        config
    };

    let store = store::open(&config.store)?;
    println!("  Store: {} ({})", store.backend(), config.store.path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set the company name:   queuedesk company set \"Acme Bank\"");
    println!("  2. Add a service window:   queuedesk windows add Cashier 1");
    println!("  3. Start the surfaces:     queuedesk serve");
    Ok(())
}

fn handle_serve(
    config: QueueConfig,
    store: Arc<dyn SharedStore>,
    bind: Option<String>,
) -> queuedesk::Result<()> {
    let addr = bind.unwrap_or_else(|| config.server.bind.clone());

    let mut sync = QueueSync::new(QueueSyncConfig::from(&config), store.clone())
        .with_signal(notify::from_config(&config.notification));
    let commands = sync.command_sender();
    let server = QueueServer::new(store, &config).with_snapshot(sync.snapshot_handle());

    println!("Serving queuedesk on http://{}", addr);

    block_on(async move {
        let poller = tokio::spawn(async move { sync.run().await });

        let served = server.run(&addr).await;

        let _ = commands.send(queuedesk::sync::QueueCommand::Shutdown).await;
        match poller.await {
            Ok(result) => result?,
            Err(e) => tracing::warn!(error = %e, "Poll loop task failed"),
        }
        served
    })
}

fn handle_display(
    config: QueueConfig,
    store: Arc<dyn SharedStore>,
    once: bool,
) -> queuedesk::Result<()> {
    let company = CompanySetup::new(store.clone()).load()?;
    let policy = config.retention.clone();
    let mut sync = QueueSync::new(QueueSyncConfig::from(&config), store)
        .with_signal(notify::from_config(&config.notification));

    if once {
        sync.tick()?;
        print_board(&company, &sync.view(), &sync.snapshot());
        return Ok(());
    }

    let handle = sync.snapshot_handle();
    let mut events = sync.subscribe();

    block_on(async move {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(QueueEvent::TickCompleted { .. }) => {
                        let snapshot = match handle.read() {
                            Ok(guard) => guard.clone(),
                            Err(poisoned) => poisoned.into_inner().clone(),
                        };
                        let view = snapshot.view(&policy, chrono::Utc::now());
                        print_board(&company, &view, &snapshot);
                    }
                    Ok(QueueEvent::Error { message }) => {
                        eprintln!("{} {}", style::warning("Store unavailable:"), message);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Display fell behind the event stream");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        sync.run().await
    })
}

fn print_board(company: &CompanyProfile, view: &ActiveView, snapshot: &QueueSnapshot) {
    println!();
    println!(
        "{}  {}",
        style::header(company.display_name()),
        style::dim(&view.observed_at.format("%H:%M:%S").to_string())
    );
    if snapshot.is_stale() {
        println!("{}", style::warning("(showing last good view)"));
    }

    println!("{}", style::header("Now serving"));
    if view.called.is_empty() {
        println!("  {}", style::dim("-"));
    }
    for ticket in &view.called {
        println!("  {}", style::ticket_line(ticket));
    }

    println!("{}", style::header("Waiting"));
    if view.waiting.is_empty() {
        println!("  {}", style::dim("-"));
    }
    for ticket in &view.waiting {
        println!("  {}", style::ticket_line(ticket));
    }
}

fn handle_kiosk_command(
    cmd: KioskCommands,
    config: &QueueConfig,
    store: Arc<dyn SharedStore>,
) -> queuedesk::Result<()> {
    let registry = WindowRegistry::new(store.clone());

    match cmd {
        KioskCommands::Categories => {
            let windows = registry.list()?;
            if windows.is_empty() {
                println!("No categories configured");
                return Ok(());
            }
            for window in windows {
                println!("  {}", window.name);
            }
        }

        KioskCommands::Take { category } => {
            let category = registry.find_by_name(&category)?.ok_or_else(|| {
                QueueError::InvalidInput(format!("unknown category: {}", category.trim()))
            })?;
            let ledger = TicketLedger::new(store).with_policy(config.retention.clone());
            let ticket = ledger.create(&category.name)?;

            println!("Your ticket: {}", style::ticket_id(&ticket));
            println!("  {}", style::dim(&category.name));
        }
    }

    Ok(())
}

fn handle_console_command(
    cmd: ConsoleCommands,
    config: &QueueConfig,
    store: Arc<dyn SharedStore>,
) -> queuedesk::Result<()> {
    let ledger = TicketLedger::new(store).with_policy(config.retention.clone());

    match cmd {
        ConsoleCommands::Call { ticket_id, window } => {
            let ticket_id = TicketId::new(ticket_id.trim());
            if ledger.get(&ticket_id)?.is_none() {
                return Err(QueueError::TicketNotFound(ticket_id.to_string()));
            }
            let window = u32::try_from(window).ok().filter(|w| *w > 0).ok_or_else(|| {
                QueueError::InvalidInput(format!(
                    "window must be a positive integer, got {}",
                    window
                ))
            })?;
            let ledger = ledger.with_signal(notify::from_config(&config.notification));
            let ticket = ledger.call(&ticket_id, window)?;
            println!("{}", style::ticket_line(&ticket));
        }

        ConsoleCommands::Tickets => {
            let tickets = ledger.tickets()?;
            if tickets.is_empty() {
                println!("No tickets");
                return Ok(());
            }
            println!("Tickets ({}):", style::count(tickets.len()));
            for ticket in &tickets {
                println!(
                    "  {}  {}",
                    style::ticket_line(ticket),
                    style::status_style(ticket.status)
                );
            }
        }

        ConsoleCommands::History => {
            let tickets = ledger.history_view()?;
            if tickets.is_empty() {
                println!("No history yet");
                return Ok(());
            }
            for ticket in &tickets {
                println!(
                    "  {}  {}",
                    style::ticket_line(ticket),
                    style::dim(&ticket.created_at.format("%Y-%m-%d %H:%M:%S").to_string())
                );
            }
        }
    }

    Ok(())
}

fn handle_window_command(cmd: WindowCommands, store: Arc<dyn SharedStore>) -> queuedesk::Result<()> {
    let registry = WindowRegistry::new(store);

    match cmd {
        WindowCommands::Add {
            name,
            window_number,
        } => {
            let category = registry.add(&name, window_number)?;
            println!(
                "Added '{}' at window {} (id {})",
                category.name, category.window_number, category.id
            );
        }

        WindowCommands::Remove { id } => {
            if registry.remove(&WindowId::new(id.as_str()))? {
                println!("Removed category {}", id);
            } else {
                println!("Category {} not found", id);
            }
        }

        WindowCommands::List => {
            let windows = registry.list()?;
            if windows.is_empty() {
                println!("No categories configured");
                return Ok(());
            }
            println!("Categories ({}):", style::count(windows.len()));
            for window in windows {
                println!(
                    "  {}  window {}  {}",
                    window.name,
                    window.window_number,
                    style::dim(window.id.as_str())
                );
            }
        }
    }

    Ok(())
}

fn handle_company_command(
    cmd: CompanyCommands,
    store: Arc<dyn SharedStore>,
) -> queuedesk::Result<()> {
    let setup = CompanySetup::new(store);

    match cmd {
        CompanyCommands::Set { name, logo } => {
            let profile = setup.save(CompanyProfile::new(name, logo))?;
            println!("{} Company set to {}", style::success("✓"), profile.name);
        }

        CompanyCommands::Show => {
            if !setup.is_configured()? {
                println!("Company not configured");
                return Ok(());
            }
            let profile = setup.load()?;
            println!("{}", style::header(&profile.name));
            if !profile.logo_url.is_empty() {
                println!("  Logo: {}", profile.logo_url);
            }
        }
    }

    Ok(())
}

fn handle_status(config: &QueueConfig, store: Arc<dyn SharedStore>) -> queuedesk::Result<()> {
    let ledger = TicketLedger::new(store.clone()).with_policy(config.retention.clone());
    let summary = ledger.summary()?;
    let windows = WindowRegistry::new(store.clone()).list()?;
    let company = CompanySetup::new(store.clone()).load()?;

    println!("{}", style::header(company.display_name()));
    println!("  Store:      {}", store.backend());
    if store.backend() == "sqlite" {
        println!(
            "  Path:       {}",
            style::path(&config.store.path.display().to_string())
        );
    }
    println!("  Waiting:    {}", style::count(summary.waiting));
    println!("  Called:     {}", style::count(summary.called));
    println!("  Retained:   {} of {}", summary.retained, config.retention.max_retained);
    println!("  Next:       {}", TicketId::from_number(summary.next_number));
    println!("  Categories: {}", style::count(windows.len()));

    Ok(())
}
