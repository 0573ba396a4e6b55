mod events;
mod ui;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex};
use std::time::Duration;

use clap::Parser as ClapParser;
use color_eyre::eyre::{Result, WrapErr};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use events::AppEvent;
use fleetview::api::ApiClient;
use fleetview::app::App;
use fleetview::settings::Settings;
use fleetview::topology::{reconstruct, TopologySnapshot};

#[derive(ClapParser, Debug)]
#[command(name = "fleetview", about = "Terminal dashboard for a multi-agent orchestration backend")]
struct Cli {
    /// Backend base URL (overrides the settings file).
    #[arg(short, long)]
    base_url: Option<String>,

    /// Chat session to start in.
    #[arg(short, long)]
    session: Option<String>,

    /// Refresh topology and agents every N seconds (0 disables).
    #[arg(long)]
    poll_secs: Option<u64>,

    /// Settings file (defaults to <config dir>/fleetview/config.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write logs to this file. Filter with FLEETVIEW_LOG.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the agent topology to stdout instead of launching the TUI.
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    if let Some(session) = cli.session {
        settings.session = session;
    }
    if let Some(poll_secs) = cli.poll_secs {
        settings.poll_secs = poll_secs;
    }

    if let Some(ref path) = cli.log_file {
        init_logging(path)?;
    }
    info!(base_url = %settings.base_url, session = %settings.session, "starting");

    let runtime = Runtime::new().wrap_err("failed to start async runtime")?;
    let client = ApiClient::http(&settings.base_url)?;

    if cli.dump {
        let snapshot: TopologySnapshot = runtime.block_on(client.get_as("/topology"))?;
        dump_topology(&snapshot);
        return Ok(());
    }

    // Launch TUI.
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(&settings);
    let result = run_tui(&mut terminal, &mut app, &runtime, &client, &settings);

    // Restore terminal.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Send tracing output to `path`. Nothing is logged without a log file, since
/// stderr belongs to the terminal UI.
fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .wrap_err_with(|| format!("failed to create log file {}", path.display()))?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("FLEETVIEW_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn run_tui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    runtime: &Runtime,
    client: &ApiClient,
    settings: &Settings,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<AppEvent>();
    let handle = runtime.handle();

    events::spawn_key_reader(tx.clone());
    events::spawn_timer(tx.clone(), Duration::from_millis(250), || AppEvent::Tick);
    if let Some(interval) = settings.poll_interval() {
        events::spawn_timer(tx.clone(), interval, || AppEvent::Poll);
    }

    events::spawn_commands(handle, client, &tx, app.startup());

    loop {
        terminal.draw(|f| ui::render(f, app))?;

        let commands = match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(AppEvent::Key(key)) => app.handle_key(key),
            Ok(AppEvent::Outcome(outcome)) => app.apply(outcome),
            Ok(AppEvent::Poll) => app.poll(),
            Ok(AppEvent::Tick) | Err(mpsc::RecvTimeoutError::Timeout) => Vec::new(),
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };
        events::spawn_commands(handle, client, &tx, commands);

        if app.should_quit {
            break;
        }
    }

    info!("quit");
    Ok(())
}

fn dump_topology(snapshot: &TopologySnapshot) {
    let layout = reconstruct(snapshot);
    println!(
        "Topology: {} agents, {} shown, {} edges",
        snapshot.nodes.len(),
        layout.node_count(),
        layout.edges.len(),
    );
    println!();

    if snapshot.nodes.is_empty() {
        println!("  No agents active yet.");
    }
    for (depth, level) in layout.levels.iter().enumerate() {
        println!("  Level {depth}");
        for node in level {
            println!(
                "    {} [{}] {} task={} tokens={}",
                node.agent_id,
                node.role,
                node.status,
                node.task_label(),
                node.token_usage,
            );
        }
    }

    let hidden = layout.hidden_count(snapshot);
    if hidden > 0 {
        println!("  ({hidden} unreachable)");
    }

    if !layout.edges.is_empty() {
        println!();
        println!("  Edges");
        for edge in &layout.edges {
            println!("    {edge}");
        }
    }
}
