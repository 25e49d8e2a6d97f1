//! Binary entrypoint for the livemud CLI.
//!
//! Commands:
//! - `start [--bind <addr>]` - boot the engine and serve the TCP front end until Ctrl-C
//! - `init` - write a starter `config.toml`
//! - `status` - print room and player counts and who is marked online
//!
//! See the library crate docs for module-level details: `livemud::`.
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{debug, error, info, trace};
use tokio::net::TcpListener;

use livemud::config::Config;
use livemud::engine::Engine;
use livemud::frontend;
use livemud::metrics;

const METRICS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "livemud")]
#[command(about = "Live-session engine for a text-based multiplayer world")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the game server
    Start {
        /// Address to listen on (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// Show world and player status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { bind } => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            info!("Starting livemud v{}", env!("CARGO_PKG_VERSION"));
            run_server(config, bind).await?;
        }
        Commands::Init => {
            init_logging(&None, cli.verbose);
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            show_status(&config)?;
        }
    }

    Ok(())
}

async fn run_server(config: Config, bind: Option<String>) -> Result<()> {
    let engine = Engine::open(&config)?;
    engine.boot().await?;

    let addr = bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = TcpListener::bind(&addr).await?;
    info!("{} accepting players on {}", config.server.name, addr);

    let server = frontend::serve(listener, engine.clone(), config.server.protocol);
    let mut ticker = tokio::time::interval(METRICS_INTERVAL);
    tokio::pin!(server);

    loop {
        tokio::select! {
            result = &mut server => {
                if let Err(e) = result {
                    error!("front end stopped: {}", e);
                }
                break;
            }
            _ = ticker.tick() => log_metrics(&engine),
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }

    engine.shutdown().await?;
    info!("shutdown complete");
    Ok(())
}

fn log_metrics(engine: &Engine) {
    let snap = metrics::snapshot();
    debug!(
        "metrics: actors={} live={} commands ok={} failed={} crashed={} timed_out={} tx committed={} conflicts={} exhausted={}",
        engine.actor_count(),
        snap.actors_live(),
        snap.commands_completed,
        snap.commands_failed,
        snap.commands_crashed,
        snap.commands_timed_out,
        snap.tx_committed,
        snap.tx_conflicts,
        snap.tx_exhausted
    );
    for (label, counter) in metrics::command_counters_snapshot() {
        trace!("command {}: runs={} failures={}", label, counter.runs, counter.failures);
    }
}

fn show_status(config: &Config) -> Result<()> {
    let engine = Engine::open(config)?;
    let store = engine.store();
    let players = store.list_players()?;
    let online = store.online_players()?;
    println!("livemud v{}", env!("CARGO_PKG_VERSION"));
    println!("data dir: {}", config.storage.data_dir);
    println!("rooms:    {}", store.count_rooms()?);
    println!("players:  {}", players.len());
    println!("online:   {}", online.len());
    for player in online {
        println!(
            "  {} ({:?}, in {})",
            player.display_name, player.presence, player.current_room
        );
    }
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|cfg| cfg.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    if let Some(f) = file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Foreground runs also echo to the console.
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!(
                "{} [{}] {}: {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            );
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(
                fmt,
                "{} [{}] {}: {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
