/// Lyre - command-line player for bundled catalogs
use clap::{Parser, Subcommand};
use lyre_core::{CatalogSource, StaticCatalog, Track};
use lyre_cli::{activator::LogActivator, config::AppConfig, manifest, shell::Shell};
use lyre_playback::{
    BundleResolver, InterruptionCoordinator, PlaybackEvent, Player, SignalBus, SimulatedBackend,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lyre")]
#[command(about = "Play tracks from a bundled catalog", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./lyre.toml if present)
    #[arg(short, long, global = true, env = "LYRE_CONFIG")]
    config: Option<PathBuf>,

    /// Print catalog listings as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every track in the bundle
    List,
    /// Search the bundle by title, artist or album
    Search {
        /// Text to look for
        query: String,
    },
    /// Start the interactive player
    Shell,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    config.validate()?;
    let catalog = manifest::load_catalog(&config.manifest_path())?;
    tracing::info!(
        root = %config.bundle.root.display(),
        tracks = catalog.len(),
        "Bundle loaded"
    );

    match cli.command {
        Commands::List => {
            let tracks = catalog.fetch().await?;
            print_tracks(&tracks, cli.json)?;
        }
        Commands::Search { query } => {
            let tracks = catalog.search(&query).await?;
            print_tracks(&tracks, cli.json)?;
        }
        Commands::Shell => {
            run_shell(config, catalog).await?;
        }
    }

    Ok(())
}

fn print_tracks(tracks: &[Track], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(tracks)?);
        return Ok(());
    }

    for track in tracks {
        println!(
            "{:<16} {:<10} {:>5}s  {} - {}",
            track.id(),
            track.source_kind().to_string(),
            track.duration().as_secs(),
            track.artist(),
            track.title()
        );
    }
    Ok(())
}

async fn run_shell(config: AppConfig, catalog: StaticCatalog) -> anyhow::Result<()> {
    let resolver = BundleResolver::new(&config.bundle.root, SimulatedBackend::new())
        .with_extensions(config.bundle.extensions.clone());
    let player = Player::spawn(Arc::new(resolver), config.playback.clone());

    let bus = SignalBus::new();
    let coordinator = InterruptionCoordinator::spawn(&bus, player.clone(), Arc::new(LogActivator));

    // Surface playback transitions in the log
    let mut events = player.subscribe_events();
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PlaybackEvent::PositionUpdate { .. }) => {}
                Ok(PlaybackEvent::Error { message }) => tracing::warn!(%message, "Playback error"),
                Ok(other) => tracing::info!(event = ?other, "Playback event"),
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "Event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let shell =
        Shell::new(player.clone(), catalog, bus).with_signal_acks(coordinator.handled_signals());
    let mut stdout = std::io::stdout();
    shell.run(BufReader::new(tokio::io::stdin()), &mut stdout).await?;

    drop(coordinator);
    player.shutdown().await?;
    event_log.abort();

    tracing::info!("Player shut down");
    Ok(())
}
