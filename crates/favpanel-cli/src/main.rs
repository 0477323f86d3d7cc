// favpanel entry point.
//
// `preview` fetches one profile's yearly listing and prints the panel.
// `replay` runs the engine against the in-memory host page, navigating
// between profiles the way the site's client-side router does.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{error, info};

use favpanel_app::{Engine, FetchCoordinator, HostEvent, HttpListingSource, ListingSource, RunOutcome};
use favpanel_core::config::{self, Config};
use favpanel_core::dom::{DomPage, SharedDom};
use favpanel_core::render::PanelRenderer;

#[derive(Parser)]
#[command(name = "favpanel")]
#[command(about = "Yearly favourite games panel for Backloggd profiles")]
struct Cli {
    #[arg(short = 'c', long, global = true, help = "Path to config file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a profile's listing and print the rendered panel
    Preview {
        #[arg(help = "Profile id, as in /u/{id}/")]
        profile: String,
        #[arg(long, help = "Print the parsed games as JSON instead of HTML")]
        json: bool,
    },
    /// Navigate the in-memory host page through profiles with the engine running
    Replay {
        #[arg(required = true, help = "Profile ids to visit, in order")]
        profiles: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref()).context("failed to load configuration")?;
    info!(
        "Config loaded: {} (year {}, categories {})",
        config.site.base_url, config.site.year, config.site.categories
    );

    let source: Arc<dyn ListingSource> = Arc::new(
        HttpListingSource::new(config.timing.request_timeout).context("failed to build HTTP client")?,
    );

    match cli.command {
        Commands::Preview { profile, json } => preview(&config, source, &profile, json).await,
        Commands::Replay { profiles } => {
            LocalSet::new()
                .run_until(replay(&config, source, &profiles))
                .await
        }
    }
}

async fn preview(
    config: &Config,
    source: Arc<dyn ListingSource>,
    profile: &str,
    json: bool,
) -> anyhow::Result<()> {
    let fetcher = FetchCoordinator::new(source, config.site.clone());
    let games = fetcher
        .fetch_now(profile)
        .await
        .with_context(|| format!("failed to fetch listing for {profile}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&games)?);
        return Ok(());
    }

    if games.is_empty() {
        eprintln!("{profile} has no rated games from {}", config.site.year);
        return Ok(());
    }

    let fragment = PanelRenderer::new(config.site.clone()).render(profile, &games);
    println!("{}", fragment.html);
    Ok(())
}

async fn replay(config: &Config, source: Arc<dyn ListingSource>, profiles: &[String]) -> anyhow::Result<()> {
    let mut page = DomPage::new("/");
    page.mount_app_root().context("failed to set up host page")?;
    let dom = SharedDom::new(page);

    let (host_tx, host_rx) = mpsc::channel(64);
    let (outcome_tx, mut outcome_rx) = mpsc::channel(64);
    let engine = Engine::new(dom.clone(), config, source, outcome_tx);
    let engine = tokio::task::spawn_local(engine.run(host_rx));

    // Long enough for the request plus the whole mount retry budget.
    let wait = config.timing.request_timeout
        + config.timing.debounce
        + config.timing.mount_retry * config.timing.mount_retry_limit
        + Duration::from_secs(1);

    for profile in profiles {
        let path = format!("/u/{profile}/");
        dom.with_mut(|p| p.navigate(&path));
        host_tx.send(HostEvent::HistoryPush).await?;
        dom.with_mut(|p| p.render_profile()).context("failed to render profile view")?;
        host_tx.send(HostEvent::Mutation).await?;

        loop {
            let outcome = tokio::time::timeout(wait, outcome_rx.recv())
                .await
                .with_context(|| format!("no outcome for {profile}"))?
                .context("engine stopped unexpectedly")?;
            println!("{path}: {}", describe(&outcome));
            if outcome != RunOutcome::Busy {
                break;
            }
        }
    }

    host_tx.send(HostEvent::Shutdown).await?;
    let dom = match engine.await {
        Ok(result) => result?,
        Err(e) => {
            error!("Engine task failed: {}", e);
            return Err(e.into());
        }
    };

    for html in dom.with(|p| p.fragment_html()) {
        println!("{html}");
    }
    Ok(())
}

fn describe(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Mounted { cards, generation, .. } => {
            format!("mounted {cards} games (run {generation})")
        }
        RunOutcome::Busy => "skipped, run in progress".into(),
        RunOutcome::NoProfile => "not a profile page".into(),
        RunOutcome::Empty { .. } => "nothing to show".into(),
        RunOutcome::Stale { .. } => "left the profile before mounting".into(),
        RunOutcome::MountTimeout { .. } => "profile view never finished rendering".into(),
        RunOutcome::Aborted { reason, .. } => format!("mount failed: {reason}"),
    }
}

/// Initialize tracing to stderr so stdout carries only command output.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("favpanel=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    Ok(())
}
