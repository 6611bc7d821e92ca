//! `analytics`: track and deliver events from the command line.

use analytics_pipeline::config::secrets::ExposeSecret;
use analytics_pipeline::config::{Config, SinkConfig};
use analytics_pipeline::sink::{MemorySink, PgSink};
use analytics_pipeline::telemetry::{TelemetryConfig, init_telemetry};
use analytics_pipeline::{Analytics, DrainSummary, HostEnvironment, Properties};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "analytics", about = "Deliver analytics events to the configured sink")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the sink tables in Postgres
    Migrate,
    /// Track a single event and deliver it
    Track {
        /// Event type (e.g. "page_view", "signup_form_submission")
        event_type: String,
        /// JSON object of event properties
        #[arg(long)]
        props: Option<String>,
        /// Location reported with the event
        #[arg(long, default_value = "/")]
        path: String,
        /// Deliver to an in-memory sink instead of the configured one
        #[arg(long)]
        dry_run: bool,
    },
    /// Track every event in a JSON-lines file, then deliver them
    Replay {
        /// File with one `{"event_type": ..., "props": {...}}` object per line
        file: PathBuf,
        /// TOML file describing the host environment
        #[arg(long)]
        environment: Option<PathBuf>,
        /// Deliver to an in-memory sink instead of the configured one
        #[arg(long)]
        dry_run: bool,
    },
}

/// One line of a replay file.
#[derive(Debug, Deserialize)]
struct ReplayLine {
    event_type: String,
    #[serde(default)]
    props: Option<Properties>,
    #[serde(default)]
    path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "analytics".to_string(),
        log_level: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Migrate => cmd_migrate(&config).await,
        Command::Track {
            event_type,
            props,
            path,
            dry_run,
        } => cmd_track(&config, event_type, props, path, dry_run).await,
        Command::Replay {
            file,
            environment,
            dry_run,
        } => cmd_replay(&config, &file, environment.as_deref(), dry_run).await,
    }
}

async fn cmd_migrate(config: &Config) -> anyhow::Result<()> {
    let Some(SinkConfig::Postgres { url }) = &config.sink else {
        anyhow::bail!("migrate requires ANALYTICS_DATABASE_URL");
    };
    let sink = PgSink::connect(url.expose_secret()).await?;
    sink.migrate().await?;
    sink.health_check().await?;
    println!("Migrations applied.");
    Ok(())
}

async fn cmd_track(
    config: &Config,
    event_type: String,
    props: Option<String>,
    path: String,
    dry_run: bool,
) -> anyhow::Result<()> {
    let props = match props {
        Some(json) => Some(serde_json::from_str::<Properties>(&json)?),
        None => None,
    };

    let env = Arc::new(HostEnvironment::from_process());
    env.set_path(path);

    let analytics = start(config, env, dry_run).await?;
    analytics.track_event(&event_type, props);

    let summary = analytics.drain().await;
    report(&analytics, 1, summary)
}

async fn cmd_replay(
    config: &Config,
    file: &Path,
    environment: Option<&Path>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(file).await?;
    let env = Arc::new(match environment {
        Some(path) => HostEnvironment::from_toml_file(path)?,
        None => HostEnvironment::from_process(),
    });

    let analytics = start(config, Arc::clone(&env), dry_run).await?;

    let mut tracked = 0;
    for (n, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: ReplayLine = serde_json::from_str(line)
            .map_err(|e| anyhow::anyhow!("{}:{}: {e}", file.display(), n + 1))?;
        if let Some(path) = entry.path {
            env.set_path(path);
        }
        analytics.track_event(&entry.event_type, entry.props);
        tracked += 1;
    }

    let summary = analytics.drain().await;
    report(&analytics, tracked, summary)
}

async fn start(
    config: &Config,
    env: Arc<HostEnvironment>,
    dry_run: bool,
) -> anyhow::Result<Analytics> {
    let builder = Analytics::builder().environment(env).config(config.pipeline);
    let analytics = if dry_run {
        builder.sink(Arc::new(MemorySink::new())).start()
    } else {
        builder.start_from_env().await
    };

    if !analytics.is_enabled() {
        anyhow::bail!(
            "no analytics sink available; set ANALYTICS_DATABASE_URL or ANALYTICS_SINK_URL/ANALYTICS_SINK_KEY, or pass --dry-run"
        );
    }
    Ok(analytics)
}

fn report(analytics: &Analytics, tracked: usize, summary: DrainSummary) -> anyhow::Result<()> {
    let session = analytics
        .session_id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());

    println!("Session:    {session}");
    println!("Tracked:    {tracked} (+1 initial page view)");
    println!("Delivered:  {}", summary.delivered);
    println!("Remaining:  {}", summary.remaining);

    if summary.failed {
        anyhow::bail!("sink rejected a batch; {} event(s) not delivered", summary.remaining);
    }
    Ok(())
}
