//! `needlelog` command-line client.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use needlelog_client::{
    friendly_message, ClientConfig, FormController, FormStep, OfflineQueue, RequestClient,
    SubmitError, SubmitOutcome, SyncEvent, SyncWorker,
};
use needlelog_core::{Field, IncidentRecord};
use needlelog_observability::LogFormat;
use serde_json::Value;
use tracing::info;

#[derive(Parser)]
#[command(name = "needlelog")]
#[command(about = "Needle break logger client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file
    #[arg(short, long, env = "NEEDLELOG_CONFIG")]
    config: Option<PathBuf>,

    /// Backend endpoint (overrides config and NEEDLELOG_ENDPOINT)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the backend answers
    Test,
    /// Submit one entry
    Submit {
        /// Entry as a JSON object with camelCase keys, or a positional array
        #[arg(long)]
        record: String,
        /// Photo of the broken needle (PNG or JPEG)
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// List entries recorded for a date
    List {
        /// Date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Show requests waiting in the offline queue
    Queue,
    /// Replay the offline queue once
    Sync,
    /// Keep syncing in the background until Ctrl+C
    Watch,
}

struct Session {
    config: ClientConfig,
    queue: OfflineQueue,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let mut config = ClientConfig::load(cli.config.as_deref())?;
        if let Some(endpoint) = &cli.endpoint {
            config.endpoint = Some(endpoint.clone());
        }

        let queue = match &config.queue_path {
            Some(path) => OfflineQueue::open(path, config.queue_capacity),
            None => OfflineQueue::open_default(config.queue_capacity)?,
        };

        Ok(Self { config, queue })
    }

    /// Only commands that reach the backend need an endpoint.
    fn client(&self) -> Result<Arc<RequestClient>> {
        let endpoint = self.config.endpoint()?.to_string();
        Ok(Arc::new(RequestClient::http(
            endpoint,
            self.config.token.clone(),
            self.config.retry_policy(),
        )?))
    }

    fn form(&self) -> Result<FormController> {
        Ok(FormController::new(self.client()?, self.queue.clone())
            .with_attachment_limits(self.config.attachment_limits()))
    }

    fn worker(&self) -> Result<SyncWorker> {
        Ok(SyncWorker::new(self.client()?, self.queue.clone()).with_interval(self.config.sync_interval()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_logs { LogFormat::Json } else { LogFormat::Pretty };
    needlelog_observability::init_with(format, &cli.log_level);

    let session = Session::open(&cli)?;

    match cli.command {
        Commands::Test => run_test(&session).await,
        Commands::Submit { record, image } => run_submit(&session, &record, image).await,
        Commands::List { date } => run_list(&session, date).await,
        Commands::Queue => run_queue(&session).await,
        Commands::Sync => run_sync(&session).await,
        Commands::Watch => run_watch(&session).await,
    }
}

async fn run_test(session: &Session) -> Result<()> {
    match session.form()?.test_connection().await {
        Ok(result) if result.success => {
            println!("ok: {}", result.message);
            if let Some(data) = result.data {
                println!("{}", serde_json::to_string_pretty(&data)?);
            }
            Ok(())
        }
        Ok(result) => bail!("backend answered but reported failure: {}", result.message),
        Err(err) => bail!(friendly_message(&err)),
    }
}

async fn run_submit(session: &Session, record: &str, image: Option<PathBuf>) -> Result<()> {
    let form = session.form()?;
    fill_form(&form, record)?;
    if let Some(path) = image {
        form.attach_image(&path)
            .await
            .with_context(|| format!("cannot attach {}", path.display()))?;
    }

    match form.submit().await {
        Ok(SubmitOutcome::Delivered { result, .. }) => {
            println!("{}", result.message);
            Ok(())
        }
        Ok(SubmitOutcome::Queued { entry_id, error, .. }) => {
            println!(
                "{}\nSaved offline as {entry_id}; run `needlelog sync` once the backend is reachable.",
                friendly_message(&SubmitError::Request(error))
            );
            Ok(())
        }
        Err(err) => bail!(friendly_message(&err)),
    }
}

/// Copy values from a JSON object (camelCase keys) or positional array into the form.
fn fill_form(form: &FormController, raw: &str) -> Result<()> {
    let value: Value = serde_json::from_str(raw).context("--record is not valid JSON")?;
    match value {
        Value::Array(_) => {
            let record: IncidentRecord = serde_json::from_value(value)?;
            for step in FormStep::ALL {
                if step != FormStep::Image {
                    form.set_value(step, record.get(step.field()))?;
                }
            }
        }
        Value::Object(map) => {
            for step in FormStep::ALL {
                if step == FormStep::Image {
                    continue;
                }
                match map.get(step.field().key()) {
                    Some(Value::String(s)) => form.set_value(step, s.clone())?,
                    Some(Value::Null) | None => {}
                    Some(other) => form.set_value(step, other.to_string())?,
                }
            }
            if let Some(key) = map.keys().find(|k| {
                !FormStep::ALL.iter().any(|s| s.field().key() == k.as_str())
                    && k.as_str() != Field::Timestamp.key()
            }) {
                tracing::warn!(key = %key, "ignoring unknown record key");
            }
        }
        _ => bail!("--record must be a JSON object or array"),
    }
    Ok(())
}

async fn run_list(session: &Session, date: Option<String>) -> Result<()> {
    let date = date.unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());
    let rows = session
        .form()?
        .load_submissions(&date)
        .await
        .map_err(|e| anyhow::anyhow!(friendly_message(&e)))?;

    if rows.is_empty() {
        println!("No submissions for {date}");
        return Ok(());
    }
    println!("{} submission(s) for {date}", rows.len());
    for row in rows {
        println!(
            "{}  {}  machine {}  line {}  {}  operator {}",
            row.get(Field::Time),
            row.get(Field::Department),
            row.get(Field::MachineNo),
            row.get(Field::LineNo),
            row.get(Field::NeedleType),
            row.get(Field::Operator),
        );
    }
    Ok(())
}

async fn run_queue(session: &Session) -> Result<()> {
    let scan = session.queue.scan().await?;
    if scan.entries.is_empty() && scan.corrupt.is_empty() {
        println!("Offline queue is empty");
        return Ok(());
    }
    for entry in scan.entries {
        println!(
            "{}  {}  {}  -> {}",
            entry.id,
            entry.created_at.to_rfc3339(),
            entry.action(),
            entry.endpoint
        );
    }
    for bad in scan.corrupt {
        println!("{}  unreadable: {}", bad.id, bad.error);
    }
    Ok(())
}

async fn run_sync(session: &Session) -> Result<()> {
    let report = session.worker()?.drain().await?;
    println!(
        "synced {} of {} ({} still queued)",
        report.synced, report.total, report.failed
    );
    Ok(())
}

async fn run_watch(session: &Session) -> Result<()> {
    let worker = session.worker()?;
    let mut events = worker.subscribe();
    let handle = worker.start();

    info!("watching offline queue; press Ctrl+C to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(SyncEvent::Completed(report)) if report.total > 0 => {
                    println!("synced {} of {}", report.synced, report.total);
                }
                Ok(SyncEvent::Connectivity { state }) => println!("connectivity: {state:?}"),
                Ok(SyncEvent::Failed { error }) => eprintln!("sync failed: {error}"),
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    worker.shutdown();
    handle.await.context("sync worker task failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn local_queue_listing_needs_no_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("needlelog.json");
        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(
            file,
            r#"{{"queuePath":{}}}"#,
            serde_json::to_string(&dir.path().join("offline.db")).unwrap()
        )
        .unwrap();

        let cli = Cli::try_parse_from(["needlelog", "--config", config_path.to_str().unwrap(), "queue"]).unwrap();
        let session = Session::open(&cli).unwrap();

        run_queue(&session).await.unwrap();
        assert!(session.client().is_err());
    }
}
