mod config;

use std::{
  io::Write as _,
  path::{Path, PathBuf},
};

use anyhow::{Context as _, bail};
use chrono::Utc;
use claimdrift_claims::{
  fingerprint::fingerprint_debug,
  stability::{StabilityItem, evaluate_stability, stability_report},
};
use claimdrift_core::{
  post::Post,
  store::{LedgerStore as _, PendingQueue},
};
use claimdrift_recheck::{
  MemoryQueue, Scheduler,
  batch::{self, LiveOptions},
  expire_stale_labels, ingest_post,
};
use claimdrift_store_sqlite::SqliteStore;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};
use uuid::Uuid;

use crate::config::{AppConfig, QueueBackend};

// ─── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "claimdrift", about = "Longitudinal claim-drift labeler")]
struct Cli {
  /// Path to the TOML config file.
  #[arg(short, long, global = true, default_value = "claimdrift.toml")]
  config:  PathBuf,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Detect over a JSONL file of posts and write deterministic labels.
  Run {
    #[arg(long)]
    input:        PathBuf,
    #[arg(long)]
    out:          PathBuf,
    #[arg(long)]
    live:         bool,
    #[arg(long)]
    confirm_live: bool,
    #[arg(long, default_value_t = 0)]
    max_emit:     i64,
  },
  /// Print the label candidates for one post.
  Explain {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    uri:   String,
  },
  /// Show how text is reduced to a fingerprint.
  Fingerprint(FingerprintArgs),
  /// Store posts and schedule their rechecks.
  Ingest {
    #[arg(long)]
    input: PathBuf,
  },
  /// Drain pending rechecks, once or until interrupted.
  Recheck {
    #[arg(long)]
    once:  bool,
    /// Ingest these posts before the first pass.
    #[arg(long)]
    input: Option<PathBuf>,
  },
  /// Expire labels older than the TTL.
  Expire {
    #[arg(long)]
    ttl_days: Option<i64>,
  },
  /// Inspect suppressed emissions.
  #[command(subcommand)]
  Quarantine(QuarantineCommand),
  /// Print recent ledger rows.
  Decisions {
    #[arg(long)]
    subject: Option<String>,
    #[arg(long, default_value_t = 20)]
    limit:   usize,
  },
  /// Measure fingerprint collisions, churn and mutation drift.
  StabilityTest {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    out:   PathBuf,
    #[arg(long)]
    limit: Option<usize>,
  },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct FingerprintArgs {
  #[arg(long)]
  text:  Option<String>,
  #[arg(long)]
  input: Option<PathBuf>,
}

#[derive(Subcommand)]
enum QuarantineCommand {
  List {
    #[arg(long, default_value_t = 20)]
    limit: usize,
  },
  Show { emit_id: Uuid },
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let cfg = AppConfig::load(&cli.config)?;

  match cli.command {
    Command::Run { input, out, live, confirm_live, max_emit } => {
      let opts = LiveOptions { live, confirm_live, max_emit };
      let summary =
        batch::run_batch(&input, &out, opts, &cfg.recheck.rules, &cfg.recheck.emit)
          .context("batch run failed")?;
      tracing::info!(labels = summary.labels, out = %summary.out.display(), "labels written");
      if let Some((status, count, path)) = summary.live {
        tracing::info!(%status, count, audit = %path.display(), "live records flushed");
      }
    }
    Command::Explain { input, uri } => {
      let posts = batch::read_posts(&input).context("failed to read posts")?;
      match batch::explain(&posts, &uri, &cfg.recheck.rules) {
        Some(labels) => print_json(&labels)?,
        None => bail!("post not found: {uri}"),
      }
    }
    Command::Fingerprint(args) => fingerprint(args, &cfg)?,
    Command::Ingest { input } => {
      let store = open_store(&cfg).await?;
      match cfg.queue {
        QueueBackend::Sqlite => ingest_file(&store, &store.queue(), &cfg, &input).await?,
        QueueBackend::Memory => {
          tracing::warn!("memory queue selected; ingested rechecks are lost on exit");
          ingest_file(&store, &MemoryQueue::new(), &cfg, &input).await?
        }
      }
    }
    Command::Recheck { once, input } => {
      let store = open_store(&cfg).await?;
      match cfg.queue {
        QueueBackend::Sqlite => {
          let queue = store.queue();
          recheck(store, queue, &cfg, input.as_deref(), once).await?
        }
        QueueBackend::Memory => {
          recheck(store, MemoryQueue::new(), &cfg, input.as_deref(), once).await?
        }
      }
    }
    Command::Expire { ttl_days } => {
      let store = open_store(&cfg).await?;
      let ttl = ttl_days.unwrap_or(cfg.recheck.label_ttl_days);
      let expired = expire_stale_labels(&store, ttl, Utc::now())
        .await
        .context("TTL sweep failed")?;
      println!("expired {} label(s)", expired.len());
    }
    Command::Quarantine(cmd) => {
      let store = open_store(&cfg).await?;
      match cmd {
        QuarantineCommand::List { limit } => {
          let rows = store
            .list_quarantine_emits(limit)
            .await
            .context("failed to list quarantined emits")?;
          print_json(&rows)?;
        }
        QuarantineCommand::Show { emit_id } => {
          match store
            .get_quarantine_emit(emit_id)
            .await
            .context("failed to load quarantined emit")?
          {
            Some(row) => print_json(&row)?,
            None => bail!("no quarantined emit with id {emit_id}"),
          }
        }
      }
    }
    Command::Decisions { subject, limit } => {
      let store = open_store(&cfg).await?;
      let mut rows = match subject {
        Some(uri) => store.decisions_for_subject(&uri).await,
        None => store.recent_decisions(limit).await,
      }
      .context("failed to load decisions")?;
      rows.truncate(limit);
      print_json(&rows)?;
    }
    Command::StabilityTest { input, out, limit } => {
      stability_test(&input, &out, limit, &cfg)?
    }
  }

  Ok(())
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn open_store(cfg: &AppConfig) -> anyhow::Result<SqliteStore> {
  SqliteStore::open(&cfg.store_path).await.with_context(|| {
    format!("failed to open store at {}", cfg.store_path.display())
  })
}

fn fingerprint(args: FingerprintArgs, cfg: &AppConfig) -> anyhow::Result<()> {
  let fp_cfg = &cfg.recheck.rules.fingerprint;
  if let Some(text) = args.text {
    return print_json(&fingerprint_debug(&text, fp_cfg));
  }
  let Some(path) = args.input else {
    bail!("either --text or --input is required");
  };
  let posts = batch::read_posts(&path).context("failed to read posts")?;
  let mut stdout = std::io::stdout().lock();
  for post in &posts {
    let line = serde_json::json!({
      "uri": post.uri,
      "debug": fingerprint_debug(&post.text, fp_cfg),
    });
    writeln!(stdout, "{line}")?;
  }
  Ok(())
}

async fn ingest_file<Q: PendingQueue>(
  store: &SqliteStore,
  queue: &Q,
  cfg: &AppConfig,
  input: &Path,
) -> anyhow::Result<()> {
  let posts: Vec<Post> = batch::read_posts(input).context("failed to read posts")?;
  let mut changed = 0usize;
  let mut groups = 0usize;
  for post in &posts {
    let outcome = ingest_post(store, queue, &cfg.recheck, post, Utc::now())
      .await
      .with_context(|| format!("failed to ingest {}", post.uri))?;
    changed += usize::from(outcome.write.changed());
    groups += usize::from(outcome.claim_group.is_some());
  }
  tracing::info!(read = posts.len(), changed, claim_groups = groups, "ingest complete");
  Ok(())
}

async fn recheck<Q: PendingQueue>(
  store: SqliteStore,
  queue: Q,
  cfg: &AppConfig,
  input: Option<&Path>,
  once: bool,
) -> anyhow::Result<()> {
  if let Some(path) = input {
    ingest_file(&store, &queue, cfg, path).await?;
  }
  let scheduler = Scheduler::new(store, queue, cfg.recheck.clone());

  if once {
    let report = scheduler.run_once().await.context("recheck pass failed")?;
    return print_json(&report);
  }

  let (tx, rx) = watch::channel(false);
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::info!("interrupt received; stopping after the current pass");
      let _ = tx.send(true);
    }
  });
  scheduler.run_periodic(rx).await;
  Ok(())
}

fn stability_test(
  input: &Path,
  out: &Path,
  limit: Option<usize>,
  cfg: &AppConfig,
) -> anyhow::Result<()> {
  let raw = std::fs::read_to_string(input)
    .with_context(|| format!("failed to read {}", input.display()))?;
  let mut items = Vec::new();
  for (n, line) in raw.lines().enumerate() {
    if limit.is_some_and(|l| items.len() >= l) {
      break;
    }
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    match serde_json::from_str::<Value>(line) {
      Ok(value) => items.push(StabilityItem::from_value(&value)),
      Err(e) => tracing::warn!(line = n + 1, error = %e, "skipping malformed stability item"),
    }
  }

  let report = stability_report(&items, &cfg.recheck.rules.fingerprint, Utc::now());
  let verdict = evaluate_stability(&report, &cfg.stability);
  let body = serde_json::to_string_pretty(&serde_json::json!({
    "report": report,
    "verdict": verdict,
  }))?;
  std::fs::write(out, body).with_context(|| format!("failed to write {}", out.display()))?;

  print_json(&verdict)?;
  if !verdict.ok {
    bail!("fingerprint stability checks failed");
  }
  Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
