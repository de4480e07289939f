//! The recheck scheduler.
//!
//! A pass drains up to `batch_limit` thread requests, then (when enabled) up
//! to `claim_recheck.max_per_run` claim-group requests. Each unit is loaded,
//! evaluated and reconciled against the active labels on its posts; a unit
//! that fails is logged and skipped, its request already consumed. All
//! labels inserted during the pass are flushed through one [`Governor`].

use std::{
  collections::{BTreeMap, BTreeSet, HashMap},
  time::Duration,
};

use chrono::Utc;
use claimdrift_claims::{FINGERPRINT_VERSION, decision_inputs, evidence_hash};
use claimdrift_core::{
  claim::Fingerprint,
  emit::{EmitMode, EmitStatus},
  label::{LabelCandidate, LabelPayload, SchedulerKind},
  ledger::{DecisionTrace, NewLabelDecision, NewQuarantineEmit},
  post::Post,
  recheck::{RecheckKey, RecheckKind},
  store::{DriftStore, PendingQueue},
};
use claimdrift_rules::{DriftRule as _, HistorySnapshot, PriorClaim, RuleContext, repeat::RepeatClaim};
use serde::Serialize;
use tokio::sync::watch;

use crate::{AuditLog, Error, Governor, RecheckConfig, Result, governor::EmitRecord};

// ─── Report ──────────────────────────────────────────────────────────────────

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassReport {
  pub threads:         usize,
  pub claim_groups:    usize,
  pub failed:          usize,
  pub inserted:        usize,
  pub expired:         usize,
  pub groups_enqueued: usize,
  pub emitted:         usize,
  pub suppressed:      usize,
  pub mode:            Option<EmitMode>,
  pub reason:          Option<String>,
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

pub struct Scheduler<S, Q> {
  store:  S,
  queue:  Q,
  config: RecheckConfig,
  audit:  AuditLog,
}

impl<S, Q> Scheduler<S, Q>
where
  S: DriftStore,
  Q: PendingQueue,
{
  pub fn new(store: S, queue: Q, config: RecheckConfig) -> Self {
    let config = config.sanitized();
    let audit = AuditLog::new(&config.emit.audit_dir);
    Self { store, queue, config, audit }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn queue(&self) -> &Q { &self.queue }

  pub fn config(&self) -> &RecheckConfig { &self.config }

  /// Run one full pass.
  pub async fn run_once(&self) -> Result<PassReport> {
    let mut report = PassReport::default();
    let mut governor = Governor::new(&self.config.emit, &self.config.budgets);

    let roots = self
      .queue
      .dequeue(RecheckKind::Thread, self.config.batch_limit)
      .await
      .map_err(Error::queue)?;

    for key in roots {
      let RecheckKey::Thread { root_uri } = key else { continue };
      match self.process_thread(&root_uri, &mut governor, &mut report).await {
        Ok(()) => report.threads += 1,
        Err(e) => {
          tracing::warn!(root = %root_uri, error = %e, "thread recheck failed");
          report.failed += 1;
        }
      }
    }

    let claim = &self.config.claim_recheck;
    if claim.enabled && claim.max_per_run > 0 {
      let groups = self
        .queue
        .dequeue(RecheckKind::ClaimGroup, claim.max_per_run)
        .await
        .map_err(Error::queue)?;

      for key in groups {
        let RecheckKey::ClaimGroup { author_did, fingerprint } = key else { continue };
        let fingerprint = Fingerprint::new(fingerprint, FINGERPRINT_VERSION);
        match self.process_claim_group(&author_did, &fingerprint, &mut governor, &mut report).await {
          Ok(()) => report.claim_groups += 1,
          Err(e) => {
            tracing::warn!(author = %author_did, %fingerprint, error = %e, "claim-group recheck failed");
            report.failed += 1;
          }
        }
      }
    }

    self.flush(governor, &mut report).await;

    tracing::info!(
      threads = report.threads,
      claim_groups = report.claim_groups,
      failed = report.failed,
      inserted = report.inserted,
      expired = report.expired,
      "recheck pass complete"
    );
    Ok(report)
  }

  /// Run a pass every `interval_secs` until `shutdown` turns `true` or its
  /// sender is dropped. A pass in progress always runs to completion.
  pub async fn run_periodic(&self, mut shutdown: watch::Receiver<bool>) {
    let interval = Duration::from_secs(self.config.interval_secs);
    tracing::info!(interval_secs = self.config.interval_secs, "starting recheck loop");

    loop {
      if *shutdown.borrow() {
        break;
      }
      if let Err(e) = self.run_once().await {
        tracing::error!(error = %e, "recheck pass failed");
      }
      tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        changed = shutdown.changed() => {
          if changed.is_err() {
            break;
          }
        }
      }
    }

    tracing::info!("recheck loop stopping");
  }

  // ── Units ─────────────────────────────────────────────────────────────

  async fn process_thread(
    &self,
    root_uri: &str,
    governor: &mut Governor,
    report: &mut PassReport,
  ) -> Result<()> {
    let posts = self.store.load_posts_for_root(root_uri).await.map_err(Error::store)?;
    tracing::debug!(root = root_uri, posts = posts.len(), "rechecking thread");

    let history = self.load_history(&posts).await?;
    let ctx = RuleContext::new(&posts, &history, &self.config.rules);

    let mut evaluated = Vec::with_capacity(posts.len());
    for post in &posts {
      let candidates = claimdrift_rules::evaluate(post, &ctx);

      let repeat_id = RepeatClaim.id();
      if self.config.claim_recheck.enabled && candidates.iter().any(|c| c.rule_id == repeat_id) {
        let fp = ctx.fingerprint(post);
        match self.queue.enqueue(RecheckKey::claim_group(&post.author_did, &fp.value)).await {
          Ok(()) => report.groups_enqueued += 1,
          Err(e) => tracing::warn!(uri = %post.uri, error = %e, "failed to enqueue claim group"),
        }
      }

      evaluated.push((post, candidates));
    }

    for (post, candidates) in evaluated {
      self
        .reconcile(post, &candidates, SchedulerKind::ThreadRoot, governor, report)
        .await?;
    }
    Ok(())
  }

  async fn process_claim_group(
    &self,
    author_did: &str,
    fingerprint: &Fingerprint,
    governor: &mut Governor,
    report: &mut PassReport,
  ) -> Result<()> {
    let posts = self
      .store
      .load_posts_for_claim_group(author_did, fingerprint)
      .await
      .map_err(Error::store)?;
    tracing::debug!(author = author_did, %fingerprint, posts = posts.len(), "rechecking claim group");

    let history = self.load_history(&posts).await?;
    let ctx = RuleContext::new(&posts, &history, &self.config.rules);

    for post in &posts {
      let candidates = claimdrift_rules::evaluate(post, &ctx);
      self
        .reconcile(post, &candidates, SchedulerKind::ClaimGroup, governor, report)
        .await?;
    }
    Ok(())
  }

  /// Claim history for every `(author, fingerprint)` present in `posts`,
  /// joined with the posts the entries point at.
  async fn load_history(&self, posts: &[Post]) -> Result<HistorySnapshot> {
    let mut known: HashMap<String, Option<Post>> =
      posts.iter().map(|p| (p.uri.clone(), Some(p.clone()))).collect();

    let groups: BTreeSet<(String, Fingerprint)> = posts
      .iter()
      .map(|p| (p.author_did.clone(), claimdrift_claims::fingerprint(&p.text, &self.config.rules.fingerprint)))
      .collect();

    let mut snapshot = HistorySnapshot::default();
    for (author, fp) in groups {
      let entries = self.store.claim_history(&author, &fp).await.map_err(Error::store)?;

      let mut priors = Vec::with_capacity(entries.len());
      for entry in entries {
        let post = match known.get(&entry.post_uri) {
          Some(post) => post.clone(),
          None => {
            let post = self.store.get_post(&entry.post_uri).await.map_err(Error::store)?;
            known.insert(entry.post_uri.clone(), post.clone());
            post
          }
        };
        priors.push(PriorClaim { entry, post });
      }
      snapshot.insert(&author, fp, priors);
    }
    Ok(snapshot)
  }

  // ── Reconciliation ────────────────────────────────────────────────────

  /// Bring the labels this axis owns on `post` in line with `candidates`:
  /// expire those no longer produced, insert the new ones.
  async fn reconcile(
    &self,
    post: &Post,
    candidates: &[LabelCandidate],
    scheduler: SchedulerKind,
    governor: &mut Governor,
    report: &mut PassReport,
  ) -> Result<()> {
    let labeler = self.config.labeler_did.as_str();
    let desired: BTreeSet<&str> = candidates.iter().map(|c| c.label.as_str()).collect();

    let active = self.store.active_labels(&post.uri).await.map_err(Error::store)?;
    for label in &active {
      if label.labeler_did != labeler || label.scheduler() != Some(scheduler) {
        continue;
      }
      let Some(name) = label.name() else { continue };
      if desired.contains(name) {
        continue;
      }

      let n = self
        .store
        .expire_label(&post.uri, labeler, &label.payload)
        .await
        .map_err(Error::store)?;
      if n > 0 {
        report.expired += n;
        tracing::debug!(subject = %post.uri, label = name, "label expired");
        if let Err(e) = self.store.mark_expired(&post.uri, name).await {
          tracing::warn!(subject = %post.uri, label = name, error = %e, "failed to mark decision expired");
        }
      }
    }

    for candidate in candidates {
      let payload = LabelPayload::from_candidate(candidate, post.created_at, labeler, scheduler).to_value()?;
      let inserted = self
        .store
        .insert_label(&post.uri, labeler, &payload)
        .await
        .map_err(Error::store)?;
      if !inserted {
        continue;
      }

      report.inserted += 1;
      tracing::debug!(subject = %post.uri, label = %candidate.label, "label inserted");
      governor.record(EmitRecord::from(candidate));

      let decision = NewLabelDecision {
        subject_uri:         post.uri.clone(),
        root_uri:            Some(post.thread_root().to_owned()),
        label:               candidate.label.clone(),
        rule_id:             candidate.rule_id.clone(),
        fingerprint_version: FINGERPRINT_VERSION.to_owned(),
        inputs:              decision_inputs(&post.text),
        evidence_hashes:     vec![evidence_hash(post)],
        decision_trace:      DecisionTrace {
          reasons:   candidate.reasons.clone(),
          evidence:  candidate.evidence.clone(),
          scheduler,
        },
        config_hash:         self.config.rules.config_hash(),
      };
      if let Err(e) = self.store.append_decision(decision).await {
        tracing::warn!(subject = %post.uri, label = %candidate.label, error = %e, "failed to append ledger decision");
      }
    }
    Ok(())
  }

  // ── Flush ─────────────────────────────────────────────────────────────

  async fn flush(&self, governor: Governor, report: &mut PassReport) {
    if governor.is_empty() {
      return;
    }

    let window_counts: Option<BTreeMap<String, u64>> = if governor.needs_window_counts() {
      let since = governor.window_start(Utc::now());
      match self.store.rule_counts_since(since).await {
        Ok(counts) => Some(counts),
        Err(e) => {
          tracing::warn!(error = %e, "failed to read window counts; skipping window budget");
          None
        }
      }
    } else {
      None
    };

    let outcome = governor.finish(window_counts.as_ref());
    if outcome.mode == EmitMode::Quarantine {
      tracing::warn!(reason = outcome.reason.as_deref().unwrap_or("configured"), "pass quarantined");
    }

    match self.audit.append(outcome.mode, &outcome.records) {
      Ok(path) => tracing::info!(
        records = outcome.records.len(),
        mode = %outcome.mode,
        path = %path.display(),
        "emissions recorded"
      ),
      Err(e) => tracing::warn!(error = %e, "failed to write emission audit"),
    }

    if outcome.status == EmitStatus::Suppressed {
      for record in &outcome.records {
        let payload = match serde_json::to_value(record) {
          Ok(v) => v,
          Err(e) => {
            tracing::warn!(error = %e, "failed to encode quarantined record");
            continue;
          }
        };
        let emit = NewQuarantineEmit {
          emit_mode:   outcome.mode,
          emit_status: outcome.status,
          emit_reason: record.emit_reason.clone(),
          payload,
        };
        if let Err(e) = self.store.append_quarantine_emit(emit).await {
          tracing::warn!(subject = %record.subject_uri, error = %e, "failed to record quarantined emission");
        }
      }
      report.suppressed += outcome.records.len();
    } else {
      report.emitted += outcome.records.len();
    }

    report.mode = Some(outcome.mode);
    report.reason = outcome.reason;
  }
}
