use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::classify::{classify, Classification};
use crate::error::PipelineError;
use crate::export::{Exporter, EXPORTED_MARKER};
use crate::memory::{fingerprint, ArtifactEntry, ArtifactStore};
use crate::notify::Notifier;
use crate::records::{PostRecord, RecordPatch, RecordStatus, RecordStore};
use crate::revise::ReviseEngine;

/// What processing one record did this cycle.
#[derive(Debug, PartialEq)]
pub enum StepOutcome {
    /// No feedback, or feedback too unclear to act on.
    Waiting,
    /// Feedback unchanged since the last transition — stale read, no-op.
    AlreadyHandled,
    /// Approved is terminal; nothing to do.
    Terminal,
    Approved { exported: bool },
    Revised { version: u32 },
}

/// The poll loop: fetch candidate records, process each one fully and
/// sequentially, sleep, repeat. A single orchestrator instance is assumed;
/// running two against the same record store is unsupported.
pub struct Orchestrator {
    records: Arc<dyn RecordStore>,
    engine: ReviseEngine,
    memory: ArtifactStore,
    exporter: Exporter,
    notifier: Notifier,
    owner: String,
    poll_interval: Duration,
}

impl Orchestrator {
    pub fn new(
        records: Arc<dyn RecordStore>,
        engine: ReviseEngine,
        memory: ArtifactStore,
        exporter: Exporter,
        notifier: Notifier,
        owner: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            records,
            engine,
            memory,
            exporter,
            notifier,
            owner,
            poll_interval,
        }
    }

    /// Run until the shutdown signal flips. Cancellation is cooperative:
    /// the current record is finished, the next one is never started.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(interval = ?self.poll_interval, owner = %self.owner, "poll loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.run_cycle(&shutdown).await;
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.changed() => break,
            }
        }
        info!("poll loop stopped");
        Ok(())
    }

    /// One poll cycle. No single record's failure ever terminates the loop;
    /// failed records stay in place and are retried when their feedback
    /// changes.
    pub async fn run_cycle(&mut self, shutdown: &watch::Receiver<bool>) {
        let records = match self.records.fetch_pending().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "failed to fetch candidate records");
                return;
            }
        };
        if records.is_empty() {
            debug!("no candidate records");
            return;
        }
        info!(count = records.len(), "processing candidate records");

        for record in records {
            if *shutdown.borrow() {
                info!("shutdown requested, not starting next record");
                return;
            }
            match self.step(&record).await {
                Ok(outcome) => {
                    debug!(record_id = %record.id, ?outcome, "record processed")
                }
                Err(e) => match e.downcast_ref::<PipelineError>() {
                    Some(PipelineError::NoProgress(_)) => warn!(
                        record_id = %record.id,
                        "revision made no progress, leaving record for manual review"
                    ),
                    _ => error!(record_id = %record.id, error = %e, "record action failed"),
                },
            }
        }
    }

    /// Process one record: classify its feedback, act, persist. The record
    /// is handled fully before the caller moves to the next one, so at most
    /// one revision is ever in flight per record.
    pub async fn step(&mut self, record: &PostRecord) -> Result<StepOutcome> {
        if record.status == RecordStatus::Approved {
            return Ok(StepOutcome::Terminal);
        }

        let Some(feedback) = record
            .feedback
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return Ok(StepOutcome::Waiting);
        };

        // Stale-read guard: the store is eventually consistent, so a fetch
        // may still show feedback we already acted on.
        if record.processed_feedback.as_deref().map(str::trim) == Some(feedback) {
            debug!(record_id = %record.id, "feedback unchanged since last action");
            return Ok(StepOutcome::AlreadyHandled);
        }

        match classify(Some(feedback)) {
            Classification::Unclear => Ok(StepOutcome::Waiting),
            Classification::Approve => self.approve(record, feedback).await,
            Classification::Reject | Classification::Regenerate => {
                self.revise_record(record, feedback).await
            }
        }
    }

    /// Approval: export a training example, learn the artifact, mark the
    /// record terminal.
    async fn approve(&mut self, record: &PostRecord, feedback: &str) -> Result<StepOutcome> {
        let exported = self.exporter.export(record)?;

        self.memory.insert(ArtifactEntry {
            topic: record.topic.clone(),
            text: record.content.clone(),
            owner: self.owner.clone(),
            voice_quality: record.voice_quality,
            post_quality: record.post_quality,
            timestamp: Utc::now(),
            fingerprint: fingerprint(&record.content),
        })?;

        let patch = RecordPatch {
            status: Some(RecordStatus::Approved),
            processed_feedback: Some(feedback.to_string()),
            fine_tune_status: Some(EXPORTED_MARKER.to_string()),
            ..Default::default()
        };
        self.records.update(&record.id, patch).await?;

        info!(
            record_id = %record.id,
            topic = %record.topic,
            exported,
            artifacts = self.memory.len(),
            "record approved"
        );
        Ok(StepOutcome::Approved { exported })
    }

    /// Rejection: retrieve context, revise, write the new draft back with a
    /// bumped version and cleared feedback for the next review round.
    async fn revise_record(
        &mut self,
        record: &PostRecord,
        feedback: &str,
    ) -> Result<StepOutcome> {
        let context = self.memory.retrieve(&record.topic, &self.owner);
        let revised = self.engine.revise(record, feedback, &context).await?;
        let new_version = record.version + 1;

        let patch = RecordPatch {
            content: Some(revised),
            version: Some(new_version),
            status: Some(RecordStatus::Revised),
            feedback: Some(String::new()),
            processed_feedback: Some(feedback.to_string()),
            revised_at: Some(Utc::now()),
            ..Default::default()
        };
        self.records.update(&record.id, patch).await?;

        // Fire-and-forget: a failed notification never rolls back the
        // transition above.
        self.notifier.notify_revised(record, new_version).await;

        info!(record_id = %record.id, version = new_version, "record revised");
        Ok(StepOutcome::Revised {
            version: new_version,
        })
    }
}
