use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One approved artifact the pipeline has learned from.
/// Entries are append-only and never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub topic: String,
    pub text: String,
    pub owner: String,
    pub voice_quality: Option<u8>,
    pub post_quality: Option<u8>,
    pub timestamp: DateTime<Utc>,
    /// blake3 of the normalized text; (owner, fingerprint) is unique.
    pub fingerprint: String,
}

/// Content fingerprint: case-folded, whitespace-collapsed, then hashed.
/// The same post with different spacing or casing maps to the same id.
pub fn fingerprint(text: &str) -> String {
    let normalized = text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    blake3::hash(normalized.as_bytes()).to_hex().to_string()
}

#[derive(Debug, Default)]
pub struct StoreStats {
    pub total: usize,
    pub avg_voice_quality: f64,
    pub avg_post_quality: f64,
}

/// Append-only similarity store of approved artifacts, persisted as JSON
/// under the data dir. Retrieval is lexical (token-set Jaccard over topics),
/// which matches what the upstream system actually did — no embedding
/// service is involved.
pub struct ArtifactStore {
    path: PathBuf,
    entries: Vec<ArtifactEntry>,
    exclude_within_days: i64,
    top_k: usize,
}

impl ArtifactStore {
    pub fn open(data_dir: &Path, exclude_within_days: i64, top_k: usize) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data dir {:?}", data_dir))?;
        let path = data_dir.join("artifacts.json");

        let entries: Vec<ArtifactEntry> = if path.exists() {
            let bytes = fs::read(&path)
                .with_context(|| format!("failed to read artifact store {:?}", path))?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("artifact store {:?} is corrupt", path))?
        } else {
            Vec::new()
        };

        info!(entries = entries.len(), path = ?path, "artifact store opened");
        Ok(Self {
            path,
            entries,
            exclude_within_days,
            top_k,
        })
    }

    /// Insert an artifact. Idempotent: an entry with the same owner and
    /// fingerprint already present makes this a no-op.
    pub fn insert(&mut self, entry: ArtifactEntry) -> Result<bool> {
        let duplicate = self
            .entries
            .iter()
            .any(|e| e.owner == entry.owner && e.fingerprint == entry.fingerprint);
        if duplicate {
            debug!(topic = %entry.topic, "artifact already stored, skipping");
            return Ok(false);
        }

        info!(topic = %entry.topic, owner = %entry.owner, "storing approved artifact");
        self.entries.push(entry);
        self.persist()?;
        Ok(true)
    }

    /// Most-similar artifacts for a topic, excluding the owner's artifacts
    /// from the last `exclude_within_days` days. May be empty; never fails.
    pub fn retrieve(&self, topic: &str, owner: &str) -> Vec<ArtifactEntry> {
        self.retrieve_at(topic, owner, Utc::now())
    }

    /// `retrieve` with an explicit clock, so the recency window is testable.
    pub fn retrieve_at(
        &self,
        topic: &str,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Vec<ArtifactEntry> {
        let cutoff = now - Duration::days(self.exclude_within_days);

        let mut scored: Vec<(f64, &ArtifactEntry)> = self
            .entries
            .iter()
            .filter(|e| e.owner == owner && e.timestamp <= cutoff)
            .map(|e| (jaccard(topic, &e.topic), e))
            .collect();

        // Descending similarity, ties broken most-recent-first
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.1.timestamp.cmp(&a.1.timestamp))
        });

        let results: Vec<ArtifactEntry> = scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, e)| e.clone())
            .collect();
        debug!(topic, count = results.len(), "retrieved context artifacts");
        results
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        let voice: Vec<u8> = self.entries.iter().filter_map(|e| e.voice_quality).collect();
        let post: Vec<u8> = self.entries.iter().filter_map(|e| e.post_quality).collect();
        let avg = |v: &[u8]| {
            if v.is_empty() {
                0.0
            } else {
                v.iter().map(|&n| n as f64).sum::<f64>() / v.len() as f64
            }
        };
        StoreStats {
            total: self.entries.len(),
            avg_voice_quality: avg(&voice),
            avg_post_quality: avg(&post),
        }
    }

    fn persist(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.entries).context("serialize artifacts")?;
        fs::write(&self.path, bytes)
            .with_context(|| format!("failed to write artifact store {:?}", self.path))?;
        Ok(())
    }
}

/// Token-set Jaccard similarity between two topic strings.
fn jaccard(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f64 / union as f64
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}
