use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::records::PostRecord;

/// Marker written to the record store once a record has been exported.
pub const EXPORTED_MARKER: &str = "exported";

const SYSTEM_PROMPT: &str = "You are a LinkedIn content writer for HR coaches.";

/// Appends approved posts to the fine-tuning training file as
/// newline-delimited JSON. Append is the only mutation — the file is never
/// rewritten or reordered.
pub struct Exporter {
    path: PathBuf,
    /// Records exported during this process lifetime. Guards against a
    /// re-observed record whose store-side marker is not yet visible.
    exported: HashSet<String>,
}

impl Exporter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            exported: HashSet::new(),
        }
    }

    /// Append one training example for the record. Returns false if the
    /// record was already exported (store marker or in-process set).
    pub fn export(&mut self, record: &PostRecord) -> Result<bool> {
        if record.fine_tune_status.as_deref() == Some(EXPORTED_MARKER)
            || self.exported.contains(&record.id)
        {
            debug!(record_id = %record.id, "record already exported, skipping");
            return Ok(false);
        }

        let example = serde_json::json!({
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!("Write a LinkedIn post about {}.", record.topic)
                },
                { "role": "assistant", "content": record.content },
            ]
        });

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create export dir {:?}", parent))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open export file {:?}", self.path))?;
        writeln!(file, "{}", example)
            .with_context(|| format!("failed to append to {:?}", self.path))?;

        self.exported.insert(record.id.clone());
        info!(record_id = %record.id, topic = %record.topic, "training example exported");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::records::RecordStatus;

    fn record(id: &str) -> PostRecord {
        PostRecord {
            id: id.to_string(),
            topic: "pricing".to_string(),
            content: "final approved post".to_string(),
            status: RecordStatus::Approved,
            feedback: Some("yes".to_string()),
            processed_feedback: None,
            voice_quality: Some(8),
            post_quality: Some(9),
            version: 1,
            created_at: Utc::now(),
            revised_at: None,
            fine_tune_status: None,
        }
    }

    fn read_lines(path: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn test_export_appends_one_training_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        let mut exporter = Exporter::new(path.clone());

        assert!(exporter.export(&record("rec1")).unwrap());

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        let messages = parsed["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(
            messages[1]["content"],
            "Write a LinkedIn post about pricing."
        );
        assert_eq!(messages[2]["content"], "final approved post");
    }

    #[test]
    fn test_export_is_idempotent_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        let mut exporter = Exporter::new(path.clone());

        assert!(exporter.export(&record("rec1")).unwrap());
        // Re-observed before the store marker is visible
        assert!(!exporter.export(&record("rec1")).unwrap());
        assert_eq!(read_lines(&path).len(), 1);
    }

    #[test]
    fn test_export_respects_store_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        let mut exporter = Exporter::new(path.clone());

        let mut rec = record("rec2");
        rec.fine_tune_status = Some(EXPORTED_MARKER.to_string());
        assert!(!exporter.export(&rec).unwrap());
        assert!(read_lines(&path).is_empty());
    }

    #[test]
    fn test_export_appends_without_rewriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        let mut exporter = Exporter::new(path.clone());

        exporter.export(&record("rec1")).unwrap();
        let first = read_lines(&path)[0].clone();
        exporter.export(&record("rec2")).unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], first);
    }
}
