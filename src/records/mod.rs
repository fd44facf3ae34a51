pub mod types;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::PipelineError;

pub use types::{PostRecord, RecordPatch, RecordStatus};

const MAX_ATTEMPTS: u32 = 3;

/// Record store boundary: fetch candidate records, apply partial updates.
/// The store is assumed eventually consistent — a just-written update may
/// not be visible on the next immediate fetch.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All non-approved records. Malformed records are skipped with a
    /// warning, never surfaced as errors.
    async fn fetch_pending(&self) -> Result<Vec<PostRecord>>;

    /// Partial update: fields not set in the patch are left unchanged.
    async fn update(&self, id: &str, patch: RecordPatch) -> Result<()>;
}

/// Airtable-style REST implementation: GET with pagination offsets, PATCH
/// per record, bearer auth.
pub struct AirtableStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AirtableStore {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        // Table names may contain spaces
        let table: String = settings
            .airtable_table
            .chars()
            .map(|c| {
                if c == ' ' {
                    "%20".to_string()
                } else {
                    c.to_string()
                }
            })
            .collect();
        let base_url = format!(
            "https://api.airtable.com/v0/{}/{}",
            settings.airtable_base_id, table
        );

        Ok(Self {
            client,
            base_url,
            api_key: settings.airtable_api_key.clone(),
        })
    }

    /// Send with bounded retry on transport errors, rate limits, and 5xx.
    async fn send_with_retry(&self, req: reqwest::RequestBuilder) -> Result<Value> {
        let mut last_err = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let attempt_req = req
                .try_clone()
                .ok_or_else(|| anyhow!("request body is not cloneable"))?;
            match attempt_req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str(&text)
                            .context("failed to parse record store JSON");
                    }
                    if !(status.is_server_error() || status.as_u16() == 429) {
                        return Err(anyhow!(
                            "record store returned {}: {}",
                            status,
                            text
                        ));
                    }
                    warn!(attempt, %status, "record store request rejected");
                    last_err = format!("{}: {}", status, text);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "record store request failed");
                    last_err = e.to_string();
                }
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(std::time::Duration::from_secs(attempt as u64 * 2))
                    .await;
            }
        }
        Err(PipelineError::Transient(last_err).into())
    }
}

#[async_trait]
impl RecordStore for AirtableStore {
    async fn fetch_pending(&self) -> Result<Vec<PostRecord>> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut req = self
                .client
                .get(&self.base_url)
                .header("Authorization", format!("Bearer {}", self.api_key));
            if let Some(off) = &offset {
                req = req.query(&[("offset", off)]);
            }

            let page = self.send_with_retry(req).await?;
            for raw in page["records"].as_array().map(|v| v.as_slice()).unwrap_or(&[]) {
                match parse_record(raw) {
                    Ok(record) => {
                        // Approved is terminal — nothing left to do
                        if record.status != RecordStatus::Approved {
                            records.push(record);
                        }
                    }
                    Err(e) => warn!(error = %e, "skipping malformed record"),
                }
            }

            offset = page["offset"].as_str().map(|s| s.to_string());
            if offset.is_none() {
                break;
            }
        }

        debug!(count = records.len(), "fetched candidate records");
        Ok(records)
    }

    async fn update(&self, id: &str, patch: RecordPatch) -> Result<()> {
        let url = format!("{}/{}", self.base_url, id);
        let body = serde_json::json!({ "fields": patch });
        let req = self
            .client
            .patch(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);

        self.send_with_retry(req)
            .await
            .with_context(|| format!("failed to update record {}", id))?;
        debug!(record_id = id, "record updated");
        Ok(())
    }
}

fn parse_record(raw: &Value) -> Result<PostRecord, PipelineError> {
    let id = raw["id"]
        .as_str()
        .ok_or(PipelineError::Malformed {
            id: "<unknown>".to_string(),
            field: "id",
        })?
        .to_string();
    let fields = &raw["fields"];

    let topic = required_text(fields, "Topic", &id)?;
    let content = required_text(fields, "Post", &id)?;

    let created_at = fields["Timestamp"]
        .as_str()
        .and_then(parse_timestamp)
        .or_else(|| raw["createdTime"].as_str().and_then(parse_timestamp))
        .ok_or(PipelineError::Malformed {
            id: id.clone(),
            field: "Timestamp",
        })?;

    let status = match fields["Status"].as_str() {
        Some("Approved") => RecordStatus::Approved,
        Some("Revised") => RecordStatus::Revised,
        _ => RecordStatus::Pending,
    };

    Ok(PostRecord {
        id,
        topic,
        content,
        status,
        feedback: optional_text(fields, "Feedback"),
        processed_feedback: optional_text(fields, "Processed Feedback"),
        voice_quality: quality_score(fields, "voice score"),
        post_quality: quality_score(fields, "quality score"),
        version: fields["Version"].as_u64().unwrap_or(1) as u32,
        created_at,
        revised_at: fields["Revised At"].as_str().and_then(parse_timestamp),
        fine_tune_status: optional_text(fields, "Fine Tune Status"),
    })
}

fn required_text(fields: &Value, key: &'static str, id: &str) -> Result<String, PipelineError> {
    fields[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or(PipelineError::Malformed {
            id: id.to_string(),
            field: key,
        })
}

fn optional_text(fields: &Value, key: &str) -> Option<String> {
    fields[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn quality_score(fields: &Value, key: &str) -> Option<u8> {
    fields[key]
        .as_u64()
        .filter(|n| (1..=10).contains(n))
        .map(|n| n as u8)
}

/// Timestamps arrive in two shapes: RFC 3339 from the API, and the legacy
/// "YYYY-MM-DD HH:MM:SS UTC" format older rows were written with.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S UTC")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_full() {
        let raw = serde_json::json!({
            "id": "rec123",
            "createdTime": "2025-06-01T10:00:00.000Z",
            "fields": {
                "Topic": "pricing",
                "Post": "draft A",
                "Status": "Pending",
                "Feedback": "  No, make it more personal  ",
                "voice score": 8,
                "quality score": 9,
                "Version": 2,
                "Timestamp": "2025-06-01 10:00:00 UTC"
            }
        });

        let record = parse_record(&raw).unwrap();
        assert_eq!(record.id, "rec123");
        assert_eq!(record.version, 2);
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(record.feedback.as_deref(), Some("No, make it more personal"));
        assert_eq!(record.voice_quality, Some(8));
    }

    #[test]
    fn test_parse_record_missing_content_is_malformed() {
        let raw = serde_json::json!({
            "id": "rec456",
            "createdTime": "2025-06-01T10:00:00.000Z",
            "fields": { "Topic": "pricing" }
        });

        let err = parse_record(&raw).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Malformed { field: "Post", .. }
        ));
    }

    #[test]
    fn test_parse_record_falls_back_to_created_time() {
        let raw = serde_json::json!({
            "id": "rec789",
            "createdTime": "2025-06-01T10:00:00.000Z",
            "fields": { "Topic": "pricing", "Post": "draft A" }
        });

        let record = parse_record(&raw).unwrap();
        assert_eq!(record.created_at.to_rfc3339(), "2025-06-01T10:00:00+00:00");
        assert_eq!(record.version, 1);
        assert!(record.feedback.is_none());
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = RecordPatch {
            status: Some(RecordStatus::Approved),
            processed_feedback: Some("yes".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["Status"], "Approved");
        assert_eq!(json["Processed Feedback"], "yes");
        assert!(json.get("Post").is_none());
        assert!(json.get("Version").is_none());
    }
}
