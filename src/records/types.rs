use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review lifecycle of a post record. Transitions only move forward:
/// Pending -> Revised -> Approved, or Pending -> Approved directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Pending,
    Revised,
    Approved,
}

/// One content artifact under client review. The record store owns these;
/// the pipeline only holds a transient copy per poll cycle.
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub id: String,
    pub topic: String,
    pub content: String,
    pub status: RecordStatus,
    pub feedback: Option<String>,
    /// The last feedback text the pipeline acted on. Re-observing unchanged
    /// feedback (a stale read from an eventually-consistent store) is a
    /// no-op because of this marker.
    pub processed_feedback: Option<String>,
    pub voice_quality: Option<u8>,
    pub post_quality: Option<u8>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub revised_at: Option<DateTime<Utc>>,
    /// Set once the record has been appended to the training export.
    pub fine_tune_status: Option<String>,
}

/// Partial update for a record. Only set fields are sent; the store leaves
/// everything else unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordPatch {
    #[serde(rename = "Post", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
    /// `Some("")` clears the feedback column for the next review round.
    #[serde(rename = "Feedback", skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(rename = "Processed Feedback", skip_serializing_if = "Option::is_none")]
    pub processed_feedback: Option<String>,
    #[serde(rename = "Version", skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(rename = "Revised At", skip_serializing_if = "Option::is_none")]
    pub revised_at: Option<DateTime<Utc>>,
    #[serde(rename = "Fine Tune Status", skip_serializing_if = "Option::is_none")]
    pub fine_tune_status: Option<String>,
}
