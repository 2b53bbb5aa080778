//! Instructions handed to the browser companion.

use chrono::{DateTime, Utc};
use reelforge_error::{ReelforgeResult, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `POST /api/extension/queue` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueRequest {
    /// Instruction text
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub prompt: Option<String>,
    /// Template the companion wraps around each repetition
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub queue_template: Option<String>,
    /// How many times to submit
    #[serde(default, deserialize_with = "crate::lenient::count")]
    pub count: Option<u64>,
    /// Pause between submissions
    #[serde(default, deserialize_with = "crate::lenient::count")]
    pub interval_seconds: Option<u64>,
}

/// One pending instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique id so the companion can detect duplicates
    pub id: Uuid,
    /// Instruction text
    pub prompt: String,
    /// Optional template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_template: Option<String>,
    /// Repetitions, at least one
    pub count: u64,
    /// Seconds between repetitions
    pub interval_seconds: u64,
    /// When the item was queued
    pub created_at: DateTime<Utc>,
}

impl QueueItem {
    /// Validate a queue request into an item.
    ///
    /// # Examples
    ///
    /// ```
    /// use reelforge_core::{QueueItem, QueueRequest};
    ///
    /// let request = QueueRequest {
    ///     prompt: Some("draw a fox".to_string()),
    ///     count: Some(0),
    ///     ..Default::default()
    /// };
    /// let item = QueueItem::from_request(request).unwrap();
    /// assert_eq!(item.count, 1);
    /// assert_eq!(item.interval_seconds, 0);
    /// ```
    pub fn from_request(request: QueueRequest) -> ReelforgeResult<Self> {
        let prompt = request
            .prompt
            .ok_or_else(|| ValidationError::new("Missing prompt"))?;
        Ok(Self {
            id: Uuid::new_v4(),
            prompt,
            queue_template: request.queue_template,
            count: request.count.unwrap_or(1).max(1),
            interval_seconds: request.interval_seconds.unwrap_or(0),
            created_at: Utc::now(),
        })
    }
}
