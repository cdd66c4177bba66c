//! Domain models for stacks and their attributes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::color::ColorSample;
use crate::error::{Error, Result};

/// Kind of media a stack holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Comic,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Comic => "comic",
            MediaType::Video => "video",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "comic" => Ok(MediaType::Comic),
            "video" => Ok(MediaType::Video),
            other => Err(Error::InvalidRequest(format!("unknown media type: {other}"))),
        }
    }
}

/// A stack as returned to callers after a page is hydrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSummary {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub name: String,
    pub media_type: MediaType,
    pub like_count: i32,
    pub author_id: Option<Uuid>,
    pub author_name: Option<String>,
    /// Dominant colors, at most [`crate::defaults::MAX_COLOR_SAMPLES`].
    pub colors: Vec<ColorSample>,
    /// Whether the default principal has favorited this stack.
    pub favorited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
