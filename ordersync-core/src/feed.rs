//! Source feed seam.
//!
//! A feed returns one complete snapshot of orders per call. Pagination, auth
//! and timeouts are the implementation's concern; the engine only ever sees
//! the full ordered sequence.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FeedError;

/// Order status filter passed to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    Open,
    Closed,
    Cancelled,
    Any,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::Open => "open",
            StatusFilter::Closed => "closed",
            StatusFilter::Cancelled => "cancelled",
            StatusFilter::Any => "any",
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "cancelled" => Ok(Self::Cancelled),
            "any" => Ok(Self::Any),
            other => Err(format!(
                "unknown order status '{other}'; expected: open, closed, cancelled, any"
            )),
        }
    }
}

/// Something that can produce a full snapshot of external orders.
pub trait SourceFeed: Send + Sync {
    fn fetch_snapshot(&self, status: StatusFilter) -> Result<Vec<Value>, FeedError>;
}

/// A fixed in-memory snapshot; the status filter is ignored.
impl SourceFeed for Vec<Value> {
    fn fetch_snapshot(&self, _status: StatusFilter) -> Result<Vec<Value>, FeedError> {
        Ok(self.clone())
    }
}
