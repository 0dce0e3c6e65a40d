//! Persisted highlight records.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anchors::{self, PathStep};
use crate::dom::{DomRange, DomTree};

/// Unique, creation-ordered token identifying one highlight.
///
/// The high bits carry the creation time in epoch milliseconds and the low
/// bits a process-local sequence, so ids sort in creation order even when
/// several highlights land within one millisecond.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct HighlightId(pub u64);

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

impl HighlightId {
    pub fn next() -> Self {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0x3ff;
        Self((millis << 10) | seq)
    }
}

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HighlightId {
    type Err = ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.parse::<u64>().map(Self)
    }
}

/// One persisted highlight. Immutable after creation; the only mutation a
/// record ever sees is wholesale deletion.
///
/// `text` is captured verbatim at creation time and never recomputed — it is
/// what exports quote even when the anchor itself no longer resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: HighlightId,
    pub start_path: Vec<PathStep>,
    pub end_path: Vec<PathStep>,
    pub start_offset: usize,
    pub end_offset: usize,
    pub text: String,
    pub color: String,
    pub timestamp: DateTime<Utc>,
}

impl Highlight {
    /// Capture a live selection as a persistable record, encoding both
    /// endpoints relative to the tree root.
    pub fn from_selection(tree: &DomTree, range: &DomRange, color: &str) -> Self {
        Self {
            id: HighlightId::next(),
            start_path: anchors::encode_path(tree, range.start.node, tree.root()),
            end_path: anchors::encode_path(tree, range.end.node, tree.root()),
            start_offset: range.start.offset,
            end_offset: range.end.offset,
            text: range.text(tree),
            color: color.to_string(),
            timestamp: Utc::now(),
        }
    }
}
