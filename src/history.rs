//! Linear undo/redo history of full document snapshots.
//!
//! The history is a list of serialized snapshots and a cursor pointing at the
//! one that matches the live document:
//!
//! ```text
//! save:  [s0 s1 s2]      cursor=2  →  [s0 s1 s2 s3]  cursor=3
//! undo:  [s0 s1 s2 s3]   cursor=3  →  cursor=2, returns s2
//! save after undo:       cursor=2  →  [s0 s1 s2 s4]  (s3 discarded)
//! ```
//!
//! Restoring a snapshot is the caller's job and must not save a new one.
//! Callers that can fail to restore peek with [`History::previous`] /
//! [`History::following`] and only move the cursor once restoring worked.

use std::time::{SystemTime, UNIX_EPOCH};

/// One immutable document snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub json: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct History {
    snapshots: Vec<Snapshot>,
    cursor: Option<usize>,
    limit: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// History that keeps at most `limit` snapshots, dropping the oldest.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit: limit.filter(|&l| l > 0),
            ..Self::default()
        }
    }

    /// Record a snapshot at the cursor, discarding any redo branch.
    pub fn save(&mut self, json: String) {
        self.save_at(json, now_millis());
    }

    fn save_at(&mut self, json: String, timestamp_ms: u64) {
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.snapshots.truncate(keep);
        self.snapshots.push(Snapshot { json, timestamp_ms });
        if let Some(limit) = self.limit
            && self.snapshots.len() > limit
        {
            let excess = self.snapshots.len() - limit;
            self.snapshots.drain(..excess);
        }
        self.cursor = Some(self.snapshots.len() - 1);
    }

    /// The snapshot `undo` would return, without moving the cursor.
    pub fn previous(&self) -> Option<&Snapshot> {
        let cursor = self.cursor?;
        cursor.checked_sub(1).and_then(|i| self.snapshots.get(i))
    }

    /// The snapshot `redo` would return, without moving the cursor.
    pub fn following(&self) -> Option<&Snapshot> {
        self.snapshots.get(self.cursor? + 1)
    }

    /// Step back one snapshot and return it, or `None` at the oldest.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        let cursor = self.cursor?;
        if cursor == 0 {
            return None;
        }
        self.cursor = Some(cursor - 1);
        self.snapshots.get(cursor - 1)
    }

    /// Step forward one snapshot and return it, or `None` at the tip.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        let next = self.cursor? + 1;
        if next >= self.snapshots.len() {
            return None;
        }
        self.cursor = Some(next);
        self.snapshots.get(next)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.snapshots.len())
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.cursor.and_then(|c| self.snapshots.get(c))
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
