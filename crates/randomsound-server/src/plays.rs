//! Live plays: opaque ids handed out by `random`, resolved by `stream`.
//!
//! The table is bounded; once full, the oldest id is forgotten and its
//! stream URL starts answering 404.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// Length of a hyphenated UUID, the part of a stream path that is the id.
pub const PLAY_ID_LEN: usize = 36;

#[derive(Debug, Clone)]
struct Play {
    path: PathBuf,
    issued_at: DateTime<Utc>,
}

#[derive(Default)]
struct Table {
    plays: HashMap<String, Play>,
    order: VecDeque<String>,
}

pub struct LivePlays {
    capacity: usize,
    table: Mutex<Table>,
}

impl LivePlays {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            table: Mutex::new(Table::default()),
        }
    }

    /// Record a new play of `path` and return its id.
    pub fn issue(&self, path: PathBuf) -> String {
        let id = Uuid::new_v4().to_string();
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        while table.order.len() >= self.capacity {
            if let Some(old) = table.order.pop_front() {
                table.plays.remove(&old);
                debug!("plays: evicted {}", old);
            }
        }
        table.order.push_back(id.clone());
        table.plays.insert(
            id.clone(),
            Play {
                path,
                issued_at: Utc::now(),
            },
        );
        id
    }

    pub fn resolve(&self, id: &str) -> Option<PathBuf> {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let play = table.plays.get(id)?;
        debug!(
            "plays: {} resolved, issued {}s ago",
            id,
            (Utc::now() - play.issued_at).num_seconds()
        );
        Some(play.path.clone())
    }

    pub fn len(&self) -> usize {
        self.table
            .lock()
            .map(|t| t.plays.len())
            .unwrap_or_default()
    }
}
