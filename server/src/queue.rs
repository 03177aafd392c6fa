use std::collections::VecDeque;

/// A player waiting for an opponent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub player_id: String,
    pub display_name: String,
}

impl QueueEntry {
    pub fn new(player_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// First-in first-out waiting list of players seeking a match.
///
/// Arrival order is the only fairness rule: pairing always takes the two
/// oldest entries.
#[derive(Debug, Default)]
pub struct MatchQueue {
    entries: VecDeque<QueueEntry>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a player. Returns false without changing the queue if the
    /// player is already waiting, so a retried announce keeps its place.
    pub fn enqueue(&mut self, entry: QueueEntry) -> bool {
        if self.contains(&entry.player_id) {
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    /// Removes the two oldest entries, or nothing if fewer than two wait.
    pub fn dequeue_front_pair(&mut self) -> Option<(QueueEntry, QueueEntry)> {
        if self.entries.len() < 2 {
            return None;
        }
        let first = self.entries.pop_front()?;
        let second = self.entries.pop_front()?;
        Some((first, second))
    }

    /// Removes a player wherever they are in the queue. Missing players are ignored.
    pub fn remove(&mut self, player_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.player_id != player_id);
        self.entries.len() != before
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.entries.iter().any(|entry| entry.player_id == player_id)
    }

    /// Zero-based place in line.
    pub fn position(&self, player_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.player_id == player_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
