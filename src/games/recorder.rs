use crate::config::RecorderConfig;
use crate::games::types::LeaderboardEntry;
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;
pub const DEFAULT_LEADERBOARD_CAPACITY: usize = 8;

/// Most-recent-first list that evicts its oldest entry when full
#[derive(Debug, Clone, Serialize)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    #[serde(skip)]
    capacity: usize,
}

impl<T: Clone> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend `value`, dropping whatever falls off the end
    pub fn record(&mut self, value: T) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_front(value);
        self.entries.truncate(self.capacity);
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

/// Round history plus the recent-winners leaderboard
#[derive(Debug, Clone)]
pub struct Recorder {
    history: BoundedLog<f64>,
    leaderboard: BoundedLog<LeaderboardEntry>,
}

impl Recorder {
    pub fn new(history_capacity: usize, leaderboard_capacity: usize) -> Self {
        Self {
            history: BoundedLog::new(history_capacity),
            leaderboard: BoundedLog::new(leaderboard_capacity),
        }
    }

    /// Recorder with the configured capacities, prefilled with any seed entries
    pub fn from_config(config: &RecorderConfig) -> Self {
        let mut recorder = Self::new(config.history_capacity, config.leaderboard_capacity);
        // Seeds are listed most recent first
        for value in config.seed_history.iter().rev() {
            recorder.record_round(*value);
        }
        for entry in config.seed_leaderboard.iter().rev() {
            recorder.record_winner(entry.clone());
        }
        recorder
    }

    pub fn record_round(&mut self, final_multiplier: f64) {
        self.history.record(final_multiplier);
    }

    pub fn record_winner(&mut self, entry: LeaderboardEntry) {
        self.leaderboard.record(entry);
    }

    pub fn history(&self) -> &BoundedLog<f64> {
        &self.history
    }

    pub fn leaderboard(&self) -> &BoundedLog<LeaderboardEntry> {
        &self.leaderboard
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_LEADERBOARD_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_recent_first() {
        let mut log = BoundedLog::new(3);
        log.record(1);
        log.record(2);
        assert_eq!(log.to_vec(), vec![2, 1]);
        assert_eq!(log.latest(), Some(&2));
    }

    #[test]
    fn test_evicts_oldest() {
        let mut log = BoundedLog::new(3);
        for value in 1..=5 {
            log.record(value);
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.to_vec(), vec![5, 4, 3]);
    }

    #[test]
    fn test_zero_capacity_stays_empty() {
        let mut log = BoundedLog::new(0);
        log.record(1.5);
        assert!(log.is_empty());
    }

    #[test]
    fn test_recorder_capacities() {
        let mut recorder = Recorder::default();
        for i in 0..25 {
            recorder.record_round(1.0 + i as f64);
            recorder.record_winner(LeaderboardEntry {
                username: format!("******{:02}", i),
                odds: 2.0,
                bet: 10.0,
                win: 20.0,
            });
        }
        assert_eq!(recorder.history().len(), DEFAULT_HISTORY_CAPACITY);
        assert_eq!(recorder.leaderboard().len(), DEFAULT_LEADERBOARD_CAPACITY);
        assert_eq!(recorder.history().latest(), Some(&25.0));
        assert_eq!(
            recorder.leaderboard().latest().map(|e| e.username.as_str()),
            Some("******24")
        );
    }

    #[test]
    fn test_from_config_keeps_seed_order() {
        let config = RecorderConfig {
            history_capacity: 2,
            seed_history: vec![3.0, 2.0, 1.5],
            seed_leaderboard: vec![LeaderboardEntry {
                username: "******7".to_string(),
                odds: 1.9,
                bet: 20.0,
                win: 38.0,
            }],
            ..Default::default()
        };
        let mut recorder = Recorder::from_config(&config);
        assert_eq!(recorder.history().to_vec(), vec![3.0, 2.0]);
        assert_eq!(recorder.leaderboard().len(), 1);

        recorder.record_round(4.0);
        assert_eq!(recorder.history().to_vec(), vec![4.0, 3.0]);
    }
}
