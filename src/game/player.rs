//! Player bookkeeping.

use std::collections::VecDeque;

use serde::Serialize;

use super::config::PlayerSettings;
use crate::cpu::Thread;

/// One competitor: its settings, score counters and run queue.
#[derive(Debug, Clone)]
pub struct Player {
    /// Player id, 1-based. Also the owner id stamped into the arena.
    pub pid: u8,
    pub name: String,
    pub cycle_modifier: f64,
    pub max_threads: u8,
    pub owned_ram: usize,
    pub killed_threads: u32,
    pub killed_processes: u32,
    pub score: u64,
    threads: VecDeque<Thread>,
}

impl Player {
    /// Create a player with an empty run queue.
    pub fn new(pid: u8, settings: &PlayerSettings) -> Self {
        Self {
            pid,
            name: settings.name.clone(),
            cycle_modifier: settings.cycle_modifier,
            max_threads: settings.max_threads,
            owned_ram: 0,
            killed_threads: 0,
            killed_processes: 0,
            score: 0,
            threads: VecDeque::new(),
        }
    }

    /// Cycles this player gets per turn. Never less than one.
    pub fn turn_budget(&self, cycles_per_turn: u16) -> u32 {
        ((cycles_per_turn as f64 * self.cycle_modifier) as u32).max(1)
    }

    /// Add a thread to the back of the queue.
    ///
    /// Returns `false` if the player is already at its thread cap.
    #[must_use]
    pub fn spawn(&mut self, thread: Thread) -> bool {
        if self.threads.len() >= self.max_threads as usize {
            return false;
        }
        self.threads.push_back(thread);
        true
    }

    /// Take the thread at the head of the queue.
    pub fn next_thread(&mut self) -> Option<Thread> {
        self.threads.pop_front()
    }

    /// Put a thread that survived its turn back at the end of the queue.
    pub fn requeue(&mut self, thread: Thread) {
        self.threads.push_back(thread);
    }

    /// The queued threads, head first.
    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.threads.iter()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// A player is alive while it has at least one thread.
    pub fn is_alive(&self) -> bool {
        !self.threads.is_empty()
    }

    pub fn credit_thread_kill(&mut self, points: u32) {
        self.killed_threads += 1;
        self.score += points as u64;
    }

    pub fn credit_process_kill(&mut self, points: u32) {
        self.killed_processes += 1;
        self.score += points as u64;
    }

    /// Snapshot of the player's results.
    pub fn report(&self) -> PlayerReport {
        PlayerReport {
            pid: self.pid,
            name: self.name.clone(),
            score: self.score,
            killed_threads: self.killed_threads,
            killed_processes: self.killed_processes,
            owned_ram: self.owned_ram,
            threads: self.threads.len(),
        }
    }
}

/// A player's results at the end of a match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerReport {
    pub pid: u8,
    pub name: String,
    pub score: u64,
    pub killed_threads: u32,
    pub killed_processes: u32,
    pub owned_ram: usize,
    pub threads: usize,
}
