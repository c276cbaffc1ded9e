//! A match between warriors.
//!
//! [`Game`] owns the arena and the players. It places every warrior at a
//! random offset, then schedules players round-robin: each turn one thread
//! of each living player runs until the player's cycle budget is spent or
//! the thread faults. A faulting thread is removed and whoever owns the
//! memory cell it died on is credited with the kill.

pub mod config;
pub mod event;
pub mod player;

use std::io;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::cpu::decode;
use crate::cpu::memory::UNOWNED;
use crate::cpu::{Cpu, Fault, Memory, MemoryError, Thread, MEMORY_SIZE};

pub use config::{ConfigError, CycleTable, GameConfig, PlayerSettings};
pub use event::{Event, EventSink, JsonLines};
pub use player::{Player, PlayerReport};

/// Errors that abort a match.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("placement error: {0}")]
    Memory(#[from] MemoryError),

    #[error("failed to write event: {0}")]
    Log(#[from] io::Error),

    #[error("player {pid} may not start any threads")]
    NoThreads { pid: u8 },
}

/// Outcome of one instruction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// The instruction ran.
    Done,
    /// The budget ran out before the instruction was paid for.
    Deferred,
    /// The instruction faulted and the thread is dead.
    Faulted(Fault),
}

/// Final results of a match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchReport {
    /// Value of the cycle counter when the match ended.
    pub cycles: u64,
    /// Number of players with at least one thread left.
    pub survivors: usize,
    pub players: Vec<PlayerReport>,
}

/// A match in progress.
pub struct Game {
    config: GameConfig,
    memory: Memory,
    players: Vec<Player>,
    /// Start address of each player's first thread, in pid order.
    starts: Vec<u16>,
    cycle: u64,
    /// Players with at least one thread.
    alive: usize,
    finished: bool,
}

impl Game {
    /// Set up a match, placing warriors with the configured seed or, if
    /// there is none, with OS entropy.
    pub fn new(config: GameConfig) -> Result<Self, GameError> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, &mut rng)
    }

    /// Set up a match, placing warriors with `rng`.
    pub fn with_rng<R: Rng>(config: GameConfig, rng: &mut R) -> Result<Self, GameError> {
        let mut players: Vec<Player> = config
            .players
            .iter()
            .enumerate()
            .map(|(i, settings)| Player::new(i as u8 + 1, settings))
            .collect();
        let mut memory = Memory::new();
        let mut starts = vec![0u16; players.len()];

        let mut order: Vec<usize> = (0..players.len()).collect();
        order.shuffle(rng);

        let max_gap = (MEMORY_SIZE - config.total_size()) / players.len();
        let mut offset = 0usize;
        for index in order {
            let player = &mut players[index];
            let program = &config.warriors[index];
            offset += rng.gen_range(0..=max_gap);

            let start = offset as u16;
            memory.load(start, program, player.pid)?;
            if !player.spawn(Thread::new(start)) {
                return Err(GameError::NoThreads { pid: player.pid });
            }
            starts[index] = start;
            debug!(pid = player.pid, name = %player.name, start, size = program.len(), "placed warrior");

            offset += program.len();
        }

        let alive = players.len();
        Ok(Self {
            config,
            memory,
            players,
            starts,
            cycle: 0,
            alive,
            finished: false,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Mutable access to the arena, for tools that patch it before a run.
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn starts(&self) -> &[u16] {
        &self.starts
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Number of players that still have a thread.
    pub fn alive(&self) -> usize {
        self.alive
    }

    /// Run the match to completion, reporting every step to `sink`.
    pub fn run<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> Result<MatchReport, GameError> {
        if self.cycle == 0 {
            sink.emit(&Event::Init { cycle: 0, starts: self.starts.clone() })?;
            self.cycle = 1;
        }

        // A lone warrior plays until it dies; otherwise the last one standing wins.
        let last = if self.players.len() > 1 { 1 } else { 0 };
        while self.alive > last && !self.out_of_cycles() {
            for index in 0..self.players.len() {
                self.turn(index, sink)?;
            }
        }

        self.finish();
        Ok(self.report())
    }

    /// Whether there are not enough cycles left for every living player to
    /// get a full turn.
    fn out_of_cycles(&self) -> bool {
        let reserve: u64 = self
            .players
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| p.turn_budget(self.config.cycles_per_turn) as u64)
            .sum();
        self.cycle.saturating_add(reserve) >= self.config.max_cycles
    }

    /// Run the head thread of player `index` for one turn.
    fn turn<S: EventSink + ?Sized>(&mut self, index: usize, sink: &mut S) -> Result<(), GameError> {
        let Some(mut thread) = self.players[index].next_thread() else {
            return Ok(());
        };

        let mut budget = self.players[index].turn_budget(self.config.cycles_per_turn);
        while budget > 0 {
            match self.exec(index, &mut thread, &mut budget, sink)? {
                Step::Done | Step::Deferred => {}
                Step::Faulted(fault) => {
                    self.kill(index, &thread, fault);
                    return Ok(());
                }
            }
        }

        self.players[index].requeue(thread);
        Ok(())
    }

    /// Charge and, if paid for, execute the instruction at the thread's IP.
    fn exec<S: EventSink + ?Sized>(
        &mut self,
        index: usize,
        thread: &mut Thread,
        budget: &mut u32,
        sink: &mut S,
    ) -> Result<Step, GameError> {
        let pid = self.players[index].pid;
        let cycle = self.cycle;
        let ins = thread.ip;

        let owed = if thread.debt > 0 {
            thread.debt
        } else {
            self.config.cycles.cost(decode::opcode_at(&self.memory, ins))
        };

        if owed > *budget {
            thread.debt = owed - *budget;
            self.cycle += *budget as u64;
            *budget = 0;
            sink.emit(&Event::Exec { cycle, pid, ins, end: None })?;
            return Ok(Step::Deferred);
        }

        thread.debt = 0;
        *budget -= owed;
        self.cycle += owed as u64;

        let result = Cpu::new(thread, &mut self.memory, pid).step();
        let end = result.is_ok().then_some(self.cycle);
        sink.emit(&Event::Exec { cycle, pid, ins, end })?;

        Ok(match result {
            Ok(_) => Step::Done,
            Err(fault) => Step::Faulted(fault),
        })
    }

    /// Remove a dead thread and credit its killer.
    fn kill(&mut self, index: usize, thread: &Thread, fault: Fault) {
        let victim = self.players[index].pid;
        let cause = self.memory.owner(thread.ip);
        debug!(pid = victim, ip = thread.ip, cause, %fault, "thread died");

        let process_died = !self.players[index].is_alive();
        if process_died {
            self.alive -= 1;
        }

        let killer = if cause != UNOWNED && cause != victim {
            self.players.get_mut(cause as usize - 1)
        } else {
            None
        };
        if let Some(killer) = killer {
            killer.credit_thread_kill(self.config.score_for_killing_thread);
            if process_died {
                killer.credit_process_kill(self.config.score_for_killing_process);
            }
        }

        if process_died {
            debug!(pid = victim, cycle = self.cycle, "player eliminated");
        }
    }

    /// Award the owned-memory bonus. Runs once per match.
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        for player in &mut self.players {
            player.owned_ram = self.memory.owned_by(player.pid);
            player.score += (self.config.score_for_owning_ram * player.owned_ram as f64).floor() as u64;
        }

        info!(cycles = self.cycle, survivors = self.alive, "match finished");
    }

    /// Current results.
    pub fn report(&self) -> MatchReport {
        MatchReport {
            cycles: self.cycle,
            survivors: self.players.iter().filter(|p| p.is_alive()).count(),
            players: self.players.iter().map(Player::report).collect(),
        }
    }
}
