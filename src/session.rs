use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    agent::Agent,
    error::{Error, Result},
    world::{Direction, EndCause, GridWorld},
};

/// Reward issued when the snake eats
pub const FOOD_REWARD: f32 = 10.0;
/// Reward issued for a step that found nothing
pub const STEP_PENALTY: f32 = -0.1;
/// Reward issued when the snake dies
pub const DEATH_PENALTY: f32 = -15.0;

/// Pause between game over and an automatic restart
const RESTART_DELAY: Duration = Duration::from_millis(500);

/// Who drives the snake
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Ai,
    Manual,
}

/// Running session statistics, emitted to observers
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stats {
    pub score: u32,
    pub high_score: u32,
    pub games_played: u32,
    pub average_score: f32,
}

/// Boundary events produced by [`Session::tick`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    /// Emitted after every food eat and every episode reset
    Stats(Stats),
    /// Emitted once per episode end; `auto_restart` distinguishes the silent
    /// AI/training path from the manual wait-for-input path
    GameOver { score: u32, auto_restart: bool },
}

#[derive(Clone, Copy, Debug)]
enum Phase {
    Running,
    GameOver { at: Instant },
}

/// Construction parameters for a [`Session`]
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    pub grid_size: u32,
    pub learning_rate: f32,
    /// RNG seed for world and agent; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grid_size: 20,
            learning_rate: 0.01,
            seed: None,
        }
    }
}

/// The episode loop: one world, one long-lived agent, and the time-gated
/// tick that ties input, simulation, and learning together
///
/// Configuration changes and queued intents are consumed at tick boundaries,
/// never mid-computation.
pub struct Session {
    world: GridWorld,
    agent: Agent,
    mode: Mode,
    training: bool,
    game_speed: f32,
    intents: VecDeque<Direction>,
    phase: Phase,
    last_tick: Option<Instant>,
    restart_pending: bool,
    games_played: u32,
    total_score: u32,
    high_score: u32,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self> {
        if config.grid_size < 2 {
            return Err(Error::GridTooSmall {
                got: config.grid_size,
            });
        }
        if !(config.learning_rate > 0.0 && config.learning_rate <= 1.0) {
            return Err(Error::InvalidLearningRate {
                got: config.learning_rate,
            });
        }

        let (world_rng, agent_rng) = match config.seed {
            Some(seed) => (
                StdRng::seed_from_u64(seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (StdRng::from_entropy(), StdRng::from_entropy()),
        };

        Ok(Self {
            world: GridWorld::new(config.grid_size, world_rng),
            agent: Agent::new(config.grid_size, config.learning_rate, agent_rng),
            mode: Mode::Ai,
            training: false,
            game_speed: 5.0,
            intents: VecDeque::new(),
            phase: Phase::Running,
            last_tick: None,
            restart_pending: false,
            games_played: 0,
            total_score: 0,
            high_score: 0,
        })
    }

    /// Advance the session if at least `1/game_speed` seconds have elapsed
    /// since the last accepted tick; otherwise nothing changes
    pub fn tick(&mut self, now: Instant) -> Vec<Event> {
        let mut events = Vec::new();

        if let Some(last) = self.last_tick {
            if now.duration_since(last).as_secs_f32() < 1.0 / self.game_speed {
                return events;
            }
        }
        self.last_tick = Some(now);

        match self.phase {
            Phase::Running => self.advance(now, &mut events),
            Phase::GameOver { at } => {
                let auto = self.auto_restart() && now.duration_since(at) >= RESTART_DELAY;
                if auto || self.restart_pending {
                    self.start_episode(&mut events);
                }
            }
        }

        events
    }

    fn advance(&mut self, now: Instant, events: &mut Vec<Event>) {
        let dir = match self.mode {
            Mode::Ai => self.agent.act(self.world.snake(), self.world.food()),
            Mode::Manual => self.intents.pop_front().unwrap_or_else(|| self.world.dir()),
        };

        let training = self.training && self.mode == Mode::Ai;
        let snapshot = training.then(|| (self.world.snake().clone(), self.world.food()));

        let outcome = self.world.step(dir);

        if outcome.ate_food {
            if self.mode == Mode::Ai {
                self.agent.reward(FOOD_REWARD);
            }
            self.high_score = self.high_score.max(outcome.score);
            events.push(Event::Stats(self.stats()));
        } else if outcome.alive() {
            if self.mode == Mode::Ai {
                self.agent.reward(STEP_PENALTY);
            }
        }

        if let Some(cause) = outcome.end {
            self.total_score += outcome.score;
            // A full board is a forced win, not a death.
            if self.mode == Mode::Ai && cause != EndCause::BoardFull {
                self.agent.reward(DEATH_PENALTY);
            }
            let auto_restart = self.auto_restart();
            info!(
                "episode over: {:?}, score {}, epsilon {:.3}",
                cause,
                outcome.score,
                self.agent.exploration_rate()
            );
            self.phase = Phase::GameOver { at: now };
            events.push(Event::GameOver {
                score: outcome.score,
                auto_restart,
            });
        }

        if let Some((prev_snake, prev_food)) = snapshot {
            self.agent.learn(
                &prev_snake,
                prev_food,
                self.world.snake(),
                self.world.food(),
                outcome.ate_food,
            );
        }
    }

    fn start_episode(&mut self, events: &mut Vec<Event>) {
        self.world.reset();
        self.intents.clear();
        self.restart_pending = false;
        self.games_played += 1;
        self.phase = Phase::Running;
        debug!("episode {} started", self.games_played + 1);
        events.push(Event::Stats(self.stats()));
    }

    fn auto_restart(&self) -> bool {
        self.mode == Mode::Ai || self.training
    }

    /// Queue a manual direction intent, dropped if it reverses the snake
    ///
    /// Any intent while parked on a manual game over counts as the restart
    /// request instead.
    pub fn queue_direction(&mut self, dir: Direction) {
        if self.mode != Mode::Manual {
            return;
        }
        if matches!(self.phase, Phase::GameOver { .. }) {
            self.restart_pending = true;
            return;
        }
        if !self.world.dir().is_reverse_of(dir) {
            self.intents.push_back(dir);
        }
    }

    /// Request a restart of a finished episode, honored on the next tick
    pub fn restart(&mut self) {
        if matches!(self.phase, Phase::GameOver { .. }) {
            self.restart_pending = true;
        }
    }

    /// Switch the controller; stale manual intents are discarded
    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            info!("mode switched to {mode:?}");
            self.mode = mode;
            self.intents.clear();
        }
    }

    pub fn set_training(&mut self, training: bool) {
        if self.training != training {
            info!(
                "training {}",
                if training { "started" } else { "stopped" }
            );
            self.training = training;
        }
    }

    /// Set the tick rate in ticks per second; non-positive values are ignored
    pub fn set_speed(&mut self, speed: f32) {
        if speed > 0.0 {
            debug!("game speed set to {speed}");
            self.game_speed = speed;
        } else {
            warn!("ignoring non-positive game speed {speed}");
        }
    }

    pub fn stats(&self) -> Stats {
        let average_score = if self.games_played == 0 {
            0.0
        } else {
            self.total_score as f32 / self.games_played as f32
        };
        Stats {
            score: self.world.score(),
            high_score: self.high_score,
            games_played: self.games_played,
            average_score,
        }
    }

    pub fn world(&self) -> &GridWorld {
        &self.world
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_training(&self) -> bool {
        self.training
    }
}
