//! Core simulation and learning for a self-improving game of snake
//!
//! A [`session::Session`] ties together one [`world::GridWorld`] and one
//! long-lived [`agent::Agent`], advancing them with a time-gated tick that a
//! host UI (or the [`runner`] driver thread) supplies with wall-clock time,
//! direction intents, and configuration changes. Rendering, persistence, and
//! I/O are left to external collaborators.

/// The tabular Q-learning controller
pub mod agent;

/// Crate error types
pub mod error;

/// Exploration policies
pub mod exploration;

/// A cancellable fixed-rate driver thread for a session
pub mod runner;

/// The episode loop: ticking, input, and stats
pub mod session;

/// The grid, the snake, and the movement rules
pub mod world;

mod util;
