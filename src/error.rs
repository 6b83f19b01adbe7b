use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced when wiring up a session
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("grid size {got} is too small: need at least 2 cells per side")]
    GridTooSmall { got: u32 },

    #[error("learning rate {got} is out of range: must be in (0, 1]")]
    InvalidLearningRate { got: f32 },
}
