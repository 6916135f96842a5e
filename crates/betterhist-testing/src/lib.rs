//! Testing infrastructure for betterhist integration tests.
//!
//! - `transcript`: ordered tap events for segmentation fixtures
//! - `fakes`: stand-ins for the shell, the terminal and the pty streams
//! - `TestWorld`: isolated data directory with a seeded session store

pub mod fakes;
pub mod transcript;
pub mod world;

pub use transcript::Transcript;
pub use world::TestWorld;
