pub mod discrete;
pub mod window_env;

pub use discrete::{DiscreteAction, DiscreteWindowEnv};
pub use window_env::{CostConfig, EnvStep, MarketWindowEnv, StepInfo};

/// Gym-style episodic environment over precomputed market windows.
///
/// Actions are target positions; continuous environments accept any value in
/// [-1, 1], discrete wrappers map their action set onto the same range.
pub trait Environment: Send {
    /// Restart the episode and return the first observation.
    fn reset(&mut self) -> Vec<f64>;
    /// Advance one window with the given target position.
    fn step(&mut self, action: f64) -> EnvStep;
    /// Length of every observation vector this environment emits.
    fn observation_len(&self) -> usize;
}
