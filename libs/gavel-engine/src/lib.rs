//! Judging core: materialize source, compile and run it under limits,
//! and reduce every outcome to exactly one verdict.

pub mod adapter;
pub mod config;
pub mod evaluator;
pub mod judge;
pub mod languages;
pub mod materializer;
pub mod progress;
pub mod supervisor;
pub mod verdict;

pub use config::JudgeConfig;
pub use judge::Judge;
pub use progress::{NoopProgress, ProgressSink};
pub use supervisor::{LocalSupervisor, Supervisor};
