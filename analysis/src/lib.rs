mod analyzer;
mod error;
mod position;

pub mod config;
pub mod normalize;
pub mod process;
pub mod session;
pub mod supervisor;

#[cfg(test)]
mod mock;

pub use analyzer::{AnalysisRequest, AnalysisResult, Analyzer, DEFAULT_DEPTH, DEFAULT_LINES};
pub use config::{AnalysisConfig, EngineConfig, Limits, PoolConfig, Timeouts};
pub use error::{AnalysisError, EngineId, Result};
pub use normalize::{Evaluation, PrincipalVariation};
pub use position::Position;
pub use session::CancelToken;
pub use supervisor::{PoolStatus, Supervisor};
