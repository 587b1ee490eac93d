use std::time::Duration;

/// Instance id assigned by the supervisor.
pub type EngineId = usize;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("engine {engine} failed to start: {reason}")]
    StartupError { engine: EngineId, reason: String },

    #[error("engine {engine} did not respond within {timeout:?}")]
    EngineTimeout { engine: EngineId, timeout: Duration },

    #[error("engine {engine} exited unexpectedly: {reason}")]
    EngineCrashed { engine: EngineId, reason: String },

    #[error("no engine became available within {0:?}")]
    PoolExhausted(Duration),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("analysis cancelled")]
    Cancelled,

    #[error("engine pool is shutting down")]
    ShuttingDown,

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl AnalysisError {
    /// True for failures caused by a specific engine instance, which gets replaced.
    pub fn is_instance_failure(&self) -> bool {
        matches!(
            self,
            AnalysisError::StartupError { .. }
                | AnalysisError::EngineTimeout { .. }
                | AnalysisError::EngineCrashed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
