use std::path::PathBuf;
use std::time::Duration;

use uci::{EngineOption, HASH, MULTI_PV, THREADS};

use crate::error::{AnalysisError, Result};

const DEFAULT_HASH_MB: u32 = 64;

#[derive(Debug, Clone, Default)]
pub struct AnalysisConfig {
    pub engine: EngineConfig,
    pub pool: PoolConfig,
    pub limits: Limits,
    pub timeouts: Timeouts,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pool.size == 0 {
            return Err(AnalysisError::Configuration(
                "pool size must be at least 1".to_string(),
            ));
        }
        if self.limits.max_depth == 0 || self.limits.max_lines == 0 {
            return Err(AnalysisError::Configuration(
                "depth and line limits must be positive".to_string(),
            ));
        }
        MULTI_PV
            .validate(&self.limits.max_lines.to_string())
            .map_err(AnalysisError::Configuration)?;
        self.engine.validate_options()
    }
}

/// How to launch one engine instance. Every pool member uses the same one.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
    /// Applied with `setoption` during startup, in order.
    pub options: Vec<(String, String)>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("stockfish", 1)
    }
}

impl EngineConfig {
    /// Engine at `path` with the standard options, splitting the machine's
    /// cores evenly across `pool_size` instances.
    pub fn new(path: impl Into<PathBuf>, pool_size: usize) -> Self {
        let threads = (num_cpus::get() / pool_size.max(1)).max(1);

        Self {
            path: path.into(),
            args: Vec::new(),
            options: vec![
                (THREADS.name.to_string(), threads.to_string()),
                (HASH.name.to_string(), DEFAULT_HASH_MB.to_string()),
            ],
        }
    }

    /// Sets an option, replacing an earlier value for the same name.
    pub fn set_option(&mut self, name: &str, value: impl ToString) {
        let value = value.to_string();
        match self
            .options
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => *existing = value,
            None => self.options.push((name.to_string(), value)),
        }
    }

    /// Checks the values of standard options. Engine-specific options pass through unchecked.
    pub fn validate_options(&self) -> Result<()> {
        for (name, value) in &self.options {
            if name.eq_ignore_ascii_case(MULTI_PV.name) {
                return Err(AnalysisError::Configuration(
                    "MultiPV is set per request, not per engine".to_string(),
                ));
            }
            if let Some(option) = EngineOption::well_known(name) {
                option.validate(value).map_err(AnalysisError::Configuration)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub size: usize,
    /// Longest a request waits for an idle engine.
    pub acquire_timeout: Duration,
    pub restart_attempts: u32,
    /// Delay before the first restart retry, doubled on each further attempt.
    pub restart_backoff: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 1,
            acquire_timeout: Duration::from_secs(30),
            restart_attempts: 3,
            restart_backoff: Duration::from_millis(500),
        }
    }
}

/// Resource ceilings applied to every request.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_depth: u32,
    pub max_lines: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: 30,
            max_lines: 5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Budget for each of the startup exchanges (`uciok`, `readyok`).
    pub handshake: Duration,
    /// Per-request search deadline.
    pub search: Duration,
    /// How long to wait for `bestmove` after sending `stop`.
    pub stop_grace: Duration,
    /// How long a process gets to exit after `quit` before it is killed.
    pub quit_grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(10),
            search: Duration::from_secs(30),
            stop_grace: Duration::from_secs(2),
            quit_grace: Duration::from_millis(100),
        }
    }
}
