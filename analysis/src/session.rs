//! Drives one search on a leased engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use log::{debug, warn};
use uci::{EngineOutput, GoParams, InfoLine, Score, UciCommand, MULTI_PV};

use crate::config::Timeouts;
use crate::error::{AnalysisError, Result};
use crate::position::Position;
use crate::process::EngineProcess;

/// Longest single blocking read, so cancellation is noticed promptly.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A validated, clamped request ready to be sent to an engine.
#[derive(Debug, Clone)]
pub struct SearchJob {
    pub position: Position,
    pub depth: u32,
    pub lines: u32,
}

/// Latest report for one variation, as the engine sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub multipv: u32,
    pub depth: u32,
    pub score: Score,
    pub pv: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Ordered by variation index.
    pub lines: Vec<RawLine>,
    /// False when the search was cut short by the deadline.
    pub completed: bool,
}

/// Caller-side cancellation flag. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Runs `job` on a ready engine. On success or cancellation the engine is ready
/// again afterwards; on any other error it has been marked crashed.
pub fn run(
    process: &mut EngineProcess,
    job: &SearchJob,
    timeouts: &Timeouts,
    cancel: &CancelToken,
) -> Result<SessionOutcome> {
    process.begin_session()?;

    let result = drive(process, job, timeouts, cancel);
    match &result {
        Ok(_) | Err(AnalysisError::Cancelled) => process.end_session(),
        Err(e) => {
            warn!("Engine {} session failed: {}", process.id(), e);
            process.mark_crashed();
        }
    }
    result
}

fn drive(
    process: &mut EngineProcess,
    job: &SearchJob,
    timeouts: &Timeouts,
    cancel: &CancelToken,
) -> Result<SessionOutcome> {
    process.send(&UciCommand::UciNewGame)?;
    process.send(&UciCommand::SetOption {
        name: MULTI_PV.name.to_string(),
        value: Some(job.lines.to_string()),
    })?;
    process.sync(timeouts.handshake)?;

    process.send(&job.position.command())?;
    process.send(&UciCommand::Go(GoParams { depth: Some(job.depth) }))?;

    let deadline = Instant::now() + timeouts.search;
    let mut variations = Variations::new(job.lines);

    loop {
        if cancel.is_cancelled() {
            debug!("Engine {}: search cancelled", process.id());
            stop_search(process, &mut variations, timeouts)?;
            return Err(AnalysisError::Cancelled);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            warn!(
                "Engine {}: search deadline of {:?} reached, stopping",
                process.id(),
                timeouts.search
            );
            stop_search(process, &mut variations, timeouts)?;
            return Ok(variations.finish(false));
        }

        match process.read_event(remaining.min(POLL_INTERVAL))? {
            Some(EngineOutput::Info(info)) => variations.record(info),
            Some(EngineOutput::BestMove { .. }) => return Ok(variations.finish(true)),
            Some(_) | None => {}
        }
    }
}

/// Sends `stop` and drains output up to the engine's `bestmove`.
fn stop_search(
    process: &mut EngineProcess,
    variations: &mut Variations,
    timeouts: &Timeouts,
) -> Result<()> {
    process.send(&UciCommand::Stop)?;

    let grace = Instant::now() + timeouts.stop_grace;
    loop {
        let remaining = grace.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match process.read_event(remaining)? {
            Some(EngineOutput::Info(info)) => variations.record(info),
            Some(EngineOutput::BestMove { .. }) => return Ok(()),
            Some(_) | None => {}
        }
    }

    let engine = process.id();
    process.mark_crashed();
    if process.has_exited() {
        Err(AnalysisError::EngineCrashed {
            engine,
            reason: "exited while stopping a search".to_string(),
        })
    } else {
        Err(AnalysisError::EngineTimeout {
            engine,
            timeout: timeouts.search + timeouts.stop_grace,
        })
    }
}

/// Most recent report per variation index.
struct Variations {
    limit: u32,
    latest: AHashMap<u32, RawLine>,
}

impl Variations {
    fn new(limit: u32) -> Self {
        Self {
            limit,
            latest: AHashMap::new(),
        }
    }

    fn record(&mut self, info: InfoLine) {
        if info.multipv == 0 || info.multipv > self.limit {
            return;
        }

        match self.latest.get_mut(&info.multipv) {
            Some(line) => {
                if info.depth < line.depth {
                    return;
                }
                line.depth = info.depth;
                line.score = info.score;
                // A report without a pv keeps the previous move list.
                if !info.pv.is_empty() {
                    line.pv = info.pv;
                }
            }
            None if info.pv.is_empty() => {}
            None => {
                self.latest.insert(
                    info.multipv,
                    RawLine {
                        multipv: info.multipv,
                        depth: info.depth,
                        score: info.score,
                        pv: info.pv,
                    },
                );
            }
        }
    }

    fn finish(self, completed: bool) -> SessionOutcome {
        let mut lines: Vec<RawLine> = self.latest.into_values().collect();
        lines.sort_by_key(|line| line.multipv);

        SessionOutcome { lines, completed }
    }
}
