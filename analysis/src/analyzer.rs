use std::sync::Arc;

use log::debug;

use crate::config::{AnalysisConfig, Limits};
use crate::error::{AnalysisError, EngineId, Result};
use crate::normalize::{normalize, PrincipalVariation};
use crate::position::Position;
use crate::process::{Launcher, ProcessLauncher};
use crate::session::{CancelToken, SearchJob};
use crate::supervisor::{PoolStatus, Supervisor};

pub const DEFAULT_DEPTH: u32 = 15;
pub const DEFAULT_LINES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// `start` or a FEN string.
    pub position: String,
    /// Moves already played from `position`, in UCI notation.
    pub moves: Vec<String>,
    pub depth: u32,
    pub lines: u32,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            position: "start".to_string(),
            moves: Vec::new(),
            depth: DEFAULT_DEPTH,
            lines: DEFAULT_LINES,
        }
    }
}

impl AnalysisRequest {
    pub fn new(position: impl Into<String>) -> Self {
        Self {
            position: position.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub position: String,
    /// Depth and line count actually searched, after clamping.
    pub depth: u32,
    pub lines: u32,
    /// Best first.
    pub variations: Vec<PrincipalVariation>,
    pub best_move: Option<String>,
    /// False if the search deadline cut the search short.
    pub complete: bool,
    pub engine: EngineId,
}

/// Entry point for callers: validates requests and runs them on the pool.
#[derive(Clone)]
pub struct Analyzer {
    supervisor: Supervisor,
    limits: Limits,
}

impl Analyzer {
    pub fn new(supervisor: Supervisor, limits: Limits) -> Self {
        Self { supervisor, limits }
    }

    /// Starts a pool of engine processes as described by `config`.
    pub fn start(config: &AnalysisConfig) -> Result<Self> {
        let launcher: Arc<dyn Launcher> = Arc::new(ProcessLauncher::new(&config.engine));
        Self::with_launcher(config, launcher)
    }

    pub fn with_launcher(config: &AnalysisConfig, launcher: Arc<dyn Launcher>) -> Result<Self> {
        let supervisor = Supervisor::start(config, launcher)?;
        Ok(Self::new(supervisor, config.limits))
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        self.analyze_with_cancel(request, &CancelToken::new())
    }

    pub fn analyze_with_cancel(
        &self,
        request: &AnalysisRequest,
        cancel: &CancelToken,
    ) -> Result<AnalysisResult> {
        let job = self.prepare(request)?;
        let report = self.supervisor.submit(&job, cancel)?;

        let variations = normalize(report.outcome.lines, job.position.side_to_move());
        let best_move = variations
            .first()
            .and_then(|pv| pv.moves.first())
            .cloned();

        Ok(AnalysisResult {
            position: request.position.clone(),
            depth: job.depth,
            lines: job.lines,
            variations,
            best_move,
            complete: report.outcome.completed,
            engine: report.engine,
        })
    }

    /// Validates and clamps a request without touching any engine.
    pub fn prepare(&self, request: &AnalysisRequest) -> Result<SearchJob> {
        if request.depth == 0 {
            return Err(AnalysisError::InvalidRequest(
                "depth must be positive".to_string(),
            ));
        }
        if request.lines == 0 {
            return Err(AnalysisError::InvalidRequest(
                "line count must be positive".to_string(),
            ));
        }

        let position = Position::parse(&request.position, &request.moves)?;
        let depth = request.depth.min(self.limits.max_depth);
        let lines = request.lines.min(self.limits.max_lines);
        if depth != request.depth || lines != request.lines {
            debug!(
                "Clamped request from depth {} x{} to depth {} x{}",
                request.depth, request.lines, depth, lines
            );
        }

        Ok(SearchJob {
            position,
            depth,
            lines,
        })
    }

    pub fn status(&self) -> PoolStatus {
        self.supervisor.status()
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn shutdown(&self) {
        self.supervisor.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, PoolConfig, Timeouts};
    use crate::mock::{MockBehavior, MockLauncher, MockStats};
    use crate::normalize::Evaluation;
    use cozy_chess::Color;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            engine: EngineConfig {
                path: PathBuf::from("mock"),
                args: vec![],
                options: vec![],
            },
            pool: PoolConfig {
                size: 1,
                acquire_timeout: Duration::from_secs(5),
                restart_attempts: 2,
                restart_backoff: Duration::from_millis(10),
            },
            limits: Limits {
                max_depth: 20,
                max_lines: 4,
            },
            timeouts: Timeouts {
                handshake: Duration::from_millis(200),
                search: Duration::from_millis(500),
                stop_grace: Duration::from_millis(100),
                quit_grace: Duration::from_millis(10),
            },
        }
    }

    fn analyzer(behavior: MockBehavior) -> (Analyzer, Arc<MockStats>) {
        let launcher = MockLauncher::new(behavior);
        let stats = launcher.stats();
        (
            Analyzer::with_launcher(&config(), Arc::new(launcher)).unwrap(),
            stats,
        )
    }

    fn request(position: &str, depth: u32, lines: u32) -> AnalysisRequest {
        AnalysisRequest {
            position: position.to_string(),
            moves: vec![],
            depth,
            lines,
        }
    }

    #[test]
    fn test_two_line_example() {
        let (analyzer, _stats) = analyzer(MockBehavior::with_infos(
            &[
                "info depth 10 multipv 1 score cp 25 pv e2e4",
                "info depth 10 multipv 2 score mate 3 pv d2d4",
            ],
            "e2e4",
        ));

        let result = analyzer.analyze(&request("start", 10, 2)).unwrap();

        assert_eq!(result.depth, 10);
        assert_eq!(result.lines, 2);
        assert_eq!(result.variations.len(), 2);

        let first = &result.variations[0];
        assert_eq!(first.rank, 1);
        assert_eq!(first.score, Evaluation::Centipawns(25));
        assert_eq!(first.moves, vec!["e2e4"]);
        assert_eq!(first.perspective, Color::White);

        let second = &result.variations[1];
        assert_eq!(second.rank, 2);
        assert_eq!(second.score, Evaluation::MateIn(3));
        assert_eq!(second.moves, vec!["d2d4"]);

        assert_eq!(result.best_move.as_deref(), Some("e2e4"));
        assert!(result.complete);
    }

    #[test]
    fn test_more_lines_than_reported() {
        let (analyzer, _stats) = analyzer(MockBehavior::with_infos(
            &["info depth 10 multipv 1 score cp 25 pv e2e4"],
            "e2e4",
        ));

        let result = analyzer.analyze(&request("start", 10, 5)).unwrap();
        assert_eq!(result.lines, 4);
        assert_eq!(result.variations.len(), 1);
        assert_eq!(result.variations[0].rank, 1);
    }

    #[test]
    fn test_no_variations_means_no_best_move() {
        let (analyzer, _stats) = analyzer(MockBehavior::with_infos(&[], "(none)"));

        let result = analyzer.analyze(&request("start", 3, 1)).unwrap();
        assert!(result.variations.is_empty());
        assert_eq!(result.best_move, None);
    }

    #[test]
    fn test_requests_are_clamped() {
        let (analyzer, stats) = analyzer(MockBehavior::default());

        let result = analyzer.analyze(&request("start", 99, 50)).unwrap();
        assert_eq!(result.depth, 20);
        assert_eq!(result.lines, 4);

        let commands = stats.commands();
        assert!(commands.contains(&"go depth 20".to_string()));
        assert!(commands.contains(&"setoption name MultiPV value 4".to_string()));
    }

    #[test]
    fn test_invalid_requests_touch_no_engine() {
        let (analyzer, stats) = analyzer(MockBehavior::default());
        let before = stats.commands().len();

        let invalid = [
            request("start", 0, 1),
            request("start", 10, 0),
            request("definitely not a fen", 10, 1),
            AnalysisRequest {
                moves: vec!["e2e5".to_string()],
                ..request("start", 10, 1)
            },
        ];
        for request in &invalid {
            assert!(matches!(
                analyzer.analyze(request),
                Err(AnalysisError::InvalidRequest(_))
            ));
        }

        assert_eq!(stats.commands().len(), before);
        assert_eq!(stats.sessions(), 0);
    }

    #[test]
    fn test_perspective_follows_side_to_move() {
        let (analyzer, stats) = analyzer(MockBehavior::with_infos(
            &["info depth 10 multipv 1 score cp -40 pv g8f6"],
            "g8f6",
        ));

        let request = AnalysisRequest {
            moves: vec!["e2e4".to_string()],
            ..request("startpos", 10, 1)
        };
        let result = analyzer.analyze(&request).unwrap();

        let pv = &result.variations[0];
        assert_eq!(pv.perspective, Color::Black);
        assert_eq!(pv.score, Evaluation::Centipawns(-40));
        assert!(stats
            .commands()
            .contains(&"position startpos moves e2e4".to_string()));
    }

    #[test]
    fn test_ranks_form_a_prefix() {
        let (analyzer, _stats) = analyzer(MockBehavior::with_infos(
            &[
                "info depth 9 multipv 1 score cp 20 pv e2e4",
                "info depth 9 multipv 3 score cp 5 pv c2c4",
                "info depth 9 multipv 2 score cp 10",
                "info depth 10 multipv 1 score cp 22 pv e2e4 e7e5",
            ],
            "e2e4",
        ));

        let result = analyzer.analyze(&request("start", 10, 3)).unwrap();
        let ranks: Vec<u32> = result.variations.iter().map(|pv| pv.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
        assert_eq!(result.variations[0].score, Evaluation::Centipawns(22));
        assert_eq!(result.variations[1].moves, vec!["c2c4"]);
    }
}
