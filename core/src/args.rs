use std::path::PathBuf;
use std::time::Duration;

use analysis::{AnalysisConfig, AnalysisRequest, EngineConfig, DEFAULT_DEPTH, DEFAULT_LINES};
use clap::Parser;
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "Kibitz")]
#[command(author = "Jørgen Hanssen <jorgen@hanssen.io>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// UCI engine executable.
    #[arg(short, long, default_value = "stockfish")]
    pub engine: PathBuf,

    /// Extra argument for the engine executable. Can be repeated.
    #[arg(long = "engine-arg")]
    pub engine_args: Vec<String>,

    /// Number of engine processes to run side by side.
    #[arg(long, default_value_t = 1)]
    pub pool_size: usize,

    /// Search threads per engine. Defaults to the cores split across the pool.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Hash table size per engine in MB.
    #[arg(long, default_value_t = 64)]
    pub hash: u32,

    #[arg(short, long, default_value_t = DEFAULT_DEPTH)]
    pub depth: u32,

    /// Number of principal variations per position.
    #[arg(short = 'n', long, default_value_t = DEFAULT_LINES)]
    pub lines: u32,

    #[arg(long, default_value_t = 30)]
    pub max_depth: u32,

    #[arg(long, default_value_t = 5)]
    pub max_lines: u32,

    #[arg(long, default_value_t = 30_000)]
    pub search_timeout_ms: u64,

    #[arg(long, default_value_t = 10_000)]
    pub handshake_timeout_ms: u64,

    /// Log engine communication to a file for debugging.
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    #[arg(long, default_value = "info", value_parser = parse_level)]
    pub log_level: LevelFilter,

    /// Positions to analyze: `start` or a FEN, optionally followed by `;` and
    /// the moves played from it, e.g. "start;e2e4 e7e5".
    #[arg(default_value = "start")]
    pub positions: Vec<String>,
}

impl Args {
    pub fn config(&self) -> AnalysisConfig {
        let mut config = AnalysisConfig::default();

        config.engine = EngineConfig::new(&self.engine, self.pool_size);
        config.engine.args = self.engine_args.clone();
        if let Some(threads) = self.threads {
            config.engine.set_option("Threads", threads);
        }
        config.engine.set_option("Hash", self.hash);

        config.pool.size = self.pool_size;
        config.limits.max_depth = self.max_depth;
        config.limits.max_lines = self.max_lines;
        config.timeouts.search = Duration::from_millis(self.search_timeout_ms);
        config.timeouts.handshake = Duration::from_millis(self.handshake_timeout_ms);

        config
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.positions
            .iter()
            .map(|spec| {
                let (position, moves) = spec.split_once(';').unwrap_or((spec.as_str(), ""));
                AnalysisRequest {
                    position: position.trim().to_string(),
                    moves: moves.split_whitespace().map(str::to_string).collect(),
                    depth: self.depth,
                    lines: self.lines,
                }
            })
            .collect()
    }
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    level
        .parse()
        .map_err(|_| format!("unknown log level {:?}", level))
}
