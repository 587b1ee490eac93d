mod decoder;
mod encoder;
mod options;

pub mod commands;

pub use commands::{Bound, EngineOutput, GoParams, InfoLine, PositionSpec, Score, UciCommand};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use options::{EngineOption, EngineOptionType, HASH, MULTI_PV, THREADS};

/// Null move in UCI format. Engines send it as the bestmove when the position has no legal moves.
pub const NULL_MOVE: &str = "0000";
