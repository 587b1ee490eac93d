//! Position identifiers accepted by the analyzer.
//!
//! Only enough chess is done here to reject garbage before an engine sees it:
//! the FEN must parse, the played moves must be legal, and the side to move
//! at the end is needed to report scores from the right perspective.

use std::str::FromStr;

use cozy_chess::{util::parse_uci_move, Board, Color};
use uci::{PositionSpec, UciCommand};

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    spec: PositionSpec,
    moves: Vec<String>,
    side_to_move: Color,
}

impl Position {
    /// `identifier` is `start`, `startpos` or a FEN string.
    pub fn parse(identifier: &str, moves: &[String]) -> Result<Self> {
        let identifier = identifier.trim();

        let (spec, mut board) = match identifier {
            "start" | "startpos" => (PositionSpec::StartPos, Board::default()),
            "" => return Err(invalid("empty position")),
            fen => {
                let board = Board::from_str(fen)
                    .map_err(|_| invalid(&format!("malformed FEN {:?}", fen)))?;
                (PositionSpec::Fen(fen.to_string()), board)
            }
        };

        for mv_str in moves {
            let mv = parse_uci_move(&board, mv_str)
                .map_err(|_| invalid(&format!("malformed move {:?}", mv_str)))?;
            board
                .try_play(mv)
                .map_err(|_| invalid(&format!("illegal move {:?}", mv_str)))?;
        }

        Ok(Self {
            spec,
            moves: moves.to_vec(),
            side_to_move: board.side_to_move(),
        })
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn command(&self) -> UciCommand {
        UciCommand::Position {
            position: self.spec.clone(),
            moves: self.moves.clone(),
        }
    }
}

fn invalid(reason: &str) -> AnalysisError {
    AnalysisError::InvalidRequest(reason.to_string())
}
