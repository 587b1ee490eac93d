//! Engine scores to caller-facing evaluations.
//!
//! UCI engines report scores for the side to move, and so do we: a positive
//! value always favors the side that was to move in the analyzed position.
//! Callers wanting a fixed color use [`Evaluation::for_color`] at their boundary.

use std::fmt;

use cozy_chess::Color;
use uci::Score;

use crate::session::RawLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Centipawns(i32),
    /// Moves to mate. Positive: the analyzed side mates. Negative: it gets mated.
    /// `MateIn(0)` means the analyzed side is already checkmated.
    MateIn(i32),
    /// The analyzed side has already delivered checkmate. Only produced by
    /// [`Evaluation::for_color`] flipping a `MateIn(0)`.
    MateGiven,
}

impl Evaluation {
    pub fn centipawns(self) -> Option<i32> {
        match self {
            Evaluation::Centipawns(cp) => Some(cp),
            Evaluation::MateIn(_) | Evaluation::MateGiven => None,
        }
    }

    pub fn mate(self) -> Option<i32> {
        match self {
            Evaluation::Centipawns(_) => None,
            Evaluation::MateIn(moves) => Some(moves),
            Evaluation::MateGiven => Some(0),
        }
    }

    pub fn is_mate(self) -> bool {
        matches!(self, Evaluation::MateIn(_) | Evaluation::MateGiven)
    }

    /// Re-expresses a score computed for `perspective` from `color`'s point of view.
    pub fn for_color(self, perspective: Color, color: Color) -> Evaluation {
        if perspective == color {
            return self;
        }
        match self {
            Evaluation::Centipawns(cp) => Evaluation::Centipawns(cp.saturating_neg()),
            Evaluation::MateIn(0) => Evaluation::MateGiven,
            Evaluation::MateIn(moves) => Evaluation::MateIn(moves.saturating_neg()),
            Evaluation::MateGiven => Evaluation::MateIn(0),
        }
    }
}

impl From<Score> for Evaluation {
    fn from(score: Score) -> Self {
        match score {
            Score::Centipawns(cp) => Evaluation::Centipawns(cp),
            Score::Mate(moves) => Evaluation::MateIn(moves),
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Centipawns(cp) => write!(f, "{}", cp),
            Evaluation::MateIn(moves) => write!(f, "M{}", moves),
            Evaluation::MateGiven => write!(f, "M+0"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalVariation {
    pub rank: u32,
    pub moves: Vec<String>,
    pub score: Evaluation,
    /// Side to move in the analyzed position; `score` is from its point of view.
    pub perspective: Color,
    pub depth: u32,
}

/// Ranks the engine's lines best first, numbering them 1..=n without gaps.
pub fn normalize(mut lines: Vec<RawLine>, perspective: Color) -> Vec<PrincipalVariation> {
    lines.sort_by_key(|line| line.multipv);

    lines
        .into_iter()
        .filter(|line| !line.pv.is_empty())
        .enumerate()
        .map(|(i, line)| PrincipalVariation {
            rank: i as u32 + 1,
            moves: line.pv,
            score: line.score.into(),
            perspective,
            depth: line.depth,
        })
        .collect()
}
