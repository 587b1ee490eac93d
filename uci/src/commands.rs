/// Commands sent from the analysis side to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,

    UciNewGame,
    SetOption {
        name: String,
        value: Option<String>,
    },
    Position {
        position: PositionSpec,
        moves: Vec<String>,
    },
    Go(GoParams),

    Stop,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionSpec {
    StartPos,
    Fen(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    // Search depth ply only.
    pub depth: Option<u32>,
}

/// Lines received from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutput {
    IdName(String),
    IdAuthor(String),
    UciOk,
    ReadyOk,
    BestMove {
        best_move: Option<String>,
        ponder: Option<String>,
    },
    Info(InfoLine),
    Unknown(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoLine {
    pub depth: u32,
    pub sel_depth: Option<u32>,
    pub multipv: u32,
    pub nodes: Option<u64>,
    pub score: Score,
    pub bound: Bound,
    pub pv: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32), // centipawns
    Mate(i32),       // Positive for mate-in-n, negative for mated-in-n
}

impl Default for Score {
    fn default() -> Self {
        Score::Centipawns(0)
    }
}

/// Whether a reported score is exact or only a bound from an aspiration fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Bound {
    #[default]
    Exact,
    Lower,
    Upper,
}
