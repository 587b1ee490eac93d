use super::commands::{Bound, EngineOutput, InfoLine, Score};
use super::NULL_MOVE;

/// Info keywords that terminate a move list.
const INFO_KEYWORDS: &[&str] = &[
    "depth",
    "seldepth",
    "time",
    "nodes",
    "pv",
    "multipv",
    "score",
    "currmove",
    "currmovenumber",
    "hashfull",
    "nps",
    "tbhits",
    "sbhits",
    "cpuload",
    "string",
    "refutation",
    "currline",
    "wdl",
];

pub struct Decoder;

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self
    }

    /// Decodes one line of engine output. Anything that is not understood
    /// comes back as `Unknown`.
    pub fn decode(&self, input: &str) -> EngineOutput {
        let input = input.trim();
        match input {
            "uciok" => EngineOutput::UciOk,
            "readyok" => EngineOutput::ReadyOk,

            _ if input.starts_with("id name ") => {
                EngineOutput::IdName(input["id name ".len()..].trim().to_string())
            }
            _ if input.starts_with("id author ") => {
                EngineOutput::IdAuthor(input["id author ".len()..].trim().to_string())
            }
            _ if first_token(input) == Some("bestmove") => self.decode_bestmove(input),
            _ if first_token(input) == Some("info") => self
                .decode_info(input)
                .map(EngineOutput::Info)
                .unwrap_or_else(|| EngineOutput::Unknown(input.to_string())),

            _ => EngineOutput::Unknown(input.to_string()),
        }
    }

    fn decode_bestmove(&self, input: &str) -> EngineOutput {
        // Parse: bestmove <move> [ponder <move>]
        let mut tokens = input.split_whitespace().skip(1);

        let best_move = tokens.next().and_then(real_move);
        let ponder = match tokens.next() {
            Some("ponder") => tokens.next().and_then(real_move),
            _ => None,
        };

        EngineOutput::BestMove { best_move, ponder }
    }

    fn decode_info(&self, input: &str) -> Option<InfoLine> {
        let tokens: Vec<&str> = input.split_whitespace().skip(1).collect();

        let mut info = InfoLine {
            multipv: 1,
            ..Default::default()
        };
        let mut score = None;

        let mut i = 0;
        while i < tokens.len() {
            match tokens[i] {
                "depth" => {
                    info.depth = parse_at(&tokens, i + 1)?;
                    i += 2;
                }
                "seldepth" => {
                    info.sel_depth = Some(parse_at(&tokens, i + 1)?);
                    i += 2;
                }
                "multipv" => {
                    info.multipv = parse_at(&tokens, i + 1)?;
                    i += 2;
                }
                "nodes" => {
                    info.nodes = Some(parse_at(&tokens, i + 1)?);
                    i += 2;
                }
                "score" => {
                    let value: i32 = parse_at(&tokens, i + 2)?;
                    score = Some(match *tokens.get(i + 1)? {
                        "cp" => Score::Centipawns(value),
                        "mate" => Score::Mate(value),
                        _ => return None,
                    });
                    i += 3;

                    match tokens.get(i) {
                        Some(&"lowerbound") => {
                            info.bound = Bound::Lower;
                            i += 1;
                        }
                        Some(&"upperbound") => {
                            info.bound = Bound::Upper;
                            i += 1;
                        }
                        _ => {}
                    }
                }
                "pv" => {
                    let moves = take_moves(&tokens[i + 1..]);
                    i += 1 + moves.len();
                    info.pv = moves;
                }
                // Diagnostic text, never an evaluation.
                "string" => return None,
                "refutation" | "currline" => {
                    i += 1 + take_moves(&tokens[i + 1..]).len();
                }
                "wdl" => i += 4,
                _ if INFO_KEYWORDS.contains(&tokens[i]) => i += 2,
                _ => i += 1,
            }
        }

        if info.multipv == 0 {
            return None;
        }

        info.score = score?;
        Some(info)
    }
}

fn first_token(input: &str) -> Option<&str> {
    input.split_whitespace().next()
}

fn parse_at<T: std::str::FromStr>(tokens: &[&str], index: usize) -> Option<T> {
    tokens.get(index)?.parse().ok()
}

fn take_moves(tokens: &[&str]) -> Vec<String> {
    tokens
        .iter()
        .take_while(|token| !INFO_KEYWORDS.contains(*token))
        .map(|token| token.to_string())
        .collect()
}

fn real_move(token: &str) -> Option<String> {
    match token {
        NULL_MOVE | "(none)" => None,
        mv => Some(mv.to_string()),
    }
}
