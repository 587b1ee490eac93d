use super::commands::{GoParams, PositionSpec, UciCommand};

pub struct Encoder {}

impl Encoder {
    pub fn encode(&self, command: &UciCommand) -> String {
        match command {
            UciCommand::Uci => "uci".to_string(),
            UciCommand::IsReady => "isready".to_string(),
            UciCommand::UciNewGame => "ucinewgame".to_string(),

            UciCommand::SetOption { name, value } => match value {
                Some(value) => format!("setoption name {} value {}", name, value),
                None => format!("setoption name {}", name),
            },
            UciCommand::Position { position, moves } => {
                let mut line = match position {
                    PositionSpec::StartPos => "position startpos".to_string(),
                    PositionSpec::Fen(fen) => format!("position fen {}", fen.trim()),
                };
                if !moves.is_empty() {
                    line.push_str(" moves ");
                    line.push_str(&moves.join(" "));
                }
                line
            }
            UciCommand::Go(params) => encode_go(params),

            UciCommand::Stop => "stop".to_string(),
            UciCommand::Quit => "quit".to_string(),
        }
    }
}

fn encode_go(params: &GoParams) -> String {
    let mut line = String::from("go");
    if let Some(depth) = params.depth {
        line.push_str(&format!(" depth {}", depth));
    }
    line
}
