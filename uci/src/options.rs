/// Engine-side option as advertised by `option name ... type ...`.
#[derive(Debug, Clone)]
pub struct EngineOption {
    pub name: &'static str,
    pub option_type: EngineOptionType,
}

#[derive(Debug, Clone)]
pub enum EngineOptionType {
    Spin { min: i64, max: i64 },
    Check,
}

pub const THREADS: EngineOption = EngineOption {
    name: "Threads",
    option_type: EngineOptionType::Spin { min: 1, max: 1024 },
};

pub const HASH: EngineOption = EngineOption {
    name: "Hash",
    option_type: EngineOptionType::Spin {
        min: 1,
        max: 33_554_432,
    },
};

pub const MULTI_PV: EngineOption = EngineOption {
    name: "MultiPV",
    option_type: EngineOptionType::Spin { min: 1, max: 500 },
};

impl EngineOption {
    /// Looks up one of the standard options by name (case-insensitive, as UCI option names are).
    pub fn well_known(name: &str) -> Option<EngineOption> {
        [THREADS, HASH, MULTI_PV]
            .into_iter()
            .find(|option| option.name.eq_ignore_ascii_case(name))
    }

    pub fn validate(&self, value: &str) -> Result<(), String> {
        self.option_type
            .validate(value)
            .map_err(|e| format!("{}: {}", self.name, e))
    }
}

impl EngineOptionType {
    pub fn validate(&self, value: &str) -> Result<(), String> {
        match self {
            EngineOptionType::Spin { min, max } => {
                let parsed = value
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| format!("Invalid integer: {}", e))?;
                if parsed < *min || parsed > *max {
                    return Err(format!("Value {} out of range [{}, {}]", parsed, min, max));
                }
                Ok(())
            }
            EngineOptionType::Check => match value.to_lowercase().as_str() {
                "true" | "false" => Ok(()),
                _ => Err("Boolean value must be 'true' or 'false'".to_string()),
            },
        }
    }
}
