use serde::{Deserialize, Serialize};
use std::fmt;

/// Action proposed by the scoring stages. The last stage to write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    None,
    Long,
    Short,
    Exit,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::None => "none",
            Operation::Long => "long",
            Operation::Short => "short",
            Operation::Exit => "exit",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
