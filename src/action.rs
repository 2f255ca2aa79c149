use std::fmt;
use std::str::FromStr;

use crate::error::HarnessError;

/// What a single invocation of the program under test does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Encode,
    Decode,
    /// Encode piped straight into a second, decoding, instance.
    EncodeThenDecode,
}

impl ActionKind {
    /// Default benchmark order.
    pub const ALL: [ActionKind; 3] = [
        ActionKind::Encode,
        ActionKind::Decode,
        ActionKind::EncodeThenDecode,
    ];

    /// Symbol written to the `action` column and accepted on the command line.
    pub fn symbol(self) -> &'static str {
        match self {
            ActionKind::Encode => "-",
            ActionKind::Decode => "+",
            ActionKind::EncodeThenDecode => "-+",
        }
    }

    pub fn from_symbol(symbol: &str) -> Result<Self, HarnessError> {
        match symbol {
            "-" => Ok(ActionKind::Encode),
            "+" => Ok(ActionKind::Decode),
            "-+" | "+-" => Ok(ActionKind::EncodeThenDecode),
            other => Err(HarnessError::InvalidAction(other.to_string())),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ActionKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::from_symbol(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_parse_back() {
        for action in ActionKind::ALL {
            assert_eq!(ActionKind::from_symbol(action.symbol()).unwrap(), action);
        }
        assert_eq!("+-".parse::<ActionKind>().unwrap(), ActionKind::EncodeThenDecode);
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        let err = ActionKind::from_symbol("x").unwrap_err();
        assert!(matches!(err, HarnessError::InvalidAction(ref s) if s == "x"));
        assert!(ActionKind::from_symbol("--").is_err());
    }
}
