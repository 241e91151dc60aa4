//! Trade direction and signal kinds.

use std::fmt;
use std::str::FromStr;

/// Raw signal value and trade direction.
///
/// `Buy` opens a long position (or closes a short one), `Sell` opens a short
/// position (or closes a long one), `Wait` means no action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PriceAction {
    Buy,
    Sell,
    #[default]
    Wait,
}

impl PriceAction {
    /// The action that closes a position opened with `self`.
    pub fn opposite(self) -> Self {
        match self {
            PriceAction::Buy => PriceAction::Sell,
            PriceAction::Sell => PriceAction::Buy,
            PriceAction::Wait => PriceAction::Wait,
        }
    }

    pub fn is_wait(self) -> bool {
        self == PriceAction::Wait
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriceAction::Buy => "buy",
            PriceAction::Sell => "sell",
            PriceAction::Wait => "wait",
        }
    }
}

impl fmt::Display for PriceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(PriceAction::Buy),
            "sell" => Ok(PriceAction::Sell),
            "wait" | "" => Ok(PriceAction::Wait),
            other => Err(format!("unknown price action '{other}'")),
        }
    }
}

/// Which raw signal column an evaluator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigType {
    Entry,
    Exit,
}
