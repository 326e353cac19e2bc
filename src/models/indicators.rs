use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmaIndicator {
    pub value: f64,
    pub period: u32,
}

/// Which side of a reference line a value sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Above,
    Below,
}

impl Side {
    /// `None` when the two values are equal (no side).
    pub fn of(value: f64, reference: f64) -> Option<Self> {
        if value > reference {
            Some(Side::Above)
        } else if value < reference {
            Some(Side::Below)
        } else {
            None
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Above => write!(f, "above"),
            Side::Below => write!(f, "below"),
        }
    }
}
