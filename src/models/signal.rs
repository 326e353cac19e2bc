//! Signal events produced by the detectors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::indicators::Side;

/// The three detector families. Also used to name the detectors themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    EmaTouch,
    DailyFlip,
    VolumeSpike,
}

impl SignalKind {
    pub const ALL: [SignalKind; 3] = [
        SignalKind::EmaTouch,
        SignalKind::DailyFlip,
        SignalKind::VolumeSpike,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::EmaTouch => "ema_touch",
            SignalKind::DailyFlip => "daily_flip",
            SignalKind::VolumeSpike => "volume_spike",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ema_touch" | "ema" => Ok(SignalKind::EmaTouch),
            "daily_flip" | "flip" => Ok(SignalKind::DailyFlip),
            "volume_spike" | "volume" | "volume_scanner" => Ok(SignalKind::VolumeSpike),
            other => Err(format!("unknown scanner '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipDirection {
    /// below → above
    Bullish,
    /// above → below
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoverCategory {
    Gainer,
    Loser,
    VolumeSurge,
}

impl MoverCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoverCategory::Gainer => "gainer",
            MoverCategory::Loser => "loser",
            MoverCategory::VolumeSurge => "volume_surge",
        }
    }
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalDetail {
    EmaTouch {
        period: u32,
        ema: f64,
        price: f64,
        distance_pct: f64,
        side: Side,
    },
    DailyFlip {
        flip: FlipDirection,
        price: f64,
        reference: String,
        body_pct: f64,
    },
    Mover {
        category: MoverCategory,
        price: f64,
        change_24h_pct: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        volume_ratio: Option<f64>,
        volume_24h: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub symbol: String,
    pub kind: SignalKind,
    pub direction: SignalDirection,
    pub magnitude: f64,
    pub timestamp: DateTime<Utc>,
    pub detail: SignalDetail,
}

impl SignalEvent {
    /// Key under which this event is deduplicated. EMA touches are keyed per
    /// period and movers per category, so they fire independently.
    pub fn cooldown_key(&self) -> CooldownKey {
        let variant = match &self.detail {
            SignalDetail::EmaTouch { period, .. } => Some(period.to_string()),
            SignalDetail::DailyFlip { .. } => None,
            SignalDetail::Mover { category, .. } => Some(category.as_str().to_string()),
        };
        CooldownKey::new(&self.symbol, self.kind, variant.as_deref())
    }
}

/// `(symbol, signal)` pair identifying a cooldown entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CooldownKey {
    pub symbol: String,
    pub signal: String,
}

impl CooldownKey {
    pub fn new(symbol: &str, kind: SignalKind, variant: Option<&str>) -> Self {
        let signal = match variant {
            Some(v) => format!("{}:{}", kind.as_str(), v),
            None => kind.as_str().to_string(),
        };
        Self {
            symbol: symbol.to_string(),
            signal,
        }
    }
}

impl fmt::Display for CooldownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.symbol, self.signal)
    }
}
