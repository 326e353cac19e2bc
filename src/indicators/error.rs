use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndicatorError {
    /// Fewer bars than the period needs; callers skip the symbol/period.
    #[error("insufficient data for period {period}: {available} bars available")]
    InsufficientData { period: u32, available: usize },

    #[error("invalid period {0}")]
    InvalidPeriod(u32),

    #[error("non-finite value in series")]
    NonFinite,
}
