//! Per-request 401 retry bookkeeping.

/// Where a request stands with respect to its single 401 retry.
///
/// ```text
/// NotRetried ──401──▶ Retried ──▶ Terminal
///      └────────────other──────────▲
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryState {
    #[default]
    NotRetried,
    /// The one allowed retry has been spent.
    Retried,
    /// The request has settled; nothing further may happen to it.
    Terminal,
}

impl RetryState {
    /// Consumes the retry if it is still available.
    pub fn begin_retry(&mut self) -> bool {
        match self {
            Self::NotRetried => {
                *self = Self::Retried;
                true
            }
            Self::Retried | Self::Terminal => false,
        }
    }

    pub fn terminate(&mut self) {
        *self = Self::Terminal;
    }
}
