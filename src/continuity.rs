//! Candle feed validation and continuity checking
//!
//! The detector assumes a validated, strictly time-ordered feed; this module
//! is the ingestion-side kernel that enforces it. It flags holes in a
//! timeframe's timestamp grid, rejects malformed candles with their position,
//! and can fill missing slots with flat candles at the previous close.

use crate::{Candle, GapError, Ohlcv, OhlcvExt, Result};

/// Timeframe/interval of a candle sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Expected step between consecutive candles, in seconds
    pub fn seconds(self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::H1 => 60 * 60,
            Timeframe::H4 => 4 * 60 * 60,
            Timeframe::D1 => 24 * 60 * 60,
        }
    }

    pub fn minutes(self) -> i64 {
        self.seconds() / 60
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A hole in the timestamp grid between candle `index` and `index + 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampGap {
    pub index: usize,
    pub from_time: i64,
    pub to_time: i64,
    pub gap_minutes: i64,
}

/// Continuity check result
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ContinuityReport {
    pub gaps: Vec<TimestampGap>,
}

impl ContinuityReport {
    #[inline]
    pub fn is_continuous(&self) -> bool {
        self.gaps.is_empty()
    }

    #[inline]
    pub fn total_gaps(&self) -> usize {
        self.gaps.len()
    }
}

/// Flag every timestamp delta larger than 1.5x the timeframe step.
///
/// The slack tolerates exchange clock jitter without reporting every slightly
/// late candle as a hole. Sequences shorter than 2 candles are continuous.
pub fn check_continuity<T: Ohlcv>(candles: &[T], timeframe: Timeframe) -> ContinuityReport {
    let mut report = ContinuityReport::default();
    if candles.len() < 2 {
        return report;
    }

    let threshold = timeframe.seconds() * 3 / 2;
    for (i, pair) in candles.windows(2).enumerate() {
        let delta = pair[1].timestamp() - pair[0].timestamp();
        if delta > threshold {
            report.gaps.push(TimestampGap {
                index: i,
                from_time: pair[0].timestamp(),
                to_time: pair[1].timestamp(),
                gap_minutes: delta / 60,
            });
        }
    }

    if !report.is_continuous() {
        tracing::warn!(
            "{} discontinuities in {} {} candles",
            report.total_gaps(),
            candles.len(),
            timeframe,
        );
    }
    report
}

/// Full feed integrity check: per-candle OHLC sanity plus strictly
/// increasing timestamps. Fails on the first violation with its index.
pub fn validate_integrity<T: Ohlcv>(candles: &[T]) -> Result<()> {
    for (i, candle) in candles.iter().enumerate() {
        candle.validate().map_err(|e| match e {
            GapError::InvalidCandle { reason, .. } => GapError::InvalidCandle { index: i, reason },
            other => other,
        })?;

        let (open, close) = (candle.open(), candle.close());
        if candle.high() < open || candle.high() < close {
            return Err(GapError::InvalidCandle {
                index: i,
                reason: "high below open/close",
            });
        }
        if candle.low() > open || candle.low() > close {
            return Err(GapError::InvalidCandle {
                index: i,
                reason: "low above open/close",
            });
        }
        if candle.volume() < 0.0 {
            return Err(GapError::InvalidCandle {
                index: i,
                reason: "negative volume",
            });
        }

        if i > 0 && candle.timestamp() <= candles[i - 1].timestamp() {
            return Err(GapError::OutOfOrderCandle {
                index: i,
                prev: candles[i - 1].timestamp(),
                next: candle.timestamp(),
            });
        }
    }
    Ok(())
}

/// Fill holes in the timestamp grid with flat candles at the previous close
/// (open = high = low = close, volume 0), stepping by the timeframe interval.
pub fn fill_missing(candles: &[Candle], timeframe: Timeframe) -> Vec<Candle> {
    if candles.len() < 2 {
        return candles.to_vec();
    }

    let step = timeframe.seconds();
    let mut filled = Vec::with_capacity(candles.len());

    for pair in candles.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        filled.push(prev);

        let mut expected = prev.timestamp + step;
        while expected < next.timestamp {
            filled.push(Candle::new(
                expected, prev.close, prev.close, prev.close, prev.close, 0.0,
            ));
            expected += step;
        }
    }
    filled.push(candles[candles.len() - 1]);

    if filled.len() > candles.len() {
        tracing::debug!(
            "filled {} missing {} candles",
            filled.len() - candles.len(),
            timeframe,
        );
    }
    filled
}
