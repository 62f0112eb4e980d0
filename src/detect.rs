//! Fair value gap pattern detector
//!
//! A candidate window at index `i` is the three consecutive candles
//! L = `i-2`, M = `i-1`, R = `i`. The pattern is only confirmed in hindsight
//! once the right candle exists, so `i` is both the right index and the
//! detection index of any gap the window produces.

use crate::{FairValueGap, GapError, GapKind, GapStatus, Ohlcv, OhlcvExt, Result};

/// Candles after the left candle during which a gap stays live for display
/// and clearing checks. Empirically chosen rather than derived; override via
/// [`FvgDetector::max_lookback`].
pub const DISPLAY_WINDOW: usize = 40;

/// Three-candle imbalance detector
#[derive(Debug, Clone)]
pub struct FvgDetector {
    /// Display window and clearing horizon, in candles after the left candle
    pub max_lookback: usize,
}

impl Default for FvgDetector {
    fn default() -> Self {
        Self {
            max_lookback: DISPLAY_WINDOW,
        }
    }
}

impl FvgDetector {
    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.max_lookback == 0 {
            return Err(GapError::InvalidValue("max_lookback must be > 0"));
        }
        Ok(())
    }

    /// Evaluate the window ending at `index`.
    ///
    /// Bullish iff `M.close > M.open`, `M.close > L.high` and
    /// `L.high < R.low`; bearish is the mirror against `L.low`/`R.high`.
    /// The two rule sets cannot hold for the same window, so a window yields
    /// at most one gap.
    ///
    /// The middle candle is judged by its **close** against the left extreme:
    /// a wick through the level without a close beyond it does not qualify.
    pub fn detect_at<T: Ohlcv>(&self, candles: &[T], index: usize) -> Option<FairValueGap> {
        if index < 2 {
            return None;
        }
        let left = candles.get(index - 2)?;
        let middle = candles.get(index - 1)?;
        let right = candles.get(index)?;

        let kind = if middle.is_bullish()
            && middle.close() > left.high()
            && left.high() < right.low()
        {
            GapKind::Bullish
        } else if middle.is_bearish()
            && middle.close() < left.low()
            && left.low() > right.high()
        {
            GapKind::Bearish
        } else {
            return None;
        };

        // Strict inequalities above make both intervals non-degenerate
        let (top_price, bottom_price) = match kind {
            GapKind::Bullish => (right.low(), left.high()),
            GapKind::Bearish => (left.low(), right.high()),
        };

        let left_index = index - 2;
        let last_index = candles.len() - 1;
        let end_index = (left_index + self.max_lookback).min(last_index);

        tracing::debug!(
            "{:?} FVG at candle {}: interval {}..{}, size {}",
            kind,
            index,
            bottom_price,
            top_price,
            top_price - bottom_price,
        );

        Some(FairValueGap {
            kind,
            top_price,
            bottom_price,
            start_index: left_index,
            start_time: left.timestamp(),
            end_index,
            end_time: candles[end_index].timestamp(),
            left_index,
            middle_index: index - 1,
            right_index: index,
            status: GapStatus::Valid,
            cleared_at_index: None,
        })
    }

    /// Plain indexed scan over every candidate index 2..n-1.
    ///
    /// Windows overlap (one candle can be the right of one window and the
    /// left of a later one), so each index is evaluated independently and
    /// none is skipped. Returns raw gaps, all `valid`; lifecycle resolution
    /// happens separately.
    pub fn scan_windows<T: Ohlcv>(&self, candles: &[T]) -> Vec<FairValueGap> {
        if candles.len() < 3 {
            return Vec::new();
        }

        let mut gaps = Vec::new();
        for i in 2..candles.len() {
            if let Some(gap) = self.detect_at(candles, i) {
                gaps.push(gap);
            }
        }
        gaps
    }
}
