//! Gap lifecycle tracking
//!
//! A gap clears when a later candle's close re-enters its interval: a bullish
//! gap when the close drops below `bottom_price` (the left candle's high), a
//! bearish gap when the close rises above `top_price` (the left candle's
//! low). Clearing is only evaluated while the candle index is inside the
//! gap's display window `[left_index, left_index + max_lookback]`; past that
//! horizon the gap is frozen in whatever status it reached.

use crate::{FairValueGap, GapKind, Ohlcv};

/// Whether `close` breaches the gap's guarded boundary
#[inline]
pub fn close_breaches(gap: &FairValueGap, close: f64) -> bool {
    match gap.kind {
        GapKind::Bullish => close < gap.bottom_price,
        GapKind::Bearish => close > gap.top_price,
    }
}

/// Single-candle incremental step: apply the close at `index` to one gap.
///
/// Returns `true` iff the gap's status changed. Idempotent: an
/// already-cleared gap, a candle at or before the confirming candle, and a
/// candle beyond the display window are all no-ops. Touches no state other
/// than this gap's.
pub fn apply_close(gap: &mut FairValueGap, index: usize, close: f64, max_lookback: usize) -> bool {
    if gap.is_cleared() {
        return false;
    }
    if index <= gap.right_index || index > gap.left_index + max_lookback {
        return false;
    }
    if close_breaches(gap, close) {
        gap.clear_at(index);
        tracing::debug!(
            "{:?} FVG from candle {} cleared at candle {} (close {})",
            gap.kind,
            gap.right_index,
            index,
            close,
        );
        return true;
    }
    false
}

/// Batch forward scan for one gap: first breaching close inside
/// `(right_index, min(left_index + max_lookback, last_index)]` wins and the
/// scan stops there.
pub fn resolve<T: Ohlcv>(gap: &mut FairValueGap, candles: &[T], max_lookback: usize) {
    if candles.is_empty() {
        return;
    }
    let limit = (gap.left_index + max_lookback).min(candles.len() - 1);
    for j in gap.right_index + 1..=limit {
        if apply_close(gap, j, candles[j].close(), max_lookback) {
            break;
        }
    }
}

/// Resolve every gap against the full sequence.
///
/// Each gap is evaluated in isolation; a gap's update can never affect
/// another gap's state.
pub fn resolve_all<T: Ohlcv>(gaps: &mut [FairValueGap], candles: &[T], max_lookback: usize) {
    for gap in gaps.iter_mut() {
        resolve(gap, candles, max_lookback);
    }
}
