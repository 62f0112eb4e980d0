//! Incremental replay session
//!
//! Streaming/replay consumers feed candles one at a time instead of scanning
//! a finished sequence. The session owns the per-session candle and gap lists
//! (no global state; independent sessions never cross-mutate) and reports,
//! per pushed candle, exactly the gaps that appeared or changed status so a
//! consumer can redraw minimally.

use crate::{detect::FvgDetector, lifecycle, EngineConfig, FairValueGap, GapError, Ohlcv, OhlcvExt, Result};

/// Gaps affected by one pushed candle. Both lists empty when the candle
/// neither confirmed a new pattern nor cleared an open gap.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ReplayUpdate {
    /// Gap confirmed by the pushed candle, if its window qualified
    pub detected: Vec<FairValueGap>,
    /// Previously-open gaps whose close breach happened on this candle
    pub cleared: Vec<FairValueGap>,
}

impl ReplayUpdate {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detected.is_empty() && self.cleared.is_empty()
    }
}

/// Session-scoped incremental detector state.
///
/// Candles must arrive in strict timestamp order; an out-of-order candle is
/// rejected, never silently reordered. A session can be dropped or left idle
/// between pushes at any point; its state is simply retained as-is.
#[derive(Debug, Clone)]
pub struct ReplaySession<T: Ohlcv> {
    detector: FvgDetector,
    config: EngineConfig,
    candles: Vec<T>,
    gaps: Vec<FairValueGap>,
}

impl<T: Ohlcv> Default for ReplaySession<T> {
    fn default() -> Self {
        Self::new(FvgDetector::default())
    }
}

impl<T: Ohlcv> ReplaySession<T> {
    pub fn new(detector: FvgDetector) -> Self {
        Self::with_config(detector, EngineConfig::default())
    }

    pub fn with_config(detector: FvgDetector, config: EngineConfig) -> Self {
        Self {
            detector,
            config,
            candles: Vec::new(),
            gaps: Vec::new(),
        }
    }

    /// Append the next candle and update all tracker state it touches.
    ///
    /// Processing order per arrival: validate, extend display extents, run
    /// the single-candle clearing check on every still-open gap, then
    /// evaluate the window the new candle completes. A completed replay holds
    /// exactly the gaps a batch scan of the same sequence produces.
    pub fn push(&mut self, candle: T) -> Result<ReplayUpdate> {
        if self.config.validate_data {
            candle.validate().map_err(|e| match e {
                GapError::InvalidCandle { reason, .. } => GapError::InvalidCandle {
                    index: self.candles.len(),
                    reason,
                },
                other => other,
            })?;
        }

        if let Some(last) = self.candles.last() {
            if candle.timestamp() <= last.timestamp() {
                return Err(GapError::OutOfOrderCandle {
                    index: self.candles.len(),
                    prev: last.timestamp(),
                    next: candle.timestamp(),
                });
            }
        }

        self.candles.push(candle);
        let k = self.candles.len() - 1;
        let arrived_time = self.candles[k].timestamp();
        let close = self.candles[k].close();
        let lookback = self.detector.max_lookback;

        // The display extent grows with the data until left + max_lookback,
        // for cleared gaps too; this matches what a batch scan of the
        // sequence-so-far would report.
        for gap in &mut self.gaps {
            if gap.left_index + lookback >= k {
                gap.end_index = k;
                gap.end_time = arrived_time;
            }
        }

        let mut update = ReplayUpdate::default();

        // Per-gap isolation: each open gap sees the new close independently,
        // so a status change in one can never leak into another.
        for gap in &mut self.gaps {
            if lifecycle::apply_close(gap, k, close, lookback) {
                update.cleared.push(*gap);
            }
        }

        if let Some(gap) = self.detector.detect_at(&self.candles, k) {
            let keep = match self.config.kind_filter {
                Some(kind) => gap.kind == kind,
                None => true,
            };
            if keep {
                self.gaps.push(gap);
                update.detected.push(gap);
            }
        }

        if !update.is_empty() {
            tracing::debug!(
                "candle {}: {} detected, {} cleared",
                k,
                update.detected.len(),
                update.cleared.len(),
            );
        }

        Ok(update)
    }

    /// All gaps seen so far, ordered by `right_index` ascending
    #[inline]
    pub fn gaps(&self) -> &[FairValueGap] {
        &self.gaps
    }

    /// Gaps still open for clearing
    pub fn valid_gaps(&self) -> impl Iterator<Item = &FairValueGap> {
        self.gaps.iter().filter(|g| g.is_valid())
    }

    #[inline]
    pub fn candles(&self) -> &[T] {
        &self.candles
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Drop all candles and gaps, keeping the configuration
    pub fn reset(&mut self) {
        self.candles.clear();
        self.gaps.clear();
        tracing::debug!("replay session reset");
    }
}
