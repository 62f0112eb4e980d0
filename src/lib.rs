//! # FVGD - Fair Value Gap Detector
//!
//! Fair value gap (FVG) detection and lifecycle tracking for OHLC candle data.
//!
//! A fair value gap is a three-candle imbalance: a directional middle candle
//! leaves an untouched price interval between the first and third candles.
//! Each detected gap starts out `valid` and transitions to `cleared` when a
//! later close re-enters the interval within the gap's display window.
//!
//! ## Quick Start
//!
//! ```rust
//! use fvgd::prelude::*;
//!
//! // Define your OHLC data
//! struct Bar { t: i64, o: f64, h: f64, l: f64, c: f64, v: f64 }
//!
//! impl Ohlcv for Bar {
//!     fn timestamp(&self) -> i64 { self.t }
//!     fn open(&self) -> f64 { self.o }
//!     fn high(&self) -> f64 { self.h }
//!     fn low(&self) -> f64 { self.l }
//!     fn close(&self) -> f64 { self.c }
//!     fn volume(&self) -> f64 { self.v }
//! }
//!
//! // Create an engine with the default 40-candle display window
//! let engine = GapEngineBuilder::new().build().unwrap();
//!
//! // Scan your data
//! let bars: Vec<Bar> = vec![];
//! let gaps = engine.scan(&bars).unwrap();
//! ```

pub mod continuity;
pub mod detect;
pub mod lifecycle;
pub mod session;

pub mod prelude {
    pub use crate::{
        // Continuity
        continuity::{check_continuity, fill_missing, validate_integrity},
        continuity::{ContinuityReport, Timeframe, TimestampGap},
        // Detector
        detect::{FvgDetector, DISPLAY_WINDOW},
        // Lifecycle
        lifecycle::{apply_close, close_breaches, resolve, resolve_all},
        // Parallel
        scan_parallel,
        // Session
        session::{ReplaySession, ReplayUpdate},
        // Types
        Candle,
        EngineConfig,
        FairValueGap,
        // Engine
        GapEngine,
        GapEngineBuilder,
        // Errors
        GapError,
        GapKind,
        GapStatus,
        Lookback,
        OhlcvExt,
        Result,
        ScanError,
        ScanResult,
        Ohlcv,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, GapError>;

/// Errors that can occur during gap detection and tracking
#[derive(Debug, Clone, thiserror::Error)]
pub enum GapError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },

    #[error("Out-of-order candle at index {index}: timestamp {next} <= {prev}")]
    OutOfOrderCandle { index: usize, prev: i64, next: i64 },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Candle-count window length (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Lookback(usize);

impl Lookback {
    /// Create a new Lookback, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(GapError::InvalidValue("Lookback must be > 0"));
        }
        Ok(Self(value))
    }

    /// Create a Lookback from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for Lookback {
    fn default() -> Self {
        Self(detect::DISPLAY_WINDOW)
    }
}

impl serde::Serialize for Lookback {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Lookback {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Lookback::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLC candle data trait.
///
/// Timestamps are epoch seconds and must be strictly increasing within a
/// sequence; the detector assumes the feed enforces this (see
/// [`continuity::validate_integrity`]).
pub trait Ohlcv {
    fn timestamp(&self) -> i64;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Extension trait with computed properties for OHLC data
pub trait OhlcvExt: Ohlcv {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Validate OHLC data consistency
    fn validate(&self) -> Result<()> {
        if self.high() < self.low() {
            return Err(GapError::InvalidCandle {
                index: 0,
                reason: "high < low",
            });
        }
        if self.open().is_nan()
            || self.high().is_nan()
            || self.low().is_nan()
            || self.close().is_nan()
        {
            return Err(GapError::InvalidCandle {
                index: 0,
                reason: "NaN in OHLC",
            });
        }
        if self.open().is_infinite()
            || self.high().is_infinite()
            || self.low().is_infinite()
            || self.close().is_infinite()
        {
            return Err(GapError::InvalidCandle {
                index: 0,
                reason: "Infinite value in OHLC",
            });
        }
        Ok(())
    }
}

impl<T: Ohlcv> OhlcvExt for T {}

/// Concrete candle record as produced by the ingestion layer.
///
/// Serde aliases accept the capitalized column names of raw CSV exports.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    #[serde(alias = "Open")]
    pub open: f64,
    #[serde(alias = "High")]
    pub high: f64,
    #[serde(alias = "Low")]
    pub low: f64,
    #[serde(alias = "Close")]
    pub close: f64,
    #[serde(alias = "Volume", default)]
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl Ohlcv for Candle {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

// ============================================================
// GAP MODEL
// ============================================================

/// Direction of a fair value gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapKind {
    Bullish,
    Bearish,
}

impl GapKind {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, GapKind::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, GapKind::Bearish)
    }
}

/// Lifecycle state of a gap. `Cleared` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapStatus {
    Valid,
    Cleared,
}

/// A detected fair value gap - Copy, no allocations.
///
/// Boundaries and forming indices are fixed at detection; only `status`,
/// `cleared_at_index` and the display extent (`end_index`/`end_time`) change
/// afterwards. `top_price > bottom_price` holds for every emitted gap.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairValueGap {
    pub kind: GapKind,
    pub top_price: f64,
    pub bottom_price: f64,
    /// Left forming candle; anchors display and the clearing window
    pub start_index: usize,
    pub start_time: i64,
    /// `min(start_index + max_lookback, last_index)` at the time of evaluation
    pub end_index: usize,
    pub end_time: i64,
    pub left_index: usize,
    pub middle_index: usize,
    /// Confirming candle; the gap is only observable once this candle exists
    pub right_index: usize,
    pub status: GapStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleared_at_index: Option<usize>,
}

impl FairValueGap {
    /// Index of the candle that confirmed the pattern (the right candle)
    #[inline]
    pub fn detection_index(&self) -> usize {
        self.right_index
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self.status, GapStatus::Valid)
    }

    #[inline]
    pub fn is_cleared(&self) -> bool {
        matches!(self.status, GapStatus::Cleared)
    }

    /// Height of the untouched price interval
    #[inline]
    pub fn gap_size(&self) -> f64 {
        self.top_price - self.bottom_price
    }

    /// Mark the gap cleared by the candle at `index`.
    ///
    /// No-op on an already-cleared gap: the transition is one-way.
    pub fn clear_at(&mut self, index: usize) {
        if self.is_valid() {
            self.status = GapStatus::Cleared;
            self.cleared_at_index = Some(index);
        }
    }
}

// ============================================================
// GAP ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub validate_data: bool,
    pub kind_filter: Option<GapKind>,
}

/// Main detection engine: one full pass = detection + lifecycle resolution.
///
/// The output list is ordered by `right_index` ascending and contains every
/// emitted gap regardless of status; consumers filter by status as needed.
#[derive(Debug, Clone)]
pub struct GapEngine {
    detector: detect::FvgDetector,
    config: EngineConfig,
}

impl GapEngine {
    #[inline]
    pub fn max_lookback(&self) -> usize {
        self.detector.max_lookback
    }

    /// Evaluate the single window ending at `index`. Lifecycle is not applied.
    #[inline]
    pub fn detect_at<T: Ohlcv>(&self, candles: &[T], index: usize) -> Option<FairValueGap> {
        self.detector.detect_at(candles, index)
    }

    /// Scan the full sequence: detect every qualifying window, then resolve
    /// each gap's final status against the forward candles.
    ///
    /// Sequences shorter than 3 candles produce an empty list, not an error.
    pub fn scan<T: Ohlcv>(&self, candles: &[T]) -> Result<Vec<FairValueGap>> {
        if self.config.validate_data {
            self.validate_candles(candles)?;
        }

        let mut gaps = self.detector.scan_windows(candles);
        if let Some(kind) = self.config.kind_filter {
            gaps.retain(|g| g.kind == kind);
        }

        lifecycle::resolve_all(&mut gaps, candles, self.detector.max_lookback);

        let bullish = gaps.iter().filter(|g| g.kind.is_bullish()).count();
        let valid = gaps.iter().filter(|g| g.is_valid()).count();
        tracing::info!(
            "checked {} windows, detected {} gaps ({} bullish, {} bearish), {} valid",
            candles.len().saturating_sub(2),
            gaps.len(),
            bullish,
            gaps.len() - bullish,
            valid,
        );

        Ok(gaps)
    }

    /// Start an incremental replay session with this engine's configuration.
    pub fn session<T: Ohlcv>(&self) -> session::ReplaySession<T> {
        session::ReplaySession::with_config(self.detector.clone(), self.config.clone())
    }

    fn validate_candles<T: Ohlcv>(&self, candles: &[T]) -> Result<()> {
        for (i, candle) in candles.iter().enumerate() {
            candle.validate().map_err(|e| match e {
                GapError::InvalidCandle { reason, .. } => {
                    GapError::InvalidCandle { index: i, reason }
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

impl Default for GapEngine {
    fn default() -> Self {
        Self {
            detector: detect::FvgDetector::default(),
            config: EngineConfig::default(),
        }
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating [`GapEngine`] instances
#[derive(Debug, Clone)]
pub struct GapEngineBuilder {
    detector: detect::FvgDetector,
    config: EngineConfig,
}

impl Default for GapEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GapEngineBuilder {
    pub fn new() -> Self {
        Self {
            detector: detect::FvgDetector::default(),
            config: EngineConfig::default(),
        }
    }

    /// Display window and clearing horizon, in candles after the left candle
    pub fn max_lookback(mut self, lookback: Lookback) -> Self {
        self.detector.max_lookback = lookback.get();
        self
    }

    /// Enable/disable per-candle data validation during scans
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Emit only gaps of one direction
    pub fn only_kind(mut self, kind: GapKind) -> Self {
        self.config.kind_filter = Some(kind);
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<GapEngine> {
        self.detector.validate_config()?;
        Ok(GapEngine {
            detector: self.detector,
            config: self.config,
        })
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub gaps: Vec<FairValueGap>,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: GapError,
}

/// Parallel scanning of multiple instruments.
///
/// Each sequence is scanned independently; a failure on one symbol never
/// affects the others.
pub fn scan_parallel<'a, T, I>(
    engine: &GapEngine,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: Ohlcv + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, candles)| {
            engine
                .scan(candles)
                .map(|gaps| ScanResult {
                    symbol: symbol.to_string(),
                    gaps,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(t: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(t, o, h, l, c, 1000.0)
    }

    /// Flat filler bars that form no gap and clear nothing
    fn quiet_bars(start_t: i64, n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| bar(start_t + i as i64 * 60, 105.0, 106.0, 104.0, 105.5))
            .collect()
    }

    #[test]
    fn test_lookback_validation() {
        assert!(Lookback::new(1).is_ok());
        assert!(Lookback::new(40).is_ok());
        assert!(Lookback::new(0).is_err());
        assert_eq!(Lookback::default().get(), detect::DISPLAY_WINDOW);
    }

    #[test]
    fn test_ohlcv_ext() {
        let c = bar(0, 100.0, 110.0, 90.0, 105.0);
        assert_eq!(c.body(), 5.0);
        assert_eq!(c.range(), 20.0);
        assert!(c.is_bullish());
        assert!(!c.is_bearish());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_candle_validation_failures() {
        assert!(bar(0, 100.0, 90.0, 110.0, 100.0).validate().is_err()); // high < low
        assert!(bar(0, f64::NAN, 110.0, 90.0, 100.0).validate().is_err());
        assert!(bar(0, 100.0, f64::INFINITY, 90.0, 100.0).validate().is_err());
    }

    #[test]
    fn test_engine_builder() {
        let engine = GapEngineBuilder::new()
            .max_lookback(Lookback::new(60).unwrap())
            .validate_data(true)
            .build();
        assert!(engine.is_ok());
        assert_eq!(engine.unwrap().max_lookback(), 60);
    }

    #[test]
    fn test_empty_scan() {
        let engine = GapEngine::default();
        let candles: Vec<Candle> = vec![];
        assert!(engine.scan(&candles).unwrap().is_empty());
    }

    #[test]
    fn test_short_sequence_is_not_an_error() {
        let engine = GapEngine::default();
        let candles = vec![
            bar(0, 100.0, 101.0, 99.0, 100.5),
            bar(60, 100.5, 102.0, 100.0, 101.0),
        ];
        assert!(engine.scan(&candles).unwrap().is_empty());
    }

    #[test]
    fn test_bullish_scenario() {
        // L = {high: 100, low: 95}, M = {open: 101, close: 108}, R = {low: 103, high: 110}
        let candles = vec![
            bar(0, 96.0, 100.0, 95.0, 99.0),
            bar(60, 101.0, 109.0, 100.5, 108.0),
            bar(120, 104.0, 110.0, 103.0, 109.0),
        ];

        let gaps = GapEngine::default().scan(&candles).unwrap();
        assert_eq!(gaps.len(), 1);

        let gap = &gaps[0];
        assert_eq!(gap.kind, GapKind::Bullish);
        assert_eq!(gap.top_price, 103.0);
        assert_eq!(gap.bottom_price, 100.0);
        assert_eq!(gap.left_index, 0);
        assert_eq!(gap.middle_index, 1);
        assert_eq!(gap.right_index, 2);
        assert_eq!(gap.detection_index(), 2);
        assert_eq!(gap.start_time, 0);
        assert_eq!(gap.end_index, 2); // capped at last candle
        assert_eq!(gap.status, GapStatus::Valid);
        assert!(gap.cleared_at_index.is_none());
    }

    #[test]
    fn test_kind_filter() {
        let mut candles = vec![
            bar(0, 96.0, 100.0, 95.0, 99.0),
            bar(60, 101.0, 109.0, 100.5, 108.0),
            bar(120, 104.0, 110.0, 103.0, 109.0),
        ];
        candles.extend(quiet_bars(180, 3));

        let engine = GapEngineBuilder::new()
            .only_kind(GapKind::Bearish)
            .build()
            .unwrap();
        assert!(engine.scan(&candles).unwrap().is_empty());

        let engine = GapEngineBuilder::new()
            .only_kind(GapKind::Bullish)
            .build()
            .unwrap();
        assert_eq!(engine.scan(&candles).unwrap().len(), 1);
    }

    #[test]
    fn test_validate_data_reports_index() {
        let candles = vec![
            bar(0, 100.0, 101.0, 99.0, 100.5),
            bar(60, 100.0, 99.0, 101.0, 100.0), // high < low
            bar(120, 100.0, 101.0, 99.0, 100.5),
        ];

        let engine = GapEngineBuilder::new().validate_data(true).build().unwrap();
        match engine.scan(&candles) {
            Err(GapError::InvalidCandle { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InvalidCandle, got {other:?}"),
        }
    }

    #[test]
    fn test_clear_at_is_one_way() {
        let candles = vec![
            bar(0, 96.0, 100.0, 95.0, 99.0),
            bar(60, 101.0, 109.0, 100.5, 108.0),
            bar(120, 104.0, 110.0, 103.0, 109.0),
        ];
        let mut gap = GapEngine::default().detect_at(&candles, 2).unwrap();

        gap.clear_at(10);
        assert_eq!(gap.cleared_at_index, Some(10));
        gap.clear_at(20);
        assert_eq!(gap.cleared_at_index, Some(10)); // terminal
    }

    #[test]
    fn test_parallel_scan() {
        let bullish = vec![
            bar(0, 96.0, 100.0, 95.0, 99.0),
            bar(60, 101.0, 109.0, 100.5, 108.0),
            bar(120, 104.0, 110.0, 103.0, 109.0),
        ];
        let quiet = quiet_bars(0, 10);

        let engine = GapEngine::default();
        let instruments: Vec<(&str, &[Candle])> = vec![("EURUSD", &bullish), ("GBPUSD", &quiet)];

        let (results, errors) = scan_parallel(&engine, instruments);
        assert_eq!(results.len(), 2);
        assert!(errors.is_empty());

        let eur = results.iter().find(|r| r.symbol == "EURUSD").unwrap();
        assert_eq!(eur.gaps.len(), 1);
    }

    #[test]
    fn test_gap_serde_contract() {
        let candles = vec![
            bar(0, 96.0, 100.0, 95.0, 99.0),
            bar(60, 101.0, 109.0, 100.5, 108.0),
            bar(120, 104.0, 110.0, 103.0, 109.0),
        ];
        let gaps = GapEngine::default().scan(&candles).unwrap();
        let json = serde_json::to_value(gaps[0]).unwrap();

        assert_eq!(json["kind"], "bullish");
        assert_eq!(json["topPrice"], 103.0);
        assert_eq!(json["bottomPrice"], 100.0);
        assert_eq!(json["startTime"], 0);
        assert_eq!(json["status"], "valid");
        // unset while the gap is valid
        assert!(json.get("clearedAtIndex").is_none());
    }

    #[test]
    fn test_candle_accepts_csv_column_names() {
        let json =
            r#"{"timestamp": 60, "Open": 1.0, "High": 2.0, "Low": 0.5, "Close": 1.5, "Volume": 10.0}"#;
        let candle: Candle = serde_json::from_str(json).unwrap();
        assert_eq!(candle.open, 1.0);
        assert_eq!(candle.volume, 10.0);
    }
}
