//! Independent A/V sync measurement and quality validation.
//!
//! The validator is the system's QA instrument, not its actuator: it
//! records paired audio/video position samples on its own, computes
//! statistically grounded quality metrics over them, and raises
//! discrete sync events. It never steers the master clock — the
//! correction recommendation it produces is advisory. Keeping this
//! measurement path separate from the clock's internal correction
//! bookkeeping means the exported measurement log always reflects what
//! was actually observed.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mt_common::TimePoint;

use crate::error::SyncError;
use crate::stats;

/// Samples required before drift/stability estimates are meaningful.
const MIN_SAMPLES_FOR_STATS: usize = 10;
/// Trailing window for the drift-rate regression.
const DRIFT_CALCULATION_WINDOW_MS: f64 = 30_000.0;
/// Measurements considered by the correction recommendation.
const MAX_RECOMMENDATION_SAMPLES: usize = 50;
/// Minimum spacing between repeated lip-sync events.
const LIP_SYNC_EVENT_INTERVAL: Duration = Duration::from_secs(5);

/// Sync validator configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SyncValidatorConfig {
    /// Offsets within this tolerance count as in sync.
    pub sync_tolerance_ms: f64,
    /// Nominal measurement cadence (informational; the caller paces).
    pub measurement_interval_ms: f64,
    /// Maximum retained measurements (FIFO eviction past this).
    pub max_measurement_history: usize,
    /// Whether correction recommendations should be acted on.
    pub enable_automatic_correction: bool,
    /// Enable lip-sync scoring and events.
    pub enable_lip_sync_detection: bool,
    /// Lip-sync tolerance threshold.
    pub lip_sync_threshold_ms: f64,
    /// Enable quality metric computation.
    pub enable_quality_monitoring: bool,
    /// How aggressively to recommend corrections (0-1).
    pub correction_aggression: f64,
}

impl Default for SyncValidatorConfig {
    fn default() -> Self {
        Self {
            sync_tolerance_ms: 10.0,
            measurement_interval_ms: 100.0,
            max_measurement_history: 10_000,
            enable_automatic_correction: true,
            enable_lip_sync_detection: true,
            lip_sync_threshold_ms: 40.0,
            enable_quality_monitoring: true,
            correction_aggression: 0.5,
        }
    }
}

/// One recorded sync sample. Immutable after creation.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SyncMeasurement {
    /// Microseconds since the validator started.
    pub timestamp_us: i64,
    /// A/V offset in milliseconds (positive = video ahead).
    pub av_offset_ms: f64,
    /// Confidence in this measurement (0-1).
    pub confidence_score: f64,
    /// Audio position at measurement.
    pub audio_pos: TimePoint,
    /// Video position at measurement.
    pub video_pos: TimePoint,
}

impl fmt::Display for SyncMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Offset: {:.2}ms, Confidence: {:.2}",
            self.av_offset_ms, self.confidence_score
        )
    }
}

/// Comprehensive sync quality metrics over the retained history.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SyncQualityMetrics {
    pub mean_offset_ms: f64,
    pub median_offset_ms: f64,
    pub std_deviation_ms: f64,
    pub max_offset_ms: f64,
    pub min_offset_ms: f64,

    /// Regression slope of offset over the trailing window, ms/min.
    pub drift_rate_ms_per_min: f64,
    /// 0-1, higher is steadier.
    pub sync_stability_score: f64,
    /// 0-1 weighted blend of percentage, stability, mean, and spread.
    pub overall_quality_score: f64,

    pub measurement_count: i64,
    pub in_sync_count: i64,
    pub out_of_sync_count: i64,
    pub sync_percentage: f64,

    /// Span between the first and last retained measurement.
    pub measurement_duration_us: i64,
}

impl fmt::Display for SyncQualityMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Quality: {:.1}%, Sync: {:.1}%, Mean: {:.2}ms",
            self.overall_quality_score * 100.0,
            self.sync_percentage,
            self.mean_offset_ms
        )
    }
}

/// Discrete sync conditions reported via the event callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEventType {
    /// A/V came back within tolerance.
    InSync,
    /// A/V went outside tolerance.
    OutOfSync,
    /// A sync correction was applied.
    SyncCorrected,
    /// Significant drift detected.
    DriftDetected,
    /// Sync quality has degraded.
    QualityDegraded,
    /// Lip-sync specific problem.
    LipSyncIssue,
}

/// Sync event payload, delivered synchronously to the registered
/// handler on whichever thread recorded the measurement.
#[derive(Clone, Debug)]
pub struct SyncEvent {
    pub event_type: SyncEventType,
    pub offset_ms: f64,
    pub confidence: f64,
    pub timestamp: Instant,
    pub description: String,
}

/// Callback for sync events. Handlers run inline on the recording
/// thread and must be fast and non-blocking.
pub type SyncEventCallback = Box<dyn Fn(&SyncEvent) + Send>;

/// Detected repeating behavior in a measurement series.
#[derive(Clone, Debug)]
pub struct SyncPattern {
    /// Pattern period (0 when unknown).
    pub period_ms: f64,
    /// Pattern amplitude.
    pub amplitude_ms: f64,
    /// Detection confidence (0-1).
    pub confidence: f64,
    /// Human-readable description.
    pub description: String,
}

/// Detect oscillation in an offset series: frequent sign changes
/// indicate the correction loop is hunting rather than settling.
/// Requires at least 10 measurements.
pub fn detect_patterns(measurements: &[SyncMeasurement]) -> Vec<SyncPattern> {
    let mut patterns = Vec::new();
    if measurements.len() < MIN_SAMPLES_FOR_STATS {
        return patterns;
    }

    let offsets: Vec<f64> = measurements.iter().map(|m| m.av_offset_ms).collect();

    let mut sign_changes = 0usize;
    for pair in offsets.windows(2) {
        if (pair[1] > 0.0) != (pair[0] > 0.0) {
            sign_changes += 1;
        }
    }

    if sign_changes > offsets.len() / 4 {
        let s = stats::series_stats(&offsets);
        patterns.push(SyncPattern {
            period_ms: 0.0,
            amplitude_ms: (s.max - s.min) / 2.0,
            confidence: 0.7,
            description: "Oscillating sync pattern detected".to_string(),
        });
    }

    patterns
}

struct MeasurementStore {
    history: VecDeque<SyncMeasurement>,
    latest: SyncMeasurement,
}

/// Professional A/V synchronization validator.
///
/// Concurrency: measurement history and quality metrics sit behind
/// separate mutexes; the event callback has its own, so a slow handler
/// can only delay event delivery, never metric reads.
pub struct SyncValidator {
    config: Mutex<SyncValidatorConfig>,
    running: AtomicBool,
    was_in_sync: AtomicBool,

    measurements: Mutex<MeasurementStore>,
    metrics: Mutex<SyncQualityMetrics>,
    callback: Mutex<Option<SyncEventCallback>>,

    /// Timestamp base for `timestamp_us`, set on start.
    epoch: Mutex<Option<Instant>>,
    /// Last emitted event time, for lip-sync rate limiting.
    last_event_time: Mutex<Option<Instant>>,
}

impl SyncValidator {
    /// Create a validator with the given configuration.
    pub fn new(config: SyncValidatorConfig) -> Self {
        info!(
            tolerance_ms = config.sync_tolerance_ms,
            interval_ms = config.measurement_interval_ms,
            "Sync validator created"
        );
        Self {
            config: Mutex::new(config),
            running: AtomicBool::new(false),
            was_in_sync: AtomicBool::new(true),
            measurements: Mutex::new(MeasurementStore {
                history: VecDeque::new(),
                latest: SyncMeasurement::default(),
            }),
            metrics: Mutex::new(SyncQualityMetrics::default()),
            callback: Mutex::new(None),
            epoch: Mutex::new(None),
            last_event_time: Mutex::new(None),
        }
    }

    /// Start validation, clearing history and metrics. Returns `false`
    /// (and logs) if already running.
    pub fn start(&self) -> bool {
        if self.running.load(Ordering::Acquire) {
            warn!("Sync validator already running");
            return false;
        }

        let capacity = self.config.lock().max_measurement_history;
        {
            let mut store = self.measurements.lock();
            store.history.clear();
            store.history.reserve(capacity.min(4096));
            store.latest = SyncMeasurement::default();
        }
        *self.metrics.lock() = SyncQualityMetrics::default();
        self.was_in_sync.store(true, Ordering::Relaxed);
        *self.epoch.lock() = Some(Instant::now());
        *self.last_event_time.lock() = None;

        self.running.store(true, Ordering::Release);
        info!("Sync validator started");
        true
    }

    /// Stop validation. No-op if already stopped.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let total = self.metrics.lock().measurement_count;
        info!(total_measurements = total, "Sync validator stopped");
    }

    /// Clear all measurements and statistics without changing running
    /// state.
    pub fn reset(&self) {
        {
            let mut store = self.measurements.lock();
            store.history.clear();
            store.latest = SyncMeasurement::default();
        }
        *self.metrics.lock() = SyncQualityMetrics::default();
        self.was_in_sync.store(true, Ordering::Relaxed);
        debug!("Sync validator reset");
    }

    /// Whether the validator is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Record a paired audio/video position sample. Returns the
    /// computed measurement, or the default when not running.
    pub fn record_measurement(
        &self,
        audio_position: TimePoint,
        video_position: TimePoint,
        timestamp: Instant,
    ) -> SyncMeasurement {
        if !self.running.load(Ordering::Acquire) {
            return SyncMeasurement::default();
        }

        let config = *self.config.lock();
        let offset_ms =
            (video_position.as_secs_f64() - audio_position.as_secs_f64()) * 1000.0;

        let timestamp_us = {
            let epoch = self.epoch.lock();
            match *epoch {
                Some(base) => timestamp.saturating_duration_since(base).as_micros() as i64,
                None => 0,
            }
        };

        let measurement = SyncMeasurement {
            timestamp_us,
            av_offset_ms: offset_ms,
            confidence_score: confidence_score(offset_ms),
            audio_pos: audio_position,
            video_pos: video_position,
        };

        {
            let mut store = self.measurements.lock();
            store.history.push_back(measurement);
            if store.history.len() > config.max_measurement_history {
                store.history.pop_front();
            }
            store.latest = measurement;
        }

        if config.enable_quality_monitoring {
            self.update_quality_metrics(&config);
        }
        self.check_sync_events(&config, &measurement, timestamp);

        measurement
    }

    /// Latest measured A/V offset in milliseconds.
    pub fn current_offset_ms(&self) -> f64 {
        self.measurements.lock().latest.av_offset_ms
    }

    /// Whether the latest offset is within tolerance.
    pub fn is_in_sync(&self) -> bool {
        let tolerance = self.config.lock().sync_tolerance_ms;
        self.current_offset_ms().abs() <= tolerance
    }

    /// Current quality metrics.
    pub fn quality_metrics(&self) -> SyncQualityMetrics {
        *self.metrics.lock()
    }

    /// The newest `count` measurements, oldest first (0 = all).
    pub fn recent_measurements(&self, count: usize) -> Vec<SyncMeasurement> {
        let store = self.measurements.lock();
        let len = store.history.len();
        let take = if count == 0 || count >= len { len } else { count };
        store.history.iter().skip(len - take).copied().collect()
    }

    /// Recommend a correction in milliseconds: confidence- and
    /// recency-weighted average of recent offsets, negated and scaled
    /// by the configured aggression. Advisory only.
    pub fn correction_recommendation(&self) -> f64 {
        let config = *self.config.lock();
        let store = self.measurements.lock();

        if store.history.len() < MIN_SAMPLES_FOR_STATS {
            return 0.0;
        }

        let len = store.history.len();
        let count = len.min(MAX_RECOMMENDATION_SAMPLES);

        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for (rank, m) in store.history.iter().skip(len - count).enumerate() {
            // Later samples weigh more.
            let weight = m.confidence_score * (rank + 1) as f64;
            weighted_sum += m.av_offset_ms * weight;
            weight_sum += weight;
        }

        if weight_sum == 0.0 {
            return 0.0;
        }

        let correction = -(weighted_sum / weight_sum) * config.correction_aggression;
        debug!(
            correction_ms = correction,
            samples = count,
            "Correction recommendation"
        );
        correction
    }

    /// Lip-sync quality score in [0, 1] from the current offset
    /// magnitude: linear degradation within the threshold, steeper
    /// beyond it. Returns 1.0 when lip-sync detection is disabled.
    pub fn validate_lip_sync(&self) -> f64 {
        let config = *self.config.lock();
        if !config.enable_lip_sync_detection {
            return 1.0;
        }

        let offset = self.current_offset_ms().abs();
        if offset <= config.lip_sync_threshold_ms {
            1.0 - (offset / config.lip_sync_threshold_ms) * 0.2
        } else {
            let excess = offset - config.lip_sync_threshold_ms;
            (0.8 - (excess / config.lip_sync_threshold_ms) * 0.8).max(0.0)
        }
    }

    /// Register the sync event handler. Replaces any previous handler.
    pub fn set_event_callback(&self, callback: SyncEventCallback) {
        *self.callback.lock() = Some(callback);
    }

    /// Replace the configuration.
    pub fn update_config(&self, config: SyncValidatorConfig) {
        *self.config.lock() = config;
        debug!("Sync validator config updated");
    }

    /// Current configuration.
    pub fn config(&self) -> SyncValidatorConfig {
        *self.config.lock()
    }

    /// Export the retained measurement history as CSV.
    pub fn export_measurements(&self, path: &Path) -> Result<(), SyncError> {
        let snapshot: Vec<SyncMeasurement> =
            self.measurements.lock().history.iter().copied().collect();

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(
            writer,
            "Timestamp_us,Offset_ms,Confidence,Audio_Position_s,Video_Position_s"
        )?;
        for m in &snapshot {
            writeln!(
                writer,
                "{},{:.3},{:.2},{:.6},{:.6}",
                m.timestamp_us,
                m.av_offset_ms,
                m.confidence_score,
                m.audio_pos.as_secs_f64(),
                m.video_pos.as_secs_f64()
            )?;
        }
        writer.flush()?;

        info!(
            count = snapshot.len(),
            path = %path.display(),
            "Exported sync measurements"
        );
        Ok(())
    }

    /// Human-readable quality report.
    pub fn quality_report(&self) -> String {
        let metrics = self.quality_metrics();

        let mut report = String::new();
        report.push_str("=== A/V Sync Quality Report ===\n");
        report.push_str(&format!(
            "Measurement Count: {}\n",
            metrics.measurement_count
        ));
        report.push_str(&format!(
            "Sync Percentage: {:.1}%\n",
            metrics.sync_percentage
        ));
        report.push_str(&format!("Mean Offset: {:.2} ms\n", metrics.mean_offset_ms));
        report.push_str(&format!(
            "Median Offset: {:.2} ms\n",
            metrics.median_offset_ms
        ));
        report.push_str(&format!(
            "Std Deviation: {:.2} ms\n",
            metrics.std_deviation_ms
        ));
        report.push_str(&format!("Max Offset: {:.2} ms\n", metrics.max_offset_ms));
        report.push_str(&format!("Min Offset: {:.2} ms\n", metrics.min_offset_ms));
        report.push_str(&format!(
            "Drift Rate: {:.3} ms/min\n",
            metrics.drift_rate_ms_per_min
        ));
        report.push_str(&format!(
            "Stability Score: {:.2}\n",
            metrics.sync_stability_score
        ));
        report.push_str(&format!(
            "Overall Quality: {:.2}\n",
            metrics.overall_quality_score
        ));
        if metrics.measurement_count > 0 {
            report.push_str(&format!(
                "Duration: {:.1} seconds\n",
                metrics.measurement_duration_us as f64 / 1_000_000.0
            ));
        }
        report
    }

    /// Full recompute of the quality metrics from the retained history.
    fn update_quality_metrics(&self, config: &SyncValidatorConfig) {
        let (offsets, in_sync_count, first_us, last_us, timed_offsets) = {
            let store = self.measurements.lock();
            if store.history.is_empty() {
                return;
            }

            let offsets: Vec<f64> = store.history.iter().map(|m| m.av_offset_ms).collect();
            let in_sync = store
                .history
                .iter()
                .filter(|m| m.av_offset_ms.abs() <= config.sync_tolerance_ms)
                .count();
            let first_us = store.history.front().map(|m| m.timestamp_us).unwrap_or(0);
            let last_us = store.history.back().map(|m| m.timestamp_us).unwrap_or(0);

            // Trailing regression window for the drift rate.
            let window_start_us =
                last_us - (DRIFT_CALCULATION_WINDOW_MS * 1000.0) as i64;
            let timed: Vec<(f64, f64)> = store
                .history
                .iter()
                .filter(|m| m.timestamp_us >= window_start_us)
                .map(|m| {
                    (
                        (m.timestamp_us - window_start_us) as f64 / 1_000_000.0,
                        m.av_offset_ms,
                    )
                })
                .collect();

            (offsets, in_sync, first_us, last_us, timed)
        };

        let basic = stats::series_stats(&offsets);
        let count = offsets.len();

        let drift_rate = if count < MIN_SAMPLES_FOR_STATS || timed_offsets.len() < 2 {
            0.0
        } else {
            // Slope is ms/s over the window; x60 gives ms/min.
            stats::linear_slope(&timed_offsets) * 60.0
        };

        let stability = if count < MIN_SAMPLES_FOR_STATS {
            1.0
        } else {
            let mean_magnitude = basic.mean.abs();
            if mean_magnitude < 0.1 {
                1.0
            } else {
                let cv = basic.std_dev / mean_magnitude;
                (1.0 - cv.min(1.0)).max(0.0)
            }
        };

        let sync_percentage = in_sync_count as f64 / count as f64 * 100.0;
        let overall = 0.4 * (sync_percentage / 100.0)
            + 0.3 * stability
            + 0.2 * (1.0 - basic.mean.abs() / config.sync_tolerance_ms).max(0.0)
            + 0.1 * (1.0 - basic.std_dev / config.sync_tolerance_ms).max(0.0);

        let mut metrics = self.metrics.lock();
        metrics.measurement_count = count as i64;
        metrics.mean_offset_ms = basic.mean;
        metrics.median_offset_ms = basic.median;
        metrics.std_deviation_ms = basic.std_dev;
        metrics.max_offset_ms = basic.max;
        metrics.min_offset_ms = basic.min;
        metrics.in_sync_count = in_sync_count as i64;
        metrics.out_of_sync_count = (count - in_sync_count) as i64;
        metrics.sync_percentage = sync_percentage;
        metrics.drift_rate_ms_per_min = drift_rate;
        metrics.sync_stability_score = stability;
        metrics.overall_quality_score = overall;
        metrics.measurement_duration_us = last_us - first_us;
    }

    /// Evaluate sync state transitions and the lip-sync threshold,
    /// emitting events. Transition events are edge-triggered; lip-sync
    /// events are rate-limited to one per 5-second window.
    fn check_sync_events(
        &self,
        config: &SyncValidatorConfig,
        measurement: &SyncMeasurement,
        timestamp: Instant,
    ) {
        let currently_in_sync = measurement.av_offset_ms.abs() <= config.sync_tolerance_ms;
        let was_in_sync = self.was_in_sync.load(Ordering::Relaxed);

        if currently_in_sync != was_in_sync {
            if currently_in_sync {
                self.emit_sync_event(
                    SyncEventType::InSync,
                    measurement,
                    "A/V sync restored within tolerance",
                );
            } else {
                self.emit_sync_event(
                    SyncEventType::OutOfSync,
                    measurement,
                    "A/V sync outside tolerance",
                );
            }
            self.was_in_sync.store(currently_in_sync, Ordering::Relaxed);
            *self.last_event_time.lock() = Some(timestamp);
        }

        if config.enable_lip_sync_detection
            && measurement.av_offset_ms.abs() > config.lip_sync_threshold_ms
        {
            let mut last = self.last_event_time.lock();
            let due = match *last {
                Some(prev) => {
                    timestamp.saturating_duration_since(prev) > LIP_SYNC_EVENT_INTERVAL
                }
                None => true,
            };
            if due {
                *last = Some(timestamp);
                drop(last);
                self.emit_sync_event(
                    SyncEventType::LipSyncIssue,
                    measurement,
                    "Lip-sync quality degraded",
                );
            }
        }
    }

    fn emit_sync_event(
        &self,
        event_type: SyncEventType,
        measurement: &SyncMeasurement,
        description: &str,
    ) {
        let callback = self.callback.lock();
        let Some(handler) = callback.as_ref() else {
            return;
        };

        let event = SyncEvent {
            event_type,
            offset_ms: measurement.av_offset_ms,
            confidence: measurement.confidence_score,
            timestamp: Instant::now(),
            description: description.to_string(),
        };
        handler(&event);
    }
}

/// Measurement confidence: high base, reduced for extreme offsets.
fn confidence_score(offset_ms: f64) -> f64 {
    let base = 0.8;
    let offset_penalty = (offset_ms.abs() / 100.0).min(0.3);
    (base - offset_penalty).max(0.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn started_validator(config: SyncValidatorConfig) -> SyncValidator {
        let validator = SyncValidator::new(config);
        assert!(validator.start());
        validator
    }

    /// Record one measurement with the given offset in milliseconds,
    /// audio pinned at 1s.
    fn record_offset(validator: &SyncValidator, offset_ms: f64, at: Instant) -> SyncMeasurement {
        let audio = TimePoint::new(1, 1);
        let video = TimePoint::new(1_000_000 + (offset_ms * 1000.0).round() as i64, 1_000_000);
        validator.record_measurement(audio, video, at)
    }

    #[test]
    fn start_guard_and_lifecycle() {
        let validator = SyncValidator::new(SyncValidatorConfig::default());
        assert!(validator.start());
        assert!(!validator.start());
        validator.stop();
        assert!(!validator.is_running());
        assert!(validator.start());
    }

    #[test]
    fn not_running_returns_default_measurement() {
        let validator = SyncValidator::new(SyncValidatorConfig::default());
        let m = validator.record_measurement(
            TimePoint::new(1, 1),
            TimePoint::new(2, 1),
            Instant::now(),
        );
        assert_eq!(m.av_offset_ms, 0.0);
        assert_eq!(validator.quality_metrics().measurement_count, 0);
    }

    #[test]
    fn measurement_offset_and_confidence() {
        let validator = started_validator(SyncValidatorConfig::default());
        let m = record_offset(&validator, 30.0, Instant::now());
        assert!((m.av_offset_ms - 30.0).abs() < 1e-9);
        // 0.8 - 30/100 = 0.5
        assert!((m.confidence_score - 0.5).abs() < 1e-9);

        let extreme = record_offset(&validator, 500.0, Instant::now());
        // Penalty capped at 0.3
        assert!((extreme.confidence_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn confidence_floor() {
        assert!((confidence_score(0.0) - 0.8).abs() < 1e-9);
        assert!(confidence_score(1e6) >= 0.1);
    }

    #[test]
    fn sync_percentage_counts_tolerance() {
        let validator = started_validator(SyncValidatorConfig::default());
        let now = Instant::now();
        // 3 in tolerance (10ms), 2 out.
        for offset in [2.0, -5.0, 9.0, 15.0, -20.0] {
            record_offset(&validator, offset, now);
        }
        let metrics = validator.quality_metrics();
        assert_eq!(metrics.measurement_count, 5);
        assert_eq!(metrics.in_sync_count, 3);
        assert_eq!(metrics.out_of_sync_count, 2);
        assert!((metrics.sync_percentage - 60.0).abs() < 1e-9);
    }

    #[test]
    fn capacity_eviction_is_fifo() {
        let config = SyncValidatorConfig {
            max_measurement_history: 5,
            ..Default::default()
        };
        let validator = started_validator(config);
        let now = Instant::now();
        for i in 0..6 {
            record_offset(&validator, i as f64, now);
        }
        let retained = validator.recent_measurements(0);
        assert_eq!(retained.len(), 5);
        // Oldest (offset 0) evicted.
        assert!((retained[0].av_offset_ms - 1.0).abs() < 1e-9);
        assert!((retained[4].av_offset_ms - 5.0).abs() < 1e-9);
    }

    #[test]
    fn events_are_edge_triggered() {
        let validator = started_validator(SyncValidatorConfig::default());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        validator.set_event_callback(Box::new(move |event| {
            sink.lock().push(event.clone());
        }));

        let now = Instant::now();
        // out, out, in, in, out — three transitions, five samples.
        for offset in [30.0, 35.0, 2.0, 1.0, 25.0] {
            record_offset(&validator, offset, now);
        }

        let recorded = events.lock();
        let transitions: Vec<SyncEventType> = recorded
            .iter()
            .filter(|e| {
                matches!(e.event_type, SyncEventType::InSync | SyncEventType::OutOfSync)
            })
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            transitions,
            vec![
                SyncEventType::OutOfSync,
                SyncEventType::InSync,
                SyncEventType::OutOfSync
            ]
        );
    }

    #[test]
    fn lip_sync_events_are_rate_limited() {
        let validator = started_validator(SyncValidatorConfig::default());
        let lip_events = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&lip_events);
        validator.set_event_callback(Box::new(move |event| {
            if event.event_type == SyncEventType::LipSyncIssue {
                sink.fetch_add(1, Ordering::Relaxed);
            }
        }));

        let base = Instant::now();
        // Persistent 60ms offset (beyond the 40ms lip-sync threshold),
        // sampled every second for 14 seconds. The first sample's
        // OutOfSync transition arms the shared event timer, so lip-sync
        // events fire only once per 5-second window after it: t=6s and
        // t=12s.
        for second in 0..14 {
            record_offset(&validator, 60.0, base + Duration::from_secs(second));
        }

        assert_eq!(lip_events.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn perfect_sync_scenario() {
        let validator = started_validator(SyncValidatorConfig::default());
        let out_events = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&out_events);
        validator.set_event_callback(Box::new(move |event| {
            if event.event_type == SyncEventType::OutOfSync {
                sink.fetch_add(1, Ordering::Relaxed);
            }
        }));

        let now = Instant::now();
        for step in 1..=10 {
            let pos = TimePoint::new(step, 10);
            validator.record_measurement(pos, pos, now);
        }

        assert!(validator.is_in_sync());
        let metrics = validator.quality_metrics();
        assert!(metrics.mean_offset_ms.abs() < 1e-9);
        assert!((metrics.sync_percentage - 100.0).abs() < 1e-9);
        assert_eq!(out_events.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn sustained_offset_scenario_scores_lower_than_perfect() {
        let now = Instant::now();

        let perfect = started_validator(SyncValidatorConfig::default());
        for step in 1..=10 {
            let pos = TimePoint::new(step, 10);
            perfect.record_measurement(pos, pos, now);
        }

        let config = SyncValidatorConfig {
            sync_tolerance_ms: 10.0,
            ..Default::default()
        };
        let offset = started_validator(config);
        let out_events = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&out_events);
        offset.set_event_callback(Box::new(move |event| {
            if event.event_type == SyncEventType::OutOfSync {
                sink.fetch_add(1, Ordering::Relaxed);
            }
        }));
        for step in 1..=10i64 {
            let audio = TimePoint::new(step, 10);
            let video = TimePoint::new(step * 100 + 30, 1000); // +30ms
            offset.record_measurement(audio, video, now);
        }

        assert_eq!(out_events.load(Ordering::Relaxed), 1);
        let offset_metrics = offset.quality_metrics();
        assert!((offset_metrics.sync_percentage - 0.0).abs() < 1e-9);
        assert!(
            offset_metrics.overall_quality_score
                < perfect.quality_metrics().overall_quality_score
        );
    }

    #[test]
    fn drift_rate_from_regression() {
        let validator = started_validator(SyncValidatorConfig::default());
        let base = Instant::now();
        // Offset grows 1ms per second: drift rate 60 ms/min.
        for second in 0..15 {
            record_offset(&validator, second as f64, base + Duration::from_secs(second));
        }
        let metrics = validator.quality_metrics();
        assert!(
            (metrics.drift_rate_ms_per_min - 60.0).abs() < 1.0,
            "drift rate {}",
            metrics.drift_rate_ms_per_min
        );
    }

    #[test]
    fn drift_rate_neutral_below_min_samples() {
        let validator = started_validator(SyncValidatorConfig::default());
        let base = Instant::now();
        for second in 0..5 {
            record_offset(&validator, second as f64 * 3.0, base + Duration::from_secs(second));
        }
        let metrics = validator.quality_metrics();
        assert_eq!(metrics.drift_rate_ms_per_min, 0.0);
        assert_eq!(metrics.sync_stability_score, 1.0);
    }

    #[test]
    fn correction_recommendation_opposes_offset() {
        let validator = started_validator(SyncValidatorConfig::default());
        let now = Instant::now();
        for _ in 0..20 {
            record_offset(&validator, 20.0, now);
        }
        let recommendation = validator.correction_recommendation();
        // Constant +20ms offset, aggression 0.5 -> -10ms.
        assert!((recommendation + 10.0).abs() < 1e-6);
    }

    #[test]
    fn correction_recommendation_needs_samples() {
        let validator = started_validator(SyncValidatorConfig::default());
        record_offset(&validator, 20.0, Instant::now());
        assert_eq!(validator.correction_recommendation(), 0.0);
    }

    #[test]
    fn lip_sync_score_curve() {
        let validator = started_validator(SyncValidatorConfig::default());
        let now = Instant::now();

        record_offset(&validator, 0.0, now);
        assert!((validator.validate_lip_sync() - 1.0).abs() < 1e-9);

        record_offset(&validator, 40.0, now);
        assert!((validator.validate_lip_sync() - 0.8).abs() < 1e-9);

        record_offset(&validator, 60.0, now);
        // 0.8 - (20/40)*0.8 = 0.4
        assert!((validator.validate_lip_sync() - 0.4).abs() < 1e-9);

        record_offset(&validator, 200.0, now);
        assert_eq!(validator.validate_lip_sync(), 0.0);
    }

    #[test]
    fn lip_sync_disabled_always_passes() {
        let config = SyncValidatorConfig {
            enable_lip_sync_detection: false,
            ..Default::default()
        };
        let validator = started_validator(config);
        record_offset(&validator, 500.0, Instant::now());
        assert_eq!(validator.validate_lip_sync(), 1.0);
    }

    #[test]
    fn export_writes_csv() {
        let validator = started_validator(SyncValidatorConfig::default());
        let base = Instant::now();
        for second in 0..3 {
            record_offset(&validator, second as f64 * 5.0, base + Duration::from_secs(second));
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync_measurements.csv");
        validator.export_measurements(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Timestamp_us,Offset_ms,Confidence,Audio_Position_s,Video_Position_s"
        );
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 3);
        let fields: Vec<&str> = rows[1].split(',').collect();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[1], "5.000");
        assert_eq!(fields[3], "1.000000");
    }

    #[test]
    fn export_fails_on_unwritable_path() {
        let validator = started_validator(SyncValidatorConfig::default());
        let result =
            validator.export_measurements(Path::new("/nonexistent-dir/out.csv"));
        assert!(matches!(result, Err(SyncError::Io(_))));
    }

    #[test]
    fn detect_oscillating_pattern() {
        let validator = started_validator(SyncValidatorConfig::default());
        let now = Instant::now();
        for i in 0..20 {
            let offset = if i % 2 == 0 { 8.0 } else { -8.0 };
            record_offset(&validator, offset, now);
        }
        let patterns = detect_patterns(&validator.recent_measurements(0));
        assert_eq!(patterns.len(), 1);
        assert!((patterns[0].amplitude_ms - 8.0).abs() < 1e-9);
        assert!((patterns[0].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn no_pattern_in_steady_series() {
        let validator = started_validator(SyncValidatorConfig::default());
        let now = Instant::now();
        for _ in 0..20 {
            record_offset(&validator, 3.0, now);
        }
        assert!(detect_patterns(&validator.recent_measurements(0)).is_empty());
    }

    #[test]
    fn quality_report_contains_key_lines() {
        let validator = started_validator(SyncValidatorConfig::default());
        let now = Instant::now();
        for offset in [1.0, 2.0, 3.0] {
            record_offset(&validator, offset, now);
        }
        let report = validator.quality_report();
        assert!(report.contains("=== A/V Sync Quality Report ==="));
        assert!(report.contains("Measurement Count: 3"));
        assert!(report.contains("Sync Percentage: 100.0%"));
    }

    #[test]
    fn reset_clears_history_but_keeps_running() {
        let validator = started_validator(SyncValidatorConfig::default());
        record_offset(&validator, 5.0, Instant::now());
        validator.reset();
        assert!(validator.is_running());
        assert_eq!(validator.quality_metrics().measurement_count, 0);
        assert!(validator.recent_measurements(0).is_empty());
    }

    #[test]
    fn config_serde_roundtrip() {
        let config = SyncValidatorConfig {
            sync_tolerance_ms: 7.5,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let restored: SyncValidatorConfig = serde_json::from_str(&json).unwrap();
        assert!((restored.sync_tolerance_ms - 7.5).abs() < f64::EPSILON);
        assert_eq!(restored.max_measurement_history, 10_000);
    }
}
