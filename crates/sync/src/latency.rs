//! Latency compensation: plugin delay, system output latency, and the
//! adaptively-smoothed compensation value applied to the pipeline.
//!
//! Every source of audio-pipeline delay — per-plugin processing latency
//! (with look-ahead already hiding part of it) and audio driver/output
//! latency — is folded into a single compensation value. The live value
//! never jumps to its target: it moves a configurable fraction of the
//! gap per update (first-order low-pass) and is clamped to a maximum,
//! so a plugin chain change cannot destabilize the sync loop. Saturation
//! and large changes are surfaced through the event callback.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mt_common::{TimeDuration, TimePoint};

use crate::clock::MasterClock;
use crate::stats;

/// Compensation below this threshold is treated as none.
const MIN_COMPENSATION_MS: f64 = 0.1;
/// Compensation deltas above this count as an adjustment.
const ADJUSTMENT_EPSILON_MS: f64 = 0.1;
/// Compensation deltas above this emit a change event.
const CHANGE_EVENT_THRESHOLD_MS: f64 = 1.0;
/// System latency is re-measured at most this often.
const SYSTEM_LATENCY_MEASUREMENT_INTERVAL: Duration = Duration::from_millis(1000);
/// Measurements required before outlier detection engages.
const MIN_SAMPLES_FOR_OUTLIERS: usize = 5;

/// Latency compensation configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LatencyCompensatorConfig {
    /// Maximum compensation allowed, in either direction.
    pub max_compensation_ms: f64,
    /// Nominal measurement cadence (informational; the caller paces).
    pub measurement_interval_ms: f64,
    /// Fraction of the target gap closed per update (0-1).
    pub adaptation_speed: f64,

    /// Enable plugin delay compensation.
    pub enable_pdc: bool,
    /// Look-ahead buffer that already hides part of the plugin delay.
    pub pdc_lookahead_ms: f64,
    /// Tolerance for PDC calculations.
    pub pdc_tolerance_ms: f64,

    /// Compensate for audio driver/output latency.
    pub enable_system_latency_compensation: bool,
    /// Initial estimate of system latency.
    pub system_latency_ms: f64,
    /// Measure system latency automatically on start and on demand.
    pub auto_detect_system_latency: bool,

    /// Measurements retained (FIFO eviction past this).
    pub measurement_history_size: usize,
    /// Z-score beyond which a measurement is flagged as an outlier.
    pub outlier_threshold: f64,
    /// Use predictive compensation algorithms.
    pub enable_predictive_compensation: bool,
}

impl Default for LatencyCompensatorConfig {
    fn default() -> Self {
        Self {
            max_compensation_ms: 100.0,
            measurement_interval_ms: 50.0,
            adaptation_speed: 0.1,
            enable_pdc: true,
            pdc_lookahead_ms: 10.0,
            pdc_tolerance_ms: 1.0,
            enable_system_latency_compensation: true,
            system_latency_ms: 20.0,
            auto_detect_system_latency: true,
            measurement_history_size: 100,
            outlier_threshold: 2.0,
            enable_predictive_compensation: true,
        }
    }
}

/// Latency contribution of one registered plugin.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PluginLatencyInfo {
    /// Unique plugin identifier (map key).
    pub plugin_id: String,
    /// Processing delay in milliseconds.
    pub processing_latency_ms: f64,
    /// Required look-ahead in samples.
    pub lookahead_samples: f64,
    /// Whether latency can change during processing.
    pub has_variable_latency: bool,
    /// Bypassed plugins are excluded from the total but stay
    /// registered for re-enable.
    pub is_bypassed: bool,
}

impl PluginLatencyInfo {
    pub fn new(plugin_id: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            processing_latency_ms: latency_ms,
            lookahead_samples: 0.0,
            has_variable_latency: false,
            is_bypassed: false,
        }
    }
}

/// One latency snapshot. Immutable after creation.
#[derive(Clone, Copy, Debug)]
pub struct LatencyMeasurement {
    pub timestamp: Instant,
    /// Combined non-bypassed plugin delay.
    pub plugin_latency_ms: f64,
    /// Audio driver + hardware latency.
    pub system_latency_ms: f64,
    /// Sum of the above.
    pub total_latency_ms: f64,
    /// Compensation in effect when the snapshot was taken.
    pub compensation_applied_ms: f64,
    /// Measurement confidence (0-1).
    pub confidence_score: f64,
}

impl Default for LatencyMeasurement {
    fn default() -> Self {
        Self {
            timestamp: Instant::now(),
            plugin_latency_ms: 0.0,
            system_latency_ms: 0.0,
            total_latency_ms: 0.0,
            compensation_applied_ms: 0.0,
            confidence_score: 0.0,
        }
    }
}

/// Aggregate statistics over the retained measurement history plus the
/// persistent compensation counters.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct LatencyStats {
    pub measurement_count: usize,
    pub mean_latency_ms: f64,
    pub median_latency_ms: f64,
    pub std_deviation_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,

    pub current_compensation_ms: f64,
    pub total_compensation_applied_ms: f64,
    pub compensation_adjustments: usize,

    /// Span between the first and last retained measurement.
    pub measurement_duration_us: i64,
}

/// Latency conditions reported via the event callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatencyEventType {
    /// Compensation amount changed.
    CompensationChanged,
    /// Plugin latency updated.
    PluginLatencyChanged,
    /// System latency changed.
    SystemLatencyChanged,
    /// Hit the maximum compensation limit.
    CompensationLimitReached,
    /// Detected a measurement outlier.
    MeasurementOutlier,
}

/// Latency event payload, delivered synchronously to the registered
/// handler on the calling thread.
#[derive(Clone, Debug)]
pub struct LatencyEvent {
    pub event_type: LatencyEventType,
    pub latency_ms: f64,
    pub description: String,
    pub timestamp: Instant,
}

/// Callback for latency events. Handlers run inline and must be fast
/// and non-blocking.
pub type LatencyEventCallback = Box<dyn Fn(&LatencyEvent) + Send>;

/// Source of system output latency measurements.
///
/// The production implementation is a hardware round-trip/loopback
/// timing probe; substituting one never touches the compensation
/// logic. Implementations return milliseconds and should never block
/// for long — the monitoring thread calls this inline.
pub trait LatencyProbe: Send {
    fn measure(&mut self) -> f64;
}

/// Deterministic stand-in probe: oscillates around the configured
/// baseline instead of performing a genuine round-trip measurement.
/// Good enough to exercise the adaptation path until a hardware
/// loopback prober is wired in.
pub struct SyntheticLatencyProbe {
    baseline_ms: f64,
    started: Instant,
}

impl SyntheticLatencyProbe {
    pub fn new(baseline_ms: f64) -> Self {
        Self {
            baseline_ms,
            started: Instant::now(),
        }
    }
}

impl LatencyProbe for SyntheticLatencyProbe {
    fn measure(&mut self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        (self.baseline_ms + elapsed.sin() * 2.0).max(1.0)
    }
}

/// Convert a latency in milliseconds to a sample count.
pub fn latency_ms_to_samples(latency_ms: f64, sample_rate: f64) -> i64 {
    (latency_ms * sample_rate / 1000.0) as i64
}

/// Convert a sample count to latency in milliseconds.
pub fn samples_to_latency_ms(samples: i64, sample_rate: f64) -> f64 {
    samples as f64 * 1000.0 / sample_rate
}

struct MeasurementLog {
    history: VecDeque<LatencyMeasurement>,
}

/// Adaptive latency compensator.
///
/// Concurrency: the plugin map, measurement history, statistics, and
/// callback each sit behind their own mutex; the live compensation and
/// system latency values are atomics so the render thread's
/// per-frame `current_compensation_ms()` read takes no lock.
pub struct LatencyCompensator {
    config: Mutex<LatencyCompensatorConfig>,
    master_clock: Option<Arc<MasterClock>>,

    running: AtomicBool,
    compensation_bits: AtomicU64,
    system_latency_bits: AtomicU64,

    plugins: Mutex<HashMap<String, PluginLatencyInfo>>,
    measurements: Mutex<MeasurementLog>,
    statistics: Mutex<LatencyStats>,
    callback: Mutex<Option<LatencyEventCallback>>,

    probe: Mutex<Box<dyn LatencyProbe>>,
    last_system_measurement: Mutex<Option<Instant>>,
}

impl LatencyCompensator {
    /// Create a compensator with the synthetic stand-in probe.
    pub fn new(config: LatencyCompensatorConfig) -> Self {
        let probe = Box::new(SyntheticLatencyProbe::new(config.system_latency_ms));
        Self::build(config, None, probe)
    }

    /// Create a compensator holding an advisory master clock reference.
    pub fn with_master_clock(
        config: LatencyCompensatorConfig,
        master_clock: Arc<MasterClock>,
    ) -> Self {
        let probe = Box::new(SyntheticLatencyProbe::new(config.system_latency_ms));
        Self::build(config, Some(master_clock), probe)
    }

    /// Create a compensator with a custom system latency probe.
    pub fn with_probe(config: LatencyCompensatorConfig, probe: Box<dyn LatencyProbe>) -> Self {
        Self::build(config, None, probe)
    }

    fn build(
        config: LatencyCompensatorConfig,
        master_clock: Option<Arc<MasterClock>>,
        probe: Box<dyn LatencyProbe>,
    ) -> Self {
        info!(
            max_compensation_ms = config.max_compensation_ms,
            pdc_enabled = config.enable_pdc,
            "Latency compensator created"
        );
        Self {
            system_latency_bits: AtomicU64::new(config.system_latency_ms.to_bits()),
            config: Mutex::new(config),
            master_clock,
            running: AtomicBool::new(false),
            compensation_bits: AtomicU64::new(0.0f64.to_bits()),
            plugins: Mutex::new(HashMap::new()),
            measurements: Mutex::new(MeasurementLog {
                history: VecDeque::new(),
            }),
            statistics: Mutex::new(LatencyStats::default()),
            callback: Mutex::new(None),
            probe: Mutex::new(probe),
            last_system_measurement: Mutex::new(None),
        }
    }

    /// Start compensation, clearing measurements and statistics.
    /// Returns `false` (and logs) if already running.
    pub fn start(&self) -> bool {
        if self.running.load(Ordering::Acquire) {
            warn!("Latency compensator already running");
            return false;
        }

        let config = *self.config.lock();
        {
            let mut log = self.measurements.lock();
            log.history.clear();
            log.history.reserve(config.measurement_history_size);
        }
        *self.statistics.lock() = LatencyStats::default();
        self.compensation_bits.store(0.0f64.to_bits(), Ordering::Relaxed);
        *self.last_system_measurement.lock() = None;

        self.running.store(true, Ordering::Release);
        info!("Latency compensator started");

        if config.auto_detect_system_latency {
            self.measure_system_latency();
        }
        true
    }

    /// Stop compensation. No-op if already stopped.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let total = self.statistics.lock().measurement_count;
        info!(total_measurements = total, "Latency compensator stopped");
    }

    /// Clear measurements, statistics, and the live compensation.
    /// Plugin registrations survive with their bypass flags cleared.
    pub fn reset(&self) {
        {
            let mut log = self.measurements.lock();
            log.history.clear();
        }
        *self.statistics.lock() = LatencyStats::default();
        self.compensation_bits.store(0.0f64.to_bits(), Ordering::Relaxed);

        {
            let mut plugins = self.plugins.lock();
            for plugin in plugins.values_mut() {
                plugin.is_bypassed = false;
            }
        }

        debug!("Latency compensator reset");
    }

    /// Whether the compensator is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Replace the configuration and recalculate.
    pub fn update_config(&self, config: LatencyCompensatorConfig) {
        *self.config.lock() = config;
        self.system_latency_bits
            .store(config.system_latency_ms.to_bits(), Ordering::Relaxed);
        self.force_recalculation();
        debug!("Latency compensator config updated");
    }

    /// Current configuration.
    pub fn config(&self) -> LatencyCompensatorConfig {
        *self.config.lock()
    }

    /// Register a plugin's latency contribution. Re-registering an id
    /// replaces its info.
    pub fn register_plugin(&self, info: PluginLatencyInfo) {
        debug!(
            plugin_id = %info.plugin_id,
            latency_ms = info.processing_latency_ms,
            "Plugin registered"
        );
        self.plugins.lock().insert(info.plugin_id.clone(), info);
        self.update_compensation();
    }

    /// Remove a plugin from the latency accounting.
    pub fn unregister_plugin(&self, plugin_id: &str) {
        let removed = self.plugins.lock().remove(plugin_id).is_some();
        if removed {
            debug!(plugin_id, "Plugin unregistered");
            self.update_compensation();
        }
    }

    /// Update a registered plugin's latency.
    pub fn update_plugin_latency(&self, plugin_id: &str, latency_ms: f64) {
        let updated = {
            let mut plugins = self.plugins.lock();
            match plugins.get_mut(plugin_id) {
                Some(plugin) => {
                    let old = plugin.processing_latency_ms;
                    plugin.processing_latency_ms = latency_ms;
                    debug!(plugin_id, old_ms = old, new_ms = latency_ms, "Plugin latency updated");
                    true
                }
                None => false,
            }
        };

        if updated {
            self.update_compensation();
            self.emit_event(
                LatencyEventType::PluginLatencyChanged,
                latency_ms,
                &format!("Plugin {plugin_id} latency changed"),
            );
        }
    }

    /// Bypass or re-enable a registered plugin. Bypassed plugins are
    /// excluded from the total but keep their metadata.
    pub fn set_plugin_bypass(&self, plugin_id: &str, bypassed: bool) {
        let updated = {
            let mut plugins = self.plugins.lock();
            match plugins.get_mut(plugin_id) {
                Some(plugin) => {
                    plugin.is_bypassed = bypassed;
                    debug!(plugin_id, bypassed, "Plugin bypass changed");
                    true
                }
                None => false,
            }
        };

        if updated {
            self.update_compensation();
        }
    }

    /// Combined latency of all non-bypassed plugins.
    pub fn total_plugin_latency_ms(&self) -> f64 {
        self.plugins
            .lock()
            .values()
            .filter(|p| !p.is_bypassed)
            .map(|p| p.processing_latency_ms)
            .sum()
    }

    /// Registered plugins, for display/reporting.
    pub fn registered_plugins(&self) -> Vec<PluginLatencyInfo> {
        let mut plugins: Vec<PluginLatencyInfo> = self.plugins.lock().values().cloned().collect();
        plugins.sort_by(|a, b| a.plugin_id.cmp(&b.plugin_id));
        plugins
    }

    /// Re-measure system latency through the configured probe.
    /// Rate-limited; at most one probe call per second.
    pub fn measure_system_latency(&self) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        let now = Instant::now();
        {
            let mut last = self.last_system_measurement.lock();
            if let Some(prev) = *last {
                if now.duration_since(prev) < SYSTEM_LATENCY_MEASUREMENT_INTERVAL {
                    return;
                }
            }
            *last = Some(now);
        }

        let measured = self.probe.lock().measure().max(0.0);
        let old = self.system_latency_ms();
        self.system_latency_bits.store(measured.to_bits(), Ordering::Relaxed);

        if (measured - old).abs() > 1.0 {
            debug!(old_ms = old, new_ms = measured, "System latency updated");
            self.emit_event(
                LatencyEventType::SystemLatencyChanged,
                measured,
                "System latency measurement updated",
            );
            self.update_compensation();
        }
    }

    /// Current system latency estimate.
    pub fn system_latency_ms(&self) -> f64 {
        f64::from_bits(self.system_latency_bits.load(Ordering::Relaxed))
    }

    /// Manually override the system latency estimate.
    pub fn set_system_latency_ms(&self, latency_ms: f64) {
        let old = self.system_latency_ms();
        self.system_latency_bits.store(latency_ms.to_bits(), Ordering::Relaxed);

        if (latency_ms - old).abs() > ADJUSTMENT_EPSILON_MS {
            debug!(old_ms = old, new_ms = latency_ms, "System latency set manually");
            self.update_compensation();
        }
    }

    /// The live adaptively-smoothed compensation value. Lock-free.
    pub fn current_compensation_ms(&self) -> f64 {
        f64::from_bits(self.compensation_bits.load(Ordering::Relaxed))
    }

    /// Apply the current compensation to a timeline position as a
    /// rational time offset.
    pub fn compensated_position(&self, position: TimePoint) -> TimePoint {
        let compensation_ms = self.current_compensation_ms();
        if compensation_ms.abs() < MIN_COMPENSATION_MS {
            return position;
        }
        position + TimeDuration::from_millis_f64(compensation_ms)
    }

    /// Advisory hook: log the compensation applied against the master
    /// clock's timebase. The clock is never mutated from here.
    pub fn apply_to_pipeline(&self) {
        let Some(clock) = &self.master_clock else {
            return;
        };
        debug!(
            compensation_ms = self.current_compensation_ms(),
            master_time_us = clock.master_time_us(),
            "Applied compensation to pipeline"
        );
    }

    /// Snapshot plugin + system latency into the measurement history
    /// and refresh statistics. Returns the zeroed default when not
    /// running. Outliers are flagged via event but never removed from
    /// the history.
    pub fn measure_total_latency(&self) -> LatencyMeasurement {
        if !self.running.load(Ordering::Acquire) {
            return LatencyMeasurement::default();
        }

        let config = *self.config.lock();
        let plugin_latency = self.total_plugin_latency_ms();
        let system_latency = self.system_latency_ms();

        let measurement = LatencyMeasurement {
            timestamp: Instant::now(),
            plugin_latency_ms: plugin_latency,
            system_latency_ms: system_latency,
            total_latency_ms: plugin_latency + system_latency,
            compensation_applied_ms: self.current_compensation_ms(),
            confidence_score: 1.0,
        };

        let is_outlier = {
            let mut log = self.measurements.lock();
            log.history.push_back(measurement);
            if log.history.len() > config.measurement_history_size {
                log.history.pop_front();
            }

            if log.history.len() < MIN_SAMPLES_FOR_OUTLIERS {
                false
            } else {
                let totals: Vec<f64> =
                    log.history.iter().map(|m| m.total_latency_ms).collect();
                let s = stats::series_stats(&totals);
                let z_score = (measurement.total_latency_ms - s.mean).abs()
                    / s.std_dev.max(0.1);
                z_score > config.outlier_threshold
            }
        };

        self.update_statistics();

        if is_outlier {
            self.emit_event(
                LatencyEventType::MeasurementOutlier,
                measurement.total_latency_ms,
                "Latency measurement outlier detected",
            );
        }

        measurement
    }

    /// Current aggregate statistics.
    pub fn statistics(&self) -> LatencyStats {
        *self.statistics.lock()
    }

    /// The newest `count` measurements, oldest first (0 = all).
    pub fn recent_measurements(&self, count: usize) -> Vec<LatencyMeasurement> {
        let log = self.measurements.lock();
        let len = log.history.len();
        let take = if count == 0 || count >= len { len } else { count };
        log.history.iter().skip(len - take).copied().collect()
    }

    /// Register the latency event handler. Replaces any previous one.
    pub fn set_event_callback(&self, callback: LatencyEventCallback) {
        *self.callback.lock() = Some(callback);
    }

    /// Recompute the compensation from current inputs.
    pub fn force_recalculation(&self) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        self.update_compensation();
        debug!("Forced latency compensation recalculation");
    }

    /// Sanity-check the compensation: within bounds, and stable over
    /// the last ten measurements.
    pub fn validate_compensation(&self) -> bool {
        let config = *self.config.lock();
        let compensation = self.current_compensation_ms();

        if compensation.abs() > config.max_compensation_ms {
            return false;
        }

        let recent = self.recent_measurements(10);
        if recent.len() >= MIN_SAMPLES_FOR_OUTLIERS {
            let applied: Vec<f64> =
                recent.iter().map(|m| m.compensation_applied_ms).collect();
            let s = stats::series_stats(&applied);
            let variance = s.std_dev * s.std_dev;
            if variance > config.max_compensation_ms * 0.1 {
                return false;
            }
        }

        true
    }

    /// Human-readable compensation report.
    pub fn report(&self) -> String {
        let stats = self.statistics();
        let recent = self.recent_measurements(5);

        let mut report = String::new();
        report.push_str("=== Latency Compensation Report ===\n");
        let _ = writeln!(
            report,
            "Current Compensation: {:.2} ms",
            self.current_compensation_ms()
        );
        let _ = writeln!(
            report,
            "Plugin Latency: {:.2} ms",
            self.total_plugin_latency_ms()
        );
        let _ = writeln!(report, "System Latency: {:.2} ms", self.system_latency_ms());

        report.push_str("\nStatistics:\n");
        let _ = writeln!(report, "  Measurements: {}", stats.measurement_count);
        let _ = writeln!(report, "  Mean Latency: {:.2} ms", stats.mean_latency_ms);
        let _ = writeln!(report, "  Std Deviation: {:.2} ms", stats.std_deviation_ms);
        let _ = writeln!(
            report,
            "  Compensation Adjustments: {}",
            stats.compensation_adjustments
        );

        report.push_str("\nRegistered Plugins:\n");
        for plugin in self.registered_plugins() {
            let _ = write!(
                report,
                "  {}: {:.2} ms",
                plugin.plugin_id, plugin.processing_latency_ms
            );
            if plugin.is_bypassed {
                report.push_str(" (bypassed)");
            }
            report.push('\n');
        }

        if !recent.is_empty() {
            report.push_str("\nRecent Measurements:\n");
            for m in recent.iter().rev() {
                let _ = writeln!(
                    report,
                    "  {:.2} ms (Plugin: {:.2} ms, System: {:.2} ms)",
                    m.total_latency_ms, m.plugin_latency_ms, m.system_latency_ms
                );
            }
        }

        report
    }

    /// Move the live compensation one adaptation step toward the
    /// target computed from current inputs, clamp it, and emit events
    /// for significant changes and saturation.
    fn update_compensation(&self) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        let config = *self.config.lock();
        let target = self.plugin_compensation(&config) + self.system_compensation(&config);
        let old = self.current_compensation_ms();

        let adapted = (old + (target - old) * config.adaptation_speed)
            .clamp(-config.max_compensation_ms, config.max_compensation_ms);
        self.compensation_bits.store(adapted.to_bits(), Ordering::Relaxed);

        {
            let mut stats = self.statistics.lock();
            if (adapted - old).abs() > ADJUSTMENT_EPSILON_MS {
                stats.compensation_adjustments += 1;
                stats.total_compensation_applied_ms += (adapted - old).abs();
            }
            stats.current_compensation_ms = adapted;
        }

        if (adapted - old).abs() > CHANGE_EVENT_THRESHOLD_MS {
            self.emit_event(
                LatencyEventType::CompensationChanged,
                adapted,
                "Compensation updated",
            );
        }

        if adapted.abs() >= config.max_compensation_ms * 0.95 {
            self.emit_event(
                LatencyEventType::CompensationLimitReached,
                adapted,
                "Approaching maximum compensation limit",
            );
        }
    }

    /// Plugin chain delay remaining after the look-ahead buffer.
    fn plugin_compensation(&self, config: &LatencyCompensatorConfig) -> f64 {
        if !config.enable_pdc {
            return 0.0;
        }
        (self.total_plugin_latency_ms() - config.pdc_lookahead_ms).max(0.0)
    }

    /// System latency passes through in full when enabled.
    fn system_compensation(&self, config: &LatencyCompensatorConfig) -> f64 {
        if !config.enable_system_latency_compensation {
            return 0.0;
        }
        self.system_latency_ms()
    }

    /// Recompute derived statistics from the history while preserving
    /// the persistent compensation counters.
    fn update_statistics(&self) {
        let (totals, duration_us) = {
            let log = self.measurements.lock();
            if log.history.is_empty() {
                return;
            }
            let totals: Vec<f64> = log.history.iter().map(|m| m.total_latency_ms).collect();
            let duration_us = match (log.history.front(), log.history.back()) {
                (Some(first), Some(last)) => {
                    last.timestamp.duration_since(first.timestamp).as_micros() as i64
                }
                _ => 0,
            };
            (totals, duration_us)
        };

        let s = stats::series_stats(&totals);

        let mut statistics = self.statistics.lock();
        statistics.measurement_count = totals.len();
        statistics.mean_latency_ms = s.mean;
        statistics.median_latency_ms = s.median;
        statistics.std_deviation_ms = s.std_dev;
        statistics.min_latency_ms = s.min;
        statistics.max_latency_ms = s.max;
        statistics.measurement_duration_us = duration_us;
    }

    fn emit_event(&self, event_type: LatencyEventType, latency_ms: f64, description: &str) {
        let callback = self.callback.lock();
        let Some(handler) = callback.as_ref() else {
            return;
        };

        let event = LatencyEvent {
            event_type,
            latency_ms,
            description: description.to_string(),
            timestamp: Instant::now(),
        };
        handler(&event);
    }
}
