//! `mt-sync` — Audio-driven A/V synchronization for the Montage native engine.
//!
//! This crate keeps video frame presentation locked to the audio
//! timebase within a bounded offset (target ±10ms) in the presence of
//! plugin processing delay, system output latency, and natural clock
//! drift between independently-timestamped streams:
//!
//! - **MasterClock**: the canonical timebase derived from the audio
//!   sample position, with drift detection and bounded gradual correction
//! - **SyncValidator**: independent offset measurement, quality metrics,
//!   sync events, and CSV export
//! - **LatencyCompensator**: plugin delay + system latency folded into
//!   one adaptively-smoothed compensation value
//! - **AudioClock**: the lock-free sample counter the audio callback drives
//! - **Stats**: shared descriptive statistics and regression helpers
//!
//! # Architecture
//!
//! ```text
//! audio callback -> AudioClock -> MasterClock.update_audio_position()
//!                                     |            \
//!                                     v             v
//!                            video_position()   SyncValidator.record_measurement()
//!                                     |                  |
//!                                     v                  v
//!                             frame scheduler     quality metrics + events
//!                                     ^
//!                                     |
//!                  LatencyCompensator.current_compensation_ms()
//!                        (plugin delay + system latency)
//! ```
//!
//! The audio thread pushes sample positions into the master clock; the
//! render thread reports displayed video positions and reads back the
//! compensated expected position once per frame. The validator and the
//! compensator observe independently — the validator is the QA
//! instrument, the clock's drift loop is the actuator, and the two are
//! never merged. All calls are synchronous and short; locks are
//! partitioned per concern so the audio thread never blocks behind a
//! UI-thread metric read.

pub mod clock;
pub mod error;
pub mod latency;
pub mod source;
pub mod stats;
pub mod validator;

// Re-export primary types at crate root for convenience
pub use clock::{DriftState, MasterClock, MasterClockConfig, SyncMetrics};
pub use error::SyncError;
pub use latency::{
    latency_ms_to_samples, samples_to_latency_ms, LatencyCompensator, LatencyCompensatorConfig,
    LatencyEvent, LatencyEventCallback, LatencyEventType, LatencyMeasurement, LatencyProbe,
    LatencyStats, PluginLatencyInfo, SyntheticLatencyProbe,
};
pub use source::AudioClock;
pub use validator::{
    detect_patterns, SyncEvent, SyncEventCallback, SyncEventType, SyncMeasurement, SyncPattern,
    SyncQualityMetrics, SyncValidator, SyncValidatorConfig,
};
