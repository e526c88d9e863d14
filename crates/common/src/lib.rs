//! `mt-common` — Shared time types for the Montage native engine.
//!
//! This crate is the foundation the engine crates depend on. It defines
//! the rational time system:
//!
//! - **`TimeRational`**: reduced `num/den` seconds with exact comparison
//! - **`TimePoint`**: absolute timeline position
//! - **`TimeDuration`**: signed span between positions
//!
//! Positions are rational so that audio sample counts (`n / 48000`) and
//! fractional video frame rates (`30000/1001`) are represented exactly.
//! `TimePoint` / `TimeDuration` arithmetic is first-class and keeps
//! values reduced.

pub mod time;

// Re-export primary types at crate root for convenience
pub use time::{TimeDuration, TimePoint, TimeRational};
