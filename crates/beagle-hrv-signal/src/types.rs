//! Shared value types for the HRV signal pipeline.
//!
//! Hoisted into a leaf module so the trajectory engine and the movement
//! annotator can both depend on `SoftModeDistribution`, `ModeHistory`, and
//! `HysteresisConfig` without importing each other (the source this crate
//! is modeled on has the trajectory engine import the movement module,
//! which in turn imports trajectory types — a cycle broken here by giving
//! both a common leaf dependency).

use std::collections::VecDeque;
use std::fmt;

/// One of the six fixed autonomic archetypes, totally ordered by "calmness".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Mode {
    HeightenedAlertness,
    SubtleAlertness,
    Transitional,
    Settling,
    EmergingCoherence,
    CoherentPresence,
}

impl Mode {
    pub const ALL: [Mode; 6] = [
        Mode::HeightenedAlertness,
        Mode::SubtleAlertness,
        Mode::Transitional,
        Mode::Settling,
        Mode::EmergingCoherence,
        Mode::CoherentPresence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::HeightenedAlertness => "heightened alertness",
            Mode::SubtleAlertness => "subtle alertness",
            Mode::Transitional => "transitional",
            Mode::Settling => "settling",
            Mode::EmergingCoherence => "emerging coherence",
            Mode::CoherentPresence => "coherent presence",
        }
    }

    /// Build-time centroid in the 4-D classification space
    /// `(entrainment, breath_steady_score, amp_norm, inverse_volatility)`.
    pub fn centroid(&self) -> [f64; 4] {
        match self {
            Mode::HeightenedAlertness => [0.10, 0.3, 0.20, 0.20],
            Mode::SubtleAlertness => [0.25, 0.3, 0.35, 0.40],
            Mode::Transitional => [0.40, 0.5, 0.45, 0.60],
            Mode::Settling => [0.55, 0.8, 0.55, 0.75],
            Mode::EmergingCoherence => [0.65, 1.0, 0.65, 0.85],
            Mode::CoherentPresence => [0.80, 1.0, 0.75, 0.95],
        }
    }

    /// Build-time hysteresis configuration for this mode.
    pub fn hysteresis(&self) -> HysteresisConfig {
        match self {
            Mode::HeightenedAlertness | Mode::SubtleAlertness => HysteresisConfig {
                entry_threshold: 0.18,
                exit_threshold: 0.24,
                provisional_samples: 3.0,
                established_samples: 8.0,
                entry_penalty: 0.85,
                settled_bonus: 1.05,
            },
            Mode::Transitional => HysteresisConfig {
                entry_threshold: 0.17,
                exit_threshold: 0.22,
                provisional_samples: 2.0,
                established_samples: 5.0,
                entry_penalty: 0.90,
                settled_bonus: 1.00,
            },
            Mode::Settling => HysteresisConfig {
                entry_threshold: 0.19,
                exit_threshold: 0.25,
                provisional_samples: 3.0,
                established_samples: 10.0,
                entry_penalty: 0.80,
                settled_bonus: 1.10,
            },
            Mode::EmergingCoherence => HysteresisConfig {
                entry_threshold: 0.20,
                exit_threshold: 0.26,
                provisional_samples: 3.0,
                established_samples: 10.0,
                entry_penalty: 0.80,
                settled_bonus: 1.10,
            },
            Mode::CoherentPresence => HysteresisConfig {
                entry_threshold: 0.22,
                exit_threshold: 0.28,
                provisional_samples: 5.0,
                established_samples: 15.0,
                entry_penalty: 0.75,
                settled_bonus: 1.15,
            },
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature weights `(entrainment, breath_steady_score, amp_norm, inverse_volatility)`
/// used both by the softmax classifier distance and the HRV mode-score blend.
pub const FEATURE_WEIGHTS: [f64; 4] = [0.40, 0.30, 0.20, 0.10];

/// Default softmax temperature. Spec cites 1.0 throughout, but at T=1.0 the
/// upper modes (settling and above) cannot clear their own entry thresholds
/// even at their own centroid — see DESIGN.md "softmax temperature" entry.
pub const DEFAULT_SOFTMAX_TEMPERATURE: f64 = 0.4;

/// Default lag (in buffer steps) for trajectory coherence.
pub const DEFAULT_COHERENCE_LAG: usize = 5;

/// Default window (in mode-history entries) for rupture oscillation detection.
pub const DEFAULT_RUPTURE_WINDOW: usize = 10;

pub const VELOCITY_THRESHOLD: f64 = 0.03;
pub const ACCELERATION_THRESHOLD: f64 = 0.01;
pub const SETTLED_DWELL_SECONDS: f64 = 5.0;
pub const RECENT_TRANSITION_WINDOW_SECONDS: f64 = 3.0;

/// Per-mode hysteresis configuration (entry/exit thresholds plus the
/// dwell-time gates that promote a provisional mode to established).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisConfig {
    pub entry_threshold: f64,
    pub exit_threshold: f64,
    /// Seconds a mode must dwell (provisional) before promotion to established.
    pub provisional_samples: f64,
    /// Seconds a mode must dwell (established) before the settled-bonus applies.
    pub established_samples: f64,
    pub entry_penalty: f64,
    pub settled_bonus: f64,
}

/// Soft probability distribution over the six modes for one step.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SoftModeDistribution {
    /// Weight per mode, summing to 1 within floating-point tolerance.
    pub membership: Vec<(Mode, f64)>,
    pub primary: Mode,
    pub secondary: Mode,
    /// `1 - (w_primary - w_secondary)`.
    pub ambiguity: f64,
    /// KL(p‖q) against the previous step's distribution, if one was supplied.
    pub distribution_shift: Option<f64>,
}

impl SoftModeDistribution {
    pub fn weight_of(&self, mode: Mode) -> f64 {
        self.membership
            .iter()
            .find(|(m, _)| *m == mode)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    /// The three highest-weighted modes, as the emission schema requires.
    pub fn top3(&self) -> Vec<(Mode, f64)> {
        let mut sorted = self.membership.clone();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        sorted.truncate(3);
        sorted
    }
}

/// Hysteresis status of the currently emitted mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeStatus {
    Unknown,
    Provisional,
    Established,
}

/// What kind of hysteresis event produced this step's emitted mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionType {
    Entry,
    Exit,
    Sustained,
}

/// Bounded history of emitted modes, mutated exactly once per pipeline step
/// by the hysteretic state machine.
#[derive(Debug, Clone)]
pub struct ModeHistory {
    capacity: usize,
    entries: VecDeque<(f64, Mode, f64)>,
    current_mode: Option<Mode>,
    previous_mode: Option<Mode>,
    mode_entry_time: f64,
    transition_count: u64,
    state_status: ModeStatus,
    provisional_since: Option<f64>,
}

impl ModeHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity),
            current_mode: None,
            previous_mode: None,
            mode_entry_time: 0.0,
            transition_count: 0,
            state_status: ModeStatus::Unknown,
            provisional_since: None,
        }
    }

    pub fn current_mode(&self) -> Option<Mode> {
        self.current_mode
    }

    pub fn previous_mode(&self) -> Option<Mode> {
        self.previous_mode
    }

    pub fn state_status(&self) -> ModeStatus {
        self.state_status
    }

    pub fn mode_entry_time(&self) -> f64 {
        self.mode_entry_time
    }

    pub fn provisional_since(&self) -> Option<f64> {
        self.provisional_since
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    pub fn dwell_time(&self, now: f64) -> f64 {
        if self.current_mode.is_none() {
            0.0
        } else {
            (now - self.mode_entry_time).max(0.0)
        }
    }

    /// Entries in arrival order, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &(f64, Mode, f64)> {
        self.entries.iter()
    }

    /// Last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<(f64, Mode, f64)> {
        let len = self.entries.len();
        let skip = len.saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_mode = None;
        self.previous_mode = None;
        self.mode_entry_time = 0.0;
        self.transition_count = 0;
        self.state_status = ModeStatus::Unknown;
        self.provisional_since = None;
    }

    /// Commit the state machine's chosen mode for this step. Must be called
    /// exactly once per step, after the hysteresis decision has been made.
    pub fn commit(&mut self, timestamp: f64, mode: Mode, confidence: f64, status: ModeStatus) {
        let changed = self.current_mode != Some(mode);
        if changed {
            self.previous_mode = self.current_mode;
            self.mode_entry_time = timestamp;
            self.transition_count += 1;
            self.provisional_since = if status == ModeStatus::Provisional {
                Some(timestamp)
            } else {
                None
            };
        } else if status == ModeStatus::Provisional && self.provisional_since.is_none() {
            self.provisional_since = Some(timestamp);
        } else if status != ModeStatus::Provisional {
            self.provisional_since = None;
        }

        self.current_mode = Some(mode);
        self.state_status = status;

        self.entries.push_back((timestamp, mode, confidence));
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

/// Round to `dp` decimal places, matching the emission rounding conventions
/// of spec.md §6.2 (entrainment/volatility/coherence: 4dp, mode_score/ambiguity: 3dp,
/// breath_rate: 1dp).
pub fn round_dp(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}
