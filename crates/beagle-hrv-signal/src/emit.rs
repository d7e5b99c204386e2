//! Emission schema: §6.2 of the pipeline design (schema version 1.1.0).

use serde::{Deserialize, Serialize};

use crate::hrv::HrvRecord;
use crate::hysteresis::StepMeta;
use crate::movement::RuptureOscillation;
use crate::phase::TrajectoryDynamics;
use crate::types::{round_dp, Mode, SoftModeDistribution};

pub const SCHEMA_VERSION: &str = "1.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub amp: f64,
    pub ent: f64,
    pub ent_label: String,
    pub breath: Option<f64>,
    pub volatility: f64,
    pub mode: String,
    pub mode_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftModeSummary {
    pub primary: String,
    pub secondary: String,
    pub ambiguity: f64,
    pub distribution_shift: Option<f64>,
    pub membership: std::collections::BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSection {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub velocity_mag: f64,
    pub curvature: f64,
    pub stability: f64,
    pub history_signature: f64,
    pub phase_label: String,
    pub coherence: f64,
    pub movement_annotation: String,
    pub movement_aware_label: String,
    pub mode_status: String,
    pub dwell_time: f64,
    pub acceleration_mag: f64,
    pub soft_mode: SoftModeSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub ts: String,
    pub hr: i64,
    pub rr: Vec<i64>,
    pub metrics: Metrics,
    pub phase: PhaseSection,
}

/// One-time session-start record emitted before any `StepRecord`, so older
/// readers can detect schema drift up front.
pub fn session_header(schema_version: &str) -> serde_json::Value {
    serde_json::json!({ "schema_version": schema_version })
}

#[allow(clippy::too_many_arguments)]
pub fn build_step_record(
    ts: String,
    hr: i64,
    rr: Vec<i64>,
    hrv: &HrvRecord,
    dynamics: &TrajectoryDynamics,
    coherence: f64,
    soft_mode: &SoftModeDistribution,
    movement_annotation: String,
    movement_aware_label: String,
    meta: &StepMeta,
    mode_score_acceleration: f64,
) -> StepRecord {
    let membership: std::collections::BTreeMap<String, f64> =
        soft_mode.top3().into_iter().map(|(m, w)| (m.to_string(), round_dp(w, 3))).collect();

    StepRecord {
        ts,
        hr,
        rr,
        metrics: Metrics {
            amp: hrv.amplitude,
            ent: round_dp(hrv.entrainment, 4),
            ent_label: hrv.entrainment_label.to_string(),
            breath: hrv.breath_rate.map(|b| round_dp(b, 1)),
            volatility: round_dp(hrv.rr_volatility, 4),
            mode: mode_label_string(hrv.mode_label),
            mode_score: round_dp(hrv.mode_score, 3),
        },
        phase: PhaseSection {
            position: dynamics.position,
            velocity: dynamics.velocity,
            velocity_mag: dynamics.velocity_magnitude,
            curvature: dynamics.curvature,
            stability: dynamics.stability,
            history_signature: dynamics.history_signature,
            phase_label: dynamics.phase_label.to_string(),
            coherence: round_dp(coherence, 4),
            movement_annotation,
            movement_aware_label,
            mode_status: format!("{:?}", meta.state_status).to_lowercase(),
            dwell_time: meta.dwell_time,
            acceleration_mag: mode_score_acceleration,
            soft_mode: SoftModeSummary {
                primary: soft_mode.primary.to_string(),
                secondary: soft_mode.secondary.to_string(),
                ambiguity: round_dp(soft_mode.ambiguity, 3),
                distribution_shift: soft_mode.distribution_shift,
                membership,
            },
        },
    }
}

fn mode_label_string(mode: Mode) -> String {
    mode.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuptureRecord {
    pub pattern: String,
    pub modes: [String; 2],
    pub transition_count: usize,
    pub onset_index: usize,
}

impl From<RuptureOscillation> for RuptureRecord {
    fn from(r: RuptureOscillation) -> Self {
        RuptureRecord {
            pattern: r.pattern,
            modes: [r.modes[0].to_string(), r.modes[1].to_string()],
            transition_count: r.transition_count,
            onset_index: r.onset_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_header_carries_schema_version() {
        let v = session_header(SCHEMA_VERSION);
        assert_eq!(v["schema_version"], "1.1.0");
    }
}
