//! Pipeline orchestrator: wires admission → HRV → phase → trajectory →
//! {soft-mode, movement} → hysteresis → emission, per §2 dependency order.

use crate::emit::{build_step_record, RuptureRecord, StepRecord, SCHEMA_VERSION};
use crate::hrv::{self, HrvRecord};
use crate::hysteresis;
use crate::movement;
use crate::phase::{self, PhaseBuffer};
use crate::rr_buffer::{RrBuffer, DEFAULT_W_RR};
use crate::sink::{EmissionSink, InboundSample, InputSink};
use crate::soft_mode;
use crate::types::{ModeHistory, SoftModeDistribution, DEFAULT_COHERENCE_LAG, DEFAULT_RUPTURE_WINDOW, DEFAULT_SOFTMAX_TEMPERATURE};

use crate::phase::DEFAULT_W_PHASE;

/// Build/run-time constants threaded explicitly through the pipeline —
/// never global statics, per the single-threaded-cooperative-per-subject
/// design.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub w_rr: usize,
    pub w_phase: usize,
    pub softmax_temperature: f64,
    pub coherence_lag: usize,
    pub rupture_window: usize,
    pub schema_version: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            w_rr: DEFAULT_W_RR,
            w_phase: DEFAULT_W_PHASE,
            softmax_temperature: DEFAULT_SOFTMAX_TEMPERATURE,
            coherence_lag: DEFAULT_COHERENCE_LAG,
            rupture_window: DEFAULT_RUPTURE_WINDOW,
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }
}

/// Finite-difference tracker for `mode_score`'s first and second derivative,
/// independent of the phase-space trajectory engine (mode_score is scalar,
/// not a point in the phase cube).
#[derive(Debug, Clone, Default)]
struct ModeScoreTracker {
    prev: Option<(f64, f64)>,
    last: Option<(f64, f64)>,
}

const DT_FLOOR_SECONDS: f64 = 0.001;

impl ModeScoreTracker {
    fn update(&mut self, timestamp: f64, score: f64) -> (Option<f64>, f64) {
        let result = match (self.prev, self.last) {
            (_, None) => (None, 0.0),
            (None, Some(last)) => {
                let dt = (timestamp - last.0).max(DT_FLOOR_SECONDS);
                let velocity = (score - last.1) / dt;
                (Some(velocity), 0.0)
            }
            (Some(prev), Some(last)) => {
                let dt1 = (timestamp - last.0).max(DT_FLOOR_SECONDS);
                let dt2 = (last.0 - prev.0).max(DT_FLOOR_SECONDS);
                let velocity = (score - last.1) / dt1;
                let velocity_prev = (last.1 - prev.1) / dt2;
                let acceleration = (velocity - velocity_prev) / ((dt1 + dt2) / 2.0);
                (Some(velocity), acceleration)
            }
        };

        self.prev = self.last;
        self.last = Some((timestamp, score));
        result
    }
}

/// The stateful, single-subject signal pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    rr_buffer: RrBuffer,
    phase_buffer: PhaseBuffer,
    mode_history: ModeHistory,
    prior_soft_mode: Option<SoftModeDistribution>,
    mode_score_tracker: ModeScoreTracker,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let rr_buffer = RrBuffer::new(config.w_rr);
        let phase_buffer = PhaseBuffer::new(config.w_phase);
        let mode_history = ModeHistory::new(config.w_phase.max(config.rupture_window));
        Self {
            config,
            rr_buffer,
            phase_buffer,
            mode_history,
            prior_soft_mode: None,
            mode_score_tracker: ModeScoreTracker::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The full six-weight distribution from the most recent step, ahead of
    /// emission's top-3 truncation. Primarily for introspection and testing.
    pub fn last_soft_mode(&self) -> Option<&SoftModeDistribution> {
        self.prior_soft_mode.as_ref()
    }

    pub fn mode_history(&self) -> &ModeHistory {
        &self.mode_history
    }

    /// Process one inbound sample end to end, returning its emitted step record.
    pub fn step(&mut self, sample: &InboundSample) -> StepRecord {
        self.rr_buffer.admit_all(&sample.rr_intervals);
        let rr_values = self.rr_buffer.values();
        let hrv: HrvRecord = hrv::extract(&rr_values);

        let position = phase::phase_lift(&hrv);
        let dynamics = self.phase_buffer.append(sample.timestamp_seconds, position);
        let coherence = phase::trajectory_coherence(&self.phase_buffer, self.config.coherence_lag);

        let feature_vector = hrv.feature_vector();
        let soft_mode = soft_mode::classify(feature_vector, self.config.softmax_temperature, self.prior_soft_mode.as_ref());

        let previous_mode = self.mode_history.current_mode();
        let (final_mode, _confidence, meta) = hysteresis::step(&soft_mode, &mut self.mode_history, sample.timestamp_seconds);

        let (velocity, acceleration) = self.mode_score_tracker.update(sample.timestamp_seconds, hrv.mode_score);
        let movement_annotation = movement::annotate(velocity, acceleration, previous_mode, meta.dwell_time);
        let movement_aware_label = movement::movement_aware_label(final_mode, &movement_annotation);

        self.prior_soft_mode = Some(soft_mode.clone());

        build_step_record(
            sample.timestamp.clone(),
            sample.heart_rate,
            sample.rr_intervals.clone(),
            &hrv,
            &dynamics,
            coherence,
            &soft_mode,
            movement_annotation,
            movement_aware_label,
            &meta,
            acceleration.abs(),
        )
    }

    /// Secondary output: a rupture oscillation over the configured window, if any.
    pub fn check_rupture(&self) -> Option<RuptureRecord> {
        movement::detect_rupture(&self.mode_history, self.config.rupture_window).map(RuptureRecord::from)
    }

    /// Drive the pipeline from an `InputSink` to an `EmissionSink` until the
    /// input is exhausted. The binary owns reading/writing; the pipeline
    /// owns neither I/O nor timing.
    pub fn run<I: InputSink, E: EmissionSink>(&mut self, input: &mut I, sink: &mut E) {
        while let Some(sample) = input.next_sample() {
            let record = self.step(&sample);
            sink.on_step(&record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts: f64, hr: i64, rr: Vec<i64>) -> InboundSample {
        InboundSample {
            timestamp: ts.to_string(),
            timestamp_seconds: ts,
            heart_rate: hr,
            rr_intervals: rr,
            sensor_contact: true,
        }
    }

    #[test]
    fn warm_up_scenario_s6() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        for i in 0..5 {
            let record = pipeline.step(&sample(i as f64, 60, vec![800 + i]));
            assert_eq!(record.phase.phase_label, "warming up");
            assert_eq!(record.phase.velocity_mag, 0.0);
            assert_eq!(record.phase.stability, 0.5);
            assert!(!record.phase.soft_mode.membership.is_empty());
        }
    }

    #[test]
    fn constant_series_scenario_s1() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let mut last = None;
        for i in 0..30 {
            last = Some(pipeline.step(&sample(i as f64, 60, vec![1000])));
        }
        let record = last.unwrap();
        assert_eq!(record.metrics.amp, 0.0);
        assert_eq!(record.metrics.volatility, 0.0);
        assert_eq!(record.metrics.ent, 0.0);
    }

    #[test]
    fn sinusoidal_series_reaches_settled_band_scenario_s2() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let mut last = None;
        for i in 0..30 {
            let rr = 1000 + (80.0 * (2.0 * std::f64::consts::PI * i as f64 / 5.0).sin()).round() as i64;
            last = Some(pipeline.step(&sample(i as f64, 60, vec![rr])));
        }
        let record = last.unwrap();
        assert!(record.metrics.amp >= 140.0 && record.metrics.amp <= 160.0);
    }

    #[test]
    fn emitted_mode_never_changes_below_exit_threshold_scenario_s4() {
        // S1 (constant) then S2 (sinusoidal) then S1 again.
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let mut step_idx = 0.0;
        let mut saw_entry = false;
        let mut saw_exit = false;
        for i in 0..30 {
            pipeline.step(&sample(step_idx, 60, vec![1000]));
            step_idx += 1.0;
            let _ = i;
        }
        for i in 0..30 {
            let rr = 1000 + (80.0 * (2.0 * std::f64::consts::PI * i as f64 / 5.0).sin()).round() as i64;
            let record = pipeline.step(&sample(step_idx, 60, vec![rr]));
            step_idx += 1.0;
            if record.phase.mode_status == "provisional" && record.phase.dwell_time < 1.0 {
                saw_entry = true;
            }
        }
        for _ in 0..30 {
            let record = pipeline.step(&sample(step_idx, 60, vec![1000]));
            step_idx += 1.0;
            if record.phase.mode_status == "provisional" && record.phase.dwell_time < 1.0 {
                saw_exit = true;
            }
        }
        assert!(saw_entry || saw_exit, "expected at least one entry/exit transition across S1->S2->S1");
    }
}
