//! Hysteretic state machine: §4.5 of the pipeline design.

use crate::types::{Mode, ModeHistory, ModeStatus, SoftModeDistribution, TransitionType};

/// Metadata accompanying the state machine's chosen mode for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMeta {
    pub state_status: ModeStatus,
    pub transition_type: Option<TransitionType>,
    pub dwell_time: f64,
}

/// Run one step of the hysteretic state machine and commit the result to
/// `history`. Must be called exactly once per pipeline step.
pub fn step(distribution: &SoftModeDistribution, history: &mut ModeHistory, timestamp: f64) -> (Mode, f64, StepMeta) {
    let proposed = distribution.primary;
    let raw = distribution.weight_of(proposed);
    let cfg_prop = proposed.hysteresis();

    let (final_mode, final_confidence, status, transition) = match (history.current_mode(), history.state_status()) {
        (None, _) | (_, ModeStatus::Unknown) => {
            if raw >= cfg_prop.entry_threshold {
                (proposed, raw * cfg_prop.entry_penalty, ModeStatus::Provisional, Some(TransitionType::Entry))
            } else {
                (Mode::Transitional, 0.3, ModeStatus::Unknown, None)
            }
        }
        (Some(current), ModeStatus::Provisional) if proposed == current => {
            let since = history.provisional_since().unwrap_or(history.mode_entry_time());
            if timestamp - since >= cfg_prop.provisional_samples {
                (current, raw, ModeStatus::Established, Some(TransitionType::Sustained))
            } else {
                (current, raw, ModeStatus::Provisional, Some(TransitionType::Sustained))
            }
        }
        (Some(current), ModeStatus::Established) if proposed == current => {
            let cfg_curr = current.hysteresis();
            let dwell = history.dwell_time(timestamp);
            let confidence = if dwell >= cfg_curr.established_samples {
                (raw * cfg_curr.settled_bonus).min(1.0)
            } else {
                raw
            };
            (current, confidence, ModeStatus::Established, Some(TransitionType::Sustained))
        }
        (Some(current), ModeStatus::Established) => {
            let cfg_curr = current.hysteresis();
            if raw < cfg_curr.exit_threshold {
                (current, cfg_curr.exit_threshold * 0.9, ModeStatus::Established, None)
            } else {
                (proposed, raw * cfg_prop.entry_penalty, ModeStatus::Provisional, Some(TransitionType::Exit))
            }
        }
        (Some(current), ModeStatus::Provisional) => {
            if raw >= cfg_prop.entry_threshold {
                (proposed, raw * cfg_prop.entry_penalty, ModeStatus::Provisional, Some(TransitionType::Entry))
            } else {
                (current, distribution.weight_of(current), ModeStatus::Provisional, None)
            }
        }
    };

    history.commit(timestamp, final_mode, final_confidence, status);
    let dwell_time = history.dwell_time(timestamp);

    (
        final_mode,
        final_confidence,
        StepMeta {
            state_status: status,
            transition_type: transition,
            dwell_time,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soft_mode::classify;
    use crate::types::DEFAULT_SOFTMAX_TEMPERATURE;

    fn distribution_for(x: [f64; 4]) -> SoftModeDistribution {
        classify(x, DEFAULT_SOFTMAX_TEMPERATURE, None)
    }

    #[test]
    fn first_step_with_high_membership_enters_provisional() {
        let mut history = ModeHistory::new(32);
        let dist = distribution_for(Mode::CoherentPresence.centroid());
        let (mode, _conf, meta) = step(&dist, &mut history, 0.0);
        assert_eq!(mode, Mode::CoherentPresence);
        assert_eq!(meta.state_status, ModeStatus::Provisional);
        assert_eq!(meta.transition_type, Some(TransitionType::Entry));
    }

    #[test]
    fn provisional_promotes_to_established_after_dwell() {
        let mut history = ModeHistory::new(32);
        let dist = distribution_for(Mode::CoherentPresence.centroid());
        let provisional_samples = Mode::CoherentPresence.hysteresis().provisional_samples;
        step(&dist, &mut history, 0.0);
        let (_, _, meta) = step(&dist, &mut history, provisional_samples + 0.1);
        assert_eq!(meta.state_status, ModeStatus::Established);
    }

    #[test]
    fn established_mode_resists_displacement_below_exit_threshold() {
        let mut history = ModeHistory::new(32);
        let coherent_dist = distribution_for(Mode::CoherentPresence.centroid());
        let established_samples = Mode::CoherentPresence.hysteresis().established_samples;
        step(&coherent_dist, &mut history, 0.0);
        step(&coherent_dist, &mut history, established_samples + 1.0);
        assert_eq!(history.current_mode(), Some(Mode::CoherentPresence));
        assert_eq!(history.state_status(), ModeStatus::Established);

        // A weak competing proposal below the exit threshold must not displace it.
        let mut weak_membership: Vec<(Mode, f64)> = Mode::ALL.iter().map(|&m| (m, 0.02)).collect();
        let idx = weak_membership.iter().position(|(m, _)| *m == Mode::HeightenedAlertness).unwrap();
        weak_membership[idx].1 = 0.05;
        let normalize: f64 = weak_membership.iter().map(|(_, w)| w).sum();
        for w in weak_membership.iter_mut() {
            w.1 /= normalize;
        }
        let weak = SoftModeDistribution {
            membership: weak_membership,
            primary: Mode::HeightenedAlertness,
            secondary: Mode::SubtleAlertness,
            ambiguity: 0.5,
            distribution_shift: None,
        };
        let (mode, _, meta) = step(&weak, &mut history, established_samples + 2.0);
        assert_eq!(mode, Mode::CoherentPresence, "should resist displacement below exit threshold");
        assert_eq!(meta.transition_type, None);
    }

    #[test]
    fn transition_count_matches_emitted_mode_changes() {
        let mut history = ModeHistory::new(32);
        let a = distribution_for(Mode::HeightenedAlertness.centroid());
        let b = distribution_for(Mode::CoherentPresence.centroid());
        step(&a, &mut history, 0.0);
        let count_after_first = history.transition_count();
        step(&a, &mut history, 1.0);
        assert_eq!(history.transition_count(), count_after_first, "same mode must not add a transition");
        step(&b, &mut history, 100.0);
        assert!(history.transition_count() > count_after_first);
    }
}
