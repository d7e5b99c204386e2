//! Movement annotation and rupture oscillation detection: §4.6 and §4.7.

use crate::types::{Mode, ModeHistory, RECENT_TRANSITION_WINDOW_SECONDS, VELOCITY_THRESHOLD};
use crate::types::{ACCELERATION_THRESHOLD, SETTLED_DWELL_SECONDS};

/// Annotate how the current mode was approached, from the first two
/// derivatives of `mode_score`, the previous mode, and dwell time.
pub fn annotate(velocity: Option<f64>, acceleration: f64, previous_mode: Option<Mode>, dwell_time: f64) -> String {
    let velocity = match velocity {
        None => return "insufficient data".to_string(),
        Some(v) => v,
    };

    let base = if velocity.abs() < VELOCITY_THRESHOLD {
        if dwell_time >= SETTLED_DWELL_SECONDS {
            "settled".to_string()
        } else {
            "still".to_string()
        }
    } else if acceleration.abs() > ACCELERATION_THRESHOLD {
        if acceleration > 0.0 {
            "accelerating".to_string()
        } else {
            "decelerating".to_string()
        }
    } else {
        "moving".to_string()
    };

    match previous_mode {
        Some(prev) if dwell_time < RECENT_TRANSITION_WINDOW_SECONDS => format!("{} from {}", base, prev),
        _ => base,
    }
}

/// Compose `mode` and `annotation` into the movement-aware label.
pub fn movement_aware_label(mode: Mode, annotation: &str) -> String {
    let bare = annotation.starts_with("insufficient data") || annotation.starts_with("unknown") || annotation.starts_with("settled");
    if bare {
        mode.to_string()
    } else {
        format!("{} ({})", mode, annotation)
    }
}

/// A detected strictly-alternating run of exactly two modes.
#[derive(Debug, Clone, PartialEq)]
pub struct RuptureOscillation {
    pub pattern: String,
    pub modes: [Mode; 2],
    pub transition_count: usize,
    pub onset_index: usize,
}

/// Look for a rupture oscillation over the last `window` entries of `history`.
pub fn detect_rupture(history: &ModeHistory, window: usize) -> Option<RuptureOscillation> {
    let entries = history.recent(window);
    if entries.len() < 2 {
        return None;
    }
    let modes_seq: Vec<Mode> = entries.iter().map(|(_, m, _)| *m).collect();

    let transition_count = modes_seq.windows(2).filter(|w| w[0] != w[1]).count();
    if transition_count < 4 {
        return None;
    }

    let mut distinct: Vec<Mode> = Vec::new();
    for &m in &modes_seq {
        if !distinct.contains(&m) {
            distinct.push(m);
        }
    }
    if distinct.len() != 2 {
        return None;
    }

    let strictly_alternating = modes_seq.windows(2).all(|w| w[0] != w[1]);
    if !strictly_alternating {
        return None;
    }

    let pattern: String = modes_seq
        .iter()
        .map(|m| if *m == distinct[0] { 'A' } else { 'B' })
        .collect();

    let onset_index = history.len().saturating_sub(modes_seq.len());

    Some(RuptureOscillation {
        pattern,
        modes: [distinct[0], distinct[1]],
        transition_count,
        onset_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModeStatus;

    #[test]
    fn absent_velocity_is_insufficient_data() {
        assert_eq!(annotate(None, 0.0, None, 0.0), "insufficient data");
    }

    #[test]
    fn still_below_velocity_threshold() {
        assert_eq!(annotate(Some(0.01), 0.0, None, 1.0), "still");
    }

    #[test]
    fn settled_after_dwell() {
        assert_eq!(annotate(Some(0.01), 0.0, None, 6.0), "settled");
    }

    #[test]
    fn accelerating_and_decelerating() {
        assert_eq!(annotate(Some(0.2), 0.05, None, 10.0), "accelerating");
        assert_eq!(annotate(Some(0.2), -0.05, None, 10.0), "decelerating");
    }

    #[test]
    fn appends_previous_mode_within_recent_window() {
        let a = annotate(Some(0.2), 0.0, Some(Mode::Settling), 1.0);
        assert!(a.starts_with("moving from"));
        let b = annotate(Some(0.2), 0.0, Some(Mode::Settling), 10.0);
        assert_eq!(b, "moving");
    }

    #[test]
    fn movement_aware_label_suppresses_settled_and_insufficient() {
        assert_eq!(movement_aware_label(Mode::Settling, "settled"), "settling");
        assert_eq!(movement_aware_label(Mode::Settling, "insufficient data"), "settling");
        assert_eq!(movement_aware_label(Mode::Settling, "accelerating"), "settling (accelerating)");
    }

    #[test]
    fn rupture_detected_for_strict_alternation() {
        let mut history = ModeHistory::new(32);
        let modes = [Mode::HeightenedAlertness, Mode::SubtleAlertness];
        for i in 0..10 {
            history.commit(i as f64, modes[i % 2], 0.5, ModeStatus::Established);
        }
        let r = detect_rupture(&history, 10).expect("expected a rupture");
        assert_eq!(r.transition_count, 9);
        assert_eq!(r.pattern.len(), 10);
    }

    #[test]
    fn no_rupture_for_single_mode() {
        let mut history = ModeHistory::new(32);
        for i in 0..10 {
            history.commit(i as f64, Mode::Settling, 0.5, ModeStatus::Established);
        }
        assert!(detect_rupture(&history, 10).is_none());
    }

    #[test]
    fn no_rupture_for_three_distinct_modes() {
        let mut history = ModeHistory::new(32);
        let modes = [Mode::HeightenedAlertness, Mode::SubtleAlertness, Mode::Transitional];
        for i in 0..9 {
            history.commit(i as f64, modes[i % 3], 0.5, ModeStatus::Established);
        }
        assert!(detect_rupture(&history, 9).is_none());
    }
}
