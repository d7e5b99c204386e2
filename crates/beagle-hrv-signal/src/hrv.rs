//! HRV feature extraction: §4.1 of the pipeline design.

use crate::types::Mode;

/// Minimum RR buffer length required to compute entrainment.
pub const MIN_SAMPLES_FOR_ENTRAINMENT: usize = 10;
/// Lag band (in beats) searched for the entrainment peak.
pub const ENTRAINMENT_LAGS: [usize; 5] = [4, 5, 6, 7, 8];

/// Sample autocorrelation at `lag`, using the same denominator `n` for
/// variance and autocovariance. Using `n - lag` for the autocovariance
/// instead inflates the result at small buffer sizes — the regression this
/// crate exists to avoid.
pub fn autocorrelation(x: &[f64], lag: usize) -> f64 {
    let n = x.len();
    if lag == 0 || lag >= n {
        return 0.0;
    }
    let n_f = n as f64;
    let mean = x.iter().sum::<f64>() / n_f;
    let variance = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_f;
    if variance < 1e-10 {
        return 0.0;
    }
    let autocovariance: f64 = (0..n - lag).map(|i| (x[i] - mean) * (x[i + lag] - mean)).sum::<f64>() / n_f;
    autocovariance / variance
}

fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        0.0
    } else {
        x.iter().sum::<f64>() / x.len() as f64
    }
}

fn population_stddev(x: &[f64], mean_val: f64) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    (x.iter().map(|v| (v - mean_val).powi(2)).sum::<f64>() / x.len() as f64).sqrt()
}

pub fn entrainment(rr_f: &[f64]) -> (f64, &'static str) {
    if rr_f.len() < MIN_SAMPLES_FOR_ENTRAINMENT {
        return (0.0, "[insufficient data]");
    }
    let best = ENTRAINMENT_LAGS
        .iter()
        .map(|&lag| autocorrelation(rr_f, lag))
        .fold(f64::MIN, f64::max);
    let e = best.clamp(0.0, 1.0);
    let label = if e < 0.2 {
        "[low]"
    } else if e < 0.4 {
        "[emerging]"
    } else if e < 0.7 {
        "[entrained]"
    } else {
        "[high entrainment]"
    };
    (e, label)
}

/// Indices of strict local maxima.
fn find_peaks(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    for i in 1..x.len() - 1 {
        if x[i] > x[i - 1] && x[i] > x[i + 1] {
            peaks.push(i);
        }
    }
    peaks
}

/// `(breath_rate_per_min, breath_steady)`, or `(None, false)` if no estimate
/// can be produced.
fn breath_rate_estimate(rr_f: &[f64], mean_rr: f64) -> (Option<f64>, bool) {
    let peaks = find_peaks(rr_f);
    if peaks.len() >= 2 {
        let spacings: Vec<f64> = peaks.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
        let mean_spacing = mean(&spacings);
        let cv = if mean_spacing.abs() > 1e-12 {
            population_stddev(&spacings, mean_spacing) / mean_spacing
        } else {
            0.0
        };
        let cycle_ms = mean_spacing * mean_rr;
        if cycle_ms > 1e-9 {
            let rate = 60_000.0 / cycle_ms;
            if (2.0..=20.0).contains(&rate) {
                return (Some(rate), cv < 0.3);
            }
        }
        return (None, false);
    }

    // Zero-crossing fallback on the mean-detrended series.
    let m = mean(rr_f);
    let detrended: Vec<f64> = rr_f.iter().map(|v| v - m).collect();
    let mut crossings = 0usize;
    for w in detrended.windows(2) {
        if (w[0] <= 0.0 && w[1] > 0.0) || (w[0] >= 0.0 && w[1] < 0.0) {
            crossings += 1;
        }
    }
    let cycles = crossings as f64 / 2.0;
    if cycles < 1e-9 {
        return (None, false);
    }
    let total_ms: f64 = rr_f.iter().sum();
    let cycle_ms = total_ms / cycles;
    if cycle_ms > 1e-9 {
        let rate = 60_000.0 / cycle_ms;
        if (2.0..=20.0).contains(&rate) {
            return (Some(rate), false);
        }
    }
    (None, false)
}

pub fn volatility(rr_f: &[f64]) -> f64 {
    let m = mean(rr_f);
    if rr_f.is_empty() || m.abs() < 1e-12 {
        return 0.0;
    }
    population_stddev(rr_f, m) / m
}

/// Six-band label on `calm_score`, reusing the totally-ordered mode list as
/// the coarse pre-classification label carried on `HRVRecord`.
pub fn mode_band(calm_score: f64) -> Mode {
    if calm_score < 0.2 {
        Mode::HeightenedAlertness
    } else if calm_score < 0.35 {
        Mode::SubtleAlertness
    } else if calm_score < 0.5 {
        Mode::Transitional
    } else if calm_score < 0.65 {
        Mode::Settling
    } else if calm_score < 0.8 {
        Mode::EmergingCoherence
    } else {
        Mode::CoherentPresence
    }
}

/// Immutable snapshot of HRV features computed from the current RR buffer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HrvRecord {
    pub mean_rr: f64,
    pub min_rr: f64,
    pub max_rr: f64,
    pub amplitude: f64,
    pub entrainment: f64,
    pub entrainment_label: &'static str,
    pub breath_rate: Option<f64>,
    pub breath_steady: bool,
    pub rr_volatility: f64,
    pub mode_label: Mode,
    pub mode_score: f64,
}

impl HrvRecord {
    /// Amp normalized to `[0,1]`, as used by the phase lift and classifier.
    pub fn amp_norm(&self) -> f64 {
        (self.amplitude / 200.0).min(1.0)
    }

    /// `V' = clamp(1 - 5*volatility, 0, 1)`.
    pub fn inverse_volatility(&self) -> f64 {
        (1.0 - 5.0 * self.rr_volatility).clamp(0.0, 1.0)
    }

    /// `B = 1.0 if breath_steady else 0.3`.
    pub fn breath_steady_score(&self) -> f64 {
        if self.breath_steady {
            1.0
        } else {
            0.3
        }
    }

    /// The classifier's 4-vector `(E, B, A, V')`.
    pub fn feature_vector(&self) -> [f64; 4] {
        [
            self.entrainment,
            self.breath_steady_score(),
            self.amp_norm(),
            self.inverse_volatility(),
        ]
    }
}

/// Compute an `HrvRecord` from the current RR buffer contents (oldest→newest).
pub fn extract(rr: &[i64]) -> HrvRecord {
    let rr_f: Vec<f64> = rr.iter().map(|&v| v as f64).collect();

    let (mean_rr, min_rr, max_rr, amplitude) = if rr_f.is_empty() {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        let min_rr = rr_f.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_rr = rr_f.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let amplitude = if rr_f.len() >= 2 { max_rr - min_rr } else { 0.0 };
        (mean(&rr_f), min_rr, max_rr, amplitude)
    };

    let (entrainment, entrainment_label) = entrainment(&rr_f);
    let (breath_rate, breath_steady) = if rr_f.is_empty() {
        (None, false)
    } else {
        breath_rate_estimate(&rr_f, mean_rr)
    };
    let rr_volatility = volatility(&rr_f);

    let amp_norm = (amplitude / 200.0).min(1.0);
    let inverse_volatility = (1.0 - 5.0 * rr_volatility).clamp(0.0, 1.0);
    let breath_steady_score = if breath_steady { 1.0 } else { 0.3 };

    let calm_score =
        (0.4 * entrainment + 0.3 * breath_steady_score + 0.2 * amp_norm + 0.1 * inverse_volatility).clamp(0.0, 1.0);

    HrvRecord {
        mean_rr,
        min_rr,
        max_rr,
        amplitude,
        entrainment,
        entrainment_label,
        breath_rate,
        breath_steady,
        rr_volatility,
        mode_label: mode_band(calm_score),
        mode_score: calm_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_series_has_zero_amplitude_and_volatility() {
        let rr = vec![1000; 30];
        let rec = extract(&rr);
        assert_eq!(rec.amplitude, 0.0);
        assert_eq!(rec.rr_volatility, 0.0);
        assert_eq!(rec.entrainment, 0.0);
    }

    #[test]
    fn insufficient_data_below_ten_samples() {
        let rr = vec![800, 810, 790];
        let rec = extract(&rr);
        assert_eq!(rec.entrainment, 0.0);
        assert_eq!(rec.entrainment_label, "[insufficient data]");
    }

    #[test]
    fn sinusoidal_series_is_entrained() {
        let rr: Vec<i64> = (0..30)
            .map(|i| 1000 + (80.0 * (2.0 * std::f64::consts::PI * i as f64 / 5.0).sin()).round() as i64)
            .collect();
        let rec = extract(&rr);
        assert!(rec.amplitude >= 140.0 && rec.amplitude <= 160.0, "amplitude={}", rec.amplitude);
        assert!(rec.entrainment > 0.4, "entrainment={}", rec.entrainment);
        let breath = rec.breath_rate.expect("expected a breath-rate estimate");
        assert!((8.0..=16.0).contains(&breath), "breath_rate={}", breath);
        assert!(rec.breath_steady);
    }

    #[test]
    fn autocorrelation_is_zero_for_constant_input() {
        let x = vec![5.0; 20];
        assert_eq!(autocorrelation(&x, 4), 0.0);
    }

    #[test]
    fn autocorrelation_denominator_is_consistent() {
        // A hand-checkable series where lag-1 autocorrelation should be
        // strongly negative under the shared-n convention, not inflated.
        let x = vec![0.0, 10.0, 0.0, 10.0, 0.0, 10.0, 0.0, 10.0];
        let a = autocorrelation(&x, 1);
        assert!(a < 0.0);
        assert!(a >= -1.5);
    }
}
