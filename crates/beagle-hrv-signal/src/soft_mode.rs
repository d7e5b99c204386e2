//! Soft mode classifier: §4.4 of the pipeline design.

use crate::types::{Mode, SoftModeDistribution, FEATURE_WEIGHTS};

const KL_EPSILON: f64 = 1e-10;

fn weighted_squared_distance(x: [f64; 4], centroid: [f64; 4]) -> f64 {
    (0..4).map(|f| FEATURE_WEIGHTS[f] * (x[f] - centroid[f]).powi(2)).sum()
}

/// Classify the 4-vector `x = (E, B, A, V')` against the six fixed mode
/// centroids, producing a full soft distribution. `prior` supplies the
/// previous step's distribution for the KL-divergence shift, if any.
pub fn classify(x: [f64; 4], temperature: f64, prior: Option<&SoftModeDistribution>) -> SoftModeDistribution {
    let neg_distances: Vec<(Mode, f64)> = Mode::ALL.iter().map(|&m| (m, -weighted_squared_distance(x, m.centroid()))).collect();

    let max_neg = neg_distances.iter().map(|(_, v)| *v).fold(f64::MIN, f64::max);

    let exp_vals: Vec<(Mode, f64)> = neg_distances
        .iter()
        .map(|&(m, v)| (m, ((v - max_neg) / temperature).exp()))
        .collect();
    let sum: f64 = exp_vals.iter().map(|(_, v)| v).sum();

    let mut membership: Vec<(Mode, f64)> = exp_vals.iter().map(|&(m, v)| (m, v / sum)).collect();
    membership.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let primary = membership[0].0;
    let secondary = membership[1].0;
    let w1 = membership[0].1;
    let w2 = membership[1].1;
    let ambiguity = (1.0 - (w1 - w2)).clamp(0.0, 1.0);

    let distribution_shift = prior.map(|q| kl_divergence(&membership, q));

    SoftModeDistribution {
        membership,
        primary,
        secondary,
        ambiguity,
        distribution_shift,
    }
}

/// `KL(p‖q) = Σ p_i · ln((p_i + ε)/(q_i + ε))`.
fn kl_divergence(p: &[(Mode, f64)], q: &SoftModeDistribution) -> f64 {
    p.iter()
        .map(|&(mode, p_i)| {
            let q_i = q.weight_of(mode);
            p_i * ((p_i + KL_EPSILON) / (q_i + KL_EPSILON)).ln()
        })
        .sum()
}
