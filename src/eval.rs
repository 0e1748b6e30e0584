//! Held-out error metric.

use crate::data::ReferenceData;
use crate::network::Surrogate;

/// Relative L2 error of predicted density against the reference snapshots:
/// `‖ρ_pred − ρ_ref‖₂ / ‖ρ_ref‖₂`.
pub fn relative_l2_error<N: Surrogate>(net: &N, params: &[f64], reference: &ReferenceData) -> f64 {
    let pred = net.forward(params, &reference.coords).rho;
    let (num, den) = pred
        .iter()
        .zip(reference.rho.iter())
        .fold((0.0, 0.0), |(num, den), (&p, &r)| (num + (p - r) * (p - r), den + r * r));
    (num / den).sqrt()
}
