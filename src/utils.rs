use num_traits::Float;

/// Converts an `f64` constant into the working float type.
///
/// All [Float] implementors of interest (`f32`, `f64`) represent every constant used in this crate,
/// so the fallback is never taken in practice.
pub(crate) fn lit<F: Float>(value: f64) -> F {
    F::from(value).unwrap_or_else(F::nan)
}

pub(crate) fn dot<F: Float>(a: &[F], b: &[F]) -> F {
    a.iter().zip(b).fold(F::zero(), |acc, (x, y)| acc + *x * *y)
}
