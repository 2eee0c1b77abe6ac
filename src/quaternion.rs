//! Conversion of angular-velocity Jacobian columns into quaternion-rate Jacobian columns.
//!
//! Quaternions of a [crate::Pose] are stored *scalar last*, i.e., `(x, y, z, w)`. The kinematic
//! matrix below is naturally written *scalar first*, so its product has to be reordered. This is
//! done in exactly one place, [scalar_first_to_last], and nowhere else.

use num_traits::Float;

use crate::utils::lit;

/// Rotates a scalar-first 4-vector into scalar-last order: `(w, x, y, z)` becomes `(x, y, z, w)`.
pub fn scalar_first_to_last<F: Copy>(value: [F; 4]) -> [F; 4] {
    let [w, x, y, z] = value;
    [x, y, z, w]
}

/// The quaternion kinematic matrix `S(q)` (4x3, row-major, scalar-first rows) for a rotation
/// `q = (x, y, z, w)` and an angular velocity expressed in the world (spatial) frame.
///
/// `qdot = 0.5 * S(q) * omega`, which is the matrix form of `0.5 * (omega ⊗ q)`.
pub fn kinematic_matrix<F: Float>(q: &[F; 4]) -> [[F; 3]; 4] {
    let [x, y, z, w] = *q;
    [[-x, -y, -z], [w, z, -y], [-z, w, x], [y, -x, w]]
}

/// Maps one angular-velocity column `omega` of a spatial Jacobian to the rate of change of the
/// quaternion `q`. Input and output are both scalar last.
///
/// The result is linear in `q`: negating the quaternion negates the rate.
pub fn quaternion_rate<F: Float>(q: &[F; 4], omega: &[F]) -> [F; 4] {
    debug_assert_eq!(omega.len(), 3);
    let half = lit::<F>(0.5);
    let matrix = kinematic_matrix(q);
    let mut rate = [F::zero(); 4];
    rate.iter_mut().zip(matrix.iter()).for_each(|(r, row)| {
        *r = half * (row[0] * omega[0] + row[1] * omega[1] + row[2] * omega[2]);
    });
    scalar_first_to_last(rate)
}
