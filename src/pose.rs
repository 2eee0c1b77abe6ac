//! Poses of links and the weighted distance between an achieved and a desired pose.

use itertools::izip;
use num_traits::Float;

use crate::{body::Jacobian, quaternion::quaternion_rate, utils::dot};

/// Position and orientation of a link in world coordinates.
///
/// The orientation is a quaternion stored as `(x, y, z, w)`. Its sign is not canonicalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose<F> {
    pub position: [F; 3],
    pub orientation: [F; 4],
}

impl<F: Float> Pose<F> {
    pub fn new(position: [F; 3], orientation: [F; 4]) -> Self {
        Self { position, orientation }
    }

    /// A pose at `position` without rotation
    pub fn from_position(position: [F; 3]) -> Self {
        Self::new(position, [F::zero(), F::zero(), F::zero(), F::one()])
    }

    /// The same pose with the orientation quaternion negated (same rotation)
    pub fn flipped(&self) -> Self {
        Self::new(self.position, self.orientation.map(|x| -x))
    }
}

/// Weights of the position and orientation terms within a single pose distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceWeights<F> {
    pub position: F,
    pub orientation: F,
}

impl<F: Float> Default for DistanceWeights<F> {
    fn default() -> Self {
        Self {
            position: F::one(),
            orientation: F::one(),
        }
    }
}

impl<F: Float> DistanceWeights<F> {
    pub fn new(position: F, orientation: F) -> Self {
        Self { position, orientation }
    }

    /// `position * |p_a - p_d|² + orientation * (1 - <q_a, q_d>²)`
    ///
    /// Symmetric under negating either quaternion. Non-unit quaternions are used as given.
    pub fn cost(&self, achieved: &Pose<F>, desired: &Pose<F>) -> F {
        let squared_distance = izip!(&achieved.position, &desired.position)
            .map(|(a, d)| (*a - *d) * (*a - *d))
            .fold(F::zero(), |acc, x| acc + x);
        let inner = dot(&achieved.orientation, &desired.orientation);
        self.position * squared_distance + self.orientation * (F::one() - inner * inner)
    }

    /// Adds `scale` times the derivative of [DistanceWeights::cost] to `gradient`.
    ///
    /// Column `i` of `jacobian` belongs to joint `columns[i]` of the full joint vector.
    pub fn accumulate_gradient(
        &self,
        achieved: &Pose<F>,
        desired: &Pose<F>,
        jacobian: &Jacobian<F>,
        columns: &[usize],
        scale: F,
        gradient: &mut [F],
    ) {
        debug_assert_eq!(jacobian.cols(), columns.len());
        let two = F::one() + F::one();

        let mut position_difference = [F::zero(); 3];
        izip!(&mut position_difference, &achieved.position, &desired.position).for_each(|(d, a, t)| *d = *a - *t);

        // track the shorter geodesic
        let mut orientation = achieved.orientation;
        let mut inner = dot(&orientation, &desired.orientation);
        if inner < F::zero() {
            orientation = orientation.map(|x| -x);
            inner = -inner;
        }

        columns.iter().enumerate().for_each(|(i, &index)| {
            let column = jacobian.column(i);
            let position_term = two * self.position * dot(column.linear(), &position_difference);
            let rate = quaternion_rate(&orientation, column.angular());
            let orientation_term = -two * self.orientation * dot(&rate, &desired.orientation) * inner;
            gradient[index] = gradient[index] + scale * (position_term + orientation_term);
        });
    }
}
