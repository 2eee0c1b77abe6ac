//! Interface of the kinematic body model that the inverse kinematics consumes.
//!
//! Forward kinematics and Jacobians are delegated entirely to an implementor of [BodyModel].
//! The joint configuration is always passed explicitly; implementors must not rely on (or modify)
//! a hidden working configuration when answering queries.

use std::collections::HashMap;

use num_traits::Float;

use crate::{errors::Result, Pose};

/// Rows of a spatial Jacobian: three linear velocity rows followed by three angular velocity rows.
pub const JACOBIAN_ROWS: usize = 6;

/// A 6xn spatial Jacobian stored column-major, one column per joint of a group (in the group's
/// joint order).
#[derive(Debug, Clone, PartialEq)]
pub struct Jacobian<F> {
    matrix: Vec<F>,
    cols: usize,
}

/// Borrowed view of a single Jacobian column
#[derive(Debug, Clone, Copy)]
pub struct JacobianColumn<'a, F>(&'a [F]);

impl<'a, F> JacobianColumn<'a, F> {
    pub fn linear(&self) -> &'a [F] {
        &self.0[..3]
    }

    pub fn angular(&self) -> &'a [F] {
        &self.0[3..]
    }
}

impl<F: Float> Jacobian<F> {
    pub fn zeros(cols: usize) -> Self {
        Self {
            matrix: vec![F::zero(); JACOBIAN_ROWS * cols],
            cols,
        }
    }

    pub fn from_columns(columns: &[[F; JACOBIAN_ROWS]]) -> Self {
        Self {
            matrix: columns.iter().flatten().copied().collect(),
            cols: columns.len(),
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn column(&self, index: usize) -> JacobianColumn<'_, F> {
        JacobianColumn(&self.matrix[index * JACOBIAN_ROWS..(index + 1) * JACOBIAN_ROWS])
    }

    pub fn column_mut(&mut self, index: usize) -> &mut [F] {
        &mut self.matrix[index * JACOBIAN_ROWS..(index + 1) * JACOBIAN_ROWS]
    }
}

/// An articulated body that can compute forward kinematics and Jacobians for arbitrary joint
/// configurations.
///
/// The order of [BodyModel::joint_names] defines the layout of every joint vector.
pub trait BodyModel<F: Float> {
    /// All joints in canonical order
    fn joint_names(&self) -> &[String];

    /// `(lower, upper)` position limits aligned with [BodyModel::joint_names]
    fn joint_limits(&self) -> Vec<(F, F)>;

    /// The configuration the body is currently in. Used to seed the optimization.
    fn current_configuration(&self) -> Vec<F>;

    /// World poses of the requested `links` for the joint vector `joints`
    fn forward_kinematics(&self, joints: &[F], links: &[&str]) -> Result<HashMap<String, Pose<F>>>;

    /// Spatial Jacobian of `link` with respect to the joints of `group` (in the order returned by
    /// [BodyModel::group_joints])
    fn jacobian(&self, group: &str, joints: &[F], link: &str) -> Result<Jacobian<F>>;

    /// Name of the joint group that moves `link`
    fn controlling_group(&self, link: &str) -> Result<String>;

    /// Ordered joint names of a group
    fn group_joints(&self, group: &str) -> Result<Vec<String>>;
}
