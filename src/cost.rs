//! The scalar IK objective and its analytic gradient over the full joint vector.
//!
//! The cost is a weighted sum of a pose term (one [DistanceWeights::cost] per desired link pose)
//! and a fixed-joint term (squared deviation of pinned joints from their targets).

use std::{collections::HashMap, fmt::Debug};

use itertools::Itertools;
use num_traits::Float;
use tracing::debug;

use crate::{
    body::BodyModel,
    errors::{PostureError, Result},
    DistanceWeights, Pose,
};

/// Desired world poses keyed by link name
pub type DesiredPoses<F> = HashMap<String, Pose<F>>;

/// Target positions keyed by joint name
pub type FixedJoints<F> = HashMap<String, F>;

/// Weights of the terms in the cost function. Fixed for the lifetime of a [CostModel].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostWeights<F> {
    /// Weight of the summed pose distances
    pub pose: F,
    /// Weight of the summed squared fixed-joint deviations
    pub fixed_joints: F,
    /// Weights within each pose distance
    pub distance: DistanceWeights<F>,
}

impl<F: Float> Default for CostWeights<F> {
    fn default() -> Self {
        Self {
            pose: F::one(),
            fixed_joints: F::one(),
            distance: DistanceWeights::default(),
        }
    }
}

impl<F: Float> CostWeights<F> {
    pub fn new(pose: F, fixed_joints: F, distance: DistanceWeights<F>) -> Self {
        Self {
            pose,
            fixed_joints,
            distance,
        }
    }
}

#[derive(Debug, Clone)]
struct PoseTarget<F> {
    link: String,
    group: String,
    desired: Pose<F>,
    /// Joint vector index of every column of the group's Jacobian
    columns: Vec<usize>,
}

#[derive(Debug, Clone)]
struct FixedTarget<F> {
    index: usize,
    value: F,
}

/// Desired poses and fixed joints with every name resolved against the body model.
///
/// Created by [CostModel::resolve]. Iteration order is sorted by name so that evaluations are
/// reproducible.
#[derive(Debug, Clone)]
pub struct Targets<F> {
    poses: Vec<PoseTarget<F>>,
    fixed: Vec<FixedTarget<F>>,
}

impl<F> Targets<F> {
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty() && self.fixed.is_empty()
    }

    pub fn pose_count(&self) -> usize {
        self.poses.len()
    }

    pub fn fixed_count(&self) -> usize {
        self.fixed.len()
    }

    fn links(&self) -> Vec<&str> {
        self.poses.iter().map(|t| t.link.as_str()).collect()
    }
}

/// Cost function and gradient for a body model.
///
/// Holds a non-owning reference to the body and a name-to-index map of its joints built once at
/// construction.
pub struct CostModel<'a, F, B>
where
    F: Float,
    B: BodyModel<F>,
{
    body: &'a B,
    weights: CostWeights<F>,
    joint_index: HashMap<String, usize>,
}

impl<'a, F, B> CostModel<'a, F, B>
where
    F: Float + Debug,
    B: BodyModel<F>,
{
    pub fn new(body: &'a B, weights: CostWeights<F>) -> Result<Self> {
        let mut joint_index = HashMap::with_capacity(body.joint_names().len());
        for (index, name) in body.joint_names().iter().enumerate() {
            if joint_index.insert(name.clone(), index).is_some() {
                return Err(PostureError::DuplicateName(name.clone()));
            }
        }
        debug!(joints = joint_index.len(), "Cost model created");
        Ok(Self {
            body,
            weights,
            joint_index,
        })
    }

    pub fn body(&self) -> &'a B {
        self.body
    }

    pub fn weights(&self) -> &CostWeights<F> {
        &self.weights
    }

    /// Number of entries in a joint vector
    pub fn joint_count(&self) -> usize {
        self.joint_index.len()
    }

    /// Position of a joint in the joint vector
    pub fn joint_index(&self, name: &str) -> Result<usize> {
        self.joint_index
            .get(name)
            .copied()
            .ok_or_else(|| PostureError::UnknownJoint(name.to_string()))
    }

    /// Resolves all link and joint names. Fails on the first name the body model does not know.
    pub fn resolve(&self, desired: &DesiredPoses<F>, fixed: &FixedJoints<F>) -> Result<Targets<F>> {
        let poses = desired
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .map(|(link, pose)| {
                let group = self.body.controlling_group(link)?;
                let columns = self
                    .body
                    .group_joints(&group)?
                    .iter()
                    .map(|joint| self.joint_index(joint))
                    .collect::<Result<Vec<_>>>()?;
                Ok(PoseTarget {
                    link: link.clone(),
                    group,
                    desired: *pose,
                    columns,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let fixed = fixed
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .map(|(joint, value)| {
                Ok(FixedTarget {
                    index: self.joint_index(joint)?,
                    value: *value,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(poses = poses.len(), fixed = fixed.len(), "Targets resolved");
        Ok(Targets { poses, fixed })
    }

    /// Cost for unresolved targets. See [CostModel::evaluate_targets].
    pub fn evaluate(&self, joints: &[F], desired: &DesiredPoses<F>, fixed: &FixedJoints<F>) -> Result<F> {
        self.evaluate_targets(joints, &self.resolve(desired, fixed)?)
    }

    /// Gradient for unresolved targets. See [CostModel::gradient_targets].
    pub fn gradient(&self, joints: &[F], desired: &DesiredPoses<F>, fixed: &FixedJoints<F>) -> Result<Vec<F>> {
        self.gradient_targets(joints, &self.resolve(desired, fixed)?)
    }

    /// Weighted cost at `joints`. Performs one forward kinematics query if there are pose targets.
    pub fn evaluate_targets(&self, joints: &[F], targets: &Targets<F>) -> Result<F> {
        self.check_dimension(joints)?;
        let mut cost = F::zero();

        if !targets.poses.is_empty() {
            let poses = self.body.forward_kinematics(joints, &targets.links())?;
            let mut pose_cost = F::zero();
            for target in &targets.poses {
                let achieved = achieved_pose(&poses, &target.link)?;
                pose_cost = pose_cost + self.weights.distance.cost(achieved, &target.desired);
            }
            cost = cost + self.weights.pose * pose_cost;
        }

        if !targets.fixed.is_empty() {
            let fixed_cost = targets
                .fixed
                .iter()
                .map(|t| (joints[t.index] - t.value) * (joints[t.index] - t.value))
                .fold(F::zero(), |acc, x| acc + x);
            cost = cost + self.weights.fixed_joints * fixed_cost;
        }

        Ok(cost)
    }

    /// Gradient of [CostModel::evaluate_targets] with respect to every joint.
    ///
    /// Performs one forward kinematics query and one Jacobian query per desired link. Joints
    /// touched by no target have a zero entry.
    pub fn gradient_targets(&self, joints: &[F], targets: &Targets<F>) -> Result<Vec<F>> {
        self.check_dimension(joints)?;
        let mut gradient = vec![F::zero(); joints.len()];

        if !targets.poses.is_empty() {
            let poses = self.body.forward_kinematics(joints, &targets.links())?;
            for target in &targets.poses {
                let achieved = achieved_pose(&poses, &target.link)?;
                let jacobian = self.body.jacobian(&target.group, joints, &target.link)?;
                if jacobian.cols() != target.columns.len() {
                    return Err(PostureError::DimensionMismatch {
                        expected: target.columns.len(),
                        found: jacobian.cols(),
                    });
                }
                self.weights.distance.accumulate_gradient(
                    achieved,
                    &target.desired,
                    &jacobian,
                    &target.columns,
                    self.weights.pose,
                    &mut gradient,
                );
            }
        }

        let two = F::one() + F::one();
        for target in &targets.fixed {
            gradient[target.index] =
                gradient[target.index] + self.weights.fixed_joints * two * (joints[target.index] - target.value);
        }

        Ok(gradient)
    }

    fn check_dimension(&self, joints: &[F]) -> Result<()> {
        if joints.len() != self.joint_count() {
            return Err(PostureError::DimensionMismatch {
                expected: self.joint_count(),
                found: joints.len(),
            });
        }
        Ok(())
    }
}

fn achieved_pose<'p, F>(poses: &'p HashMap<String, Pose<F>>, link: &str) -> Result<&'p Pose<F>> {
    poses.get(link).ok_or_else(|| PostureError::UnknownLink(link.to_string()))
}
