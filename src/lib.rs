//! ## About
//!
//! This crate computes inverse kinematics for articulated bodies (humans, robots, characters) as a
//! bounded nonlinear least-squares problem: find the joint configuration that brings a set of links
//! to desired poses while keeping selected joints close to given values.
//!
//! Forward kinematics and Jacobians are delegated to an implementor of [BodyModel]. The crate
//! provides the cost function with its analytic gradient ([CostModel]), a bounded minimizer running
//! PANOC inside the joint limits ([BoundedMinimizer]), and the driver tying them together
//! ([InverseKinematics]). With the `nalgebra` feature (default), [chain::KinematicBody] is a
//! ready-to-use tree of revolute joints.
//!
//! See the [InverseKinematics] struct to get started.
//!
//! ## Conventions
//! * Quaternions are stored scalar last, `(x, y, z, w)` (see [scalar_first_to_last]).
//! * Jacobians are 6xn, three linear rows followed by three angular rows, with angular velocities
//!   expressed in the world frame.
//! * Joint vectors follow the order of [BodyModel::joint_names].
//!
//! ## Reading list
//!
//! * [Lecture on Inverse Kinematics](https://cseweb.ucsd.edu/classes/wi17/cse169-a/sessions.html)
//! * [PANOC: a fast Newton-type method for nonconvex optimization](https://arxiv.org/abs/1709.06487)
//! * [Optimization Engine](https://alphaville.github.io/optimization-engine/)

pub mod body;
pub mod cost;
pub mod errors;
pub mod inverse;
pub mod minimizer;
pub mod pose;
pub mod quaternion;
mod utils;

#[cfg(feature = "nalgebra")]
pub mod chain;

#[cfg(test)]
mod dummy;

pub use body::{BodyModel, Jacobian, JacobianColumn};
pub use cost::{CostModel, CostWeights, DesiredPoses, FixedJoints, Targets};
pub use errors::PostureError;
pub use inverse::{InverseKinematics, Solution};
pub use minimizer::{BoundedMinimizer, MinimizerOptions, MinimizerReport, Objective, Termination};
pub use pose::{DistanceWeights, Pose};
pub use quaternion::{quaternion_rate, scalar_first_to_last};
