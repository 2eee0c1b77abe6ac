//! The inverse kinematics driver.
//!
//! A solve is a single shot: it seeds from the body's current configuration, resolves all target
//! names (failing early on unknown links or joints), and hands the [CostModel] to a
//! [BoundedMinimizer] constrained by the body's joint limits. Nothing is carried over between
//! calls.

use std::fmt::Debug;

use itertools::izip;
use num_traits::Float;
use tracing::{debug, info};
use tracing_attributes::instrument;

use crate::{
    body::BodyModel,
    cost::{CostModel, CostWeights, DesiredPoses, FixedJoints, Targets},
    errors::{PostureError, Result},
    minimizer::{BoundedMinimizer, MinimizerOptions, MinimizerReport, Objective},
};

/// The joint vector found by [InverseKinematics::solve] and the minimizer's account of how it got
/// there. A poor local minimum is not an error; inspect [MinimizerReport::termination] if needed.
#[derive(Debug, Clone)]
pub struct Solution<F> {
    pub joints: Vec<F>,
    pub report: MinimizerReport,
}

/// Adapts a cost model and a set of resolved targets to the minimizer's [Objective].
struct TargetObjective<'m, 'a, F, B>
where
    F: Float,
    B: BodyModel<F>,
{
    model: &'m CostModel<'a, F, B>,
    targets: &'m Targets<F>,
}

impl<F, B> Objective<F> for TargetObjective<'_, '_, F, B>
where
    F: Float + Debug,
    B: BodyModel<F>,
{
    fn cost(&self, x: &[F]) -> Result<F> {
        self.model.evaluate_targets(x, self.targets)
    }

    fn gradient(&self, x: &[F]) -> Result<Vec<F>> {
        self.model.gradient_targets(x, self.targets)
    }
}

/// Optimization-based inverse kinematics on a [BodyModel].
pub struct InverseKinematics<'a, F, B>
where
    F: Float,
    B: BodyModel<F>,
{
    model: CostModel<'a, F, B>,
    minimizer: BoundedMinimizer,
    limits: Vec<(F, F)>,
}

impl<'a, F, B> InverseKinematics<'a, F, B>
where
    F: Float + Debug,
    B: BodyModel<F>,
{
    /// Builds the joint lookup and validates the body's joint limits and the minimizer options.
    pub fn new(body: &'a B, weights: CostWeights<F>, options: MinimizerOptions) -> Result<Self> {
        let model = CostModel::new(body, weights)?;
        let limits = body.joint_limits();
        if limits.len() != model.joint_count() {
            return Err(PostureError::DimensionMismatch {
                expected: model.joint_count(),
                found: limits.len(),
            });
        }
        if let Some((name, (lower, upper))) =
            izip!(body.joint_names(), &limits).find(|(_, (lower, upper))| !(lower <= upper))
        {
            return Err(PostureError::InvalidBounds {
                joint: name.clone(),
                lower: lower.to_f64().unwrap_or(f64::NAN),
                upper: upper.to_f64().unwrap_or(f64::NAN),
            });
        }
        Ok(Self {
            model,
            minimizer: BoundedMinimizer::new(options)?,
            limits,
        })
    }

    /// Default weights and minimizer options
    pub fn with_defaults(body: &'a B) -> Result<Self> {
        Self::new(body, CostWeights::default(), MinimizerOptions::default())
    }

    pub fn cost_model(&self) -> &CostModel<'a, F, B> {
        &self.model
    }

    pub fn limits(&self) -> &[(F, F)] {
        &self.limits
    }

    /// Joint vector that brings the links in `desired` to their poses while keeping the joints in
    /// `fixed` close to their values.
    pub fn compute_ik(&self, desired: &DesiredPoses<F>, fixed: &FixedJoints<F>) -> Result<Vec<F>> {
        self.solve(desired, fixed).map(|solution| solution.joints)
    }

    /// Like [InverseKinematics::compute_ik] but also returns the minimizer report.
    #[instrument(skip_all, fields(poses = desired.len(), fixed = fixed.len()))]
    pub fn solve(&self, desired: &DesiredPoses<F>, fixed: &FixedJoints<F>) -> Result<Solution<F>> {
        let targets = self.model.resolve(desired, fixed)?;

        let seed = self.model.body().current_configuration();
        if seed.len() != self.model.joint_count() {
            return Err(PostureError::DimensionMismatch {
                expected: self.model.joint_count(),
                found: seed.len(),
            });
        }

        if targets.is_empty() {
            debug!("No targets, returning the current configuration");
        }

        let objective = TargetObjective {
            model: &self.model,
            targets: &targets,
        };
        let (joints, report) = self.minimizer.minimize(&objective, &seed, &self.limits)?;

        info!(
            termination = ?report.termination,
            iterations = report.iterations,
            cost = report.cost,
            "Inverse kinematics solved"
        );
        Ok(Solution { joints, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dummy::DummyBody, minimizer::Termination, DistanceWeights, Pose};
    use approx::assert_abs_diff_eq;

    #[test_log::test]
    fn test_fixed_joint_at_seed() {
        let body = DummyBody::new(&[0.4, -0.8, 0.2]);
        let ik = InverseKinematics::with_defaults(&body).unwrap();
        let fixed = FixedJoints::from([("elbow".to_string(), -0.8)]);

        let solution = ik.solve(&DesiredPoses::new(), &fixed).unwrap();
        assert_eq!(solution.joints, vec![0.4, -0.8, 0.2]);
        assert_eq!(solution.report.iterations, 0);
        assert_eq!(solution.report.termination, Termination::Converged);
    }

    #[test]
    fn test_fixed_joint_moves() {
        let body = DummyBody::new(&[0.4, -0.8, 0.2]);
        let ik = InverseKinematics::with_defaults(&body).unwrap();
        let fixed = FixedJoints::from([("elbow".to_string(), 1.0), ("neck".to_string(), 5.0)]);

        let joints = ik.compute_ik(&DesiredPoses::new(), &fixed).unwrap();
        assert_abs_diff_eq!(joints[0], 0.4);
        assert_abs_diff_eq!(joints[1], 1.0, epsilon = 1e-4);
        // clamped by the joint limit
        assert_abs_diff_eq!(joints[2], 1.0);
    }

    #[test_log::test]
    fn test_target_at_current_pose() {
        let seed = [0.7, 1.1, -0.3];
        let body = DummyBody::new(&seed);
        let poses = body.forward_kinematics(&seed, &["hand", "head"]).unwrap();
        let ik = InverseKinematics::with_defaults(&body).unwrap();

        let solution = ik.solve(&poses, &FixedJoints::new()).unwrap();
        assert!(solution.report.iterations <= 2, "{:?}", solution.report);
        assert!(solution.report.cost < 1e-12);
        for (solved, seeded) in solution.joints.iter().zip(seed) {
            assert_abs_diff_eq!(*solved, seeded, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_reach_target() {
        let body = DummyBody::new(&[1.0, -0.5, 0.2]);
        let goal = [1.2, -0.9, 0.6];
        let desired = body.forward_kinematics(&goal, &["hand", "head"]).unwrap();
        let weights = CostWeights::new(1.0, 1.0, DistanceWeights::new(10.0, 1.0));
        let ik = InverseKinematics::new(&body, weights, MinimizerOptions::default()).unwrap();

        let solution = ik.solve(&desired, &FixedJoints::new()).unwrap();
        assert!(solution.report.cost < 1e-7, "{:?}", solution.report);
        let reached = body.forward_kinematics(&solution.joints, &["hand"]).unwrap();
        for (a, d) in reached["hand"].position.iter().zip(desired["hand"].position) {
            assert_abs_diff_eq!(*a, d, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_within_limits() {
        let body = DummyBody::new(&[0.0, 0.3, 0.0]);
        let ik = InverseKinematics::with_defaults(&body).unwrap();
        // out of reach, pulls the arm towards its limits
        let desired = DesiredPoses::from([("hand".to_string(), Pose::from_position([5.0, 0.0, 0.0]))]);
        let fixed = FixedJoints::from([("neck".to_string(), -4.0)]);

        let joints = ik.compute_ik(&desired, &fixed).unwrap();
        for (joint, (lower, upper)) in joints.iter().zip(ik.limits()) {
            assert!(lower <= joint && joint <= upper);
        }
        assert_eq!(joints[2], -1.0);
    }

    #[test]
    fn test_unknown_link_before_optimization() {
        let body = DummyBody::new(&[0.0; 3]);
        let ik = InverseKinematics::with_defaults(&body).unwrap();
        let desired = DesiredPoses::from([
            ("hand".to_string(), Pose::from_position([0.1, 0.1, 0.0])),
            ("tail".to_string(), Pose::from_position([0.0, 0.0, 0.0])),
        ]);

        let result = ik.compute_ik(&desired, &FixedJoints::new());
        assert_eq!(result.unwrap_err(), PostureError::UnknownLink("tail".into()));
        assert_eq!(body.calls(), (0, 0));
    }

    #[test]
    fn test_invalid_limits() {
        let mut body = DummyBody::new(&[0.0; 3]);
        body.limits[1] = (1.0, -1.0);
        let result = InverseKinematics::with_defaults(&body);
        assert!(matches!(result, Err(PostureError::InvalidBounds { ref joint, .. }) if joint == "elbow"));
    }

    #[test]
    fn test_invalid_options() {
        let body = DummyBody::new(&[0.0; 3]);
        let options = MinimizerOptions::default().with_tolerance(-1.0);
        let result = InverseKinematics::new(&body, CostWeights::default(), options);
        assert!(matches!(result, Err(PostureError::InvalidOptions(_))));
    }

    #[test]
    fn test_iteration_budget() {
        let body = DummyBody::new(&[1.0, -0.5, 0.2]);
        let desired = body.forward_kinematics(&[-1.2, 2.1, -0.6], &["hand", "head"]).unwrap();
        let options = MinimizerOptions::default().with_max_iterations(1);
        let ik = InverseKinematics::new(&body, CostWeights::default(), options).unwrap();

        let solution = ik.solve(&desired, &FixedJoints::new()).unwrap();
        assert_eq!(solution.report.termination, Termination::MaxIterations);
        for (joint, (lower, upper)) in solution.joints.iter().zip(ik.limits()) {
            assert!(lower <= joint && joint <= upper);
        }
    }

    #[test]
    fn test_stateless() {
        let body = DummyBody::new(&[0.2, 0.2, 0.2]);
        let ik = InverseKinematics::with_defaults(&body).unwrap();
        let fixed = FixedJoints::from([("shoulder".to_string(), 1.0)]);

        let first = ik.compute_ik(&DesiredPoses::new(), &fixed).unwrap();
        let second = ik.compute_ik(&DesiredPoses::new(), &fixed).unwrap();
        assert_eq!(first, second);
    }
}
