//! Bounded minimization with PANOC from the
//! [Optimization Engine](https://docs.rs/optimization_engine).
//!
//! The box given by per-variable `(lower, upper)` bounds is handed to the solver as a
//! [Rectangle]; PANOC combines projected gradient steps with L-BFGS directions and returns a point
//! inside the box. The solver works in `f64`, so joint vectors of other float types are converted
//! at this boundary. Errors raised by the [Objective] are kept and returned as they are.

use std::{cell::RefCell, fmt::Debug, time::Duration};

use itertools::izip;
use num_traits::Float;
use optimization_engine::{
    constraints::Rectangle,
    panoc::{PANOCCache, PANOCOptimizer},
    core::ExitStatus, FunctionCallResult, Optimizer, Problem, SolverError,
};
use tracing::{debug, trace};

use crate::{
    errors::{PostureError, Result},
    utils::lit,
};

/// A differentiable scalar function of a parameter vector.
pub trait Objective<F> {
    fn cost(&self, x: &[F]) -> Result<F>;
    fn gradient(&self, x: &[F]) -> Result<Vec<F>>;
}

/// Reason why [BoundedMinimizer::minimize] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The fixed-point residual dropped below the tolerance
    Converged,
    MaxIterations,
    /// The time budget ran out
    OutOfTime,
}

impl Termination {
    /// Whether the minimizer stopped because the tolerance was met (rather than a budget).
    pub fn converged(&self) -> bool {
        matches!(self, Termination::Converged)
    }
}

impl From<ExitStatus> for Termination {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Converged => Termination::Converged,
            ExitStatus::NotConvergedIterations => Termination::MaxIterations,
            ExitStatus::NotConvergedOutOfTime => Termination::OutOfTime,
        }
    }
}

/// Information about the outcome of a minimization
#[derive(Debug, Clone)]
pub struct MinimizerReport {
    pub iterations: usize,
    /// Cost at the returned point
    pub cost: f64,
    /// Norm of the fixed-point residual `x - P(x - γ∇f(x))` when the solver stopped
    pub residual: f64,
    pub solve_time: Duration,
    pub termination: Termination,
}

/// Options of the [BoundedMinimizer].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizerOptions {
    /// Tolerance on the fixed-point residual
    pub tolerance: f64,
    /// Number of curvature pairs of the L-BFGS directions
    pub memory: usize,
    pub max_iterations: usize,
    /// Wall-clock budget of a single minimization (unbounded if `None`)
    pub max_duration: Option<Duration>,
}

impl Default for MinimizerOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            memory: 10,
            max_iterations: 15000,
            max_duration: None,
        }
    }
}

impl MinimizerOptions {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_memory(mut self, memory: usize) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0) {
            return Err(PostureError::InvalidOptions(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.memory == 0 {
            return Err(PostureError::InvalidOptions("memory must be positive".into()));
        }
        if self.max_iterations == 0 {
            return Err(PostureError::InvalidOptions("max_iterations must be positive".into()));
        }
        Ok(())
    }
}

/// PANOC minimizer with box constraints.
#[derive(Debug, Clone, Default)]
pub struct BoundedMinimizer {
    options: MinimizerOptions,
}

impl BoundedMinimizer {
    /// Fails with [PostureError::InvalidOptions] for a non-positive tolerance, memory or iteration
    /// budget.
    pub fn new(options: MinimizerOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &MinimizerOptions {
        &self.options
    }

    /// Minimizes `objective` starting at `seed` (projected into `bounds` first).
    ///
    /// Returns the last iterate and a report. Hitting a budget is not an error.
    pub fn minimize<F, O>(&self, objective: &O, seed: &[F], bounds: &[(F, F)]) -> Result<(Vec<F>, MinimizerReport)>
    where
        F: Float + Debug,
        O: Objective<F>,
    {
        check_bounds(seed, bounds)?;
        let lower = bounds.iter().map(|(lower, _)| to_f64(*lower)).collect::<Vec<_>>();
        let upper = bounds.iter().map(|(_, upper)| to_f64(*upper)).collect::<Vec<_>>();
        let mut u = izip!(seed, &lower, &upper)
            .map(|(x, lower, upper)| to_f64(*x).max(*lower).min(*upper))
            .collect::<Vec<_>>();

        if u.is_empty() {
            let cost = to_f64(objective.cost(&[])?);
            debug!(?cost, "Nothing to minimize");
            let report = MinimizerReport {
                iterations: 0,
                cost,
                residual: 0.0,
                solve_time: Duration::ZERO,
                termination: Termination::Converged,
            };
            return Ok((Vec::new(), report));
        }

        // The first error raised by the objective; the solver itself only sees `SolverError::Cost`
        let failure = RefCell::new(None);
        let fail = |error: PostureError| {
            failure.borrow_mut().get_or_insert(error);
            SolverError::Cost
        };

        let cost = |u: &[f64], cost: &mut f64| -> FunctionCallResult {
            *cost = to_f64(objective.cost(&from_f64(u)).map_err(fail)?);
            trace!(cost = *cost, "Cost evaluated");
            Ok(())
        };
        let gradient = |u: &[f64], gradient: &mut [f64]| -> FunctionCallResult {
            let value = objective.gradient(&from_f64(u)).map_err(fail)?;
            if value.len() != gradient.len() {
                return Err(fail(PostureError::DimensionMismatch {
                    expected: gradient.len(),
                    found: value.len(),
                }));
            }
            izip!(gradient.iter_mut(), value).for_each(|(g, v)| *g = to_f64(v));
            Ok(())
        };

        let rectangle = Rectangle::new(Some(lower.as_slice()), Some(upper.as_slice()));
        let problem = Problem::new(&rectangle, gradient, cost);
        let mut cache = PANOCCache::new(u.len(), self.options.tolerance, self.options.memory);
        let mut panoc = PANOCOptimizer::new(problem, &mut cache).with_max_iter(self.options.max_iterations);
        if let Some(duration) = self.options.max_duration {
            panoc = panoc.with_max_duration(duration);
        }

        let status = match panoc.solve(&mut u) {
            Ok(status) => status,
            Err(error) => {
                return Err(failure
                    .take()
                    .unwrap_or_else(|| PostureError::Minimizer(format!("{error:?}"))))
            }
        };

        let x = from_f64(&u);
        let report = MinimizerReport {
            iterations: status.iterations(),
            cost: to_f64(objective.cost(&x)?),
            residual: status.norm_fpr(),
            solve_time: status.solve_time(),
            termination: status.exit_status().into(),
        };
        debug!(
            termination = ?report.termination,
            iterations = report.iterations,
            cost = report.cost,
            residual = report.residual,
            "Minimization finished"
        );
        Ok((x, report))
    }
}

fn to_f64<F: Float>(value: F) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

fn from_f64<F: Float>(values: &[f64]) -> Vec<F> {
    values.iter().map(|v| lit(*v)).collect()
}

fn check_bounds<F: Float>(seed: &[F], bounds: &[(F, F)]) -> Result<()> {
    if seed.len() != bounds.len() {
        return Err(PostureError::DimensionMismatch {
            expected: seed.len(),
            found: bounds.len(),
        });
    }
    match bounds.iter().enumerate().find(|(_, (lower, upper))| !(lower <= upper)) {
        Some((index, (lower, upper))) => Err(PostureError::InvalidBounds {
            joint: format!("#{index}"),
            lower: to_f64(*lower),
            upper: to_f64(*upper),
        }),
        None => Ok(()),
    }
}
