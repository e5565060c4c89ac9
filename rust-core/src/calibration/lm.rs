//! Levenberg–Marquardt nonlinear least squares
//!
//! Minimizes Σ r_i(p)² for a residual function supplied as a closure, with a
//! forward-difference Jacobian and Marquardt's diagonal scaling so that
//! parameters of very different magnitude (a period in seconds next to a
//! damping ratio) are stepped sensibly.

use crate::error::{CalibrationError, Result};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// Largest damping factor tried before giving up on a step
const MAX_LAMBDA: f64 = 1e16;

/// Smallest singular value ratio of the Jacobian still considered full rank
const JACOBIAN_RCOND: f64 = 1e-12;

/// Solver limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    /// Maximum accepted-step iterations
    pub max_iterations: usize,

    /// Relative tolerance on cost reduction and on step size
    pub tolerance: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1.49e-8,
        }
    }
}

/// Converged solution
#[derive(Debug, Clone, PartialEq)]
pub struct LmSolution {
    pub params: Vec<f64>,

    /// Final sum of squared residuals
    pub cost: f64,

    pub iterations: usize,
}

fn cost_of(r: &DVector<f64>) -> f64 {
    r.norm_squared()
}

fn evaluate<F>(residuals: &F, p: &[f64]) -> Option<DVector<f64>>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let r = DVector::from_vec(residuals(p));
    r.iter().all(|v| v.is_finite()).then_some(r)
}

/// Forward-difference Jacobian (m × n)
fn jacobian<F>(residuals: &F, p: &[f64], r0: &DVector<f64>) -> Result<DMatrix<f64>>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let eps = f64::EPSILON.sqrt();
    let mut jac = DMatrix::<f64>::zeros(r0.len(), p.len());
    let mut shifted = p.to_vec();

    for j in 0..p.len() {
        let h = if p[j] == 0.0 { eps } else { eps * p[j].abs() };
        shifted[j] = p[j] + h;
        let r = evaluate(residuals, &shifted).ok_or_else(|| {
            CalibrationError::numerical("residuals not finite while differentiating")
        })?;
        shifted[j] = p[j];
        jac.set_column(j, &((r - r0) / h));
    }

    Ok(jac)
}

/// Minimize the squared norm of `residuals` starting from `initial`
///
/// Fails with a numerical error when the Jacobian is rank deficient, when no
/// step from the seed reduces the cost, or when the iteration limit is hit.
pub fn levenberg_marquardt<F>(residuals: F, initial: &[f64], options: &LmOptions) -> Result<LmSolution>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = initial.len();
    let mut p = initial.to_vec();
    let mut r = evaluate(&residuals, &p)
        .ok_or_else(|| CalibrationError::numerical("residuals not finite at the initial guess"))?;

    if r.len() < n {
        return Err(CalibrationError::numerical(format!(
            "{} residuals cannot determine {} parameters",
            r.len(),
            n
        )));
    }

    let mut cost = cost_of(&r);
    let mut lambda = 1e-3;
    let mut accepted = 0;

    for iteration in 0..options.max_iterations {
        if cost == 0.0 {
            return Ok(LmSolution {
                params: p,
                cost,
                iterations: iteration,
            });
        }

        let jac = jacobian(&residuals, &p, &r)?;
        let sv = jac.clone().svd(false, false).singular_values;
        let smax = sv.max();
        let smin = sv.min();
        if smax.is_nan() || smax <= 0.0 || smin < JACOBIAN_RCOND * smax {
            return Err(CalibrationError::numerical(format!(
                "singular Jacobian (singular values {:e} .. {:e})",
                smin, smax
            )));
        }

        let jtj = jac.transpose() * &jac;
        let gradient = jac.transpose() * &r;

        // Residual orthogonal to every Jacobian column: already at a minimum
        let r_norm = r.norm();
        let orthogonality = jac
            .column_iter()
            .zip(gradient.iter())
            .map(|(col, g)| g.abs() / (col.norm() * r_norm))
            .fold(0.0, f64::max);
        if orthogonality <= options.tolerance {
            debug!(iterations = iteration, cost, "levenberg-marquardt at a stationary point");
            return Ok(LmSolution {
                params: p,
                cost,
                iterations: iteration,
            });
        }

        loop {
            let mut damped = jtj.clone();
            for k in 0..n {
                damped[(k, k)] += lambda * jtj[(k, k)];
            }

            let step = damped.cholesky().map(|c| c.solve(&(-&gradient)));
            let candidate = step.and_then(|delta| {
                let trial: Vec<f64> = p.iter().zip(delta.iter()).map(|(a, d)| a + d).collect();
                evaluate(&residuals, &trial).map(|rt| (delta, trial, rt))
            });

            match candidate {
                Some((delta, trial, rt)) if cost_of(&rt) < cost => {
                    let new_cost = cost_of(&rt);
                    let reduction = cost - new_cost;
                    let p_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();

                    p = trial;
                    r = rt;
                    cost = new_cost;
                    lambda = (lambda / 10.0).max(1e-12);
                    accepted += 1;

                    if reduction <= options.tolerance * (cost + reduction)
                        || delta.norm() <= options.tolerance * (p_norm + options.tolerance)
                    {
                        debug!(iterations = iteration + 1, cost, "levenberg-marquardt converged");
                        return Ok(LmSolution {
                            params: p,
                            cost,
                            iterations: iteration + 1,
                        });
                    }
                    break;
                }
                _ => {
                    lambda *= 10.0;
                    if lambda > MAX_LAMBDA {
                        // No descent left: a minimum to working precision,
                        // unless we never moved from the seed
                        if accepted == 0 {
                            return Err(CalibrationError::numerical(
                                "no step reduced the residual from the initial guess",
                            ));
                        }
                        return Ok(LmSolution {
                            params: p,
                            cost,
                            iterations: iteration + 1,
                        });
                    }
                }
            }
        }
    }

    Err(CalibrationError::numerical(format!(
        "fit did not converge within {} iterations",
        options.max_iterations
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_exponential_decay() {
        // y = 3·exp(-0.7 x)
        let xs: Vec<f64> = (0..40).map(|i| i as f64 * 0.1).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * (-0.7 * x).exp()).collect();

        let solution = levenberg_marquardt(
            |p| {
                xs.iter()
                    .zip(&ys)
                    .map(|(x, y)| p[0] * (-p[1] * x).exp() - y)
                    .collect()
            },
            &[1.0, 0.1],
            &LmOptions::default(),
        )
        .unwrap();

        assert!((solution.params[0] - 3.0).abs() < 1e-6);
        assert!((solution.params[1] - 0.7).abs() < 1e-6);
        assert!(solution.cost < 1e-12);
    }

    #[test]
    fn test_singular_jacobian_is_an_error() {
        // The second parameter has no influence on the residuals
        let result = levenberg_marquardt(
            |p| (0..10).map(|i| p[0] * i as f64 - 2.0 * i as f64).collect(),
            &[1.0, 5.0],
            &LmOptions::default(),
        );
        assert!(matches!(result, Err(CalibrationError::Numerical(_))));
    }

    #[test]
    fn test_too_few_residuals() {
        let result = levenberg_marquardt(|p| vec![p[0] + p[1]], &[1.0, 1.0], &LmOptions::default());
        assert!(matches!(result, Err(CalibrationError::Numerical(_))));
    }

    #[test]
    fn test_iteration_limit() {
        let xs: Vec<f64> = (0..40).map(|i| i as f64 * 0.1).collect();
        let result = levenberg_marquardt(
            |p| xs.iter().map(|x| p[0] * (-p[1] * x).exp() - (1.0 + x)).collect(),
            &[100.0, 10.0],
            &LmOptions {
                max_iterations: 1,
                tolerance: 1e-15,
            },
        );
        assert!(matches!(result, Err(CalibrationError::Numerical(_))));
    }
}
