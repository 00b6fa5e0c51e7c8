//! Bounded Nelder-Mead simplex minimizer
//!
//! Derivative-free, so the objective may be any finite function of the
//! unconstrained parameter vector. Non-finite objective values are treated
//! as +∞ and therefore never selected.

use crate::error::ModelFitError;

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Simplex collapse below which the search has stalled
const MIN_DIAMETER: f64 = 1e-12;

/// Minimizer settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMead {
    /// Iteration bound
    pub max_iterations: usize,
    /// Convergence when `f_worst - f_best <= tolerance * (1 + |f_best|)`
    pub tolerance: f64,
    /// Edge length of the initial simplex
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 2_000,
            tolerance: 1e-10,
            initial_step: 0.5,
        }
    }
}

/// Located minimum
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// Argument
    pub x: Vec<f64>,
    /// Objective value at `x`
    pub value: f64,
    /// Iterations spent
    pub iterations: usize,
}

impl NelderMead {
    /// Minimize `objective` starting from `x0`
    ///
    /// # Errors
    ///
    /// Returns [`ModelFitError::NotConverged`] when `max_iterations` pass
    /// without meeting the tolerance
    pub fn minimize<F>(&self, objective: F, x0: &[f64]) -> Result<Minimum, ModelFitError>
    where
        F: Fn(&[f64]) -> f64,
    {
        let eval = |x: &[f64]| {
            let v = objective(x);
            if v.is_finite() {
                v
            } else {
                f64::INFINITY
            }
        };

        let n = x0.len();
        if n == 0 {
            return Ok(Minimum {
                x: Vec::new(),
                value: eval(x0),
                iterations: 0,
            });
        }

        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        simplex.push((x0.to_vec(), eval(x0)));
        for i in 0..n {
            let mut vertex = x0.to_vec();
            vertex[i] += self.initial_step;
            let value = eval(&vertex);
            simplex.push((vertex, value));
        }

        for iteration in 0..self.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            if self.converged(&simplex) {
                return Ok(best(simplex, iteration));
            }

            let centroid = centroid(&simplex[..n]);
            let worst = simplex[n].1;
            let second_worst = simplex[n - 1].1;
            let best_value = simplex[0].1;

            let reflected = along(&centroid, &simplex[n].0, -REFLECT);
            let f_reflected = eval(&reflected);

            if f_reflected < best_value {
                let expanded = along(&centroid, &simplex[n].0, -REFLECT * EXPAND);
                let f_expanded = eval(&expanded);
                simplex[n] = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
                continue;
            }

            if f_reflected < second_worst {
                simplex[n] = (reflected, f_reflected);
                continue;
            }

            let (contracted, accept_below) = if f_reflected < worst {
                (along(&centroid, &simplex[n].0, -REFLECT * CONTRACT), f_reflected)
            } else {
                (along(&centroid, &simplex[n].0, CONTRACT), worst)
            };
            let f_contracted = eval(&contracted);
            if f_contracted < accept_below {
                simplex[n] = (contracted, f_contracted);
                continue;
            }

            let anchor = simplex[0].0.clone();
            for vertex in simplex.iter_mut().skip(1) {
                for (x, a) in vertex.0.iter_mut().zip(&anchor) {
                    *x = a + SHRINK * (*x - a);
                }
                vertex.1 = eval(&vertex.0);
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        if self.converged(&simplex) {
            Ok(best(simplex, self.max_iterations))
        } else {
            Err(ModelFitError::NotConverged {
                iterations: self.max_iterations,
            })
        }
    }

    /// Expects `simplex` sorted by value
    fn converged(&self, simplex: &[(Vec<f64>, f64)]) -> bool {
        let f_best = simplex[0].1;
        let f_worst = simplex[simplex.len() - 1].1;
        if f_best.is_finite() && f_worst - f_best <= self.tolerance * (1.0 + f_best.abs()) {
            return true;
        }
        let origin = &simplex[0].0;
        let diameter = simplex[1..]
            .iter()
            .flat_map(|(x, _)| x.iter().zip(origin).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f64, f64::max);
        f_best.is_finite() && diameter < MIN_DIAMETER
    }
}

fn best(mut simplex: Vec<(Vec<f64>, f64)>, iterations: usize) -> Minimum {
    let (x, value) = simplex.swap_remove(0);
    Minimum {
        x,
        value,
        iterations,
    }
}

#[allow(clippy::cast_precision_loss)]
fn centroid(vertices: &[(Vec<f64>, f64)]) -> Vec<f64> {
    let dim = vertices[0].0.len();
    let mut c = vec![0.0; dim];
    for (x, _) in vertices {
        for (ci, xi) in c.iter_mut().zip(x) {
            *ci += xi;
        }
    }
    let count = vertices.len() as f64;
    c.iter_mut().for_each(|ci| *ci /= count);
    c
}

/// `centroid + t * (point - centroid)`
fn along(centroid: &[f64], point: &[f64], t: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(point)
        .map(|(c, p)| c + t * (p - c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_bowl() {
        let nm = NelderMead::default();
        let min = nm
            .minimize(|x| (x[0] - 1.5).powi(2) + 2.0 * (x[1] + 0.5).powi(2), &[0.0, 0.0])
            .unwrap();
        assert!((min.x[0] - 1.5).abs() < 1e-4);
        assert!((min.x[1] + 0.5).abs() < 1e-4);
        assert!(min.value < 1e-8);
    }

    #[test]
    fn test_rosenbrock() {
        let nm = NelderMead {
            max_iterations: 5_000,
            ..NelderMead::default()
        };
        let min = nm
            .minimize(
                |x| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2),
                &[-1.2, 1.0],
            )
            .unwrap();
        assert!((min.x[0] - 1.0).abs() < 1e-3);
        assert!((min.x[1] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_dimensions() {
        let min = NelderMead::default().minimize(|_| 3.0, &[]).unwrap();
        assert_eq!(min.iterations, 0);
        assert!((min.value - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_iteration_bound() {
        let nm = NelderMead {
            max_iterations: 2,
            ..NelderMead::default()
        };
        let err = nm
            .minimize(|x| (x[0] - 100.0).powi(2) + (x[1] - 50.0).powi(2), &[0.0, 0.0])
            .unwrap_err();
        assert_eq!(err, ModelFitError::NotConverged { iterations: 2 });
    }

    #[test]
    fn test_non_finite_objective_avoided() {
        let min = NelderMead::default()
            .minimize(
                |x| if x[0] < 0.0 { f64::NAN } else { (x[0] - 2.0).powi(2) },
                &[1.0],
            )
            .unwrap();
        assert!((min.x[0] - 2.0).abs() < 1e-4);
    }
}
