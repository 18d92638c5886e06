use crate::error::SolveError;
use crate::solver::{
    check_dimensions, residual_norm, to_f64, JacobiPreconditioner, LinearOperator, LinearSolver, SolverReport,
};
use crate::Real;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

/// Parameters of the restarted GMRES solver.
///
/// The iteration stops successfully once `||b - A x|| <= max(rtol ||b||, atol)`, and fails
/// once the residual exceeds `dtol ||b||` or `max_iterations` is reached.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GmresSettings {
    pub max_iterations: usize,
    /// Krylov subspace dimension between restarts.
    pub restart: usize,
    pub rtol: f64,
    pub atol: f64,
    pub dtol: f64,
}

impl Default for GmresSettings {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            restart: 1000,
            rtol: 1e-8,
            atol: 1e-50,
            dtol: 1e20,
        }
    }
}

/// Restarted GMRES with right Jacobi preconditioning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gmres {
    settings: GmresSettings,
}

impl Gmres {
    pub fn new(settings: GmresSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &GmresSettings {
        &self.settings
    }

    fn report(&self, iterations: usize, residual: f64, converged: bool) -> SolverReport {
        SolverReport {
            solver: "gmres".to_string(),
            iterations,
            residual_norm: residual,
            converged,
        }
    }
}

impl<T: Real> LinearSolver<T> for Gmres {
    fn solve(&self, matrix: &CsrMatrix<T>, rhs: &DVector<T>) -> Result<(DVector<T>, SolverReport), SolveError> {
        check_dimensions(matrix, rhs)?;
        let n = rhs.len();
        let settings = &self.settings;
        let preconditioner = JacobiPreconditioner::from_csr(matrix);

        let mut x = DVector::zeros(n);
        let b_norm = rhs.norm();
        let tolerance = (T::from_subset(&settings.rtol) * b_norm).max(T::from_subset(&settings.atol));
        let divergence = T::from_subset(&settings.dtol) * b_norm;
        let restart = settings.restart.max(1);

        let mut iterations = 0;
        loop {
            let mut r = rhs.clone();
            let mut ax = DVector::zeros(n);
            matrix.apply((&mut ax).into(), (&x).into());
            r -= &ax;
            let beta = r.norm();

            if beta <= tolerance {
                debug!("GMRES converged after {} iterations, residual {:e}", iterations, to_f64(beta));
                return Ok((x, self.report(iterations, to_f64(beta), true)));
            }
            if beta > divergence || !beta.is_finite() {
                return Err(SolveError::Diverged {
                    iterations,
                    residual: to_f64(beta),
                });
            }
            if iterations >= settings.max_iterations {
                return Err(SolveError::NotConverged {
                    iterations,
                    residual: to_f64(beta),
                });
            }

            let m = restart.min(settings.max_iterations - iterations);
            let mut basis = Vec::with_capacity(m + 1);
            basis.push(r / beta);
            let mut h = DMatrix::<T>::zeros(m + 1, m);
            let mut cs = vec![T::zero(); m];
            let mut sn = vec![T::zero(); m];
            let mut g = DVector::<T>::zeros(m + 1);
            g[0] = beta;

            let mut z = DVector::zeros(n);
            let mut w = DVector::zeros(n);
            let mut k = 0;
            while k < m {
                preconditioner.apply((&mut z).into(), (&basis[k]).into());
                matrix.apply((&mut w).into(), (&z).into());

                // Modified Gram-Schmidt
                for (i, v_i) in basis.iter().enumerate() {
                    let h_ik = w.dot(v_i);
                    h[(i, k)] = h_ik;
                    w.axpy(-h_ik, v_i, T::one());
                }
                let w_norm = w.norm();
                h[(k + 1, k)] = w_norm;

                for i in 0..k {
                    let (h_ik, h_i1k) = (h[(i, k)], h[(i + 1, k)]);
                    h[(i, k)] = cs[i] * h_ik + sn[i] * h_i1k;
                    h[(i + 1, k)] = cs[i] * h_i1k - sn[i] * h_ik;
                }

                let (h_kk, h_k1k) = (h[(k, k)], h[(k + 1, k)]);
                let denominator = (h_kk * h_kk + h_k1k * h_k1k).sqrt();
                if denominator.is_zero() {
                    cs[k] = T::one();
                    sn[k] = T::zero();
                } else {
                    cs[k] = h_kk / denominator;
                    sn[k] = h_k1k / denominator;
                }
                h[(k, k)] = cs[k] * h_kk + sn[k] * h_k1k;
                h[(k + 1, k)] = T::zero();
                g[k + 1] = -sn[k] * g[k];
                g[k] = cs[k] * g[k];

                k += 1;
                iterations += 1;
                if w_norm.is_zero() || g[k].abs() <= tolerance {
                    break;
                }
                basis.push(&w / w_norm);
            }

            let y = h
                .view((0, 0), (k, k))
                .solve_upper_triangular(&g.rows(0, k))
                .ok_or(SolveError::Singular)?;
            let mut update = DVector::zeros(n);
            for (v_i, &y_i) in basis.iter().zip(y.iter()) {
                update.axpy(y_i, v_i, T::one());
            }
            preconditioner.apply((&mut z).into(), (&update).into());
            x += &z;

            let new_residual = residual_norm(matrix, &x, rhs);
            if new_residual >= beta {
                warn!(
                    "GMRES restart cycle made no progress (residual {:e} after {} iterations)",
                    to_f64(new_residual),
                    iterations
                );
            }
        }
    }
}
