use boardcal_core::Real;

/// Robust loss kernels for iteratively re-weighted least squares (IRLS).
#[derive(Debug, Clone, Copy, Default)]
pub enum RobustKernel {
    /// No robustness, pure L2 (quadratic).
    #[default]
    None,
    /// Huber loss with a given threshold.
    Huber { delta: Real },
    /// Cauchy loss with a scale parameter.
    Cauchy { c: Real },
}

impl RobustKernel {
    /// Return the robust loss `rho(r^2)` and the IRLS weight `w(r)` for a squared residual.
    ///
    /// This is designed for the classic IRLS procedure:
    /// 1. evaluate residuals `r_i` for the current parameters,
    /// 2. compute weights `w_i` using this method,
    /// 3. scale both residuals and Jacobian rows by `sqrt(w_i)` before solving the linearised system.
    pub fn rho_and_weight(self, r2: Real) -> (Real, Real) {
        match self {
            RobustKernel::None => {
                // Standard least squares: rho = r^2, w = 1
                (r2, 1.0)
            }
            RobustKernel::Huber { delta } => {
                let r = r2.sqrt();
                if r <= delta {
                    // Quadratic region
                    (r2, 1.0)
                } else {
                    // Linear region
                    let loss = 2.0 * delta * r - delta * delta;
                    let w = delta / r;
                    (loss, w)
                }
            }
            RobustKernel::Cauchy { c } => {
                let t = r2 / (c * c);
                let loss = c * c * (1.0 + t).ln();
                // w = derivative wrt r divided by r => w = 1 / (1 + t)
                let w = 1.0 / (1.0 + t);
                (loss, w)
            }
        }
    }
}
