//! Generator cost curves and active-power limits for economic dispatch.

use crate::units::Megawatts;
use serde::{Deserialize, Serialize};

/// Quadratic fuel-cost curve: `cost = no_load + linear*P + quadratic*P²`
/// with `P` in MW and cost in $/h.
///
/// The three coefficients are the classical `(α, β, γ)` of thermal-unit
/// input-output curves; `linear` is in $/MWh, `quadratic` in $/MW²h.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuadraticCost {
    /// No-load cost α ($/h)
    pub no_load: f64,
    /// Linear coefficient β ($/MWh)
    pub linear: f64,
    /// Quadratic coefficient γ ($/MW²h)
    pub quadratic: f64,
}

impl QuadraticCost {
    /// Create a curve from `(α, β, γ)`.
    pub const fn new(no_load: f64, linear: f64, quadratic: f64) -> Self {
        Self {
            no_load,
            linear,
            quadratic,
        }
    }

    /// Evaluate cost at given power output ($/h)
    pub fn evaluate(&self, p_mw: f64) -> f64 {
        self.no_load + self.linear * p_mw + self.quadratic * p_mw * p_mw
    }

    /// Marginal cost at given power ($/MWh, derivative of the curve)
    pub fn marginal_cost(&self, p_mw: f64) -> f64 {
        self.linear + 2.0 * self.quadratic * p_mw
    }
}

/// Active-power limits of a dispatchable generator.
///
/// The default is the unconstrained unit `[0, +∞)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenLimits {
    /// Minimum active power output
    pub pmin: Megawatts,
    /// Maximum active power output
    pub pmax: Megawatts,
}

impl Default for GenLimits {
    fn default() -> Self {
        Self {
            pmin: Megawatts(0.0),
            pmax: Megawatts(f64::INFINITY),
        }
    }
}

impl GenLimits {
    /// Set both limits (in MW)
    pub fn new(pmin_mw: f64, pmax_mw: f64) -> Self {
        Self {
            pmin: Megawatts(pmin_mw),
            pmax: Megawatts(pmax_mw),
        }
    }

    /// An unconstrained unit
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Whether `p_mw` lies inside the limits
    pub fn contains(&self, p_mw: f64) -> bool {
        p_mw >= self.pmin.value() && p_mw <= self.pmax.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_evaluate() {
        let cost = QuadraticCost::new(200.0, 7.0, 0.008);
        // 200 + 7*100 + 0.008*10000 = 980
        assert!((cost.evaluate(100.0) - 980.0).abs() < 1e-10);
    }

    #[test]
    fn test_marginal_cost() {
        let cost = QuadraticCost::new(200.0, 7.0, 0.008);
        assert!((cost.marginal_cost(0.0) - 7.0).abs() < 1e-10);
        assert!((cost.marginal_cost(100.0) - 8.6).abs() < 1e-10);
    }

    #[test]
    fn test_limits_default_unbounded() {
        let limits = GenLimits::default();
        assert_eq!(limits.pmin.value(), 0.0);
        assert!(limits.pmax.value().is_infinite());
        assert!(limits.contains(1e9));
        assert!(!limits.contains(-1.0));
    }

    #[test]
    fn test_limits_contains() {
        let limits = GenLimits::new(10.0, 85.0);
        assert!(limits.contains(10.0));
        assert!(limits.contains(85.0));
        assert!(!limits.contains(9.99));
        assert!(!limits.contains(85.01));
    }
}
