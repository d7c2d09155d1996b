//! Economic dispatch by lambda iteration with the B-coefficient loss model.
//!
//! Minimizes total fuel cost `Σ (αₖ + βₖPₖ + γₖPₖ²)` subject to the power
//! balance `Σ Pₖ = Pdemand + PL(P)` and per-unit limits `Pmin ≤ Pₖ ≤ Pmax`,
//! where `PL` is the quadratic loss formula of
//! [`LossCoefficients`](crate::loss::LossCoefficients).
//!
//! The method is the classical nested iteration: for a trial incremental
//! cost `λ`, the first-order conditions are a *linear* system in the
//! generation shares, solved directly; the residual of the power balance
//! then drives a Newton update of `λ` itself, falling back to a
//! multiplicative step when the sensitivity degenerates. Generators that
//! leave their limits near feasibility are clamped and removed from the
//! active set; a clamped unit stays clamped for the remainder of the call.
//!
//! The final `λ` is retained as a warm start for the next call: repeated
//! dispatches under small demand changes converge in a couple of outer
//! iterations. Use [`Dispatcher::reset_lambda`] for a cold start.
//!
//! ## Reference
//!
//! - **Wood, Wollenberg & Sheblé**: *Power Generation, Operation and
//!   Control*, 3rd ed., Wiley, ch. 3 (economic dispatch with losses).

use crate::linalg;
use crate::loss::LossCoefficients;
use serde::Serialize;
use sfd_core::{GenLimits, Megawatts, NetworkModel, QuadraticCost, SfdError, SfdResult};
use tracing::{debug, info, warn};

/// Lambda-iteration dispatcher. Holds the warm-start incremental cost.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    /// Convergence tolerance on the power-balance residual (MW)
    pub tolerance: f64,
    /// Maximum outer (lambda) iterations
    pub max_iterations: usize,
    lambda: Option<f64>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create a dispatcher with the standard settings (`1e-4` MW, 200
    /// iterations).
    pub fn new() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: 200,
            lambda: None,
        }
    }

    /// Set the power-balance tolerance (MW)
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Set the maximum outer iterations
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// The retained warm-start incremental cost, if any call has run.
    pub fn last_lambda(&self) -> Option<f64> {
        self.lambda
    }

    /// Drop the warm start; the next call re-seeds `λ` from `max(β)`.
    pub fn reset_lambda(&mut self) {
        self.lambda = None;
    }

    /// Dispatch `demand_mw` across the generators described by `costs` and
    /// `limits`, using `coeffs` as the loss model on `base_mva`.
    ///
    /// Returns immediately with [`SfdError::Infeasible`] when the demand
    /// lies outside `[Σ Pmin, Σ Pmax]`; nothing is mutated in that case.
    pub fn dispatch(
        &mut self,
        demand_mw: f64,
        costs: &[QuadraticCost],
        limits: &[GenLimits],
        coeffs: &LossCoefficients,
        base_mva: f64,
    ) -> SfdResult<DispatchSolution> {
        let g = costs.len();
        if g == 0 {
            return Err(SfdError::InvalidInput("no generators to dispatch".into()));
        }
        if limits.len() != g || coeffs.order() != g {
            return Err(SfdError::InvalidInput(format!(
                "dispatch tables disagree: {} cost rows, {} limit rows, loss order {}",
                g,
                limits.len(),
                coeffs.order()
            )));
        }

        let pmin: Vec<f64> = limits.iter().map(|l| l.pmin.value()).collect();
        let pmax: Vec<f64> = limits.iter().map(|l| l.pmax.value()).collect();

        let total_pmax: f64 = pmax.iter().sum();
        let total_pmin: f64 = pmin.iter().sum();
        if demand_mw > total_pmax {
            return Err(SfdError::Infeasible(format!(
                "demand {demand_mw:.3} MW exceeds total Pmax {total_pmax:.3} MW"
            )));
        }
        if demand_mw < total_pmin {
            return Err(SfdError::Infeasible(format!(
                "demand {demand_mw:.3} MW is below total Pmin {total_pmin:.3} MW"
            )));
        }

        // B in 1/MW units and the constant term in MW.
        let bu: Vec<Vec<f64>> = coeffs
            .b
            .iter()
            .map(|row| row.iter().map(|v| v / base_mva).collect())
            .collect();
        let b0 = &coeffs.b0;
        let b00u = coeffs.b00 * base_mva;

        let loss_mw = |pg: &[f64]| -> f64 {
            let mut quadratic = 0.0;
            for k in 0..g {
                for m in 0..g {
                    quadratic += pg[k] * bu[k][m] * pg[m];
                }
            }
            let linear: f64 = (0..g).map(|k| b0[k] * pg[k]).sum();
            quadratic + linear + b00u
        };

        let mut lambda = self.lambda.unwrap_or_else(|| {
            costs
                .iter()
                .map(|c| c.linear)
                .fold(f64::NEG_INFINITY, f64::max)
        });

        // Active-set weights: 1 = free, 0 = clamped at a limit.
        let mut active = vec![1.0_f64; g];
        let mut pg = vec![0.0_f64; g];
        let mut residual = 10.0_f64;
        let mut pl = 0.0_f64;
        let mut iterations = 0usize;

        while residual.abs() >= self.tolerance && iterations < self.max_iterations {
            iterations += 1;

            // Linear stage: first-order conditions at the trial lambda.
            // Clamped rows reduce to the identity with zero right-hand side
            // so the solve leaves their output untouched.
            let mut e = bu.clone();
            let mut rhs = vec![0.0; g];
            for k in 0..g {
                if active[k] == 1.0 {
                    e[k][k] = costs[k].quadratic / lambda + bu[k][k];
                    rhs[k] = 0.5 * (1.0 - b0[k] - costs[k].linear / lambda);
                } else {
                    for m in 0..g {
                        e[k][m] = if m == k { 1.0 } else { 0.0 };
                    }
                    rhs[k] = 0.0;
                }
            }

            let shares = match linalg::solve_dense(&e, &rhs) {
                Ok(x) => x,
                Err(_) => {
                    warn!(
                        iteration = iterations,
                        "singular dispatch system, falling back to minimum-norm solve"
                    );
                    linalg::solve_damped_min_norm(&e, &rhs)
                        .map_err(|err| SfdError::Solver(err.to_string()))?
                }
            };
            for k in 0..g {
                if active[k] == 1.0 {
                    pg[k] = shares[k];
                }
            }

            pl = loss_mw(&pg);
            residual = demand_mw + pl - pg.iter().sum::<f64>();

            // Clamp only near feasibility so early wild iterates do not fix
            // units prematurely. Clamping is one-way for the call.
            for k in 0..g {
                if residual.abs() <= 1e-3 {
                    if pg[k] > pmax[k] {
                        pg[k] = pmax[k];
                        active[k] = 0.0;
                    } else if pg[k] < pmin[k] {
                        pg[k] = pmin[k];
                        active[k] = 0.0;
                    }
                }
            }

            pl = loss_mw(&pg);
            residual = demand_mw + pl - pg.iter().sum::<f64>();

            // Newton update of lambda from the residual sensitivity.
            let mut grad = vec![0.0; g];
            for k in 0..g {
                if active[k] == 1.0 {
                    let coupling: f64 = (0..g)
                        .filter(|&m| m != k)
                        .map(|m| bu[k][m] * pg[m])
                        .sum();
                    let denom = 2.0 * (costs[k].quadratic + lambda * bu[k][k]).powi(2);
                    grad[k] = if denom > 1e-10 {
                        (costs[k].quadratic * (1.0 - b0[k]) + bu[k][k] * costs[k].linear
                            - 2.0 * costs[k].quadratic * coupling)
                            / denom
                    } else {
                        0.0
                    };
                }
            }
            let sensitivity: f64 = (0..g).map(|k| active[k] * grad[k]).sum();

            if sensitivity.abs() > 1e-6 {
                let mut step = residual / sensitivity;
                if step.abs() > 0.5 * lambda {
                    step = 0.5 * lambda * step.signum();
                }
                lambda += step;
            } else if residual > 0.0 {
                lambda *= 1.05;
            } else {
                lambda *= 0.95;
            }

            debug!(iteration = iterations, lambda, residual, "lambda step");
        }

        self.lambda = Some(lambda);
        info!(
            iterations,
            lambda, loss_mw = pl, "dispatch complete"
        );

        Ok(DispatchSolution {
            generation_mw: pg,
            lambda,
            loss_mw: pl,
            mismatch_mw: residual,
            iterations,
            converged: residual.abs() < self.tolerance,
        })
    }
}

/// Result of one dispatch call.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSolution {
    /// Optimal schedule (MW), one entry per cost row
    pub generation_mw: Vec<f64>,
    /// Final incremental cost ($/MWh)
    pub lambda: f64,
    /// Transmission loss at the final schedule (MW)
    pub loss_mw: f64,
    /// Power-balance residual at exit (MW)
    pub mismatch_mw: f64,
    /// Outer iterations used
    pub iterations: usize,
    /// Whether the residual met tolerance
    pub converged: bool,
}

impl DispatchSolution {
    /// Overwrite the scheduled `Pg` of the model's generator buses, in
    /// ingest order, and report the slack mismatch `|Pg_slack − Pg[0]|`
    /// against the pre-existing slack schedule (p.u.).
    pub fn apply_to(&self, model: &mut NetworkModel) -> SfdResult<f64> {
        let gens = model.generator_indices();
        if gens.len() != self.generation_mw.len() {
            return Err(SfdError::InvalidInput(format!(
                "dispatch has {} units but the model has {} generator buses",
                self.generation_mw.len(),
                gens.len()
            )));
        }
        let slack = model.slack_index();
        let previous_slack_mw = model.buses()[slack].gen_p.value();
        for (j, &idx) in gens.iter().enumerate() {
            model.buses_mut()[idx].gen_p = Megawatts(self.generation_mw[j]);
        }
        Ok((previous_slack_mw - self.generation_mw[0]).abs() / model.base_mva())
    }
}

/// Total generation cost of a schedule ($/h).
pub fn total_generation_cost(costs: &[QuadraticCost], generation_mw: &[f64]) -> f64 {
    costs
        .iter()
        .zip(generation_mw.iter())
        .map(|(c, &p)| c.evaluate(p))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_unit_costs() -> Vec<QuadraticCost> {
        vec![
            QuadraticCost::new(200.0, 7.0, 0.008),
            QuadraticCost::new(180.0, 6.3, 0.009),
            QuadraticCost::new(140.0, 6.8, 0.007),
        ]
    }

    #[test]
    fn test_infeasible_high_demand() {
        let costs = three_unit_costs();
        let limits = vec![GenLimits::new(10.0, 85.0); 3];
        let mut dispatcher = Dispatcher::new();
        let err = dispatcher
            .dispatch(500.0, &costs, &limits, &LossCoefficients::zero(3), 100.0)
            .unwrap_err();
        assert!(matches!(err, SfdError::Infeasible(_)));
        // No lambda is retained from a rejected call.
        assert!(dispatcher.last_lambda().is_none());
    }

    #[test]
    fn test_infeasible_low_demand() {
        let costs = three_unit_costs();
        let limits = vec![GenLimits::new(30.0, 85.0); 3];
        let mut dispatcher = Dispatcher::new();
        assert!(matches!(
            dispatcher.dispatch(50.0, &costs, &limits, &LossCoefficients::zero(3), 100.0),
            Err(SfdError::Infeasible(_))
        ));
    }

    #[test]
    fn test_table_length_mismatch() {
        let costs = three_unit_costs();
        let limits = vec![GenLimits::default(); 2];
        let mut dispatcher = Dispatcher::new();
        assert!(matches!(
            dispatcher.dispatch(100.0, &costs, &limits, &LossCoefficients::zero(3), 100.0),
            Err(SfdError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_lossless_matches_closed_form() {
        // With no losses the optimum is Pk = (λ − βk)/(2γk) with λ solving
        // Σ Pk = demand.
        let costs = three_unit_costs();
        let limits = vec![GenLimits::default(); 3];
        let demand = 150.0;
        let mut dispatcher = Dispatcher::new();
        let solution = dispatcher
            .dispatch(demand, &costs, &limits, &LossCoefficients::zero(3), 100.0)
            .unwrap();
        assert!(solution.converged);

        let inv_2g: f64 = costs.iter().map(|c| 1.0 / (2.0 * c.quadratic)).sum();
        let beta_2g: f64 = costs
            .iter()
            .map(|c| c.linear / (2.0 * c.quadratic))
            .sum();
        let lambda_star = (demand + beta_2g) / inv_2g;

        assert!((solution.lambda - lambda_star).abs() < 1e-3);
        for (k, cost) in costs.iter().enumerate() {
            let expected = (lambda_star - cost.linear) / (2.0 * cost.quadratic);
            assert!(
                (solution.generation_mw[k] - expected).abs() < 1e-2,
                "unit {k}: {} vs {expected}",
                solution.generation_mw[k]
            );
        }
        let total: f64 = solution.generation_mw.iter().sum();
        assert!((total - demand).abs() < 1e-3);
        assert_eq!(solution.loss_mw, 0.0);
    }

    #[test]
    fn test_equal_marginal_cost_at_optimum() {
        let costs = three_unit_costs();
        let limits = vec![GenLimits::default(); 3];
        let mut dispatcher = Dispatcher::new();
        let solution = dispatcher
            .dispatch(300.0, &costs, &limits, &LossCoefficients::zero(3), 100.0)
            .unwrap();

        // Every free unit runs at the system lambda.
        for (k, cost) in costs.iter().enumerate() {
            let mc = cost.marginal_cost(solution.generation_mw[k]);
            assert!((mc - solution.lambda).abs() < 1e-3, "unit {k}: {mc}");
        }
    }

    #[test]
    fn test_clamping_at_pmax() {
        // Cheap unit wants more than its ceiling; it pins at Pmax and the
        // expensive unit covers the rest at its own marginal cost.
        let costs = vec![
            QuadraticCost::new(0.0, 5.0, 0.01),
            QuadraticCost::new(0.0, 6.0, 0.01),
        ];
        let limits = vec![GenLimits::new(0.0, 50.0), GenLimits::new(0.0, 200.0)];
        let mut dispatcher = Dispatcher::new();
        let solution = dispatcher
            .dispatch(120.0, &costs, &limits, &LossCoefficients::zero(2), 100.0)
            .unwrap();
        assert!(solution.converged);

        assert!((solution.generation_mw[0] - 50.0).abs() < 1e-2);
        assert!((solution.generation_mw[1] - 70.0).abs() < 1e-2);
        // λ settles on the marginal unit: 6.0 + 2·0.01·70 = 7.4.
        assert!((solution.lambda - 7.4).abs() < 0.05);
        for (k, limit) in limits.iter().enumerate() {
            let p = solution.generation_mw[k];
            assert!(p >= limit.pmin.value() - 1e-6 && p <= limit.pmax.value() + 1e-6);
        }
    }

    #[test]
    fn test_warm_start_reused() {
        let costs = three_unit_costs();
        let limits = vec![GenLimits::default(); 3];
        let mut dispatcher = Dispatcher::new();
        let first = dispatcher
            .dispatch(150.0, &costs, &limits, &LossCoefficients::zero(3), 100.0)
            .unwrap();
        assert_eq!(dispatcher.last_lambda(), Some(first.lambda));

        // Re-dispatching the same demand from the warm start is nearly
        // instant.
        let second = dispatcher
            .dispatch(150.0, &costs, &limits, &LossCoefficients::zero(3), 100.0)
            .unwrap();
        assert!(second.iterations <= 3);
        assert!((second.lambda - first.lambda).abs() < 1e-6);

        dispatcher.reset_lambda();
        assert!(dispatcher.last_lambda().is_none());
    }

    #[test]
    fn test_total_cost() {
        let costs = three_unit_costs();
        let cost = total_generation_cost(&costs, &[100.0, 100.0, 100.0]);
        // 980 + 900 + 890
        let expected = (200.0 + 700.0 + 80.0) + (180.0 + 630.0 + 90.0) + (140.0 + 680.0 + 70.0);
        assert!((cost - expected).abs() < 1e-9);
    }
}
