//! # sfd-algo: Numerical pipeline for steady-state network studies
//!
//! The solver stages of the sfd workspace, consuming the tables of
//! [`sfd_core`] and feeding one another in a fixed order:
//!
//! | Stage | Entry point | Produces |
//! |-------|-------------|----------|
//! | Admittance assembly | [`admittance::build_ybus`] | dense complex `Ybus` |
//! | Power flow | [`power_flow::PowerFlowSolver`] | converged operating point |
//! | Branch flows | [`flows::branch_flows`] | per-branch flows and losses |
//! | Loss formula | [`loss::kron_loss_coefficients`] | `(B, B₀, B₀₀)` |
//! | Economic dispatch | [`dispatch::Dispatcher`] | optimal `Pg` schedule, `λ` |
//!
//! Everything is single-threaded and synchronous; the stages communicate by
//! mutating the shared [`NetworkModel`](sfd_core::NetworkModel) at
//! well-defined points (the solver writes the operating point back, the
//! dispatcher overwrites generator schedules), so a dispatch can be followed
//! by a re-solve of the same model.
//!
//! ## Example
//!
//! ```
//! use sfd_algo::{admittance::build_ybus, power_flow::PowerFlowSolver};
//! use sfd_core::{Branch, Bus, BusKind, NetworkModel};
//!
//! let mut model = NetworkModel::new(
//!     vec![
//!         Bus::new(1, BusKind::Slack).with_voltage(1.05),
//!         Bus::new(2, BusKind::PQ).with_load(100.0, 50.0),
//!     ],
//!     vec![Branch::new(1, 2, 0.02, 0.04)],
//! )
//! .unwrap();
//!
//! let ybus = build_ybus(&model).unwrap();
//! let solution = PowerFlowSolver::new().solve(&mut model, &ybus).unwrap();
//! assert!(solution.converged);
//! ```

pub mod admittance;
pub mod dispatch;
pub mod flows;
pub mod linalg;
pub mod loss;
pub mod power_flow;

pub use admittance::build_ybus;
pub use dispatch::{total_generation_cost, DispatchSolution, Dispatcher};
pub use flows::{branch_flows, BranchFlow, FlowReport};
pub use loss::{kron_loss_coefficients, LossCoefficients};
pub use power_flow::{PowerFlowSolution, PowerFlowSolver};
