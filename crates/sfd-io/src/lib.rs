//! # sfd-io: Case ingestion and result formatting
//!
//! The boundary layer of the sfd workspace: numeric bus/branch table records
//! with CSV readers on the way in, plain-text result tables on the way out.
//! The numerical pipeline itself never touches a file and never prints.
//!
//! ## Example
//!
//! ```no_run
//! use sfd_algo::{admittance::build_ybus, power_flow::PowerFlowSolver};
//! use sfd_io::{import::load_case, report::bus_report};
//!
//! let mut model = load_case("bus.csv", "branch.csv")?;
//! let ybus = build_ybus(&model)?;
//! let solution = PowerFlowSolver::new().solve(&mut model, &ybus)?;
//! println!("{}", bus_report(&model, &solution));
//! # Ok::<(), sfd_core::SfdError>(())
//! ```

pub mod import;
pub mod report;
pub mod tables;

pub use import::{load_case, read_branch_table, read_bus_table};
pub use report::{bus_report, flow_report};
pub use tables::{build_network, BranchRecord, BusRecord};
