//! # sfd-core: Data model for steady-state power-flow and dispatch studies
//!
//! This crate holds the shared vocabulary of the sfd workspace: the bus and
//! branch tables, the per-unit system conventions, generator cost curves, and
//! the unified error type. The numerical pipeline itself (admittance
//! assembly, Newton-Raphson power flow, loss coefficients, economic dispatch)
//! lives in `sfd-algo`; table ingestion and report formatting live in
//! `sfd-io`.
//!
//! ## Conventions
//!
//! - Buses are numbered `1..=N` in tables and indexed `0..N` internally.
//! - Power quantities in the model are MW/Mvar; the solvers convert to
//!   per-unit on the model's `base_mva` (default 100 MVA) at their boundary.
//! - Angles are stored in radians; tables and reports use degrees.
//!
//! ## Quick start
//!
//! ```
//! use sfd_core::{Branch, Bus, BusKind, NetworkModel};
//!
//! let buses = vec![
//!     Bus::new(1, BusKind::Slack).with_voltage(1.05),
//!     Bus::new(2, BusKind::PQ).with_load(100.0, 50.0),
//! ];
//! let branches = vec![Branch::new(1, 2, 0.02, 0.04)];
//!
//! let model = NetworkModel::new(buses, branches).unwrap();
//! assert_eq!(model.n_buses(), 2);
//! assert_eq!(model.slack_index(), 0);
//! ```

pub mod cost;
pub mod error;
pub mod graph;
pub mod model;
pub mod units;

pub use cost::{GenLimits, QuadraticCost};
pub use error::{SfdError, SfdResult};
pub use graph::{find_islands, is_connected, IslandSummary};
pub use model::{Branch, Bus, BusKind, NetworkModel, NetworkStats};
pub use units::{Degrees, Megavars, MegavoltAmperes, Megawatts, PerUnit, Radians};
