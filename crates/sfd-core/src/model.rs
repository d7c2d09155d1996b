//! Bus and branch tables for steady-state network studies.
//!
//! A [`NetworkModel`] is the shared state of the whole pipeline: the
//! admittance builder reads its branch table, the power-flow solver reads the
//! bus table and writes the converged operating point back into it, and the
//! dispatcher overwrites the scheduled generation of generator buses. The
//! model is constructed once per case through [`NetworkModel::new`], which
//! enforces every structural invariant up front so the numerical stages can
//! index freely:
//!
//! - bus numbers form a dense `1..=N` set with no duplicates,
//! - exactly one bus is the slack,
//! - branch endpoints reference existing buses and `from != to`,
//! - no branch has zero series impedance,
//! - non-positive tap ratios are rewritten to `1.0`,
//! - non-positive voltage guesses are reset to `1.0 pu` at zero angle.
//!
//! Buses are numbered `1..=N` externally (table convention) and indexed
//! `0..N` internally; `buses()[k]` is always bus number `k + 1`.

use crate::error::{SfdError, SfdResult};
use crate::units::{Degrees, Megavars, Megawatts, PerUnit, Radians};
use serde::{Deserialize, Serialize};

/// Bus classification for power flow.
///
/// The table encoding is `1 = Slack`, `2 = PV`, `0 = PQ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusKind {
    /// Slack bus: V and δ are fixed, P and Q are calculated
    Slack,
    /// PV bus: P and V are specified, Q and δ are calculated
    PV,
    /// PQ bus: P and Q are specified, V and δ are calculated
    PQ,
}

impl BusKind {
    /// Decode the integer flag used in bus tables.
    pub fn from_code(code: i64) -> SfdResult<Self> {
        match code {
            1 => Ok(BusKind::Slack),
            2 => Ok(BusKind::PV),
            0 => Ok(BusKind::PQ),
            other => Err(SfdError::InvalidInput(format!(
                "unsupported bus kind code {other} (expected 0, 1 or 2)"
            ))),
        }
    }

    /// The integer flag used in bus tables.
    pub fn code(self) -> i64 {
        match self {
            BusKind::Slack => 1,
            BusKind::PV => 2,
            BusKind::PQ => 0,
        }
    }

    /// Slack and PV buses carry dispatchable generation.
    pub fn is_generator(self) -> bool {
        !matches!(self, BusKind::PQ)
    }
}

impl std::fmt::Display for BusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusKind::Slack => write!(f, "Slack"),
            BusKind::PV => write!(f, "PV"),
            BusKind::PQ => write!(f, "PQ"),
        }
    }
}

/// One row of the bus table.
///
/// Voltage magnitude/angle double as the initial guess before a solve and the
/// converged operating point after one. Loads and generation are scheduled
/// values in MW/Mvar; `qmax` equal to zero disables reactive-limit
/// enforcement for a PV bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    /// 1-based bus number, dense across the table
    pub number: usize,
    /// Bus classification
    pub kind: BusKind,
    /// Voltage magnitude (p.u.)
    pub voltage: PerUnit,
    /// Voltage angle
    pub angle: Radians,
    /// Scheduled active load
    pub load_p: Megawatts,
    /// Scheduled reactive load
    pub load_q: Megavars,
    /// Scheduled active generation
    pub gen_p: Megawatts,
    /// Scheduled reactive generation
    pub gen_q: Megavars,
    /// Lower reactive limit for PV buses
    pub qmin: Megavars,
    /// Upper reactive limit for PV buses; `0` disables enforcement
    pub qmax: Megavars,
    /// Shunt reactive injection (positive = capacitive)
    pub shunt_q: Megavars,
}

impl Bus {
    /// Create a bus at nominal voltage with no load or generation.
    pub fn new(number: usize, kind: BusKind) -> Self {
        Self {
            number,
            kind,
            voltage: PerUnit::ONE,
            angle: Radians::ZERO,
            load_p: Megawatts(0.0),
            load_q: Megavars(0.0),
            gen_p: Megawatts(0.0),
            gen_q: Megavars(0.0),
            qmin: Megavars(0.0),
            qmax: Megavars(0.0),
            shunt_q: Megavars(0.0),
        }
    }

    /// Set the voltage magnitude (p.u.)
    pub fn with_voltage(mut self, vm_pu: f64) -> Self {
        self.voltage = PerUnit(vm_pu);
        self
    }

    /// Set the voltage angle in degrees
    pub fn with_angle(mut self, delta: Degrees) -> Self {
        self.angle = delta.to_radians();
        self
    }

    /// Set the scheduled load (MW, Mvar)
    pub fn with_load(mut self, p_mw: f64, q_mvar: f64) -> Self {
        self.load_p = Megawatts(p_mw);
        self.load_q = Megavars(q_mvar);
        self
    }

    /// Set the scheduled generation (MW, Mvar)
    pub fn with_generation(mut self, p_mw: f64, q_mvar: f64) -> Self {
        self.gen_p = Megawatts(p_mw);
        self.gen_q = Megavars(q_mvar);
        self
    }

    /// Set the reactive limits (Mvar); `qmax = 0` disables enforcement
    pub fn with_q_limits(mut self, qmin_mvar: f64, qmax_mvar: f64) -> Self {
        self.qmin = Megavars(qmin_mvar);
        self.qmax = Megavars(qmax_mvar);
        self
    }

    /// Set the shunt reactive injection (Mvar, positive = capacitive)
    pub fn with_shunt(mut self, qsh_mvar: f64) -> Self {
        self.shunt_q = Megavars(qsh_mvar);
        self
    }
}

/// One row of the branch table: a line or a two-winding transformer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// 1-based sending-end bus (the tap side for transformers)
    pub from: usize,
    /// 1-based receiving-end bus
    pub to: usize,
    /// Series resistance (p.u.)
    pub resistance: f64,
    /// Series reactance (p.u.)
    pub reactance: f64,
    /// Per-end line-charging susceptance (p.u.)
    pub charging: f64,
    /// Off-nominal tap ratio on the `from` side; non-positive values are
    /// normalized to `1.0` at model construction
    pub tap: f64,
}

impl Branch {
    /// Create a branch with unit tap and no charging.
    pub fn new(from: usize, to: usize, resistance: f64, reactance: f64) -> Self {
        Self {
            from,
            to,
            resistance,
            reactance,
            charging: 0.0,
            tap: 1.0,
        }
    }

    /// Attach per-end line-charging susceptance (p.u.)
    pub fn with_charging(mut self, bc_pu: f64) -> Self {
        self.charging = bc_pu;
        self
    }

    /// Attach an off-nominal tap ratio on the `from` side
    pub fn with_tap(mut self, tap: f64) -> Self {
        self.tap = tap;
        self
    }
}

/// The validated case: bus table, branch table, and system MVA base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkModel {
    buses: Vec<Bus>,
    branches: Vec<Branch>,
    base_mva: f64,
}

impl NetworkModel {
    /// Validate and normalize the tables into a model.
    ///
    /// Buses may arrive in any order; they are sorted by number. See the
    /// module docs for the invariants enforced here.
    pub fn new(mut buses: Vec<Bus>, mut branches: Vec<Branch>) -> SfdResult<Self> {
        if buses.is_empty() {
            return Err(SfdError::InvalidInput("bus table is empty".into()));
        }

        buses.sort_by_key(|b| b.number);
        for (idx, bus) in buses.iter().enumerate() {
            if bus.number != idx + 1 {
                return Err(SfdError::InvalidInput(format!(
                    "bus numbers must form a dense 1..={} set; found {} at position {}",
                    buses.len(),
                    bus.number,
                    idx + 1
                )));
            }
        }

        let slack_count = buses.iter().filter(|b| b.kind == BusKind::Slack).count();
        if slack_count != 1 {
            return Err(SfdError::InvalidInput(format!(
                "expected exactly one slack bus, found {slack_count}"
            )));
        }

        for bus in &mut buses {
            // A non-positive magnitude means "no initial guess": flat start.
            if bus.voltage.value() <= 0.0 {
                bus.voltage = PerUnit::ONE;
                bus.angle = Radians::ZERO;
            }
        }

        let n = buses.len();
        for branch in &mut branches {
            if branch.from == branch.to {
                return Err(SfdError::InvalidInput(format!(
                    "branch {}-{} is a self-loop",
                    branch.from, branch.to
                )));
            }
            if branch.from < 1 || branch.from > n || branch.to < 1 || branch.to > n {
                return Err(SfdError::InvalidInput(format!(
                    "branch {}-{} references a bus outside 1..={n}",
                    branch.from, branch.to
                )));
            }
            if branch.resistance == 0.0 && branch.reactance == 0.0 {
                return Err(SfdError::InvalidInput(format!(
                    "branch {}-{} has zero series impedance",
                    branch.from, branch.to
                )));
            }
            if branch.tap <= 0.0 {
                branch.tap = 1.0;
            }
        }

        Ok(Self {
            buses,
            branches,
            base_mva: 100.0,
        })
    }

    /// Override the system base apparent power (MVA, default 100).
    pub fn with_base_mva(mut self, base_mva: f64) -> Self {
        self.base_mva = base_mva;
        self
    }

    /// System base apparent power (MVA)
    pub fn base_mva(&self) -> f64 {
        self.base_mva
    }

    /// Number of buses
    pub fn n_buses(&self) -> usize {
        self.buses.len()
    }

    /// Number of branches
    pub fn n_branches(&self) -> usize {
        self.branches.len()
    }

    /// The bus table, sorted by bus number
    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    /// Mutable access to the bus table (used by the solver and dispatcher
    /// write-back paths)
    pub fn buses_mut(&mut self) -> &mut [Bus] {
        &mut self.buses
    }

    /// The branch table
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Bus by its 1-based number
    pub fn bus(&self, number: usize) -> Option<&Bus> {
        if number >= 1 && number <= self.buses.len() {
            Some(&self.buses[number - 1])
        } else {
            None
        }
    }

    /// Mutable bus by its 1-based number
    pub fn bus_mut(&mut self, number: usize) -> Option<&mut Bus> {
        if number >= 1 && number <= self.buses.len() {
            Some(&mut self.buses[number - 1])
        } else {
            None
        }
    }

    /// Internal (0-based) index of the slack bus
    pub fn slack_index(&self) -> usize {
        // Invariant: exactly one slack bus exists after construction.
        self.buses
            .iter()
            .position(|b| b.kind == BusKind::Slack)
            .expect("validated model has a slack bus")
    }

    /// Internal (0-based) indices of the generator buses (slack + PV), in
    /// bus-number order
    pub fn generator_indices(&self) -> Vec<usize> {
        self.buses
            .iter()
            .enumerate()
            .filter(|(_, b)| b.kind.is_generator())
            .map(|(i, _)| i)
            .collect()
    }

    /// `(slack, pv, pq)` bus counts
    pub fn kind_counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for bus in &self.buses {
            match bus.kind {
                BusKind::Slack => counts.0 += 1,
                BusKind::PV => counts.1 += 1,
                BusKind::PQ => counts.2 += 1,
            }
        }
        counts
    }

    /// Total scheduled load `(P, Q)`
    pub fn total_load(&self) -> (Megawatts, Megavars) {
        (
            self.buses.iter().map(|b| b.load_p).sum(),
            self.buses.iter().map(|b| b.load_q).sum(),
        )
    }

    /// Total scheduled generation `(P, Q)`
    pub fn total_generation(&self) -> (Megawatts, Megavars) {
        (
            self.buses.iter().map(|b| b.gen_p).sum(),
            self.buses.iter().map(|b| b.gen_q).sum(),
        )
    }

    /// Total shunt reactive injection
    pub fn total_shunt(&self) -> Megavars {
        self.buses.iter().map(|b| b.shunt_q).sum()
    }

    /// Compute basic statistics about the case
    pub fn stats(&self) -> NetworkStats {
        let (slack, pv, pq) = self.kind_counts();
        let (load_p, load_q) = self.total_load();
        let (gen_p, _) = self.total_generation();
        NetworkStats {
            num_buses: self.buses.len(),
            num_branches: self.branches.len(),
            num_slack: slack,
            num_pv: pv,
            num_pq: pq,
            total_load_mw: load_p.value(),
            total_load_mvar: load_q.value(),
            total_gen_mw: gen_p.value(),
        }
    }
}

/// Statistics about a case's size and scheduled power
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_branches: usize,
    pub num_slack: usize,
    pub num_pv: usize,
    pub num_pq: usize,
    pub total_load_mw: f64,
    pub total_load_mvar: f64,
    pub total_gen_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses ({} slack, {} PV, {} PQ), {} branches, load {:.1} MW / {:.1} Mvar, scheduled gen {:.1} MW",
            self.num_buses,
            self.num_slack,
            self.num_pv,
            self.num_pq,
            self.num_branches,
            self.total_load_mw,
            self.total_load_mvar,
            self.total_gen_mw
        )
    }
}
