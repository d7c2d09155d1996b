//! CSV ingestion for bus and branch tables.
//!
//! Files carry a header row naming the columns of
//! [`BusRecord`](crate::tables::BusRecord) /
//! [`BranchRecord`](crate::tables::BranchRecord); surrounding whitespace is
//! tolerated and `#`-prefixed lines are treated as comments.

use crate::tables::{build_network, BranchRecord, BusRecord};
use sfd_core::{NetworkModel, SfdError, SfdResult};
use std::fs::File;
use std::io::Read;
use std::path::Path;

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(source)
}

/// Read bus rows from any CSV source.
pub fn read_bus_table<R: Read>(source: R) -> SfdResult<Vec<BusRecord>> {
    reader(source)
        .deserialize()
        .map(|row| row.map_err(|e| SfdError::Parse(format!("bus table: {e}"))))
        .collect()
}

/// Read branch rows from any CSV source.
pub fn read_branch_table<R: Read>(source: R) -> SfdResult<Vec<BranchRecord>> {
    reader(source)
        .deserialize()
        .map(|row| row.map_err(|e| SfdError::Parse(format!("branch table: {e}"))))
        .collect()
}

/// Load and validate a case from a bus-table file and a branch-table file.
pub fn load_case<P: AsRef<Path>>(bus_path: P, branch_path: P) -> SfdResult<NetworkModel> {
    let bus_rows = read_bus_table(File::open(bus_path.as_ref())?)?;
    let branch_rows = read_branch_table(File::open(branch_path.as_ref())?)?;
    build_network(bus_rows, branch_rows)
}
