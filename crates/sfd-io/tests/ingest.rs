//! Case ingestion from files through to a solved report.

use sfd_algo::{admittance::build_ybus, branch_flows, power_flow::PowerFlowSolver};
use sfd_core::SfdError;
use sfd_io::{build_network, bus_report, flow_report, load_case, read_bus_table};
use std::io::Write;

const BUS_CSV: &str = "\
number,kind,vm,delta_deg,pd_mw,qd_mvar,pg_mw,qg_mvar,qmin_mvar,qmax_mvar,qsh_mvar
1,1,1.05,0,0,0,0,0,0,0,0
2,0,1.0,0,100,50,0,0,0,0,0
";

const BRANCH_CSV: &str = "\
from,to,r_pu,x_pu,bc_pu,tap
1,2,0.02,0.04,0,1
";

fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn load_case_from_files_and_solve() {
    let bus_file = write_temp(BUS_CSV);
    let branch_file = write_temp(BRANCH_CSV);

    let mut model = load_case(bus_file.path(), branch_file.path()).unwrap();
    assert_eq!(model.n_buses(), 2);

    let ybus = build_ybus(&model).unwrap();
    let solution = PowerFlowSolver::new().solve(&mut model, &ybus).unwrap();
    assert!(solution.converged);

    let report = branch_flows(&model, &solution);
    let bus_text = bus_report(&model, &solution);
    let flow_text = flow_report(&report);
    assert!(bus_text.contains("converged"));
    assert!(flow_text.contains("Total loss"));
}

#[test]
fn missing_file_is_an_io_error() {
    let branch_file = write_temp(BRANCH_CSV);
    let err = load_case(
        std::path::Path::new("/no/such/bus.csv"),
        branch_file.path(),
    )
    .unwrap_err();
    assert!(matches!(err, SfdError::Io(_)));
}

#[test]
fn duplicate_bus_numbers_rejected() {
    let bus_csv = "\
number,kind,vm,delta_deg,pd_mw,qd_mvar,pg_mw,qg_mvar,qmin_mvar,qmax_mvar,qsh_mvar
1,1,1.05,0,0,0,0,0,0,0,0
1,0,1.0,0,100,50,0,0,0,0,0
";
    let bus_rows = read_bus_table(bus_csv.as_bytes()).unwrap();
    let branch_rows = sfd_io::read_branch_table(BRANCH_CSV.as_bytes()).unwrap();
    let err = build_network(bus_rows, branch_rows).unwrap_err();
    assert!(matches!(err, SfdError::InvalidInput(_)));
}

#[test]
fn zero_impedance_branch_rejected() {
    let branch_csv = "\
from,to,r_pu,x_pu,bc_pu,tap
1,2,0,0,0,1
";
    let bus_rows = read_bus_table(BUS_CSV.as_bytes()).unwrap();
    let branch_rows = sfd_io::read_branch_table(branch_csv.as_bytes()).unwrap();
    let err = build_network(bus_rows, branch_rows).unwrap_err();
    assert!(err.to_string().contains("zero series impedance"));
}

#[test]
fn missing_column_is_a_parse_error() {
    let bus_csv = "\
number,kind,vm
1,1,1.05
";
    assert!(matches!(
        read_bus_table(bus_csv.as_bytes()),
        Err(SfdError::Parse(_))
    ));
}
