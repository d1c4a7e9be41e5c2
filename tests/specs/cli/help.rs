//! Help and version specs

use crate::prelude::*;

#[test]
fn no_subcommand_prints_help() {
    cli()
        .passes()
        .stdout_has("Usage: pj")
        .stdout_has("start")
        .stdout_has("revive");
}

#[test]
fn version_flag_prints_version() {
    cli()
        .args(&["--version"])
        .passes()
        .stdout_eq(&format!("pj {}\n", env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_subcommand_fails() {
    cli()
        .args(&["pause"])
        .fails()
        .stderr_has("unrecognized subcommand 'pause'");
}
