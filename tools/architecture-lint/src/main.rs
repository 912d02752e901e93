//! `architecture-lint [CRATE_DIR]`: check the dashboard crate's layering.
//!
//! Without an argument the sibling `dashboard` crate of this workspace is
//! linted.

use std::env;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    let crate_dir = env::args_os()
        .nth(1)
        .map_or_else(default_crate_dir, PathBuf::from);
    if !crate_dir.join("src").is_dir() {
        return fail(format_args!(
            "{} has no src/ directory to lint",
            crate_dir.display()
        ));
    }
    match architecture_lint::lint_crate_sources(&crate_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(err),
    }
}

fn default_crate_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../dashboard")
}

fn fail(message: impl fmt::Display) -> ExitCode {
    // The exit code still reports the failure when stderr is gone.
    match writeln!(io::stderr().lock(), "{message}") {
        Ok(()) | Err(_) => ExitCode::FAILURE,
    }
}
