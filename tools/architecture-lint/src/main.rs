//! Command-line entry point: `architecture-lint [BACKEND_DIR]`.
//!
//! Without an argument the backend crate next to this tool is checked.

use std::io::{self, Write};
use std::process::ExitCode;

use camino::Utf8PathBuf;

fn main() -> ExitCode {
    let backend_dir = std::env::args().nth(1).map_or_else(
        || Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../backend"),
        Utf8PathBuf::from,
    );
    match architecture_lint::check_backend(&backend_dir) {
        Ok(checked) => {
            let _ = writeln!(
                io::stdout().lock(),
                "architecture lint: {checked} files within their boundaries"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            let _ = writeln!(io::stderr().lock(), "{err}");
            ExitCode::FAILURE
        }
    }
}
