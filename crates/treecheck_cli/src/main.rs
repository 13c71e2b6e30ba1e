//! Validate XML files passed on the command line against the built-in
//! schema. Exits with the number of files that failed to parse or validate.

use std::env;
use std::path::Path;
use std::process::ExitCode;

use treecheck_cli::sample;
use treecheck_cli::xml::{self, DocumentError};

/// Structured logging, filtered through `RUST_LOG`.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

fn main() -> ExitCode {
    init_tracing();

    let files: Vec<String> = env::args().skip(1).collect();
    if files.is_empty() {
        eprintln!("Usage: treecheck <file.xml>...");
        return ExitCode::from(2);
    }

    let schema = sample::schema();
    let mut failures: u8 = 0;
    for file in &files {
        match xml::validate_file(&schema, Path::new(file)) {
            Ok(()) => println!("{file}: valid"),
            Err(DocumentError::Invalid(err)) => {
                failures = failures.saturating_add(1);
                println!("{file}: invalid: {err}");
            }
            Err(err) => {
                failures = failures.saturating_add(1);
                println!("{file}: {err}");
            }
        }
    }

    ExitCode::from(failures)
}
