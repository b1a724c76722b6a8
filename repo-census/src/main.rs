//! Collect process and quality metrics for a sample of popular repositories.

use repo_census_lib::{Host, run};
use std::io::Write;
use std::io::{stderr, stdout};
use std::process::ExitCode;

/// Host backed by the real standard streams and process exit.
#[derive(Debug, Clone, Default)]
pub struct ProcessHost;

impl Host for ProcessHost {
    fn output(&mut self) -> impl Write {
        stdout()
    }

    fn error(&mut self) -> impl Write {
        stderr()
    }

    fn exit(&mut self, code: i32) {
        std::process::exit(code);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut host = ProcessHost;
    match run(&mut host, std::env::args()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = writeln!(host.error(), "error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
