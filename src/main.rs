use clap::Parser;
use tradegen::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
