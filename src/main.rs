//! ristretto CLI
//!
//! Runs the `main` method of a class loaded from the classpath.

use clap::Parser;
use ristretto::{Interpreter, VmOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// A minimal Java virtual machine.
#[derive(Parser, Debug)]
#[command(name = "ristretto")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory to load classes from
    #[arg(short, long, env = "RISTRETTO_CLASSPATH", default_value = ".")]
    classpath: PathBuf,

    /// Maximum number of frames on the thread's stack
    #[arg(long, default_value_t = ristretto::runtime::DEFAULT_MAX_STACK_DEPTH)]
    max_stack_depth: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log every executed instruction
    #[arg(long)]
    trace: bool,

    /// Class whose main method runs, e.g. `com.example.Main`
    main_class: String,

    /// Arguments passed to main
    args: Vec<String>,
}

impl Args {
    fn options(&self) -> VmOptions {
        VmOptions::new(&self.classpath)
            .with_max_stack_depth(self.max_stack_depth)
            .with_trace_instructions(self.trace)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match (args.trace, args.verbose) {
        (true, _) => "ristretto=trace",
        (false, true) => "ristretto=debug",
        _ => "ristretto=warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let vm = Interpreter::new(args.options());
    match vm.run_main(&args.main_class, &args.args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error running {}: {}", args.main_class, e);
            ExitCode::FAILURE
        }
    }
}
