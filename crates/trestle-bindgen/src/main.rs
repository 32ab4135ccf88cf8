use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use trestle_bindgen::{Options, Outcome};

#[derive(Parser)]
#[command(
    name = "trestle-bindgen",
    about = "Generates boundary-crossing trampolines from *.imports.toml manifests"
)]
struct Cli {
    /// Output file, relative to each target directory
    #[arg(long, default_value = "trestle_bindings.rs")]
    output: PathBuf,

    /// Format the generated code
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    format: bool,

    /// Override the generated module name
    #[arg(long)]
    package: Option<String>,

    /// Target package directories
    #[arg(default_value = ".")]
    dirs: Vec<PathBuf>,
}

fn main() -> ExitCode {
    // Logs go to stderr so generated-path output on stdout stays clean
    fmt()
        .with_env_filter(EnvFilter::from_env("TRESTLE_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let opts = Options {
        output: cli.output,
        format: cli.format,
        package: cli.package,
    };

    // Each failing target is reported and the rest still processed.
    let mut failed = false;
    for dir in &cli.dirs {
        match trestle_bindgen::generate(dir, &opts) {
            Ok(Outcome::Written(path)) => println!("{}", path.display()),
            Ok(Outcome::NoImports) => {}
            Err(err) => {
                eprintln!("error: {:#}", anyhow::Error::new(err));
                failed = true;
            }
        }
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
