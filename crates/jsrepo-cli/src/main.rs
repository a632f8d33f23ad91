#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jsrepo")]
#[command(author, version, about = "Build and inspect jsrepo component registries", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Build the registry manifest from jsrepo.json
    Build {
        /// Write the manifest to this file instead of stdout
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,

        /// Override the number of files processed concurrently
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Resolve the imports of a single source file
    Resolve {
        /// Source file, relative to the working directory
        file: PathBuf,
    },

    /// Parse an npm-style package specifier
    ParseSpec {
        /// Specifier such as `@scope/name@1.0.0/sub/path`
        spec: String,
    },

    /// Rewrite the local imports of a registry file for a consumer
    Transform {
        /// Registry file, as listed in the manifest
        file: String,

        /// Path the file will be written to in the consumer project
        #[arg(long, value_name = "PATH")]
        target: PathBuf,

        /// Read a built manifest instead of building one
        #[arg(long, value_name = "FILE")]
        manifest: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(cli.json),
        Some(Commands::ParseSpec { spec }) => commands::parse_spec::run(&spec, cli.json),
        Some(Commands::Build {
            output,
            concurrency,
        }) => {
            let span = tracing::info_span!("build", cmd = "build", cwd = %cwd.display());
            let _guard = span.enter();
            let action = commands::build::BuildAction {
                cwd,
                output,
                concurrency,
            };
            commands::build::run(action, cli.json)
        }
        Some(Commands::Resolve { file }) => {
            let span = tracing::info_span!("resolve", cmd = "resolve", cwd = %cwd.display());
            let _guard = span.enter();
            commands::resolve::run(&cwd, &file, cli.json)
        }
        Some(Commands::Transform {
            file,
            target,
            manifest,
        }) => {
            let span = tracing::info_span!("transform", cmd = "transform", cwd = %cwd.display());
            let _guard = span.enter();
            let action = commands::transform::TransformAction {
                cwd,
                file,
                target,
                manifest,
            };
            commands::transform::run(action, cli.json)
        }
    }
}
