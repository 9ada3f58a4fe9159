//! modproxy CLI: publish Go module versions into a proxy store and inspect it.

mod commands;
mod settings;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modproxy", version, about = "Go module proxy publisher")]
struct Cli {
    /// Configuration file (default: ./modproxy.toml if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Store root directory, overriding the configuration
    #[arg(long, global = true, value_name = "DIR")]
    store: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a module version from a source directory
    Publish {
        /// Module path (e.g., example.com/foo/bar)
        module: String,
        /// Version, with or without the leading `v`
        version: String,
        /// Source tree to package
        #[arg(long, value_name = "DIR")]
        source: PathBuf,
    },
    /// Print the version listing of a module
    List {
        /// Module path
        module: String,
    },
    /// Print the metadata document of a version
    Info {
        /// Module path
        module: String,
        /// Version
        version: String,
    },
    /// Print the latest version of a module
    Latest {
        /// Module path
        module: String,
    },
    /// Fetch a raw proxy path (e.g., example.com/foo/@v/list) to stdout
    Get {
        /// Case-escaped request path
        path: String,
    },
    /// Re-hash a stored version against its recorded digest
    Verify {
        /// Module path
        module: String,
        /// Version
        version: String,
    },
    /// Remove artifacts of versions that never reached the catalog
    Sweep {
        /// Module path
        module: String,
    },
    /// List every published module
    Modules,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = settings::load(&cwd, cli.config.as_deref(), cli.store.as_deref())?;

    match cli.command {
        Commands::Publish {
            module,
            version,
            source,
        } => commands::publish::run(&config, &module, &version, &source),
        Commands::Sweep { module } => commands::publish::sweep(&config, &module),
        Commands::List { module } => commands::read::list(&config, &module),
        Commands::Info { module, version } => commands::read::info(&config, &module, &version),
        Commands::Latest { module } => commands::read::latest(&config, &module),
        Commands::Get { path } => commands::read::get(&config, &path),
        Commands::Verify { module, version } => {
            commands::read::verify(&config, &module, &version)
        }
        Commands::Modules => commands::read::modules(&config),
    }
}
