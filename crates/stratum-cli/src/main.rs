//! Stratum CLI
//!
//! Command-line interface for inspecting layered configurations

mod commands;
mod output;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use stratum_core::{Result, init_tracing_with};
use std::io;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "stratum")]
#[command(about = "Stratum: resolve layered, path-scoped configuration")]
#[command(version = stratum_core::VERSION)]
#[command(
    long_about = "Stratum folds an ordered list of glob-scoped configuration layers into the\n\
effective settings for a file. Later layers override earlier ones, append-policy\n\
keys accumulate, and ignore-layers exclude paths outright.\n\
\n\
Examples:\n  \
stratum resolve src/App.tsx          # Effective settings for one file\n  \
stratum explain src/App.test.tsx     # Which layers shaped the result\n  \
stratum scan packages/               # Included and excluded files in a tree\n  \
stratum config validate              # Check the declaration file"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(
        short,
        long,
        global = true,
        help = "Path to declaration file (stratum.yaml, .stratumrc.json, ...)"
    )]
    config: Option<PathBuf>,

    /// Verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Number of threads to use for parallel resolution
    #[arg(
        short = 'j',
        long,
        global = true,
        help = "Number of threads (default: number of CPU cores)"
    )]
    threads: Option<usize>,

    /// Generate shell completion script
    #[arg(
        long,
        value_enum,
        help = "Generate completion script for specified shell"
    )]
    generate_completion: Option<Shell>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration for one or more files
    Resolve {
        /// Files to resolve, relative to the current directory
        #[arg(required = true, help = "Files to resolve")]
        paths: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "human", help = "Output format")]
        format: OutputFormat,
    },

    /// Show which layers matched a file and where each setting came from
    Explain {
        /// File to explain
        path: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "human", help = "Output format")]
        format: OutputFormat,
    },

    /// Walk a directory and resolve every file in it
    Scan {
        /// Directory to scan
        #[arg(help = "Directory to scan (default: current directory)")]
        dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "human", help = "Output format")]
        format: OutputFormat,

        /// Only list excluded files
        #[arg(long, help = "Only list files vetoed by an ignore-layer")]
        excluded: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show version information
    Version {
        /// Show detailed version information
        #[arg(long, help = "Show detailed build information")]
        detailed: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Create a starter declaration file in the current directory
    Init {
        /// File format
        #[arg(short, long, default_value = "yaml", help = "Declaration file format")]
        format: ConfigFormat,

        /// Overwrite an existing file
        #[arg(long, help = "Overwrite existing declaration file")]
        force: bool,
    },

    /// Load a declaration and compile every layer
    Validate {
        /// Declaration file (default: discovered)
        path: Option<PathBuf>,
    },

    /// Print the loaded declaration, with `extends` applied
    Show,

    /// Print the JSON Schema of the declaration format
    Schema,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output with colors
    Human,
    /// JSON format for programmatic consumption
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (stratum.yaml)
    Yaml,
    /// JSON (.stratumrc.json)
    Json,
    /// TOML (.stratumrc.toml)
    Toml,
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.generate_completion {
        generate_completion_script(shell);
        return;
    }

    let use_colors = !cli.no_color && std::env::var("NO_COLOR").is_err();
    colored::control::set_override(use_colors);

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "stratum=error", // Only errors by default
        1 => "stratum=warn",  // Warnings on first -v
        2 => "stratum=info",  // Info on -vv
        3 => "stratum=debug", // Debug on -vvv
        _ => "stratum=trace", // Trace on -vvvv+
    };
    init_tracing_with(log_level);

    if let Some(threads) = cli.threads
        && let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
    {
        error!("Failed to set thread pool size: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run_command(cli, use_colors) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn generate_completion_script(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn run_command(cli: Cli, use_colors: bool) -> Result<()> {
    match cli.command {
        Some(Commands::Resolve { paths, format }) => {
            commands::resolve_command(paths, format, use_colors, cli.config)
        }

        Some(Commands::Explain { path, format }) => {
            commands::explain_command(path, format, use_colors, cli.config)
        }

        Some(Commands::Scan {
            dir,
            format,
            excluded,
        }) => {
            let dir = dir.unwrap_or_else(|| PathBuf::from("."));
            commands::scan_command(dir, format, excluded, use_colors, cli.config)
        }

        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { format, force } => commands::config::init_command(format, force),
            ConfigAction::Validate { path } => {
                commands::config::validate_command(path.or(cli.config))
            }
            ConfigAction::Show => commands::config::show_command(cli.config),
            ConfigAction::Schema => commands::config::schema_command(),
        },

        Some(Commands::Version { detailed }) => {
            if detailed {
                println!("stratum {}", stratum_core::VERSION);
                println!("Build information:");
                println!("  Target: {}", std::env::consts::ARCH);
                println!("  OS: {}", std::env::consts::OS);
            } else {
                println!("{}", stratum_core::VERSION);
            }
            Ok(())
        }

        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            Ok(())
        }
    }
}
