mod commands;
mod logging;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "culvert",
    version,
    about = "Drain survey normalization, defect grading and costing tool"
)]
struct Cli {
    /// Debug logging and detailed per-record reasoning
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a survey export (.db3 or .xlsx) into graded, costed records
    Process {
        /// Path to the survey export
        input_file: PathBuf,

        /// Pricing configuration JSON file
        #[arg(short, long, value_name = "FILE", conflicts_with = "store")]
        pricing: Option<PathBuf>,

        /// Use the current pricing configuration from a configuration store
        #[arg(long, value_name = "DB")]
        store: Option<PathBuf>,

        /// Custom defect code table JSON (default: mscc5 preset)
        #[arg(short, long, value_name = "FILE")]
        codes: Option<PathBuf>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Only list sections with defects (grade-0 sections are shown by default)
        #[arg(long)]
        defects_only: bool,

        /// Include the audit trail in the output
        #[arg(long)]
        audit: bool,

        /// Write the full JSON output to a file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Inspect defect code tables
    Codes {
        #[command(subcommand)]
        action: CodesAction,
    },
    /// Validate, import and inspect pricing configurations
    Pricing {
        #[command(subcommand)]
        action: PricingAction,
    },
}

#[derive(Subcommand)]
enum CodesAction {
    /// List predefined code tables
    List,
    /// Explain a code table, or a single code
    Explain {
        /// Operation code (e.g. "DER"); omit to explain the whole table
        code: Option<String>,

        /// Custom code table JSON instead of the preset
        #[arg(short, long, value_name = "FILE")]
        codes: Option<PathBuf>,
    },
    /// Validate a custom code table file
    Validate {
        /// Path to JSON code table
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum PricingAction {
    /// Validate a pricing configuration file and report range gaps
    Validate {
        /// Path to pricing JSON
        file: PathBuf,
    },
    /// Store a pricing configuration as the next version
    Import {
        /// Path to pricing JSON
        file: PathBuf,

        #[arg(long, value_name = "DB")]
        store: PathBuf,
    },
    /// Print a stored configuration (default: current)
    Show {
        #[arg(long, value_name = "DB")]
        store: PathBuf,

        #[arg(long)]
        version: Option<u32>,
    },
    /// List stored configuration versions
    History {
        #[arg(long, value_name = "DB")]
        store: PathBuf,
    },
    /// Make an earlier version current again
    Activate {
        #[arg(long, value_name = "DB")]
        store: PathBuf,

        version: u32,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Process {
            input_file,
            pricing,
            store,
            codes,
            output,
            defects_only,
            audit,
            out,
        } => commands::process::run(commands::process::ProcessArgs {
            input_file,
            pricing,
            store,
            codes,
            output,
            defects_only,
            verbose: cli.verbose,
            audit,
            out,
        }),
        Commands::Codes { action } => match action {
            CodesAction::List => commands::codes::list(),
            CodesAction::Explain { code, codes } => {
                commands::codes::explain(code.as_deref(), codes.as_deref())
            }
            CodesAction::Validate { file } => commands::codes::validate(&file),
        },
        Commands::Pricing { action } => match action {
            PricingAction::Validate { file } => commands::pricing::validate(&file),
            PricingAction::Import { file, store } => commands::pricing::import(&file, &store),
            PricingAction::Show { store, version } => commands::pricing::show(&store, version),
            PricingAction::History { store } => commands::pricing::history(&store),
            PricingAction::Activate { store, version } => {
                commands::pricing::activate(&store, version)
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
