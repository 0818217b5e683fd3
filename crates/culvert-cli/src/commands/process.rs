use culvert_core::error::SurveyError;
use culvert_core::pricing::{load_pricing, PricingStore};
use culvert_core::reader::open_source;
use culvert_core::rules::{self, builtin};
use culvert_core::{ProcessOptions, DEFAULT_READ_TIMEOUT};
use std::path::PathBuf;

use crate::output;

pub struct ProcessArgs {
    pub input_file: PathBuf,
    pub pricing: Option<PathBuf>,
    pub store: Option<PathBuf>,
    pub codes: Option<PathBuf>,
    pub output: String,
    pub defects_only: bool,
    pub verbose: bool,
    pub audit: bool,
    pub out: Option<PathBuf>,
}

pub fn run(args: ProcessArgs) -> Result<(), SurveyError> {
    let custom_table;
    let code_table = match &args.codes {
        Some(path) => {
            custom_table = rules::load_code_table(path)?;
            &custom_table
        }
        None => builtin::default_table(),
    };
    let options = ProcessOptions {
        code_table,
        read_timeout: DEFAULT_READ_TIMEOUT,
    };

    let pricing = match (&args.pricing, &args.store) {
        (Some(file), _) => Some(load_pricing(file)?),
        (None, Some(db)) => {
            let current = PricingStore::open(db)?.current()?;
            if current.is_none() {
                tracing::warn!(store = %db.display(), "configuration store has no pricing; costs skipped");
            }
            current
        }
        (None, None) => None,
    };

    let source = open_source(&args.input_file, options.read_timeout)?;
    let result = culvert_core::process_upload(source.as_ref(), pricing.as_ref(), &options)?;

    if let Some(path) = &args.out {
        output::json::write(&result, path)?;
    }

    match args.output.as_str() {
        "json" => output::json::print(&result, args.audit)?,
        _ => output::table::print(
            &result,
            output::table::TableOptions {
                defects_only: args.defects_only,
                verbose: args.verbose,
                audit: args.audit,
            },
        )?,
    }

    Ok(())
}
