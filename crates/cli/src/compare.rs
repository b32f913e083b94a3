use std::path::Path;

use apicheck_compare::{
    BaselineComparer, ChangeKinds, ChangeReport, CorrelationData, ExceptionEntry, ExceptionList,
};
use apicheck_model::ApiListing;
use apicheck_reader::{read_path, ExclusionFilter};

use crate::config::Config;
use crate::{report_error, FilterArgs, OutputFormat, EXIT_BREAKING, EXIT_ERROR};

pub(crate) struct CompareOptions<'a> {
    pub old: &'a Path,
    pub new: &'a Path,
    pub kinds: Option<&'a str>,
    pub exceptions: Option<&'a Path>,
    pub renames: &'a [String],
    pub write_exceptions: Option<&'a Path>,
    pub filters: &'a FilterArgs,
    pub config: &'a Config,
    pub output: OutputFormat,
    pub quiet: bool,
}

/// Run the comparison and return the process exit code.
pub(crate) fn cmd_compare(options: CompareOptions<'_>) -> i32 {
    match run(&options) {
        Ok(report) => {
            if !options.quiet {
                match options.output {
                    OutputFormat::Json => println!(
                        "{}",
                        serde_json::to_string_pretty(&report.to_json())
                            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
                    ),
                    OutputFormat::Text => println!("{}", report.to_text()),
                }
            }
            if report.is_empty() {
                0
            } else {
                EXIT_BREAKING
            }
        }
        Err(msg) => {
            report_error(&msg, options.output, options.quiet);
            EXIT_ERROR
        }
    }
}

fn run(options: &CompareOptions<'_>) -> Result<ChangeReport, String> {
    let config = options.config;

    let kinds = match options.kinds {
        Some(list) => list.parse::<ChangeKinds>().map_err(|e| e.to_string())?,
        None => match &config.compare.kinds {
            Some(names) => ChangeKinds::from_names(names).map_err(|e| e.to_string())?,
            None => ChangeKinds::all(),
        },
    };

    let mut data = CorrelationData {
        renames: config.renames.clone(),
    };
    for rename in options.renames {
        let Some((old, new)) = rename.split_once('=') else {
            return Err(format!("invalid --rename '{}': expected OLD=NEW", rename));
        };
        data.renames
            .insert(old.trim().to_string(), new.trim().to_string());
    }

    let exceptions_path = options
        .exceptions
        .or(config.compare.exceptions.as_deref());
    let exceptions = match exceptions_path {
        Some(path) => ExceptionList::load(path).map_err(|e| e.to_string())?,
        None => ExceptionList::default(),
    };

    let filters = config.filters(
        &options.filters.exclude_namespaces,
        &options.filters.exclude_types,
    );
    let old = load(options.old, &filters)?;
    let new = load(options.new, &filters)?;

    let report = BaselineComparer::new()
        .with_kinds(kinds)
        .with_correlation_data(data)
        .with_exception(exceptions)
        .compare(&old, &new);

    if let Some(path) = options.write_exceptions {
        let accepted = ExceptionList {
            entries: report.iter().map(ExceptionEntry::for_change).collect(),
        };
        let json = serde_json::to_string_pretty(&accepted).map_err(|e| e.to_string())?;
        std::fs::write(path, json + "\n")
            .map_err(|e| format!("could not write '{}': {}", path.display(), e))?;
        tracing::info!(path = %path.display(), entries = accepted.entries.len(), "wrote exception list");
    }

    Ok(report)
}

fn load(path: &Path, filters: &[Box<dyn ExclusionFilter>]) -> Result<ApiListing, String> {
    read_path(path, filters).map_err(|e| e.to_string())
}
