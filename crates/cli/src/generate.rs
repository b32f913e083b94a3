use std::path::Path;
use std::process;

use apicheck_model::write_baseline;
use apicheck_reader::read_path;

use crate::config::Config;
use crate::{report_error, FilterArgs, OutputFormat, EXIT_ERROR};

pub(crate) fn cmd_generate(
    input: &Path,
    out: Option<&Path>,
    config: &Config,
    filter_args: &FilterArgs,
    output: OutputFormat,
    quiet: bool,
) {
    let filters = config.filters(&filter_args.exclude_namespaces, &filter_args.exclude_types);
    let listing = match read_path(input, &filters) {
        Ok(listing) => listing,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(EXIT_ERROR);
        }
    };

    let Some(out) = out else {
        match listing.to_json_string() {
            Ok(json) => print!("{}", json),
            Err(e) => {
                report_error(&e.to_string(), output, quiet);
                process::exit(EXIT_ERROR);
            }
        }
        return;
    };

    if let Err(e) = write_baseline(out, &listing) {
        report_error(&e.to_string(), output, quiet);
        process::exit(EXIT_ERROR);
    }
    tracing::info!(path = %out.display(), types = listing.types.len(), "wrote baseline");

    if !quiet {
        match output {
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({
                    "assembly": listing.assembly_identity,
                    "baseline": out.display().to_string(),
                    "members": listing.member_count(),
                    "types": listing.types.len(),
                })
            ),
            OutputFormat::Text => println!(
                "Wrote {} type(s), {} member(s) of {} to {}",
                listing.types.len(),
                listing.member_count(),
                listing.assembly_identity,
                out.display()
            ),
        }
    }
}
