use std::path::Path;
use std::process;

use apicheck_reader::read_path;

use crate::config::Config;
use crate::{report_error, FilterArgs, OutputFormat, EXIT_ERROR};

pub(crate) fn cmd_show(
    input: &Path,
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

    match output {
        OutputFormat::Json => {
            let types: Vec<serde_json::Value> = listing
                .types
                .iter()
                .map(|ty| {
                    let members: Vec<String> = ty.members.iter().map(|m| m.id()).collect();
                    serde_json::json!({ "id": ty.id(), "members": members })
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "assembly": listing.assembly_identity,
                    "types": types,
                })
            );
        }
        OutputFormat::Text => {
            println!("{}", listing.assembly_identity);
            for ty in &listing.types {
                println!();
                println!("{}", ty.id());
                if let Some(base) = &ty.base_type {
                    println!("  : {}", base);
                }
                for interface in &ty.implemented_interfaces {
                    println!("  : {}", interface);
                }
                for member in &ty.members {
                    println!("    {}", member.id());
                }
            }
        }
    }
}
