//! Loading a listing from whatever the user points at: a compiled binary or
//! a previously persisted baseline.

use std::path::Path;

use apicheck_metadata::Module;
use apicheck_model::ApiListing;
use tracing::debug;

use crate::error::ReadError;
use crate::filter::{is_excluded, ExclusionFilter, FilterSubject};
use crate::reader::read_module;

/// Read a listing from a file holding either a CLI binary or baseline JSON.
pub fn read_path(
    path: &Path,
    filters: &[Box<dyn ExclusionFilter>],
) -> Result<ApiListing, ReadError> {
    let bytes = std::fs::read(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = bytes.len(), "loaded input");
    read_bytes(&bytes, filters)
}

/// Like [`read_path`], for contents already in memory.
///
/// Filters apply to baselines too, so a listing persisted without filters
/// can still be narrowed at comparison time.
pub fn read_bytes(
    bytes: &[u8],
    filters: &[Box<dyn ExclusionFilter>],
) -> Result<ApiListing, ReadError> {
    if apicheck_model::looks_like_baseline(bytes) {
        let text = String::from_utf8_lossy(bytes);
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        let listing = ApiListing::from_json_str(text)?;
        return Ok(apply_filters(listing, filters));
    }
    let module = Module::parse(bytes)?;
    read_module(&module, filters)
}

fn apply_filters(mut listing: ApiListing, filters: &[Box<dyn ExclusionFilter>]) -> ApiListing {
    if filters.is_empty() {
        return listing;
    }
    listing
        .types
        .retain(|ty| !is_excluded(filters, &FilterSubject::Type(ty)));
    for ty in &mut listing.types {
        let owner = ty.clone();
        ty.members.retain(|member| {
            !is_excluded(
                filters,
                &FilterSubject::Member {
                    owner: &owner,
                    member,
                },
            )
        });
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::NamespaceFilter;
    use apicheck_metadata::MetadataError;
    use apicheck_model::{MemberDescriptor, TypeDescriptor};

    fn listing() -> ApiListing {
        let mut listing = ApiListing::new("Widgets");
        for name in ["Company.Widget", "Company.Internal.Cache"] {
            listing.types.push(TypeDescriptor {
                name: name.to_string(),
                members: vec![MemberDescriptor {
                    name: "Run()".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            });
        }
        listing
    }

    #[test]
    fn test_baseline_json_is_detected() {
        let json = listing().to_json_string().unwrap();
        let read = read_bytes(json.as_bytes(), &[]).unwrap();
        assert_eq!(read, listing());
    }

    #[test]
    fn test_filters_apply_to_baselines() {
        let json = format!("\u{feff}{}", listing().to_json_string().unwrap());
        let filters: Vec<Box<dyn ExclusionFilter>> =
            vec![Box::new(NamespaceFilter::new(["Company.Internal"]))];
        let read = read_bytes(json.as_bytes(), &filters).unwrap();
        assert_eq!(read.types.len(), 1);
        assert_eq!(read.types[0].name, "Company.Widget");
        assert_eq!(read.types[0].members.len(), 1);
    }

    #[test]
    fn test_binary_garbage_is_a_metadata_error() {
        let err = read_bytes(b"not an image", &[]).unwrap_err();
        assert!(matches!(err, ReadError::Metadata(MetadataError::InvalidImage(_))));
    }
}
