//! Breaking-change records and the report that collects them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kinds::ChangeKind;

/// One difference between two listings that can break existing consumers.
///
/// Items are canonical identity strings. `new_item` is absent when the
/// element was removed; `type_id` names the owning old type for member-level
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BreakingChange {
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_item: Option<String>,
}

/// The ordered result of one comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub changes: Vec<BreakingChange>,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BreakingChange> {
        self.changes.iter()
    }

    /// Number of changes per category.
    pub fn summary(&self) -> BTreeMap<ChangeKind, usize> {
        let mut counts = BTreeMap::new();
        for change in &self.changes {
            *counts.entry(change.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_json(&self) -> Value {
        let summary: serde_json::Map<String, Value> = self
            .summary()
            .into_iter()
            .map(|(kind, count)| (kind.name().to_string(), Value::from(count)))
            .collect();
        serde_json::json!({
            "breaking": !self.is_empty(),
            "changes": self.changes,
            "summary": summary,
        })
    }

    /// Human-readable rendering, one line per change plus indented detail.
    pub fn to_text(&self) -> String {
        if self.is_empty() {
            return "No breaking changes.".to_string();
        }

        let mut lines = vec![format!("BREAKING: {} change(s)", self.len())];
        for change in &self.changes {
            let old = change.old_item.as_deref().unwrap_or("<none>");
            match &change.new_item {
                Some(new) if change.kind != ChangeKind::Removed => {
                    lines.push(format!("~ {}: {}", change.kind, old));
                    lines.push(format!("    now: {}", new));
                }
                _ => lines.push(format!("- {}: {}", change.kind, old)),
            }
            if let Some(type_id) = &change.type_id {
                lines.push(format!("    in: {}", type_id));
            }
        }

        let counts: Vec<String> = self
            .summary()
            .into_iter()
            .map(|(kind, count)| format!("{} {}", count, kind))
            .collect();
        lines.push(format!("Summary: {}", counts.join(", ")));
        lines.join("\n")
    }
}

impl<'a> IntoIterator for &'a ChangeReport {
    type Item = &'a BreakingChange;
    type IntoIter = std::slice::Iter<'a, BreakingChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ChangeReport {
        ChangeReport {
            changes: vec![
                BreakingChange {
                    kind: ChangeKind::Removed,
                    type_id: None,
                    old_item: Some("public class C.Gone".to_string()),
                    new_item: None,
                },
                BreakingChange {
                    kind: ChangeKind::ParametersChanged,
                    type_id: Some("public class C.Widget".to_string()),
                    old_item: Some("public System.Void M()".to_string()),
                    new_item: Some("public System.Void M(System.Int32 p)".to_string()),
                },
            ],
        }
    }

    #[test]
    fn test_text_rendering() {
        let text = report().to_text();
        assert!(text.starts_with("BREAKING: 2 change(s)"));
        assert!(text.contains("- removed: public class C.Gone"));
        assert!(text.contains("~ parameters: public System.Void M()\n    now: public System.Void M(System.Int32 p)\n    in: public class C.Widget"));
        assert!(text.ends_with("Summary: 1 removed, 1 parameters"));
        assert_eq!(ChangeReport::default().to_text(), "No breaking changes.");
    }

    #[test]
    fn test_json_rendering() {
        let json = report().to_json();
        assert_eq!(json["breaking"], true);
        assert_eq!(json["summary"]["removed"], 1);
        assert_eq!(json["changes"][0]["Kind"], "Removed");
        assert!(json["changes"][0].get("NewItem").is_none());
        assert_eq!(json["changes"][1]["TypeId"], "public class C.Widget");
    }
}
