//! Drive `files.list` query construction

use crate::drive::FOLDER_MIME_TYPE;
use pfind_core::{ChildQuery, EntryKind, NameFilter};

/// Escape a value for use inside single quotes in a Drive query.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Render a [`ChildQuery`] as a Drive search expression.
///
/// Prefix filters become `name contains`, which is broader than a prefix
/// match; listings are filtered again with [`ChildQuery::matches`].
pub fn drive_query(query: &ChildQuery) -> String {
    let mut clauses = vec![format!(
        "'{}' in parents",
        escape_query_value(query.parent.as_str())
    )];

    match &query.name {
        Some(NameFilter::Exact(name)) => {
            clauses.push(format!("name = '{}'", escape_query_value(name)));
        }
        Some(NameFilter::Prefix(prefix)) => {
            clauses.push(format!("name contains '{}'", escape_query_value(prefix)));
        }
        None => {}
    }

    match query.kind {
        Some(EntryKind::Container) => {
            clauses.push(format!("mimeType = '{}'", FOLDER_MIME_TYPE));
        }
        Some(EntryKind::Artifact) => {
            clauses.push(format!("mimeType != '{}'", FOLDER_MIME_TYPE));
        }
        None => {}
    }

    if !query.include_deleted {
        clauses.push("trashed = false".to_string());
    }

    clauses.join(" and ")
}
