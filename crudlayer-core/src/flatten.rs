//! Flattening of nested documents into dot-path documents.
//!
//! Document stores address nested fields with dot-joined paths (`"a.b.c"`). A
//! modification set such as `{ books: { x: [3, 4] } }` has to be sent as
//! `{ "books.x": [3, 4] }` so that only that leaf is overwritten and its siblings
//! (`books.y`, ...) survive. [`flatten`] performs that conversion.
//!
//! A *leaf* is any value that is not a document: scalars, `null`, `undefined`,
//! object ids, dates and arrays. Arrays are assigned wholesale and are never
//! exploded into indexed keys.
//!
//! # Limitations
//!
//! An empty nested document has no leaves, so it contributes nothing to the output.
//! Setting a field to `{}` therefore cannot be expressed through a flattened patch.
//! Keys that already contain the separator are not escaped.

use bson::{Bson, Document};

/// Separator placed between path segments.
pub const PATH_SEPARATOR: char = '.';

/// Flattens a nested document into a document keyed by dot-joined paths.
///
/// Already-flat input comes back unchanged, which makes the operation idempotent.
///
/// # Example
///
/// ```
/// use bson::doc;
/// use crudlayer_core::flatten::flatten;
///
/// let flat = flatten(&doc! { "a": { "b": { "c": 1 } }, "d": [1, 2] });
/// assert_eq!(flat, doc! { "a.b.c": 1, "d": [1, 2] });
/// ```
pub fn flatten(document: &Document) -> Document {
    let mut output = Document::new();
    flatten_into(&mut output, None, document);
    output
}

/// Flattens an optional filter. An absent filter means "no constraint".
pub fn flatten_filter(filter: Option<&Document>) -> Document {
    filter.map(flatten).unwrap_or_default()
}

fn flatten_into(output: &mut Document, prefix: Option<&str>, document: &Document) {
    for (key, value) in document {
        let path = match prefix {
            Some(prefix) => format!("{prefix}{PATH_SEPARATOR}{key}"),
            None => key.clone(),
        };

        match value {
            Bson::Document(nested) => flatten_into(output, Some(&path), nested),
            leaf => {
                output.insert(path, leaf.clone());
            }
        }
    }
}

/// Merges automatically populated fields underneath caller-supplied fields.
///
/// Fields from `input` win. An `undefined` value in `input` does not displace an
/// automatic field, matching deep-merge semantics where undefined means "not given".
pub fn merge_auto_fields(auto: Document, input: Document) -> Document {
    let mut merged = auto;

    for (key, value) in input {
        if matches!(value, Bson::Undefined) && merged.contains_key(&key) {
            continue;
        }

        let value = match (merged.get_mut(&key), value) {
            (Some(Bson::Document(existing)), Bson::Document(incoming)) => {
                let combined = merge_auto_fields(std::mem::take(existing), incoming);
                *existing = combined;
                continue;
            }
            (_, value) => value,
        };

        merged.insert(key, value);
    }

    merged
}
