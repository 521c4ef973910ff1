//! Application of path-addressed `$set` updates to in-memory records.

use bson::{Bson, Document};

use crudlayer_core::{
    backend::UpdateSpec,
    error::{CrudError, CrudResult},
    flatten::PATH_SEPARATOR,
    record::{ID_FIELD, Record},
};

/// Most null elements a single array assignment may append, as in MongoDB.
pub(crate) const MAX_ARRAY_PADDING: usize = 1_500_000;

/// Applies every path of `update` to a copy of `record` and returns the copy.
///
/// Either all paths are applied or the original record is left untouched and an
/// error is returned.
pub(crate) fn apply_update(record: &Record, update: &UpdateSpec) -> CrudResult<Record> {
    let mut updated = record.clone();

    for (path, value) in &update.set {
        set_path(&mut updated, path, value.clone())?;
    }

    Ok(updated)
}

/// Sets the value at a dot-path, creating intermediate documents as needed.
///
/// # Errors
///
/// Returns [`CrudError::InvalidDocument`] when the path has an empty segment,
/// passes through a scalar, uses a non-numeric segment on an array, or would
/// change the record's `_id`.
pub(crate) fn set_path(record: &mut Document, path: &str, value: Bson) -> CrudResult<()> {
    let segments = path.split(PATH_SEPARATOR).collect::<Vec<_>>();

    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(CrudError::InvalidDocument(format!("empty segment in update path '{path}'")));
    }

    if segments[0] == ID_FIELD {
        if segments.len() == 1 && record.get(ID_FIELD) == Some(&value) {
            return Ok(());
        }
        return Err(CrudError::InvalidDocument(format!(
            "update path '{path}' would modify the immutable field '{ID_FIELD}'"
        )));
    }

    set_in_document(record, &segments, value)
}

fn set_in_document(document: &mut Document, segments: &[&str], value: Bson) -> CrudResult<()> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(());
    };

    if rest.is_empty() {
        document.insert(*head, value);
        return Ok(());
    }

    match document.get_mut(*head) {
        None => {
            let mut child = Document::new();
            set_in_document(&mut child, rest, value)?;
            document.insert(*head, child);
            Ok(())
        }
        Some(Bson::Document(child)) => set_in_document(child, rest, value),
        Some(Bson::Array(items)) => set_in_array(items, rest, value),
        Some(other) => Err(CrudError::InvalidDocument(format!(
            "cannot create field '{}' in element {{{head}: {other}}}",
            rest[0]
        ))),
    }
}

fn set_in_array(items: &mut Vec<Bson>, segments: &[&str], value: Bson) -> CrudResult<()> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(());
    };

    let index = head.parse::<usize>().map_err(|_| {
        CrudError::InvalidDocument(format!("cannot create field '{head}' in an array"))
    })?;

    if items.len() <= index {
        let padding = index - items.len();
        let len = index
            .checked_add(1)
            .filter(|_| padding <= MAX_ARRAY_PADDING)
            .ok_or_else(|| CrudError::InvalidDocument(format!(
                "index {index} would pad the array by more than {MAX_ARRAY_PADDING} elements"
            )))?;
        items.resize(len, Bson::Null);
    }

    if rest.is_empty() {
        items[index] = value;
        return Ok(());
    }

    match &mut items[index] {
        Bson::Document(child) => set_in_document(child, rest, value),
        Bson::Array(nested) => set_in_array(nested, rest, value),
        slot @ Bson::Null => {
            let mut child = Document::new();
            set_in_document(&mut child, rest, value)?;
            *slot = Bson::Document(child);
            Ok(())
        }
        other => Err(CrudError::InvalidDocument(format!(
            "cannot create field '{}' in element {other}",
            rest[0]
        ))),
    }
}
