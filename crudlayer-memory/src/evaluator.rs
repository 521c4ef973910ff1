//! Query expression evaluation for in-memory record filtering.
//!
//! Paths are resolved the way a document database resolves them: segments walk
//! into nested documents, numeric segments index into arrays, and a non-numeric
//! segment applied to an array fans out over the array's document elements.

use std::cmp::Ordering;
use bson::{Binary, Bson, Document, Timestamp, datetime::DateTime, oid::ObjectId};

use crudlayer_core::{
    error::CrudError,
    flatten::PATH_SEPARATOR,
    query::{Expr, QueryVisitor},
    record::Record,
};

/// 2^63 as a double; every double below it (and at or above its negation)
/// truncates to a representable `i64`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;


/// Comparable view of a BSON value.
///
/// Values order the way document stores order them: first by type class
/// (min key, null, numbers, strings, documents, arrays, binary, object ids,
/// booleans, dates, timestamps, other, max key), then by value. Integers of
/// either width and doubles form one numeric class and compare exactly. NaN
/// sorts below every other number.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    MinKey,
    Null,
    Int(i64),
    Double(f64),
    String(&'a str),
    Map(Vec<(&'a str, Comparable<'a>)>),
    Array(Vec<Comparable<'a>>),
    Binary(&'a Binary),
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime),
    Timestamp(Timestamp),
    Other(&'a Bson),
    MaxKey,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::MinKey => Comparable::MinKey,
            Bson::MaxKey => Comparable::MaxKey,
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::String(value) | Bson::Symbol(value) => Comparable::String(value),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<Vec<_>>()
            ),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Binary(value) => Comparable::Binary(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::Timestamp(value) => Comparable::Timestamp(*value),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> Comparable<'a> {
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::MinKey => 0,
            Comparable::Null => 1,
            Comparable::Int(_) | Comparable::Double(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Binary(_) => 6,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
            Comparable::Timestamp(_) => 10,
            Comparable::Other(_) => 11,
            Comparable::MaxKey => 12,
        }
    }
}

fn cmp_doubles(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Compares an integer with a double without rounding either.
fn cmp_int_double(int: i64, double: f64) -> Ordering {
    if double.is_nan() {
        return Ordering::Greater;
    }
    if double >= I64_BOUND {
        return Ordering::Less;
    }
    if double < -I64_BOUND {
        return Ordering::Greater;
    }

    let whole = double.trunc();
    match int.cmp(&(whole as i64)) {
        Ordering::Equal => cmp_doubles(0.0, double - whole),
        unequal => unequal,
    }
}

fn cmp_binaries(a: &Binary, b: &Binary) -> Ordering {
    a.bytes
        .len()
        .cmp(&b.bytes.len())
        .then_with(|| u8::from(a.subtype).cmp(&u8::from(b.subtype)))
        .then_with(|| a.bytes.cmp(&b.bytes))
}

impl<'a> Ord for Comparable<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Int(a), Comparable::Int(b)) => a.cmp(b),
            (Comparable::Double(a), Comparable::Double(b)) => cmp_doubles(*a, *b),
            (Comparable::Int(a), Comparable::Double(b)) => cmp_int_double(*a, *b),
            (Comparable::Double(a), Comparable::Int(b)) => cmp_int_double(*b, *a).reverse(),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            // Embedded documents compare field by field, in field order.
            (Comparable::Map(a), Comparable::Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ordering = va
                        .type_rank()
                        .cmp(&vb.type_rank())
                        .then_with(|| ka.cmp(kb))
                        .then_with(|| va.cmp(vb));
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Comparable::Array(a), Comparable::Array(b)) => a.cmp(b),
            (Comparable::Binary(a), Comparable::Binary(b)) => cmp_binaries(a, b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.cmp(b),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            (Comparable::Timestamp(a), Comparable::Timestamp(b)) => {
                (a.time, a.increment).cmp(&(b.time, b.increment))
            }
            (Comparable::Other(a), Comparable::Other(b)) => (a.element_type() as u8)
                .cmp(&(b.element_type() as u8))
                .then_with(|| format!("{a:?}").cmp(&format!("{b:?}"))),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<'a> Eq for Comparable<'a> {}

/// Collects every value reachable from `document` by the dot-path `path`.
pub(crate) fn resolve_path<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments = path.split(PATH_SEPARATOR).collect::<Vec<_>>();
    let mut found = Vec::new();

    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = document.get(*head) {
            collect(value, rest, &mut found);
        }
    }

    found
}

fn collect<'a>(value: &'a Bson, segments: &[&str], found: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segments.split_first() else {
        found.push(value);
        return;
    };

    match value {
        Bson::Document(doc) => {
            if let Some(child) = doc.get(*head) {
                collect(child, rest, found);
            }
        }
        Bson::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                if let Some(item) = items.get(index) {
                    collect(item, rest, found);
                }
            }
            for item in items {
                if let Bson::Document(_) = item {
                    collect(item, segments, found);
                }
            }
        }
        _ => {}
    }
}

/// Value used when sorting by `path`: the first resolved value, or null.
pub(crate) fn sort_key<'a>(document: &'a Document, path: &str) -> Comparable<'a> {
    resolve_path(document, path)
        .first()
        .map(|value| Comparable::from(*value))
        .unwrap_or(Comparable::Null)
}


pub(crate) struct RecordEvaluator<'a> {
    record: &'a Record,
}

impl<'a> RecordEvaluator<'a> {
    pub fn new(record: &'a Record) -> Self {
        Self { record }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<bool, CrudError> {
        self.visit_expr(expr)
    }

    pub fn filter_records(
        records: impl IntoIterator<Item = &'a Record>,
        expr: &Expr,
    ) -> Result<Vec<Record>, CrudError> {
        let mut matched = Vec::new();

        for record in records {
            if RecordEvaluator::new(record).evaluate(expr)? {
                matched.push(record.clone());
            }
        }

        Ok(matched)
    }
}

impl<'a> QueryVisitor for RecordEvaluator<'a> {
    type Output = bool;
    type Error = CrudError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_eq(&mut self, path: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        let expected = Comparable::from(value);
        let candidates = resolve_path(self.record, path);

        // A null constraint also matches a missing field.
        if candidates.is_empty() {
            return Ok(expected == Comparable::Null);
        }

        Ok(candidates.into_iter().any(|candidate| {
            let actual = Comparable::from(candidate);

            match &actual {
                Comparable::Array(items) if actual != expected => {
                    items.iter().any(|item| item == &expected)
                }
                _ => actual == expected,
            }
        }))
    }
}
