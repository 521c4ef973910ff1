//! Query construction for listing records.
//!
//! The listing operation of a [`CrudService`](crate::service::CrudService) accepts
//! a plain filter document. That document is flattened into dot-path equality
//! constraints and turned into an [`Expr`]. Backends translate expressions into
//! their native form through a [`QueryVisitor`].
//!
//! ```ignore
//! use crudlayer::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("name", "brian").and(Filter::eq("address.city", "Izmir")))
//!     .sort("surname", SortDirection::Asc)
//!     .limit(10)
//!     .build();
//! ```

use bson::{Bson, Document};

use crate::{error::CrudError, flatten::flatten_filter};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// Dot-path of the field to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// A filter expression over records.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// All expressions must match. An empty list matches everything.
    And(Vec<Expr>),
    /// The value at `path` equals `value`.
    ///
    /// When the path resolves to an array, the expression also matches if any
    /// element equals `value`.
    Eq {
        /// Dot-path of the field to compare.
        path: String,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Combines this expression with another using logical AND.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Builds an expression from a filter document.
    ///
    /// The filter is flattened first, so `{ b: { c: "emre" } }` constrains the path
    /// `b.c`. Returns `None` when the filter is absent or has no leaves.
    pub fn from_filter(filter: Option<&Document>) -> Option<Self> {
        let constraints = flatten_filter(filter);

        if constraints.is_empty() {
            return None;
        }

        Some(Filter::and(
            constraints
                .into_iter()
                .map(|(path, value)| Filter::eq(path, value)),
        ))
    }
}

/// Helper for constructing filter expressions.
pub struct Filter;

impl Filter {
    /// Matches records whose value at `path` equals `value`.
    pub fn eq(path: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::Eq {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Matches records that satisfy every expression.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }
}

/// A structured query: filter, sort and paging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression. `None` selects every record.
    pub filter: Option<Expr>,
    /// Maximum number of records to return.
    pub limit: Option<usize>,
    /// Number of records to skip.
    pub offset: Option<usize>,
    /// Sort specification.
    pub sort: Option<Sort>,
}

impl Query {
    /// Creates an empty query that selects every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query from a filter document.
    pub fn from_filter(filter: Option<&Document>) -> Self {
        Query {
            filter: Expr::from_filter(filter),
            ..Query::default()
        }
    }

    /// Creates a new query builder.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Fluent builder for [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the filter from a document, flattening it into path constraints.
    pub fn filter_document(mut self, filter: &Document) -> Self {
        self.query.filter = Expr::from_filter(Some(filter));
        self
    }

    /// Sets the maximum number of records to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of records to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Sets the sort specification.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort { field: field.into(), direction });
        self
    }

    /// Builds the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Visitor used by backends to evaluate or translate expressions.
pub trait QueryVisitor {
    type Output;
    type Error: Into<CrudError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_eq(&mut self, path: &str, value: &Bson) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Eq { path, value } => self.visit_eq(path, value),
        }
    }
}
