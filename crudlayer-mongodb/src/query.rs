//! Query translation from crudlayer expressions to MongoDB filter documents.

use bson::{Bson, Document, doc};

use crudlayer_core::{
    error::CrudError,
    query::{Expr, QueryVisitor},
};


/// Translates query expressions into MongoDB's native filter syntax.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional expression; `None` matches every document.
    pub(crate) fn translate(expr: Option<&Expr>) -> Result<Document, CrudError> {
        match expr {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = CrudError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        // `$and` must be a non-empty array.
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_eq(&mut self, path: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            path: { "$eq": value },
        })
    }
}
