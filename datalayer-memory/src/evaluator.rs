//! Predicate evaluation for in-memory record filtering.
//!
//! This module provides the structured-predicate filter generator and the evaluation
//! engine behind it.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime};
use regex::Regex;

use datalayer_core::{
    error::{DataServiceError, DataServiceResult},
    filter::{FilterGenerator, RecordFilter, match_all, match_any},
    query::{DisjunctiveIdQueryBuilder, IdQueryBuilder, Query},
    record::Record,
};

use crate::predicate::{Expr, FieldOp, QueryVisitor};

/// Type-erased, comparable representation of BSON values.
///
/// Integers keep their exact value, doubles stay f64, ObjectIds use their hex form and
/// compare equal to that hex string.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(String),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Values with no comparison semantics; never equal to anything.
    Opaque,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Integer(i64::from(*value)),
            Bson::Int64(value) => Comparable::Integer(*value),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(value.to_hex()),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Opaque,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Integer(a), Comparable::Integer(b)) => a == b,
            (Comparable::Integer(a), Comparable::Number(b))
            | (Comparable::Number(b), Comparable::Integer(a)) => *a as f64 == *b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::String(b))
            | (Comparable::String(b), Comparable::ObjectId(a)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Integer(a), Comparable::Integer(b)) => a.partial_cmp(b),
            (Comparable::Integer(a), Comparable::Number(b)) => (*a as f64).partial_cmp(b),
            (Comparable::Number(a), Comparable::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path (`meta.tags.0`) inside a document.
fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Equality with array semantics: an array field matches a scalar it contains.
fn equals(field_value: &Comparable<'_>, value: &Comparable<'_>) -> bool {
    if field_value == value {
        return true;
    }

    match field_value {
        Comparable::Array(items) => items.iter().any(|item| item == value),
        _ => false,
    }
}

pub(crate) struct RecordEvaluator<'a> {
    record: &'a Record,
}

impl<'a> RecordEvaluator<'a> {
    pub fn new(record: &'a Record) -> Self {
        Self { record }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DataServiceResult<bool> {
        self.visit_expr(expr)
    }

    fn field(&self, field: &str) -> Option<&'a Bson> {
        lookup(self.record.as_document(), field)
    }
}

impl<'a> QueryVisitor for RecordEvaluator<'a> {
    type Output = bool;
    type Error = DataServiceError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_nor(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_or(exprs)?)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(self.field(field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let expected = Comparable::from(value);

        let Some(field_value) = self.field(field) else {
            // A missing field behaves like null.
            return Ok(match op {
                FieldOp::Eq => expected == Comparable::Null,
                FieldOp::Ne => expected != Comparable::Null,
                FieldOp::AnyOf => matches!(&expected, Comparable::Array(values) if values.contains(&Comparable::Null)),
                FieldOp::NoneOf => !matches!(&expected, Comparable::Array(values) if values.contains(&Comparable::Null)),
                _ => false,
            });
        };
        let actual = Comparable::from(field_value);

        match op {
            FieldOp::Eq => Ok(equals(&actual, &expected)),
            FieldOp::Ne => Ok(!equals(&actual, &expected)),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match actual.partial_cmp(&expected) {
                    Some(ordering) => Ok(match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering == Ordering::Greater || ordering == Ordering::Equal,
                        FieldOp::Lt => ordering == Ordering::Less,
                        FieldOp::Lte => ordering == Ordering::Less || ordering == Ordering::Equal,
                        _ => unreachable!(),
                    }),
                    None => Ok(false),
                }
            },
            FieldOp::AnyOf => match expected {
                Comparable::Array(values) => Ok(
                    values
                        .iter()
                        .any(|value| equals(&actual, value))
                ),
                _ => Ok(false),
            },
            FieldOp::NoneOf => match expected {
                Comparable::Array(values) => Ok(
                    !values
                        .iter()
                        .any(|value| equals(&actual, value))
                ),
                _ => Ok(true),
            },
        }
    }

    fn visit_matches(&mut self, field: &str, pattern: &Regex) -> Result<Self::Output, Self::Error> {
        Ok(match self.field(field) {
            Some(Bson::String(value)) => pattern.is_match(value),
            Some(Bson::Array(items)) => items.iter().any(|item| match item {
                Bson::String(value) => pattern.is_match(value),
                _ => false,
            }),
            _ => false,
        })
    }
}

/// Structured-predicate filter generator.
///
/// Predicates support nested `$and`/`$or`/`$nor`, field equality, comparison and
/// membership operators, and regular expressions (see [`crate::predicate`]). Raw
/// identifiers are first expanded into `{ "$or": [{ "_id": id }, { "id": id }] }` so plain
/// id lookups still resolve.
///
/// # Example
///
/// ```ignore
/// use datalayer_memory::StructuredFilterGenerator;
/// use datalayer_core::filter::FilterGenerator;
/// use bson::doc;
///
/// let filter = StructuredFilterGenerator.compile(&doc! { "msg": { "$regex": "hel" } }.into())?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredFilterGenerator;

impl FilterGenerator for StructuredFilterGenerator {
    fn compile(&self, query: &Query) -> DataServiceResult<RecordFilter> {
        match query {
            Query::All => Ok(match_all()),
            Query::Id(_) => self.compile(&DisjunctiveIdQueryBuilder.build_id_query(query.clone())),
            Query::List(queries) => Ok(match_any(
                queries
                    .iter()
                    .map(|query| self.compile(query))
                    .collect::<DataServiceResult<Vec<_>>>()?,
            )),
            Query::Predicate(predicate) => {
                let expr = Expr::parse(predicate)?;

                Ok(Box::new(move |record: &Record| {
                    RecordEvaluator::new(record)
                        .evaluate(&expr)
                        .unwrap_or(false)
                }))
            }
        }
    }
}
