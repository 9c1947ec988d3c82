//! Structured predicate parsing.
//!
//! Predicate objects are BSON documents in the familiar document-database shape:
//!
//! ```ignore
//! use bson::doc;
//!
//! // Implicit AND of field clauses
//! doc! { "status": "active", "age": { "$gte": 18 } };
//!
//! // Boolean combinators
//! doc! { "$or": [{ "_id": "a" }, { "id": "a" }] };
//!
//! // Pattern matching
//! doc! { "msg": { "$regex": "^hel", "$options": "i" } };
//! ```
//!
//! [`Expr::parse`] validates a predicate once and turns it into an expression tree, which
//! is then evaluated per record through a [`QueryVisitor`].
//!
//! Supported operators:
//!
//! - Logical: `$and`, `$or`, `$nor` (top level), `$not` (field level)
//! - Comparison: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`
//! - Membership: `$in`, `$nin`
//! - Existence: `$exists`
//! - Pattern: `$regex` with `$options`, or a BSON regular expression value

use bson::{Bson, Document};
use regex::{Regex, RegexBuilder};

use datalayer_core::error::{DataServiceError, DataServiceResult};

/// Field comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to. Array fields match when any element is equal.
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Field value (or any element of an array field) is one of the values.
    AnyOf,
    /// Field value (and every element of an array field) is none of the values.
    NoneOf,
}

impl FieldOp {
    fn from_operator(operator: &str) -> Option<Self> {
        Some(match operator {
            "$eq" => FieldOp::Eq,
            "$ne" => FieldOp::Ne,
            "$gt" => FieldOp::Gt,
            "$gte" => FieldOp::Gte,
            "$lt" => FieldOp::Lt,
            "$lte" => FieldOp::Lte,
            "$in" => FieldOp::AnyOf,
            "$nin" => FieldOp::NoneOf,
            _ => return None,
        })
    }
}

/// A parsed predicate expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOR of multiple expressions (none may match).
    Nor(Vec<Expr>),
    /// Logical NOT of an expression.
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// Dotted path of the field to compare.
        field: String,
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
    /// Regular expression test against a string field.
    Matches {
        field: String,
        pattern: Regex,
    },
}

impl Expr {
    /// Parses a predicate document into an expression.
    ///
    /// # Errors
    ///
    /// Returns [`DataServiceError::UnsupportedQuery`] for unknown operators and
    /// [`DataServiceError::InvalidQuery`] for malformed clauses or patterns.
    pub fn parse(predicate: &Document) -> DataServiceResult<Expr> {
        let mut clauses = Vec::with_capacity(predicate.len());

        for (key, value) in predicate {
            clauses.push(match key.as_str() {
                "$and" => Expr::And(parse_clauses(key, value)?),
                "$or" => Expr::Or(parse_clauses(key, value)?),
                "$nor" => Expr::Nor(parse_clauses(key, value)?),
                operator if operator.starts_with('$') => {
                    return Err(DataServiceError::UnsupportedQuery(format!(
                        "unknown top-level operator {operator}"
                    )));
                }
                field => parse_field(field, value)?,
            });
        }

        Ok(match clauses.len() {
            1 => clauses.remove(0),
            _ => Expr::And(clauses),
        })
    }
}

fn parse_clauses(operator: &str, value: &Bson) -> DataServiceResult<Vec<Expr>> {
    let Bson::Array(items) = value else {
        return Err(DataServiceError::InvalidQuery(format!(
            "{operator} expects an array of predicates"
        )));
    };

    items
        .iter()
        .map(|item| match item {
            Bson::Document(predicate) => Expr::parse(predicate),
            _ => Err(DataServiceError::InvalidQuery(format!(
                "{operator} expects an array of predicates"
            ))),
        })
        .collect()
}

fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

fn parse_field(field: &str, value: &Bson) -> DataServiceResult<Expr> {
    match value {
        Bson::Document(operators) if is_operator_document(operators) => {
            parse_operators(field, operators)
        }
        Bson::RegularExpression(regex) => Ok(Expr::Matches {
            field: field.to_string(),
            pattern: compile_pattern(regex.pattern.as_str(), regex.options.as_str())?,
        }),
        value => Ok(Expr::Field {
            field: field.to_string(),
            op: FieldOp::Eq,
            value: value.clone(),
        }),
    }
}

fn parse_operators(field: &str, operators: &Document) -> DataServiceResult<Expr> {
    let options = match operators.get("$options") {
        Some(Bson::String(options)) => options.as_str(),
        Some(_) => {
            return Err(DataServiceError::InvalidQuery(format!(
                "$options on {field} must be a string"
            )));
        }
        None => "",
    };

    let mut clauses = Vec::with_capacity(operators.len());

    for (operator, value) in operators {
        if let Some(op) = FieldOp::from_operator(operator) {
            if matches!(op, FieldOp::AnyOf | FieldOp::NoneOf) && !matches!(value, Bson::Array(_)) {
                return Err(DataServiceError::InvalidQuery(format!(
                    "{operator} on {field} expects an array"
                )));
            }

            clauses.push(Expr::Field {
                field: field.to_string(),
                op,
                value: value.clone(),
            });
            continue;
        }

        match operator.as_str() {
            "$options" => {}
            "$exists" => clauses.push(Expr::Exists(field.to_string(), is_truthy(value))),
            "$regex" => clauses.push(Expr::Matches {
                field: field.to_string(),
                pattern: match value {
                    Bson::String(pattern) => compile_pattern(pattern, options)?,
                    Bson::RegularExpression(regex) => compile_pattern(
                        regex.pattern.as_str(),
                        &format!("{}{}", regex.options.as_str(), options),
                    )?,
                    _ => {
                        return Err(DataServiceError::InvalidQuery(format!(
                            "$regex on {field} must be a string or regular expression"
                        )));
                    }
                },
            }),
            "$not" => clauses.push(Expr::Not(Box::new(match value {
                Bson::Document(inner) if is_operator_document(inner) => {
                    parse_operators(field, inner)?
                }
                Bson::RegularExpression(_) => parse_field(field, value)?,
                _ => {
                    return Err(DataServiceError::InvalidQuery(format!(
                        "$not on {field} expects an operator document or regular expression"
                    )));
                }
            }))),
            operator => {
                return Err(DataServiceError::UnsupportedQuery(format!(
                    "unknown operator {operator} on {field}"
                )));
            }
        }
    }

    if clauses.is_empty() {
        return Err(DataServiceError::InvalidQuery(format!(
            "$options on {field} without $regex"
        )));
    }

    Ok(match clauses.len() {
        1 => clauses.remove(0),
        _ => Expr::And(clauses),
    })
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(value) => *value,
        Bson::Int32(value) => *value != 0,
        Bson::Int64(value) => *value != 0,
        Bson::Double(value) => *value != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

fn compile_pattern(pattern: &str, options: &str) -> DataServiceResult<Regex> {
    for flag in options.chars() {
        if !matches!(flag, 'i' | 'm' | 's' | 'x' | 'u') {
            return Err(DataServiceError::InvalidQuery(format!(
                "unsupported regex option {flag:?}"
            )));
        }
    }

    RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'))
        .build()
        .map_err(|err| DataServiceError::InvalidQuery(format!("invalid pattern {pattern:?}: {err}")))
}

/// Visitor over parsed predicate expressions.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DataServiceError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_nor(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_matches(&mut self, field: &str, pattern: &Regex) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Nor(exprs) => self.visit_nor(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
            Expr::Matches { field, pattern } => self.visit_matches(field, pattern),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn single_field_is_an_equality() {
        let expr = Expr::parse(&doc! { "msg": "hello" }).unwrap();

        assert!(matches!(
            expr,
            Expr::Field { ref field, op: FieldOp::Eq, value: Bson::String(ref value) }
                if field == "msg" && value == "hello"
        ));
    }

    #[test]
    fn several_fields_are_an_and() {
        let expr = Expr::parse(&doc! { "a": 1, "b": { "$gt": 2, "$lt": 5 } }).unwrap();

        let Expr::And(clauses) = expr else { panic!("expected and") };
        assert_eq!(clauses.len(), 2);
        assert!(matches!(&clauses[1], Expr::And(inner) if inner.len() == 2));
    }

    #[test]
    fn regex_operators_take_options() {
        let expr = Expr::parse(&doc! { "msg": { "$regex": "^HEL", "$options": "i" } }).unwrap();

        let Expr::Matches { pattern, .. } = expr else { panic!("expected matches") };
        assert!(pattern.is_match("hello"));
    }

    #[test]
    fn combinators_require_arrays_of_documents() {
        assert!(matches!(
            Expr::parse(&doc! { "$or": { "a": 1 } }),
            Err(DataServiceError::InvalidQuery(_))
        ));
        assert!(matches!(
            Expr::parse(&doc! { "$or": [1, 2] }),
            Err(DataServiceError::InvalidQuery(_))
        ));
    }

    #[test]
    fn unknown_operators_are_unsupported() {
        assert!(matches!(
            Expr::parse(&doc! { "$where": "this.a == 1" }),
            Err(DataServiceError::UnsupportedQuery(_))
        ));
        assert!(matches!(
            Expr::parse(&doc! { "a": { "$near": [0, 0] } }),
            Err(DataServiceError::UnsupportedQuery(_))
        ));
    }

    #[test]
    fn malformed_operands_are_invalid() {
        assert!(matches!(
            Expr::parse(&doc! { "a": { "$in": 1 } }),
            Err(DataServiceError::InvalidQuery(_))
        ));
        assert!(matches!(
            Expr::parse(&doc! { "a": { "$regex": "(" } }),
            Err(DataServiceError::InvalidQuery(_))
        ));
        assert!(matches!(
            Expr::parse(&doc! { "a": { "$options": "i" } }),
            Err(DataServiceError::InvalidQuery(_))
        ));
    }

    #[test]
    fn nested_documents_without_operators_are_values() {
        let expr = Expr::parse(&doc! { "meta": { "kind": "note" } }).unwrap();
        assert!(matches!(expr, Expr::Field { op: FieldOp::Eq, value: Bson::Document(_), .. }));
    }
}
