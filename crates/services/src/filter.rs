//! A small predicate algebra that renders to MongoDB match documents.
//!
//! Route handlers and the authorization layer compose these instead of
//! splicing `$or`/`$and` keys into ad hoc documents.

use bson::{doc, Bson, Document};

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    Eq(String, Bson),
    In(String, Vec<Bson>),
    Exists(String, bool),
    /// Field holds a BSON number of any width.
    Numeric(String),
    /// Case-insensitive regular expression.
    Regex(String, String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        Filter::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn exists(field: impl Into<String>, exists: bool) -> Self {
        Filter::Exists(field.into(), exists)
    }

    pub fn numeric(field: impl Into<String>) -> Self {
        Filter::Numeric(field.into())
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Regex(field.into(), pattern.into())
    }

    /// Case-insensitive substring match on literal text.
    pub fn contains(field: impl Into<String>, needle: &str) -> Self {
        Filter::Regex(field.into(), escape_regex(needle))
    }

    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (l, r) => Filter::And(vec![l, r]),
        }
    }

    pub fn or(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, _) | (_, Filter::All) => Filter::All,
            (Filter::Or(mut left), Filter::Or(right)) => {
                left.extend(right);
                Filter::Or(left)
            }
            (Filter::Or(mut left), f) => {
                left.push(f);
                Filter::Or(left)
            }
            (l, r) => Filter::Or(vec![l, r]),
        }
    }

    pub fn to_document(&self) -> Document {
        match self {
            Filter::All => Document::new(),
            Filter::Eq(field, value) => doc! { field: value.clone() },
            Filter::In(field, values) => doc! { field: { "$in": values.clone() } },
            Filter::Exists(field, exists) => doc! { field: { "$exists": *exists } },
            Filter::Numeric(field) => doc! { field: { "$type": "number" } },
            Filter::Regex(field, pattern) => doc! {
                field: { "$regex": pattern.clone(), "$options": "i" }
            },
            // Empty conjunction is vacuously true.
            Filter::And(parts) if parts.is_empty() => Document::new(),
            Filter::And(parts) if parts.len() == 1 => parts[0].to_document(),
            Filter::And(parts) => doc! {
                "$and": parts.iter().map(|p| Bson::Document(p.to_document())).collect::<Vec<_>>()
            },
            // Empty disjunction matches nothing.
            Filter::Or(parts) if parts.is_empty() => doc! { "_id": { "$exists": false } },
            Filter::Or(parts) if parts.len() == 1 => parts[0].to_document(),
            Filter::Or(parts) => doc! {
                "$or": parts.iter().map(|p| Bson::Document(p.to_document())).collect::<Vec<_>>()
            },
        }
    }
}

fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
