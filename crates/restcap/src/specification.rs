//! Listing filters and ranges.

use std::fmt;

use crate::{Error, Result};

/// A filter over the members of a resource listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specification {
    Equals(String, String),
    NotEquals(String, String),
    GreaterThan(String, String),
    LessThan(String, String),
    In(String, Vec<String>),
    And(Vec<Specification>),
}

impl Specification {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals(field.into(), value.into())
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::NotEquals(field.into(), value.into())
    }

    pub fn greater_than(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::GreaterThan(field.into(), value.into())
    }

    pub fn less_than(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::LessThan(field.into(), value.into())
    }

    pub fn one_of<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    /// Conjunction of `self` and `other`, flattening nested conjunctions.
    pub fn and(self, other: Specification) -> Self {
        let mut parts = match self {
            Self::And(parts) => parts,
            spec => vec![spec],
        };
        match other {
            Self::And(more) => parts.extend(more),
            spec => parts.push(spec),
        }
        Self::And(parts)
    }
}

/// Turns a [`Specification`] into the query string of a listing URL.
pub trait SpecificationTranslator: Send + Sync {
    fn translate(&self, specification: &Specification) -> String;
}

/// `field=value`, `field[ne]=value`, `field[gt]=value`, `field[lt]=value` and
/// `field[in]=a,b`, joined with `&`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryStringTranslator;

impl QueryStringTranslator {
    fn collect(specification: &Specification, pairs: &mut Vec<(String, String)>) {
        match specification {
            Specification::Equals(field, value) => pairs.push((field.clone(), value.clone())),
            Specification::NotEquals(field, value) => {
                pairs.push((format!("{field}[ne]"), value.clone()))
            }
            Specification::GreaterThan(field, value) => {
                pairs.push((format!("{field}[gt]"), value.clone()))
            }
            Specification::LessThan(field, value) => {
                pairs.push((format!("{field}[lt]"), value.clone()))
            }
            Specification::In(field, values) => {
                pairs.push((format!("{field}[in]"), values.join(",")))
            }
            Specification::And(parts) => {
                for part in parts {
                    Self::collect(part, pairs);
                }
            }
        }
    }
}

impl SpecificationTranslator for QueryStringTranslator {
    fn translate(&self, specification: &Specification) -> String {
        let mut pairs = Vec::new();
        Self::collect(specification, &mut pairs);

        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish()
    }
}

/// Inclusive window over a rangeable listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    first: u64,
    last: u64,
}

impl Range {
    pub fn new(first: u64, last: u64) -> Result<Self> {
        if first > last {
            return Err(Error::Domain(format!(
                "range start {first} is after its end {last}"
            )));
        }
        Ok(Self { first, last })
    }

    pub fn first(&self) -> u64 {
        self.first
    }

    pub fn last(&self) -> u64 {
        self.last
    }

    /// Value of the `Range` request header.
    pub fn header_value(&self) -> String {
        format!("resource={}-{}", self.first, self.last)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

impl std::str::FromStr for Range {
    type Err = Error;

    /// Parses `first-last`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Domain(format!("invalid range '{s}', expected first-last"));
        let (first, last) = s.trim().split_once('-').ok_or_else(invalid)?;
        let first = first.trim().parse().map_err(|_| invalid())?;
        let last = last.trim().parse().map_err(|_| invalid())?;
        Self::new(first, last)
    }
}
