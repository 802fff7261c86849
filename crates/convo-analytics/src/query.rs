//! Query parameters sent to the analytics backend.
//!
//! Unlike the dashboard URL, list filters go out as repeated keys
//! (`enterpriseIds=A&enterpriseIds=B`), never comma-joined.

use crate::filters::DATE_FORMAT;
use chrono::NaiveDate;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendQuery {
    pairs: Vec<(String, String)>,
}

impl BackendQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date(mut self, key: &str, date: NaiveDate) -> Self {
        self.pairs
            .push((key.to_string(), date.format(DATE_FORMAT).to_string()));
        self
    }

    pub fn int(mut self, key: &str, value: i64) -> Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    /// One pair per value; nothing when `values` is empty.
    pub fn repeated(mut self, key: &str, values: &[String]) -> Self {
        for value in values {
            self.pairs.push((key.to_string(), value.clone()));
        }
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}
