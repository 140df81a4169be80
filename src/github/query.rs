//! Ordered query-string construction for REST paths.
//!
//! Parameters are joined as `key=value` pairs with `&` in the order they were
//! supplied. Nothing is percent-encoded: every value the clients send is a
//! plain token (numbers, SHAs, fixed keywords).

use std::fmt;

/// Ordered list of query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    /// Creates an empty query.
    #[must_use]
    pub const fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Appends a parameter, keeping insertion order.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.pairs.push((key.into(), value.to_string()));
        self
    }

    /// Whether no parameters were supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Appends the query to `path`, adding `?` only when parameters exist.
    #[must_use]
    pub fn apply_to(&self, path: &str) -> String {
        if self.is_empty() {
            path.to_owned()
        } else {
            format!("{path}?{self}")
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (key, value)) in self.pairs.iter().enumerate() {
            if index > 0 {
                f.write_str("&")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::Query;

    #[rstest]
    fn preserves_supplied_order() {
        let query = Query::new()
            .with("state", "open")
            .with("per_page", 100)
            .with("sort", "updated")
            .with("direction", "desc");

        assert_eq!(
            query.to_string(),
            "state=open&per_page=100&sort=updated&direction=desc"
        );
    }

    #[rstest]
    #[case::empty(Query::new(), "/repos/o/r/pulls")]
    #[case::single(Query::new().with("page", 2), "/repos/o/r/pulls?page=2")]
    fn applies_to_path(#[case] query: Query, #[case] expected: &str) {
        assert_eq!(query.apply_to("/repos/o/r/pulls"), expected);
    }

    #[rstest]
    fn does_not_encode_values() {
        let query = Query::new().with("head_sha", "abc/123 x");
        assert_eq!(query.to_string(), "head_sha=abc/123 x");
    }
}
