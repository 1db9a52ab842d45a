//! Latency histogram boundary parsing.

use std::fmt;

use super::validation::ConfigError;

/// Default boundaries: 20 exponential buckets starting at 50µs, factor 2.
pub const DEFAULT_BUCKETS: &str = "5e-05,0.0001,0.0002,0.0004,0.0008,0.0016,0.0032,0.0064,0.0128,0.0256,0.0512,0.1024,0.2048,0.4096,0.8192,1.6384,3.2768,6.5536,13.1072,26.2144";

/// Ascending set of histogram upper bounds, in seconds.
///
/// Built once at startup and cloned into the metrics recorder so that every
/// target's histogram shares the same boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSet {
    bounds: Vec<f64>,
}

impl BucketSet {
    /// Parse a comma-delimited list of non-negative seconds values.
    ///
    /// Tokens are trimmed. Out-of-order input is sorted and duplicates are
    /// dropped; ascending input is returned unchanged.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidBuckets` for an empty list, an empty
    /// token, a token that is not a number, or a negative/non-finite value.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Err(ConfigError::InvalidBuckets("bucket list is empty".to_string()));
        }

        let mut bounds = Vec::new();
        for token in input.split(',') {
            let token = token.trim();
            if token.is_empty() {
                return Err(ConfigError::InvalidBuckets(format!(
                    "empty bucket in '{}'",
                    input
                )));
            }
            let value: f64 = token
                .parse()
                .map_err(|_| ConfigError::InvalidBuckets(format!("'{}' is not a number", token)))?;
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidBuckets(format!(
                    "'{}' must be a finite non-negative number",
                    token
                )));
            }
            bounds.push(value);
        }

        let ascending = bounds.windows(2).all(|w| w[0] < w[1]);
        if !ascending {
            tracing::warn!(buckets = %input, "Bucket list is not strictly ascending, sorting");
            bounds.sort_by(f64::total_cmp);
            bounds.dedup();
        }

        Ok(Self { bounds })
    }

    /// Upper bounds in ascending order.
    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Render back to the comma-delimited form accepted by [`BucketSet::parse`].
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BucketSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.bounds.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", b)?;
        }
        Ok(())
    }
}
