//! Per-package metric results.
//!
//! A [`MetricStats`] maps package names to numeric values and carries a
//! lazily computed summary. Values combine element-wise with other results
//! over the same package universe, or broadcast against scalars; ranking
//! breaks value ties by ascending name. The counting metrics produce exact
//! integers (stored as `f64`, which is exact far beyond any real network
//! size); derived results from arithmetic may be fractional.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use thiserror::Error;

/// Errors from metric-result arithmetic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    #[error("metric results cover different package universes")]
    DomainMismatch,
}

/// Aggregate summary of a metric result, computed once on demand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub sum: f64,
}

/// A package-name → value mapping with summary and ranking operations.
#[derive(Debug, Default)]
pub struct MetricStats {
    values: BTreeMap<String, f64>,
    summary: OnceLock<Summary>,
}

impl Clone for MetricStats {
    fn clone(&self) -> Self {
        MetricStats {
            values: self.values.clone(),
            summary: OnceLock::new(),
        }
    }
}

impl PartialEq for MetricStats {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl MetricStats {
    /// Builds a result from an arbitrary name → value mapping. External
    /// callers use this to plug foreign measures (e.g. centralities) into
    /// the ranking and arithmetic machinery.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        MetricStats {
            values: values.into_iter().collect(),
            summary: OnceLock::new(),
        }
    }

    /// Value for `name`, if the package is in this result's universe.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Package names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// All `(name, value)` pairs in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, &v)| (n.as_str(), v))
    }

    /// Min, max, mean and sum. Computed once; iteration follows name order,
    /// so the floating sums are reproducible.
    pub fn summary(&self) -> Summary {
        *self.summary.get_or_init(|| {
            if self.values.is_empty() {
                return Summary {
                    min: 0.0,
                    max: 0.0,
                    mean: 0.0,
                    sum: 0.0,
                };
            }
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            let mut sum = 0.0;
            for &v in self.values.values() {
                min = min.min(v);
                max = max.max(v);
                sum += v;
            }
            Summary {
                min,
                max,
                mean: sum / self.values.len() as f64,
                sum,
            }
        })
    }

    /// The `k` packages with the largest values, ties broken by ascending
    /// name.
    pub fn top(&self, k: usize) -> Vec<(&str, f64)> {
        self.ranked(k, true, None)
    }

    /// The `k` packages with the smallest values, ties broken by ascending
    /// name.
    pub fn bottom(&self, k: usize) -> Vec<(&str, f64)> {
        self.ranked(k, false, None)
    }

    /// [`top`](Self::top) restricted to `subset`; names outside the
    /// universe are ignored.
    pub fn top_among<'a, I>(&self, k: usize, subset: I) -> Vec<(&str, f64)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let subset: HashSet<&str> = subset.into_iter().collect();
        self.ranked(k, true, Some(&subset))
    }

    /// [`bottom`](Self::bottom) restricted to `subset`.
    pub fn bottom_among<'a, I>(&self, k: usize, subset: I) -> Vec<(&str, f64)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let subset: HashSet<&str> = subset.into_iter().collect();
        self.ranked(k, false, Some(&subset))
    }

    fn ranked(&self, k: usize, largest: bool, subset: Option<&HashSet<&str>>) -> Vec<(&str, f64)> {
        let mut pairs: Vec<(&str, f64)> = self
            .values
            .iter()
            .map(|(n, &v)| (n.as_str(), v))
            .filter(|(n, _)| subset.map_or(true, |s| s.contains(n)))
            .collect();
        pairs.sort_by(|a, b| {
            let by_value = if largest {
                b.1.total_cmp(&a.1)
            } else {
                a.1.total_cmp(&b.1)
            };
            by_value.then_with(|| a.0.cmp(b.0))
        });
        pairs.truncate(k);
        pairs
    }

    /// Element-wise sum over the same universe.
    pub fn add(&self, rhs: &MetricStats) -> Result<MetricStats, StatsError> {
        self.combine(rhs, |a, b| a + b)
    }

    /// Element-wise difference over the same universe.
    pub fn sub(&self, rhs: &MetricStats) -> Result<MetricStats, StatsError> {
        self.combine(rhs, |a, b| a - b)
    }

    /// Element-wise product over the same universe.
    pub fn mul(&self, rhs: &MetricStats) -> Result<MetricStats, StatsError> {
        self.combine(rhs, |a, b| a * b)
    }

    /// Element-wise quotient over the same universe.
    pub fn div(&self, rhs: &MetricStats) -> Result<MetricStats, StatsError> {
        self.combine(rhs, |a, b| a / b)
    }

    /// Element-wise exponentiation over the same universe.
    pub fn pow(&self, rhs: &MetricStats) -> Result<MetricStats, StatsError> {
        self.combine(rhs, f64::powf)
    }

    pub fn add_scalar(&self, rhs: f64) -> MetricStats {
        self.map(|v| v + rhs)
    }

    pub fn sub_scalar(&self, rhs: f64) -> MetricStats {
        self.map(|v| v - rhs)
    }

    pub fn mul_scalar(&self, rhs: f64) -> MetricStats {
        self.map(|v| v * rhs)
    }

    pub fn div_scalar(&self, rhs: f64) -> MetricStats {
        self.map(|v| v / rhs)
    }

    pub fn pow_scalar(&self, rhs: f64) -> MetricStats {
        self.map(|v| v.powf(rhs))
    }

    fn combine(
        &self,
        rhs: &MetricStats,
        op: impl Fn(f64, f64) -> f64,
    ) -> Result<MetricStats, StatsError> {
        if self.values.len() != rhs.values.len() {
            return Err(StatsError::DomainMismatch);
        }
        let mut out = BTreeMap::new();
        for ((ln, &lv), (rn, &rv)) in self.values.iter().zip(rhs.values.iter()) {
            if ln != rn {
                return Err(StatsError::DomainMismatch);
            }
            out.insert(ln.clone(), op(lv, rv));
        }
        Ok(MetricStats {
            values: out,
            summary: OnceLock::new(),
        })
    }

    fn map(&self, op: impl Fn(f64) -> f64) -> MetricStats {
        MetricStats {
            values: self
                .values
                .iter()
                .map(|(n, &v)| (n.clone(), op(v)))
                .collect(),
            summary: OnceLock::new(),
        }
    }
}
