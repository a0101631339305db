/// Equal-width 1-D histogram of a column's values.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Bin edges, `bins + 1` values, strictly increasing.
    edges: Vec<f64>,
    counts: Vec<u64>,
}

/// Finite minimum and maximum of `values`, or `None` if there are none.
pub fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Widen a degenerate range the way numerical libraries do: no data
/// gives `[0, 1]`, a single value `v` gives `[v - 0.5, v + 0.5]`.
pub fn auto_range(range: Option<(f64, f64)>) -> (f64, f64) {
    match range {
        None => (0.0, 1.0),
        Some((lo, hi)) if lo == hi => (lo - 0.5, hi + 0.5),
        Some(range) => range,
    }
}

impl Histogram {
    /// `bins` equal-width bins over the finite range of `values`.
    pub fn from_values(values: &[f64], bins: usize) -> Self {
        let (lo, hi) = auto_range(finite_range(values));
        Self::with_range(values, bins, lo, hi)
    }

    /// `bins` equal-width bins over `[lo, hi]`.
    ///
    /// The last bin is closed on the right. Values outside the range and
    /// non-finite values are not counted. `bins` is raised to at least 1
    /// and an empty range is widened as in [`auto_range`].
    pub fn with_range(values: &[f64], bins: usize, lo: f64, hi: f64) -> Self {
        let bins = bins.max(1);
        let (lo, hi) = auto_range(Some((lo.min(hi), lo.max(hi))));
        // Divide before subtracting so ranges near f64::MAX stay finite.
        let width = hi / bins as f64 - lo / bins as f64;
        let mut edges: Vec<f64> = (0..bins).map(|i| lo + width * i as f64).collect();
        edges.push(hi);

        let mut counts = vec![0u64; bins];
        for &v in values {
            if !v.is_finite() || v < lo || v > hi {
                continue;
            }
            let mut idx = ((v / width - lo / width) as usize).min(bins - 1);
            // Rounding can put a value on the wrong side of a stored edge.
            if v < edges[idx] {
                idx -= 1;
            } else if idx + 1 < bins && v >= edges[idx + 1] {
                idx += 1;
            }
            counts[idx] += 1;
        }
        Histogram { edges, counts }
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// `(low edge, high edge)` of the whole histogram.
    pub fn range(&self) -> (f64, f64) {
        (self.edges[0], self.edges[self.edges.len() - 1])
    }

    /// Number of counted values.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// `(low, high, count)` for each bin.
    pub fn iter_bins(&self) -> impl Iterator<Item = (f64, f64, u64)> + '_ {
        self.edges
            .windows(2)
            .zip(&self.counts)
            .map(|(w, &c)| (w[0], w[1], c))
    }

    /// Outline of the histogram as a step path starting and ending on
    /// the baseline.
    pub fn step_outline(&self) -> Vec<(f64, f64)> {
        let mut points = Vec::with_capacity(2 * self.bins() + 2);
        points.push((self.edges[0], 0.0));
        for (lo, hi, c) in self.iter_bins() {
            points.push((lo, c as f64));
            points.push((hi, c as f64));
        }
        points.push((self.edges[self.edges.len() - 1], 0.0));
        points
    }
}
