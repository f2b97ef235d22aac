use serde::{Deserialize, Serialize};

/// A possibly-undefined closed interval `[low, high]`.
///
/// Ranges are conservative: a range may cover values that no longer need the
/// work it tracks. Consumers re-check the real state of every value they
/// visit inside the bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange<T> {
    bounds: Option<(T, T)>,
}

/// Range of sprite swatch indices.
pub type IndexRange = NumericRange<usize>;

/// Range of timestamps in milliseconds.
pub type TimeRange = NumericRange<f64>;

impl<T> Default for NumericRange<T> {
    fn default() -> Self {
        Self { bounds: None }
    }
}

impl<T: Copy + PartialOrd> NumericRange<T> {
    /// Create an undefined range.
    pub fn new() -> Self {
        Self { bounds: None }
    }

    /// Create a defined range covering `[low, high]`.
    pub fn from_bounds(low: T, high: T) -> Self {
        let mut range = Self::new();
        range.expand_to_include(low);
        range.expand_to_include(high);
        range
    }

    pub fn is_defined(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn low_bound(&self) -> Option<T> {
        self.bounds.map(|(low, _)| low)
    }

    pub fn high_bound(&self) -> Option<T> {
        self.bounds.map(|(_, high)| high)
    }

    pub fn bounds(&self) -> Option<(T, T)> {
        self.bounds
    }

    /// Reset to undefined.
    pub fn clear(&mut self) {
        self.bounds = None;
    }

    /// Widen the range so that it covers `value`.
    pub fn expand_to_include(&mut self, value: T) {
        self.bounds = Some(match self.bounds {
            None => (value, value),
            Some((low, high)) => (
                if value < low { value } else { low },
                if value > high { value } else { high },
            ),
        });
    }

    /// Clip the range to `[low, high]`, clearing it if nothing remains.
    pub fn truncate_to_within(&mut self, low: T, high: T) {
        let Some((current_low, current_high)) = self.bounds else {
            return;
        };
        if high < current_low || low > current_high || low > high {
            self.bounds = None;
            return;
        }
        self.bounds = Some((
            if low > current_low { low } else { current_low },
            if high < current_high { high } else { current_high },
        ));
    }

    /// True iff both ranges are defined and the closed intervals intersect.
    pub fn overlaps(&self, other: &NumericRange<T>) -> bool {
        match (self.bounds, other.bounds) {
            (Some((low, high)), Some((other_low, other_high))) => {
                low <= other_high && high >= other_low
            }
            _ => false,
        }
    }

    pub fn contains(&self, value: T) -> bool {
        matches!(self.bounds, Some((low, high)) if low <= value && value <= high)
    }
}

impl IndexRange {
    /// Number of integers covered by the range.
    pub fn len(&self) -> usize {
        self.bounds.map_or(0, |(low, high)| high - low + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    /// Expand to whole rows of `per_row` indices, clipped to `limit` entries.
    pub fn row_expanded(&self, per_row: usize, limit: usize) -> IndexRange {
        match self.bounds {
            Some((low, high)) if per_row > 0 && limit > 0 => {
                let low_row = low / per_row;
                let high_row = high / per_row;
                let expanded_high = ((high_row + 1) * per_row - 1).min(limit - 1);
                IndexRange::from_bounds(low_row * per_row, expanded_high.max(low_row * per_row))
            }
            _ => IndexRange::new(),
        }
    }
}
