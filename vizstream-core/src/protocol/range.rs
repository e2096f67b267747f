//! Range queries: a spatial sub-region plus value filter.

use serde::{Deserialize, Serialize};

use crate::error::VizError;

/// Whether the range selects what is inside or what is outside the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RangeMode {
    #[default]
    Include,
    Exclude,
}

/// A bounded region the renderer restricts its output to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    pub min: [f32; 3],
    pub max: [f32; 3],
    /// Sampling step inside the region. Must be positive.
    pub step: f32,
    pub mode: RangeMode,
    /// Values with magnitude below this are omitted.
    pub threshold: f32,
}

impl RangeQuery {
    /// An inclusive region with no value threshold.
    pub fn new(min: [f32; 3], max: [f32; 3], step: f32) -> Self {
        Self {
            min,
            max,
            step,
            mode: RangeMode::Include,
            threshold: 0.0,
        }
    }

    pub fn with_mode(mut self, mode: RangeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// `min <= max` on every axis, `step > 0`, all values finite.
    pub fn validate(&self) -> Result<(), VizError> {
        let all = self
            .min
            .iter()
            .chain(self.max.iter())
            .chain([&self.step, &self.threshold]);
        if all.into_iter().any(|v| !v.is_finite()) {
            return Err(VizError::InvalidRange("non-finite value".into()));
        }
        for axis in 0..3 {
            if self.min[axis] > self.max[axis] {
                return Err(VizError::InvalidRange(format!(
                    "min > max on axis {axis}: {} > {}",
                    self.min[axis], self.max[axis]
                )));
            }
        }
        if self.step <= 0.0 {
            return Err(VizError::InvalidRange(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        Ok(())
    }

    /// Whether `point` is selected by this query.
    pub fn selects(&self, point: [f32; 3]) -> bool {
        let inside = (0..3).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i]);
        match self.mode {
            RangeMode::Include => inside,
            RangeMode::Exclude => !inside,
        }
    }

    /// Whether `value` passes the threshold filter.
    pub fn keeps_value(&self, value: f32) -> bool {
        value.abs() >= self.threshold
    }
}

// ── DataBounds ───────────────────────────────────────────────────

/// Extent of the simulation data as discovered by the render peer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DataBounds {
    pub lower: [f32; 3],
    pub upper: [f32; 3],
    /// Minimum and maximum scalar value seen.
    pub scalar_range: [f32; 2],
}

impl DataBounds {
    /// Whether the bounds enclose a non-empty volume.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.lower[i] >= self.upper[i])
    }

    /// A full-extent query over these bounds with `divisions` steps on the
    /// longest axis.
    pub fn to_query(&self, divisions: u32) -> RangeQuery {
        let longest = (0..3)
            .map(|i| self.upper[i] - self.lower[i])
            .fold(0.0f32, f32::max);
        let step = if longest > 0.0 {
            longest / divisions.max(1) as f32
        } else {
            1.0
        };
        RangeQuery::new(self.lower, self.upper, step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_query() {
        RangeQuery::new([0.0; 3], [1.0, 2.0, 3.0], 0.1).validate().unwrap();
        // degenerate but ordered box is allowed
        RangeQuery::new([1.0; 3], [1.0; 3], 0.5).validate().unwrap();
    }

    #[test]
    fn min_greater_than_max() {
        let err = RangeQuery::new([0.0, 5.0, 0.0], [1.0, 4.0, 1.0], 0.1)
            .validate()
            .unwrap_err();
        assert!(matches!(err, VizError::InvalidRange(_)));
        assert!(err.to_string().contains("axis 1"));
    }

    #[test]
    fn non_positive_step() {
        assert!(RangeQuery::new([0.0; 3], [1.0; 3], 0.0).validate().is_err());
        assert!(RangeQuery::new([0.0; 3], [1.0; 3], -1.0).validate().is_err());
        assert!(RangeQuery::new([0.0; 3], [1.0; 3], f32::NAN).validate().is_err());
    }

    #[test]
    fn mode_selects() {
        let q = RangeQuery::new([0.0; 3], [1.0; 3], 0.1);
        assert!(q.selects([0.5; 3]));
        assert!(!q.selects([2.0, 0.5, 0.5]));
        let q = q.with_mode(RangeMode::Exclude);
        assert!(!q.selects([0.5; 3]));
        assert!(q.selects([2.0, 0.5, 0.5]));
    }

    #[test]
    fn threshold_filters_near_zero() {
        let q = RangeQuery::new([0.0; 3], [1.0; 3], 0.1).with_threshold(0.01);
        assert!(!q.keeps_value(0.001));
        assert!(q.keeps_value(-0.5));
    }

    #[test]
    fn bounds_to_query() {
        let b = DataBounds {
            lower: [0.0; 3],
            upper: [10.0, 5.0, 2.0],
            scalar_range: [0.0, 1.0],
        };
        let q = b.to_query(100);
        assert_eq!(q.min, [0.0; 3]);
        assert_eq!(q.max, [10.0, 5.0, 2.0]);
        assert!((q.step - 0.1).abs() < 1e-6);
        q.validate().unwrap();
    }
}
