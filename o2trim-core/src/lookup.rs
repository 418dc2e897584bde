//! Feed-Forward Air Pressure Table
//!
//! ## Motivation
//!
//! Oxygen feedback is slow: a change at the air damper shows up at the flue gas
//! analyser several seconds later. The feed-forward table gives the expected
//! combustion air pressure for the current gas flow straight away, so the PID
//! only has to trim the residual error.
//!
//! ## Table Design
//!
//! The table is a short piecewise-linear curve of `(gas, air_target)` points,
//! at most [`FEED_FORWARD_POINTS`] of them, strictly ascending by `gas`:
//!
//! ```text
//! air_target
//!   8.5 |                                   *
//!   6.0 |                        *
//!   3.5 |              *
//!   2.0 |     *
//!   1.0 *-----+--------+---------+----------+---- gas
//!       0     20       40        70         100
//! ```
//!
//! - below the first point the first `air_target` is returned (clamp)
//! - above the last point the last `air_target` is returned (clamp)
//! - in between, linear interpolation inside the bracketing pair
//!
//! [`FeedForwardTable`] refuses unsorted points at construction. The raw
//! [`lookup`] function works on any slice and, for an unsorted slice that has
//! no bracketing pair, falls back to the last point.

use crate::constants::FEED_FORWARD_POINTS;
use crate::errors::{ControlError, ControlResult};

/// Air pressure baseline shipped with the controller
const FACTORY_CURVE: [FeedForwardPoint; FEED_FORWARD_POINTS] = [
    FeedForwardPoint::new(0.0, 1.0),
    FeedForwardPoint::new(20.0, 2.0),
    FeedForwardPoint::new(40.0, 3.5),
    FeedForwardPoint::new(70.0, 6.0),
    FeedForwardPoint::new(100.0, 8.5),
];

/// One point of the gas flow to air pressure curve
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeedForwardPoint {
    /// Gas flow
    pub gas: f32,
    /// Baseline air pressure for that flow
    pub air_target: f32,
}

impl FeedForwardPoint {
    pub const fn new(gas: f32, air_target: f32) -> Self {
        Self { gas, air_target }
    }
}

/// Piecewise-linear lookup over a raw slice of points.
///
/// Empty slice gives `0.0`. The slice is assumed ascending by `gas`.
pub fn lookup(gas_flow: f32, points: &[FeedForwardPoint]) -> f32 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return 0.0,
    };

    if gas_flow <= first.gas {
        return first.air_target;
    }
    if gas_flow >= last.gas {
        return last.air_target;
    }

    for pair in points.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if lo.gas <= gas_flow && gas_flow <= hi.gas {
            return interpolate(lo, hi, gas_flow);
        }
    }

    // Only reachable for an unsorted slice
    last.air_target
}

/// Interpolate inside one segment, exact at both ends
fn interpolate(lo: FeedForwardPoint, hi: FeedForwardPoint, x: f32) -> f32 {
    if x == lo.gas || hi.gas == lo.gas {
        return lo.air_target;
    }
    if x == hi.gas {
        return hi.air_target;
    }

    let fraction = (x - lo.gas) / (hi.gas - lo.gas);
    let y = lo.air_target + (hi.air_target - lo.air_target) * fraction;

    // Keep rounding from stepping outside the segment, which would break
    // monotonicity across segment boundaries
    let (y_lo, y_hi) = if lo.air_target <= hi.air_target {
        (lo.air_target, hi.air_target)
    } else {
        (hi.air_target, lo.air_target)
    };
    y.clamp(y_lo, y_hi)
}

/// Validated feed-forward curve
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct FeedForwardTable {
    points: heapless::Vec<FeedForwardPoint, FEED_FORWARD_POINTS>,
}

impl FeedForwardTable {
    /// Build a table from points strictly ascending by `gas`
    pub fn new(points: &[FeedForwardPoint]) -> ControlResult<Self> {
        if points.len() > FEED_FORWARD_POINTS {
            return Err(ControlError::TableFull { capacity: FEED_FORWARD_POINTS });
        }

        for (index, point) in points.iter().enumerate() {
            if !point.gas.is_finite() || !point.air_target.is_finite() {
                return Err(ControlError::InvalidConfig {
                    reason: "feed-forward point is not a finite number",
                });
            }
            if index > 0 && point.gas <= points[index - 1].gas {
                return Err(ControlError::UnsortedTable { index });
            }
        }

        let points = heapless::Vec::from_slice(points)
            .map_err(|_| ControlError::TableFull { capacity: FEED_FORWARD_POINTS })?;
        Ok(Self { points })
    }

    /// Factory curve
    pub fn defaults() -> Self {
        // the array type has exactly the table capacity, from_slice cannot overflow
        let points = heapless::Vec::from_slice(&FACTORY_CURVE).unwrap_or_default();
        Self { points }
    }

    /// Baseline air pressure for a gas flow
    pub fn lookup(&self, gas_flow: f32) -> f32 {
        lookup(gas_flow, &self.points)
    }

    pub fn points(&self) -> &[FeedForwardPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for FeedForwardTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let points =
            <heapless::Vec<FeedForwardPoint, FEED_FORWARD_POINTS> as serde::Deserialize>::deserialize(
                deserializer,
            )?;
        FeedForwardTable::new(&points).map_err(serde::de::Error::custom)
    }
}
