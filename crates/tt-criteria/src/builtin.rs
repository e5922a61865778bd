//! Built-in stopping criteria, one per named [`StoppingFlags`] bit.
//!
//! Mask and target regions are analytic shapes (box, sphere).  Volumetric
//! masks sampled from an image are a user concern: implement
//! [`StoppingCriterion`] over your own volume type and report
//! `StoppingFlags::MASK`.

use tt_core::{Point3, StoppingFlags};

use crate::{CriterionError, CriterionResult, PredicateError, StoppingCriterion};

// ── MaxLength ─────────────────────────────────────────────────────────────────

/// Stops a streamline once it holds `max_points` points (seed included).
#[derive(Clone, Debug)]
pub struct MaxLength {
    max_points: usize,
}

impl MaxLength {
    pub fn new(max_points: usize) -> CriterionResult<Self> {
        if max_points < 2 {
            return Err(CriterionError::Config(format!(
                "MaxLength needs room for at least one step, got {max_points} points"
            )));
        }
        Ok(Self { max_points })
    }

    #[inline]
    pub fn max_points(&self) -> usize {
        self.max_points
    }
}

impl StoppingCriterion for MaxLength {
    fn flag(&self) -> StoppingFlags {
        StoppingFlags::LENGTH
    }

    fn is_stopping(&self, streamline: &[Point3]) -> Result<bool, PredicateError> {
        Ok(streamline.len() >= self.max_points)
    }

    fn name(&self) -> &str {
        "max_length"
    }
}

// ── MaxCurvature ──────────────────────────────────────────────────────────────

/// Stops when the last step turns by more than `max_angle_deg` relative to
/// the previous one.
#[derive(Clone, Debug)]
pub struct MaxCurvature {
    max_angle_deg: f32,
}

impl MaxCurvature {
    pub fn new(max_angle_deg: f32) -> CriterionResult<Self> {
        if !(0.0..=180.0).contains(&max_angle_deg) {
            return Err(CriterionError::Config(format!(
                "MaxCurvature angle must lie in [0, 180] degrees, got {max_angle_deg}"
            )));
        }
        Ok(Self { max_angle_deg })
    }
}

impl StoppingCriterion for MaxCurvature {
    fn flag(&self) -> StoppingFlags {
        StoppingFlags::CURVATURE
    }

    fn is_stopping(&self, streamline: &[Point3]) -> Result<bool, PredicateError> {
        let [.., a, b, c] = streamline else {
            return Ok(false);
        };
        Ok((*b - *a).angle_deg(*c - *b) > self.max_angle_deg)
    }

    fn name(&self) -> &str {
        "max_curvature"
    }
}

// ── BoxMask ───────────────────────────────────────────────────────────────────

/// Tracking mask shaped as an axis-aligned box.  Stops a streamline whose
/// newest point lies outside it.
#[derive(Clone, Debug)]
pub struct BoxMask {
    min: Point3,
    max: Point3,
}

impl BoxMask {
    pub fn new(min: Point3, max: Point3) -> CriterionResult<Self> {
        if min.x > max.x || min.y > max.y || min.z > max.z {
            return Err(CriterionError::Config(format!("BoxMask corners inverted: {min} > {max}")));
        }
        Ok(Self { min, max })
    }

    #[inline]
    pub fn contains(&self, p: Point3) -> bool {
        (self.min.x..=self.max.x).contains(&p.x)
            && (self.min.y..=self.max.y).contains(&p.y)
            && (self.min.z..=self.max.z).contains(&p.z)
    }

    /// Distance from `p` to the nearest face, zero outside the box.
    pub fn depth(&self, p: Point3) -> f32 {
        if !self.contains(p) {
            return 0.0;
        }
        [
            p.x - self.min.x,
            self.max.x - p.x,
            p.y - self.min.y,
            self.max.y - p.y,
            p.z - self.min.z,
            self.max.z - p.z,
        ]
        .into_iter()
        .fold(f32::INFINITY, f32::min)
    }
}

impl StoppingCriterion for BoxMask {
    fn flag(&self) -> StoppingFlags {
        StoppingFlags::MASK
    }

    fn is_stopping(&self, streamline: &[Point3]) -> Result<bool, PredicateError> {
        Ok(streamline.last().is_some_and(|&p| !self.contains(p)))
    }

    fn name(&self) -> &str {
        "box_mask"
    }
}

// ── TargetSphere ──────────────────────────────────────────────────────────────

/// Stops a streamline whose newest point enters a spherical target region.
/// The seed itself never counts as reaching the target.
#[derive(Clone, Debug)]
pub struct TargetSphere {
    center: Point3,
    radius: f32,
}

impl TargetSphere {
    pub fn new(center: Point3, radius: f32) -> CriterionResult<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(CriterionError::Config(format!(
                "TargetSphere radius must be positive, got {radius}"
            )));
        }
        Ok(Self { center, radius })
    }
}

impl StoppingCriterion for TargetSphere {
    fn flag(&self) -> StoppingFlags {
        StoppingFlags::TARGET
    }

    fn is_stopping(&self, streamline: &[Point3]) -> Result<bool, PredicateError> {
        Ok(streamline.len() > 1
            && streamline.last().is_some_and(|&p| p.distance(self.center) <= self.radius))
    }

    fn name(&self) -> &str {
        "target_sphere"
    }
}

// ── Looping ───────────────────────────────────────────────────────────────────

/// Stops a streamline whose accumulated turning exceeds `max_total_deg`,
/// e.g. 360° for a full loop.
#[derive(Clone, Debug)]
pub struct Looping {
    max_total_deg: f32,
}

impl Looping {
    pub fn new(max_total_deg: f32) -> CriterionResult<Self> {
        if !(max_total_deg.is_finite() && max_total_deg > 0.0) {
            return Err(CriterionError::Config(format!(
                "Looping threshold must be positive, got {max_total_deg}"
            )));
        }
        Ok(Self { max_total_deg })
    }
}

impl StoppingCriterion for Looping {
    fn flag(&self) -> StoppingFlags {
        StoppingFlags::LOOP
    }

    fn is_stopping(&self, streamline: &[Point3]) -> Result<bool, PredicateError> {
        let total: f32 = streamline
            .windows(3)
            .map(|w| (w[1] - w[0]).angle_deg(w[2] - w[1]))
            .sum();
        Ok(total > self.max_total_deg)
    }

    fn name(&self) -> &str {
        "looping"
    }
}
