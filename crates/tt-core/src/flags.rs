//! Named stopping-reason bits.
//!
//! Every stopping criterion owns exactly one bit.  A finished streamline
//! carries the OR of every bit that fired on the step it stopped.  Bits
//! outside the named set are retained so external criteria can claim their
//! own.

use bitflags::bitflags;

bitflags! {
    /// Why a streamline stopped.  Empty while the streamline is active.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct StoppingFlags: u32 {
        /// Reached a target region.
        const TARGET    = 1 << 0;
        /// Hit the maximum number of points.
        const LENGTH    = 1 << 1;
        /// Turned more sharply than allowed on the last step.
        const CURVATURE = 1 << 2;
        /// Left the tracking mask.
        const MASK      = 1 << 3;
        /// Looped back on itself.
        const LOOP      = 1 << 4;

        const _ = !0;
    }
}

impl StoppingFlags {
    /// Bits whose last point is excluded from exported geometry: the step
    /// that raised them is the one that went somewhere it should not have.
    pub const TRIM_LAST_POINT: StoppingFlags =
        StoppingFlags::CURVATURE.union(StoppingFlags::MASK);

    /// `true` if the exported streamline should drop its last point.
    #[inline]
    pub fn trims_last_point(self) -> bool {
        self.intersects(Self::TRIM_LAST_POINT)
    }

    /// `true` if exactly one bit is set.  Criteria must report single bits.
    #[inline]
    pub fn is_single_bit(self) -> bool {
        self.bits().count_ones() == 1
    }
}
