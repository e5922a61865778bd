//! The `StoppingCriterion` trait.

use tt_core::{Point3, StoppingFlags};

/// Error type criteria may return.  Any failure aborts the whole step.
pub type PredicateError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A pluggable rule deciding whether a streamline stops.
///
/// # Thread safety
///
/// The rollout engine evaluates criteria on many candidate histories in
/// parallel, so implementations must be `Send + Sync` and keep no mutable
/// state.
///
/// # Example
///
/// ```rust
/// use tt_core::{Point3, StoppingFlags};
/// use tt_criteria::{PredicateError, StoppingCriterion};
///
/// /// Stop once the streamline crosses the plane x = `x`.
/// struct PastPlane { x: f32 }
///
/// impl StoppingCriterion for PastPlane {
///     fn flag(&self) -> StoppingFlags {
///         StoppingFlags::TARGET
///     }
///
///     fn is_stopping(&self, streamline: &[Point3]) -> Result<bool, PredicateError> {
///         Ok(streamline.last().is_some_and(|p| p.x >= self.x))
///     }
/// }
/// ```
pub trait StoppingCriterion: Send + Sync + 'static {
    /// The single bit this criterion reports when it fires.
    fn flag(&self) -> StoppingFlags;

    /// `true` if `streamline` (seed first, newest point last) must stop.
    fn is_stopping(&self, streamline: &[Point3]) -> Result<bool, PredicateError>;

    /// Name used in error messages and logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
