//! Output types: per-step results, harvests, and the exported tractogram.
//!
//! # Trimming
//!
//! A streamline that stopped on `CURVATURE` or `MASK` ends with a point the
//! criterion rejected, so [`export_streamline`] drops it.  The export never
//! shrinks below one point; every other stop keeps its last point.
//!
//! # Serialization
//!
//! No file format lives here.  [`Tractogram::write_to`] hands each exported
//! streamline to a [`TractogramSink`], which is where a `.trk`/`.tck` writer
//! would plug in.

use tt_buffer::StreamlineBuffer;
use tt_core::{Affine, Point3, SeedId, StoppingFlags, StreamlineId};

// ── Step results ──────────────────────────────────────────────────────────────

/// What [`TrackingEnv::step`][crate::TrackingEnv::step] returns.  Every
/// vector is aligned to the active set the step was called with.
#[derive(Clone, Debug)]
pub struct StepOutput<S> {
    /// Formatted state after the step (and after any recovery).
    pub states: Vec<S>,
    /// `true` for streamlines that finished during this step.
    pub dones:  Vec<bool>,
    /// Terminal flags; empty for streamlines still going.
    pub flags:  Vec<StoppingFlags>,
    /// The pre-step active set.
    pub active: Vec<StreamlineId>,
}

impl<S> StepOutput<S> {
    #[inline]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn stopped_count(&self) -> usize {
        self.dones.iter().filter(|&&d| d).count()
    }
}

/// What [`TrackingEnv::harvest`][crate::TrackingEnv::harvest] returns.
#[derive(Clone, Debug)]
pub struct Harvest<S> {
    /// Formatted states of the new active set, in its order.
    pub states:       Vec<S>,
    /// Aligned to the previous active set: `true` if the streamline did not
    /// stop this step.  Recovered streamlines stopped before their rollout
    /// and are `false`, even though they rejoin the active set.
    pub continuation: Vec<bool>,
}

// ── Export ────────────────────────────────────────────────────────────────────

/// Coordinate space of exported points.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Space {
    /// Tracking coordinates, untouched.
    #[default]
    Voxel,
    /// Tracking coordinates mapped through the environment's affine.
    World,
}

/// How [`TrackingEnv::finalize`][crate::TrackingEnv::finalize] exports.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExportOptions {
    pub space:  Space,
    /// Run the environment's streamline filters.
    pub filter: bool,
}

/// One finished (or still running) streamline as exported.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExportedStreamline {
    pub id:      StreamlineId,
    pub seed_id: SeedId,
    pub seed:    Point3,
    pub flags:   StoppingFlags,
    pub points:  Vec<Point3>,
}

impl ExportedStreamline {
    /// Sum of segment lengths, in the units of `points`.
    pub fn path_length(&self) -> f32 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

/// Slice one buffer row to its exported form (voxel space, trimmed).
pub fn export_streamline(buffer: &StreamlineBuffer, id: StreamlineId) -> ExportedStreamline {
    let flags = buffer.flags[id.index()];
    let mut points = buffer.streamline(id);
    if flags.trims_last_point() && points.len() > 1 {
        points = &points[..points.len() - 1];
    }
    ExportedStreamline {
        id,
        seed_id: buffer.seed_ids[id.index()],
        seed:    buffer.seeds[id.index()],
        flags,
        points:  points.to_vec(),
    }
}

/// The result of `finalize`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tractogram {
    pub space:       Space,
    /// Voxel → world transform of the environment, whatever `space` is.
    pub affine:      Affine,
    pub streamlines: Vec<ExportedStreamline>,
}

impl Tractogram {
    #[inline]
    pub fn len(&self) -> usize {
        self.streamlines.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.streamlines.is_empty()
    }

    pub fn total_points(&self) -> usize {
        self.streamlines.iter().map(|s| s.points.len()).sum()
    }

    /// Stream every streamline into `sink`, then finish it.
    pub fn write_to<K: TractogramSink>(&self, sink: &mut K) -> Result<(), K::Error> {
        sink.begin(self.space, &self.affine, self.streamlines.len())?;
        for s in &self.streamlines {
            sink.write(s)?;
        }
        sink.finish()
    }
}

/// Receives an exported tractogram.  Implemented by file writers.
pub trait TractogramSink {
    type Error;

    /// Called once before the first streamline.
    fn begin(&mut self, _space: Space, _affine: &Affine, _count: usize) -> Result<(), Self::Error> {
        Ok(())
    }

    fn write(&mut self, streamline: &ExportedStreamline) -> Result<(), Self::Error>;

    /// Flush and close.
    fn finish(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ── Filters ───────────────────────────────────────────────────────────────────

/// Post-tracking filter applied by `finalize` when
/// [`ExportOptions::filter`] is set.  Filters see streamlines after trimming
/// and after the space transform.
pub trait StreamlineFilter: Send + Sync + 'static {
    fn keep(&self, streamline: &ExportedStreamline) -> bool;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Drops streamlines with fewer than `min` points.
#[derive(Clone, Copy, Debug)]
pub struct MinPoints(pub usize);

impl StreamlineFilter for MinPoints {
    fn keep(&self, s: &ExportedStreamline) -> bool {
        s.points.len() >= self.0
    }

    fn name(&self) -> &str {
        "min_points"
    }
}

/// Keeps streamlines whose path length lies in `[min, max]`.
#[derive(Clone, Copy, Debug)]
pub struct PathLengthRange {
    pub min: f32,
    pub max: f32,
}

impl StreamlineFilter for PathLengthRange {
    fn keep(&self, s: &ExportedStreamline) -> bool {
        (self.min..=self.max).contains(&s.path_length())
    }

    fn name(&self) -> &str {
        "path_length_range"
    }
}

/// Drops streamlines that stopped on any of the given bits.
#[derive(Clone, Copy, Debug)]
pub struct RejectFlags(pub StoppingFlags);

impl StreamlineFilter for RejectFlags {
    fn keep(&self, s: &ExportedStreamline) -> bool {
        !s.flags.intersects(self.0)
    }

    fn name(&self) -> &str {
        "reject_flags"
    }
}
