//! One lockstep tracking step over the active rows.

use tt_core::{Point3, StreamlineId};

use crate::{BufferError, BufferResult, StreamlineBuffer};

/// Appends one point to every active streamline.
///
/// `advance` is all-or-nothing: every row is checked (in range, active,
/// unique, room for one more point) before the first write, so an error
/// leaves the buffer untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepIntegrator;

impl StepIntegrator {
    /// For each `active[k]`, write `head + directions[k]` and extend the row
    /// by one point.
    ///
    /// `directions` are displacements already scaled to the step size.
    pub fn advance(
        &self,
        buffer:     &mut StreamlineBuffer,
        active:     &[StreamlineId],
        directions: &[Point3],
    ) -> BufferResult<()> {
        if directions.len() != active.len() {
            return Err(BufferError::CountMismatch {
                expected: active.len(),
                got:      directions.len(),
                what:     "directions",
            });
        }

        let mut seen = vec![false; buffer.count];
        for &id in active {
            buffer.check_active(id)?;
            if std::mem::replace(&mut seen[id.index()], true) {
                return Err(BufferError::InvalidIndex(id));
            }
            if buffer.len_of(id) >= buffer.capacity() {
                return Err(BufferError::CapacityExceeded {
                    streamline: id,
                    capacity:   buffer.capacity(),
                });
            }
        }

        for (&id, &dir) in active.iter().zip(directions) {
            let next = buffer.head(id) + dir;
            buffer.stage_next(id, next)?;
        }
        for &id in active {
            buffer.lengths[id.index()] += 1;
        }
        Ok(())
    }

    /// Undo the last `advance` over the same `active` set.
    ///
    /// The dropped point stays in memory past the valid length, where
    /// nothing reads it.
    pub fn retract(&self, buffer: &mut StreamlineBuffer, active: &[StreamlineId]) {
        for &id in active {
            let len = &mut buffer.lengths[id.index()];
            if *len > 1 {
                *len -= 1;
            }
        }
    }
}
