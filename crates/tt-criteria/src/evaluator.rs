//! Runs the configured criteria over a batch of streamlines.

use tt_buffer::StreamlineBuffer;
use tt_core::{Point3, StoppingFlags, StreamlineId};

use crate::{CriterionError, CriterionResult, StoppingCriterion};

// ── StopDecision ──────────────────────────────────────────────────────────────

/// Per-streamline outcome of one evaluation, aligned to the `active` slice
/// that was evaluated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StopDecision {
    /// `true` if any criterion fired.
    pub stopping: Vec<bool>,
    /// OR of the bits of every criterion that fired.  Empty when not stopping.
    pub flags:    Vec<StoppingFlags>,
}

impl StopDecision {
    #[inline]
    pub fn len(&self) -> usize {
        self.stopping.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stopping.is_empty()
    }

    /// Number of stopping streamlines.
    pub fn stopped_count(&self) -> usize {
        self.stopping.iter().filter(|&&s| s).count()
    }

    /// Split `active` (the slice this decision was computed for) into
    /// `(continuing, stopping)`, both in input order.
    pub fn partition(&self, active: &[StreamlineId]) -> (Vec<StreamlineId>, Vec<StreamlineId>) {
        let mut continuing = Vec::with_capacity(active.len());
        let mut stopping = Vec::new();
        for (&id, &stop) in active.iter().zip(&self.stopping) {
            if stop { stopping.push(id) } else { continuing.push(id) }
        }
        (continuing, stopping)
    }
}

// ── StoppingEvaluator ─────────────────────────────────────────────────────────

/// An ordered list of [`StoppingCriterion`]s.
///
/// Every criterion is evaluated on every streamline (no short-circuit), so
/// the reported flags name all the reasons a streamline stopped, not only
/// the first.
#[derive(Default)]
pub struct StoppingEvaluator {
    criteria: Vec<Box<dyn StoppingCriterion>>,
}

impl StoppingEvaluator {
    pub fn new() -> Self {
        Self { criteria: Vec::new() }
    }

    /// Append a criterion.  Rejects criteria that do not own exactly one bit.
    pub fn push(&mut self, criterion: Box<dyn StoppingCriterion>) -> CriterionResult<()> {
        let flag = criterion.flag();
        if !flag.is_single_bit() {
            return Err(CriterionError::InvalidFlag {
                criterion: criterion.name().to_owned(),
                bits:      flag.bits(),
            });
        }
        self.criteria.push(criterion);
        Ok(())
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, criterion: impl StoppingCriterion) -> CriterionResult<Self> {
        self.push(Box::new(criterion))?;
        Ok(self)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// `true` if some criterion reports `flag`.
    pub fn reports(&self, flag: StoppingFlags) -> bool {
        self.criteria.iter().any(|c| c.flag().intersects(flag))
    }

    /// Evaluate every criterion on one history.
    ///
    /// `id` is only used to label errors.  Returns the OR of the fired bits
    /// (empty means "keep going").
    pub fn evaluate_one(
        &self,
        id:      StreamlineId,
        history: &[Point3],
    ) -> CriterionResult<StoppingFlags> {
        let mut flags = StoppingFlags::empty();
        for criterion in &self.criteria {
            let fired = criterion.is_stopping(history).map_err(|source| CriterionError::Failed {
                criterion:  criterion.name().to_owned(),
                streamline: id,
                source,
            })?;
            if fired {
                flags |= criterion.flag();
            }
        }
        Ok(flags)
    }

    /// Evaluate every active streamline of `buffer`.
    ///
    /// Pure: the buffer is only read.  The first criterion error aborts the
    /// whole evaluation and nothing of the partial result escapes.
    pub fn evaluate(
        &self,
        buffer: &StreamlineBuffer,
        active: &[StreamlineId],
    ) -> CriterionResult<StopDecision> {
        let mut decision = StopDecision {
            stopping: Vec::with_capacity(active.len()),
            flags:    Vec::with_capacity(active.len()),
        };
        for &id in active {
            buffer.check_active(id)?;
            let flags = self.evaluate_one(id, buffer.streamline(id))?;
            decision.stopping.push(!flags.is_empty());
            decision.flags.push(flags);
        }
        Ok(decision)
    }
}
