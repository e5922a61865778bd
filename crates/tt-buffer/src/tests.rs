//! Unit tests for tt-buffer.

#[cfg(test)]
use tt_core::{Point3, SeedId, StoppingFlags, StreamlineId};

#[cfg(test)]
use crate::{BufferError, StepIntegrator, StreamlineBuffer};

#[cfg(test)]
fn line_buffer(n: usize, capacity: usize) -> StreamlineBuffer {
    let seeds: Vec<Point3> = (0..n).map(|i| Point3::new(0.0, i as f32, 0.0)).collect();
    let ids = (0..n as u32).map(SeedId).collect();
    StreamlineBuffer::new(&seeds, ids, capacity).unwrap()
}

#[cfg(test)]
fn all_ids(n: usize) -> Vec<StreamlineId> {
    (0..n as u32).map(StreamlineId).collect()
}

#[cfg(test)]
mod store {
    use super::*;

    #[test]
    fn new_writes_seeds() {
        let buf = line_buffer(3, 4);
        assert_eq!(buf.count, 3);
        assert_eq!(buf.capacity(), 4);
        for id in buf.ids() {
            assert_eq!(buf.streamline(id), &[Point3::new(0.0, id.0 as f32, 0.0)]);
            assert_eq!(buf.seeds[id.index()], buf.head(id));
            assert!(!buf.dones[id.index()]);
            assert!(buf.flags[id.index()].is_empty());
        }
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(StreamlineBuffer::new(&[Point3::ZERO], vec![SeedId(0)], 0).is_err());
    }

    #[test]
    fn seed_id_count_mismatch_rejected() {
        let err = StreamlineBuffer::new(&[Point3::ZERO; 2], vec![SeedId(0)], 3);
        assert!(matches!(err, Err(BufferError::CountMismatch { expected: 2, got: 1, .. })));
    }

    #[test]
    fn empty_batch() {
        let buf = line_buffer(0, 4);
        assert!(buf.is_empty());
        assert_eq!(buf.ids().count(), 0);
    }

    #[test]
    fn finish_exactly_once() {
        let mut buf = line_buffer(2, 4);
        buf.finish(StreamlineId(1), StoppingFlags::MASK).unwrap();
        assert!(buf.dones[1]);
        assert_eq!(buf.flags[1], StoppingFlags::MASK);
        assert!(matches!(
            buf.finish(StreamlineId(1), StoppingFlags::LENGTH),
            Err(BufferError::InvalidIndex(StreamlineId(1)))
        ));
        assert_eq!(buf.flags[1], StoppingFlags::MASK);
    }

    #[test]
    fn check_active_out_of_range() {
        let buf = line_buffer(2, 4);
        assert!(buf.check_active(StreamlineId(2)).is_err());
        assert!(buf.check_active(StreamlineId::INVALID).is_err());
    }

    #[test]
    fn overwrite_replaces_prefix() {
        let mut buf = line_buffer(1, 4);
        let path = [Point3::ZERO, Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)];
        buf.overwrite(StreamlineId(0), &path).unwrap();
        assert_eq!(buf.streamline(StreamlineId(0)), &path);
        assert!(buf.overwrite(StreamlineId(0), &[Point3::ZERO; 5]).is_err());
        assert!(buf.overwrite(StreamlineId(0), &[]).is_err());
    }

    #[test]
    fn grow_preserves_rows_bit_for_bit() {
        let mut buf = line_buffer(3, 3);
        let integrator = StepIntegrator;
        let ids = all_ids(3);
        let dirs = vec![Point3::new(0.1, 0.2, 0.3); 3];
        integrator.advance(&mut buf, &ids, &dirs).unwrap();
        integrator.advance(&mut buf, &ids, &dirs).unwrap();

        let before: Vec<Vec<[u32; 3]>> = ids
            .iter()
            .map(|&id| {
                buf.streamline(id)
                    .iter()
                    .map(|p| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
                    .collect()
            })
            .collect();

        buf.grow(10);
        assert_eq!(buf.capacity(), 10);
        for (&id, old) in ids.iter().zip(&before) {
            let now: Vec<[u32; 3]> = buf
                .streamline(id)
                .iter()
                .map(|p| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
                .collect();
            assert_eq!(&now, old);
            assert_eq!(buf.seed_ids[id.index()], SeedId(id.0));
        }
    }

    #[test]
    fn grow_never_shrinks() {
        let mut buf = line_buffer(1, 6);
        buf.grow(2);
        assert_eq!(buf.capacity(), 6);
    }
}

#[cfg(test)]
mod integrator {
    use super::*;

    #[test]
    fn advance_appends_head_plus_direction() {
        let mut buf = line_buffer(2, 4);
        let ids = all_ids(2);
        StepIntegrator
            .advance(&mut buf, &ids, &[Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 0.0, -1.0)])
            .unwrap();
        assert_eq!(buf.streamline(StreamlineId(0)), &[Point3::ZERO, Point3::new(1.0, 0.0, 0.0)]);
        assert_eq!(buf.head(StreamlineId(1)), Point3::new(0.0, 1.0, -1.0));
        assert_eq!(buf.lengths, vec![2, 2]);
    }

    #[test]
    fn only_active_rows_move() {
        let mut buf = line_buffer(3, 4);
        StepIntegrator
            .advance(&mut buf, &[StreamlineId(1)], &[Point3::new(1.0, 0.0, 0.0)])
            .unwrap();
        assert_eq!(buf.lengths, vec![1, 2, 1]);
    }

    #[test]
    fn capacity_exceeded_writes_nothing() {
        let mut buf = line_buffer(2, 2);
        let ids = all_ids(2);
        let dirs = vec![Point3::new(1.0, 0.0, 0.0); 2];
        StepIntegrator.advance(&mut buf, &ids, &dirs).unwrap();
        let err = StepIntegrator.advance(&mut buf, &ids, &dirs);
        assert!(matches!(err, Err(BufferError::CapacityExceeded { capacity: 2, .. })));
        assert_eq!(buf.lengths, vec![2, 2]);
    }

    #[test]
    fn done_row_is_invalid_index() {
        let mut buf = line_buffer(2, 4);
        buf.finish(StreamlineId(0), StoppingFlags::TARGET).unwrap();
        let err = StepIntegrator.advance(&mut buf, &all_ids(2), &[Point3::ZERO; 2]);
        assert!(matches!(err, Err(BufferError::InvalidIndex(StreamlineId(0)))));
        assert_eq!(buf.lengths, vec![1, 1]);
    }

    #[test]
    fn duplicate_index_rejected() {
        let mut buf = line_buffer(2, 4);
        let ids = [StreamlineId(1), StreamlineId(1)];
        assert!(StepIntegrator.advance(&mut buf, &ids, &[Point3::ZERO; 2]).is_err());
        assert_eq!(buf.lengths, vec![1, 1]);
    }

    #[test]
    fn direction_count_mismatch() {
        let mut buf = line_buffer(2, 4);
        let err = StepIntegrator.advance(&mut buf, &all_ids(2), &[Point3::ZERO]);
        assert!(matches!(err, Err(BufferError::CountMismatch { expected: 2, got: 1, .. })));
    }

    #[test]
    fn retract_undoes_advance() {
        let mut buf = line_buffer(2, 4);
        let ids = all_ids(2);
        StepIntegrator.advance(&mut buf, &ids, &[Point3::new(1.0, 1.0, 1.0); 2]).unwrap();
        StepIntegrator.retract(&mut buf, &ids);
        assert_eq!(buf.lengths, vec![1, 1]);
        assert_eq!(buf.streamline(StreamlineId(1)), &[Point3::new(0.0, 1.0, 0.0)]);
    }
}
