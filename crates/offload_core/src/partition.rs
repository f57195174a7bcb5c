//! Decomposition of `[0, N)` into fixed-size work-groups.
//!
//! The grid is one-dimensional until the group count exceeds the device's
//! per-dimension limit, at which point it folds into rows of `groups_x`
//! groups. A work-item at global id `(gx, gy)` owns index
//! `gy * row_pitch + gx`; ids at or beyond `len` fall into padding and must
//! be masked by the kernel.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    #[error("local group size must be non-zero")]
    ZeroLocalSize,
    #[error("{len} elements exceed the 32-bit global index space")]
    LengthOverflow { len: usize },
    #[error("{groups} work-groups do not fit a {limit}x{limit} dispatch grid")]
    TooManyGroups { groups: u64, limit: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkPartition {
    len: u32,
    local_size: u32,
    groups_x: u32,
    groups_y: u32,
}

impl WorkPartition {
    pub fn new(
        len: usize,
        local_size: u32,
        max_groups_per_dim: u32,
    ) -> Result<Self, PartitionError> {
        if local_size == 0 {
            return Err(PartitionError::ZeroLocalSize);
        }
        let len32 = u32::try_from(len).map_err(|_| PartitionError::LengthOverflow { len })?;
        if len32 == 0 {
            return Ok(Self {
                len: 0,
                local_size,
                groups_x: 0,
                groups_y: 0,
            });
        }

        let limit = max_groups_per_dim.max(1);
        let total = u64::from(len32).div_ceil(u64::from(local_size));
        let groups_x = total.min(u64::from(limit));
        let groups_y = total.div_ceil(groups_x);
        if groups_y > u64::from(limit) {
            return Err(PartitionError::TooManyGroups {
                groups: total,
                limit,
            });
        }
        // Every padded id must still be addressable as a u32 index.
        let padded = groups_x * groups_y * u64::from(local_size);
        if padded > u64::from(u32::MAX) {
            return Err(PartitionError::LengthOverflow { len });
        }

        Ok(Self {
            len: len32,
            local_size,
            groups_x: groups_x as u32,
            groups_y: groups_y as u32,
        })
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn local_size(&self) -> u32 {
        self.local_size
    }

    /// Work-group counts to pass to the dispatch call.
    pub fn groups(&self) -> (u32, u32, u32) {
        if self.is_empty() {
            (0, 0, 0)
        } else {
            (self.groups_x, self.groups_y, 1)
        }
    }

    /// Global ids per grid row.
    pub fn row_pitch(&self) -> u32 {
        self.groups_x * self.local_size
    }

    /// Total work-items launched, padding included.
    pub fn launched_items(&self) -> u64 {
        u64::from(self.groups_x) * u64::from(self.groups_y) * u64::from(self.local_size)
    }

    /// The element owned by the work-item at global id `(gx, gy)`, or `None` for padding.
    pub fn index_of(&self, gx: u32, gy: u32) -> Option<u32> {
        let index = u64::from(gy) * u64::from(self.row_pitch()) + u64::from(gx);
        (index < u64::from(self.len)).then_some(index as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn covered_indices(partition: &WorkPartition) -> Vec<u32> {
        let (_, groups_y, _) = partition.groups();
        let mut seen = Vec::new();
        for gy in 0..groups_y {
            for gx in 0..partition.row_pitch() {
                if let Some(index) = partition.index_of(gx, gy) {
                    seen.push(index);
                }
            }
        }
        seen
    }

    #[test]
    fn empty_range_dispatches_nothing() {
        let partition = WorkPartition::new(0, 8, 65_535).unwrap();
        assert!(partition.is_empty());
        assert_eq!(partition.groups(), (0, 0, 0));
        assert_eq!(partition.launched_items(), 0);
        assert!(covered_indices(&partition).is_empty());
    }

    #[test]
    fn single_element_gets_one_group() {
        let partition = WorkPartition::new(1, 8, 65_535).unwrap();
        assert_eq!(partition.groups(), (1, 1, 1));
        assert_eq!(covered_indices(&partition), vec![0]);
    }

    #[test]
    fn ragged_tail_is_padded_not_dropped() {
        let partition = WorkPartition::new(21, 8, 65_535).unwrap();
        assert_eq!(partition.groups(), (3, 1, 1));
        assert_eq!(partition.launched_items(), 24);
        assert_eq!(covered_indices(&partition), (0..21).collect::<Vec<_>>());
    }

    #[test]
    fn folds_into_second_dimension_past_limit() {
        let partition = WorkPartition::new(100, 4, 8).unwrap();
        // 25 groups over rows of 8.
        assert_eq!(partition.groups(), (8, 4, 1));
        assert_eq!(partition.row_pitch(), 32);
        assert_eq!(covered_indices(&partition), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn rejects_grids_beyond_device_limits() {
        assert_eq!(
            WorkPartition::new(1_000, 1, 16),
            Err(PartitionError::TooManyGroups {
                groups: 1_000,
                limit: 16
            })
        );
        assert_eq!(
            WorkPartition::new(10, 0, 16),
            Err(PartitionError::ZeroLocalSize)
        );
    }

    proptest! {
        #[test]
        fn every_index_is_covered_exactly_once(
            len in 0usize..2_000,
            local_size in 1u32..=32,
            limit in 1u32..=64,
        ) {
            let partition = match WorkPartition::new(len, local_size, limit) {
                Ok(partition) => partition,
                Err(PartitionError::TooManyGroups { .. }) => return Ok(()),
                Err(other) => panic!("unexpected error: {other}"),
            };
            let seen = covered_indices(&partition);
            let expected: Vec<u32> = (0..len as u32).collect();
            prop_assert_eq!(seen, expected);
            prop_assert!(partition.launched_items() >= len as u64);
            if len > 0 {
                prop_assert!(
                    partition.launched_items() < len as u64 + u64::from(partition.row_pitch())
                );
            }
        }
    }
}
