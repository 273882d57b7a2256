//! Mini-batch partitioning of an index range

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{DenseNetError, Result};

/// How `0..len` is cut into batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Consecutive `batch_size` chunks; the last may be smaller
    #[default]
    Chunks,

    /// `max(len / batch_size, 1)` near-equal parts, larger parts first
    EvenSplit,
}

/// Contiguous, ordered, non-overlapping ranges covering `0..len`
pub fn partition(len: usize, batch_size: usize, strategy: PartitionStrategy) -> Result<Vec<Range<usize>>> {
    if batch_size == 0 {
        return Err(DenseNetError::InvalidConfig(
            "batch_size must be positive".to_string(),
        ));
    }
    if len == 0 {
        return Ok(Vec::new());
    }

    let ranges = match strategy {
        PartitionStrategy::Chunks => (0..len)
            .step_by(batch_size)
            .map(|start| start..(start + batch_size).min(len))
            .collect(),
        PartitionStrategy::EvenSplit => {
            let parts = (len / batch_size).max(1);
            let base = len / parts;
            let extra = len % parts;

            let mut start = 0;
            (0..parts)
                .map(|i| {
                    let size = base + usize::from(i < extra);
                    let range = start..start + size;
                    start += size;
                    range
                })
                .collect()
        }
    };

    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_samples_batch_two() {
        let ranges = partition(4, 2, PartitionStrategy::Chunks).unwrap();
        assert_eq!(ranges, vec![0..2, 2..4]);
    }

    #[test]
    fn test_last_chunk_is_smaller() {
        let ranges = partition(10, 4, PartitionStrategy::Chunks).unwrap();
        assert_eq!(ranges, vec![0..4, 4..8, 8..10]);
    }

    #[test]
    fn test_even_split() {
        // 10 / 4 = 2 parts of 5
        assert_eq!(partition(10, 4, PartitionStrategy::EvenSplit).unwrap(), vec![0..5, 5..10]);
        // 7 / 2 = 3 parts: 3, 2, 2
        assert_eq!(
            partition(7, 2, PartitionStrategy::EvenSplit).unwrap(),
            vec![0..3, 3..5, 5..7]
        );
        // Fewer samples than one batch still yields one part
        assert_eq!(partition(3, 64, PartitionStrategy::EvenSplit).unwrap(), vec![0..3]);
    }

    #[test]
    fn test_cover_everything_once() {
        for strategy in [PartitionStrategy::Chunks, PartitionStrategy::EvenSplit] {
            for len in [1, 5, 63, 64, 65, 200] {
                let ranges = partition(len, 64, strategy).unwrap();
                let covered: Vec<usize> = ranges.into_iter().flatten().collect();
                assert_eq!(covered, (0..len).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_edge_cases() {
        assert!(partition(0, 8, PartitionStrategy::Chunks).unwrap().is_empty());
        assert!(matches!(
            partition(8, 0, PartitionStrategy::Chunks),
            Err(DenseNetError::InvalidConfig(_))
        ));
    }
}
