//! Page ranges and their partitioning into per-process chunks.

use crate::error::DispatchError;
use std::fmt;

/// Inclusive range of pages `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkRange {
    pub start: i64,
    pub end: i64,
}

impl WorkRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Number of pages covered; zero when `end < start`.
    pub fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            (self.end as i128 - self.start as i128 + 1) as u64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Pages in ascending order.
    pub fn pages(&self) -> impl Iterator<Item = i64> {
        self.start..=self.end
    }
}

impl fmt::Display for WorkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Split `[start, end]` into at most `processes` contiguous sub-ranges.
///
/// Every chunk holds `ceil(total / processes)` pages except possibly the last,
/// which is shorter. When the range has fewer pages than `processes`, fewer
/// chunks come back; an empty range yields no chunks at all. Output is in
/// ascending page order and depends only on the inputs.
pub fn partition(start: i64, end: i64, processes: usize) -> Result<Vec<WorkRange>, DispatchError> {
    if processes == 0 {
        return Err(DispatchError::InvalidConfiguration { processes });
    }

    let total = end as i128 - start as i128 + 1;
    if total <= 0 {
        return Ok(Vec::new());
    }

    let processes = processes as i128;
    let per_process = (total + processes - 1) / processes;

    let mut ranges = Vec::new();
    let mut chunk_start = start as i128;
    while chunk_start <= end as i128 {
        let chunk_end = (chunk_start + per_process - 1).min(end as i128);
        ranges.push(WorkRange::new(chunk_start as i64, chunk_end as i64));
        chunk_start = chunk_end + 1;
    }

    Ok(ranges)
}

/// Convenience wrapper over [`partition`] for an existing range.
pub fn partition_range(range: WorkRange, processes: usize) -> Result<Vec<WorkRange>, DispatchError> {
    partition(range.start, range.end, processes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(ranges: &[WorkRange]) -> Vec<(i64, i64)> {
        ranges.iter().map(|r| (r.start, r.end)).collect()
    }

    #[test]
    fn test_ten_pages_over_four_processes() {
        let ranges = partition(0, 9, 4).unwrap();
        assert_eq!(pairs(&ranges), vec![(0, 2), (3, 5), (6, 8), (9, 9)]);
    }

    #[test]
    fn test_fewer_pages_than_processes() {
        let ranges = partition(1, 3, 4).unwrap();
        assert_eq!(pairs(&ranges), vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_even_split() {
        let ranges = partition(1, 4, 2).unwrap();
        assert_eq!(pairs(&ranges), vec![(1, 2), (3, 4)]);
    }

    #[test]
    fn test_single_process_takes_everything() {
        let ranges = partition(5, 105, 1).unwrap();
        assert_eq!(pairs(&ranges), vec![(5, 105)]);
    }

    #[test]
    fn test_empty_range() {
        assert!(partition(10, 9, 3).unwrap().is_empty());
        assert!(partition(10, 0, 1).unwrap().is_empty());
    }

    #[test]
    fn test_zero_processes_rejected() {
        let err = partition(0, 9, 0).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidConfiguration { processes: 0 }));
    }

    #[test]
    fn test_zero_processes_rejected_even_for_empty_range() {
        assert!(partition(9, 0, 0).is_err());
    }

    #[test]
    fn test_negative_pages() {
        let ranges = partition(-5, 4, 3).unwrap();
        assert_eq!(pairs(&ranges), vec![(-5, -2), (-1, 2), (3, 4)]);
    }

    #[test]
    fn test_remainder_never_produces_empty_chunk() {
        // ceil(5 / 4) = 2 -> chunks of 2,2,1; the fourth process gets nothing
        let ranges = partition(1, 5, 4).unwrap();
        assert_eq!(pairs(&ranges), vec![(1, 2), (3, 4), (5, 5)]);
        assert!(ranges.iter().all(|r| !r.is_empty()));
    }

    #[test]
    fn test_extreme_bounds_do_not_overflow() {
        let ranges = partition(i64::MAX - 2, i64::MAX, 2).unwrap();
        assert_eq!(
            pairs(&ranges),
            vec![(i64::MAX - 2, i64::MAX - 1), (i64::MAX, i64::MAX)]
        );
    }

    #[test]
    fn test_work_range_len_and_pages() {
        let range = WorkRange::new(3, 6);
        assert_eq!(range.len(), 4);
        assert_eq!(range.pages().collect::<Vec<_>>(), vec![3, 4, 5, 6]);
        assert_eq!(range.to_string(), "[3, 6]");
        assert_eq!(WorkRange::new(4, 3).len(), 0);
    }
}
