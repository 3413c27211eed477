use std::ops::Range;

/// A contiguous slice of the input, identified by its position in the partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub range: Range<usize>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Split `len` items into consecutive chunks of at most `chunk_size` items.
///
/// Produces `ceil(len / chunk_size)` chunks; only the last one may be shorter.
/// `chunk_size` must be at least 1 (guaranteed by `BatchConfig`).
pub fn partition(len: usize, chunk_size: usize) -> Vec<Chunk> {
    debug_assert!(chunk_size >= 1, "chunk_size must be positive");
    let chunk_size = chunk_size.max(1);

    (0..len)
        .step_by(chunk_size)
        .enumerate()
        .map(|(index, start)| Chunk {
            index,
            range: start..std::cmp::min(start + chunk_size, len),
        })
        .collect()
}

/// Number of chunks `partition(len, chunk_size)` would produce
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exhaustive_and_disjoint(len: usize, chunk_size: usize) {
        let chunks = partition(len, chunk_size);
        assert_eq!(chunks.len(), chunk_count(len, chunk_size));

        let mut next = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.range.start, next, "gap or overlap at chunk {i}");
            assert!(chunk.len() <= chunk_size);
            assert!(!chunk.is_empty());
            next = chunk.range.end;
        }
        assert_eq!(next, len);
        assert_eq!(chunks.iter().map(Chunk::len).sum::<usize>(), len);
    }

    #[test]
    fn test_partition_properties() {
        for len in [1, 2, 7, 99, 100, 101, 1000, 1001] {
            for chunk_size in [1, 3, 10, 100, 1000, 5000] {
                assert_exhaustive_and_disjoint(len, chunk_size);
            }
        }
    }

    #[test]
    fn test_last_chunk_is_shorter() {
        let chunks = partition(1001, 100);
        assert_eq!(chunks.len(), 11);
        assert_eq!(chunks[10].range, 1000..1001);
        assert!(chunks[..10].iter().all(|c| c.len() == 100));
    }

    #[test]
    fn test_empty_input_has_no_chunks() {
        assert!(partition(0, 10).is_empty());
        assert_eq!(chunk_count(0, 10), 0);
    }

    #[test]
    fn test_chunk_larger_than_input() {
        let chunks = partition(5, 1000);
        assert_eq!(chunks, vec![Chunk { index: 0, range: 0..5 }]);
    }
}
