//! Page arithmetic shared by the query state and the viewer.
//!
//! Pages are 1-indexed. A table with no rows still has one (empty) page.

/// Number of pages needed to show `row_count` rows, `limit` at a time. Never less than 1.
///
/// `limit` must be non-zero; callers reject a zero page size before getting here.
pub fn page_count(row_count: usize, limit: usize) -> usize {
    debug_assert!(limit > 0, "page size must be non-zero");
    row_count.div_ceil(limit.max(1)).max(1)
}

/// Pull `current` back into `[1, page_count]`.
pub fn clamp_page(current: usize, page_count: usize) -> usize {
    current.min(page_count).max(1)
}

/// Row offset of the first row on `page`. Saturates for absurd page numbers;
/// the page is clamped against the row count before any query uses it.
pub fn offset_for_page(page: usize, limit: usize) -> usize {
    page.saturating_sub(1).saturating_mul(limit)
}

/// Page containing the row at `offset`.
pub fn page_for_offset(offset: usize, limit: usize) -> usize {
    offset / limit.max(1) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count_rounds_up() {
        assert_eq!(page_count(25, 10), 3);
        assert_eq!(page_count(30, 10), 3);
        assert_eq!(page_count(31, 10), 4);
        assert_eq!(page_count(1, 10), 1);
    }

    #[test]
    fn test_page_count_has_floor_of_one() {
        assert_eq!(page_count(0, 10), 1);
        assert_eq!(page_count(0, 1), 1);
    }

    #[test]
    fn test_page_count_matches_ceil_for_small_grid() {
        for rows in 0..60usize {
            for limit in 1..12usize {
                let expected = ((rows as f64) / (limit as f64)).ceil().max(1.0) as usize;
                assert_eq!(page_count(rows, limit), expected, "rows={rows} limit={limit}");
            }
        }
    }

    #[test]
    fn test_clamp_page() {
        assert_eq!(clamp_page(4, 3), 3);
        assert_eq!(clamp_page(2, 3), 2);
        assert_eq!(clamp_page(0, 3), 1);
        assert_eq!(clamp_page(7, 1), 1);
    }

    #[test]
    fn test_offsets() {
        assert_eq!(offset_for_page(1, 10), 0);
        assert_eq!(offset_for_page(3, 10), 20);
        assert_eq!(offset_for_page(0, 10), 0);
        assert_eq!(page_for_offset(20, 10), 3);
        assert_eq!(page_for_offset(25, 10), 3);
        assert_eq!(page_for_offset(0, 10), 1);
    }

    #[test]
    fn test_offset_for_huge_page_saturates() {
        assert_eq!(offset_for_page(usize::MAX, 10), usize::MAX);
        assert_eq!(offset_for_page(usize::MAX, 1), usize::MAX - 1);
    }
}
