/// Calculates the integer `ordering` key for a node placed between two siblings
///
/// Orderings are plain integers. A new last child takes `max + 1`; a node
/// placed between two siblings takes the midpoint when a gap exists. When the
/// neighbours are adjacent there is no free key and the caller must renumber
/// (shift every sibling from `next` onwards by one) before inserting.
pub struct OrderingCalculator;

impl OrderingCalculator {
    /// Ordering for inserting between `prev` and `next`
    ///
    /// Returns `None` when `prev` and `next` are adjacent and siblings must be
    /// renumbered first.
    ///
    /// # Examples
    /// ```
    /// use hierarchy_core::operations::OrderingCalculator;
    ///
    /// // Only child
    /// assert_eq!(OrderingCalculator::between(None, None), Some(0));
    /// // After the last sibling
    /// assert_eq!(OrderingCalculator::between(Some(3), None), Some(4));
    /// // Before the first sibling
    /// assert_eq!(OrderingCalculator::between(None, Some(0)), Some(-1));
    /// // In a gap
    /// assert_eq!(OrderingCalculator::between(Some(2), Some(6)), Some(4));
    /// // No gap left
    /// assert_eq!(OrderingCalculator::between(Some(2), Some(3)), None);
    /// ```
    pub fn between(prev: Option<i64>, next: Option<i64>) -> Option<i64> {
        match (prev, next) {
            (None, None) => Some(0),
            (Some(prev), None) => Some(prev + 1),
            (None, Some(next)) => Some(next - 1),
            (Some(prev), Some(next)) if next - prev > 1 => Some(prev + (next - prev) / 2),
            (Some(_), Some(_)) => None,
        }
    }

    /// Whether any two consecutive orderings collide
    pub fn has_ties(orderings: &[i64]) -> bool {
        orderings.windows(2).any(|pair| pair[0] == pair[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_child() {
        assert_eq!(OrderingCalculator::between(None, None), Some(0));
    }

    #[test]
    fn test_after_last() {
        assert_eq!(OrderingCalculator::between(Some(7), None), Some(8));
    }

    #[test]
    fn test_before_first() {
        assert_eq!(OrderingCalculator::between(None, Some(5)), Some(4));
    }

    #[test]
    fn test_midpoint_rounds_down() {
        assert_eq!(OrderingCalculator::between(Some(1), Some(4)), Some(2));
    }

    #[test]
    fn test_adjacent_needs_renumbering() {
        assert_eq!(OrderingCalculator::between(Some(1), Some(2)), None);
    }

    #[test]
    fn test_has_ties() {
        assert!(!OrderingCalculator::has_ties(&[0, 1, 2]));
        assert!(OrderingCalculator::has_ties(&[0, 1, 1]));
    }
}
