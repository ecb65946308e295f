use crate::types::ItemId;

/// Lexicographic r-combinations of a slice of items.
pub struct Combinations<'a> {
    items: &'a [ItemId],
    indices: Vec<usize>,
    done: bool,
}

impl<'a> Combinations<'a> {
    pub fn new(items: &'a [ItemId], size: usize) -> Self {
        Self {
            items,
            indices: (0..size).collect(),
            done: size == 0 || size > items.len(),
        }
    }
}

impl Iterator for Combinations<'_> {
    type Item = Vec<ItemId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = self.indices.iter().map(|&i| self.items[i]).collect();

        // Advance: rightmost index that can still move right
        let n = self.items.len();
        let k = self.indices.len();
        let mut pos = k;
        while pos > 0 {
            pos -= 1;
            if self.indices[pos] < n - k + pos {
                self.indices[pos] += 1;
                for next in pos + 1..k {
                    self.indices[next] = self.indices[next - 1] + 1;
                }
                return Some(current);
            }
        }
        self.done = true;
        Some(current)
    }
}

/// Every non-empty combination of at most `capacity` items: sizes ascending,
/// lexicographic within a size.
pub fn bundles_up_to(items: &[ItemId], capacity: usize) -> Vec<Vec<ItemId>> {
    (1..=capacity.min(items.len()))
        .flat_map(|size| Combinations::new(items, size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u32) -> Vec<ItemId> {
        (0..n).map(ItemId).collect()
    }

    #[test]
    fn enumeration_order_is_stable() {
        let items = ids(3);
        let all = bundles_up_to(&items, 2);
        let expected: Vec<Vec<ItemId>> = vec![
            vec![ItemId(0)],
            vec![ItemId(1)],
            vec![ItemId(2)],
            vec![ItemId(0), ItemId(1)],
            vec![ItemId(0), ItemId(2)],
            vec![ItemId(1), ItemId(2)],
        ];
        assert_eq!(all, expected);
    }

    #[test]
    fn combination_counts_match_binomials() {
        let items = ids(6);
        assert_eq!(Combinations::new(&items, 3).count(), 20);
        assert_eq!(Combinations::new(&items, 6).count(), 1);
        assert_eq!(Combinations::new(&items, 7).count(), 0);
        assert_eq!(bundles_up_to(&items, 10).len(), 63);
    }
}
