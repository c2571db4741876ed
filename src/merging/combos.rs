//! Enumeration of rule combinations.

/// Every non-empty subset of `0..n`, ordered by size and then lexicographically.
///
/// `rule_combinations(3)` yields `[0] [1] [2] [0,1] [0,2] [1,2] [0,1,2]`.
pub fn rule_combinations(n: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::with_capacity((1usize << n.min(20)).saturating_sub(1));
    for size in 1..=n {
        let mut idx: Vec<usize> = (0..size).collect();
        loop {
            out.push(idx.clone());
            // Advance to the next lexicographic k-subset.
            let Some(pos) = (0..size).rev().find(|&i| idx[i] != i + n - size) else {
                break;
            };
            idx[pos] += 1;
            for j in pos + 1..size {
                idx[j] = idx[j - 1] + 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_rules() {
        let c = rule_combinations(3);
        assert_eq!(
            c,
            vec![
                vec![0],
                vec![1],
                vec![2],
                vec![0, 1],
                vec![0, 2],
                vec![1, 2],
                vec![0, 1, 2],
            ]
        );
    }

    #[test]
    fn test_counts() {
        assert!(rule_combinations(0).is_empty());
        for n in 1..8 {
            assert_eq!(rule_combinations(n).len(), (1 << n) - 1);
        }
    }
}
