//! Compute the distance between vectors.

/// Squared Euclidean distance. Only the relative order matters to the
/// assignment stage, so the square root is never taken.
#[inline]
pub fn squared_euclidean(lhs: &[f64], rhs: &[f64]) -> f64 {
    debug_assert_eq!(lhs.len(), rhs.len());
    lhs.iter()
        .zip(rhs.iter())
        .map(|(&l, &r)| (l - r) * (l - r))
        .sum()
}

/// Index of the minimal value. The first one wins on ties.
#[inline]
pub fn argmin(vec: &[f64]) -> usize {
    let mut index = 0;
    let mut minimal = f64::MAX;
    for (i, &val) in vec.iter().enumerate() {
        if val < minimal {
            minimal = val;
            index = i;
        }
    }
    index
}

#[cfg(test)]
mod test {
    use super::{argmin, squared_euclidean};

    #[test]
    fn test_squared_euclidean() {
        assert_eq!(squared_euclidean(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(squared_euclidean(&[1.5, -2.0, 7.0], &[1.5, -2.0, 7.0]), 0.0);
        assert_eq!(squared_euclidean(&[], &[]), 0.0);
    }

    #[test]
    fn test_argmin_first_wins() {
        assert_eq!(argmin(&[3.0, 1.0, 2.0, 1.0]), 1);
        assert_eq!(argmin(&[0.5, 0.5, 0.5]), 0);
        assert_eq!(argmin(&[9.0, 4.0, 4.0, 8.0, 0.0]), 4);
    }
}
