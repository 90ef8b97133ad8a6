//! Random selection of initial centroids and the process-wide random source.

use aligned_vec::{AVec, CACHELINE_ALIGN};
use log::debug;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Draw `n` rows uniformly **with replacement**.
///
/// The same row can be picked more than once, so duplicated initial centroids
/// are possible. Every selected row is copied into the returned buffer.
pub fn subsample_with_replacement<R: Rng>(
    n: usize,
    vecs: &[f64],
    dim: usize,
    rng: &mut R,
) -> AVec<f64> {
    let num = vecs.len() / dim;
    let mut picked = AVec::with_capacity(CACHELINE_ALIGN, n * dim);
    for _ in 0..n {
        let idx = rng.random_range(0..num);
        for &v in &vecs[idx * dim..(idx + 1) * dim] {
            picked.push(v);
        }
    }
    picked
}

/// Process-wide random source.
///
/// Seeded exactly once at startup. Every clustering run takes its own
/// [`StdRng`] stream from it with [`SeedSource::fork`], so concurrent runs
/// only hold the lock for the duration of one `u64` draw.
#[derive(Debug)]
pub struct SeedSource {
    inner: Mutex<StdRng>,
}

impl SeedSource {
    /// Deterministic source, the same seed yields the same sequence of runs.
    pub fn from_seed(seed: u64) -> Self {
        debug!("seed source initialized with seed {}", seed);
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Source seeded from the operating system.
    pub fn from_os_rng() -> Self {
        Self {
            inner: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Independent generator for one clustering run.
    pub fn fork(&self) -> StdRng {
        let seed = self.inner.lock().random::<u64>();
        StdRng::seed_from_u64(seed)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::{SeedSource, subsample_with_replacement};

    #[test]
    fn test_subsample_copies_existing_rows() {
        let dim = 3;
        let vecs: Vec<f64> = (0..30).map(|x| x as f64).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let picked = subsample_with_replacement(25, &vecs, dim, &mut rng);
        assert_eq!(picked.len(), 25 * dim);
        for row in picked.chunks(dim) {
            assert!(vecs.chunks(dim).any(|v| v == row));
        }
    }

    #[test]
    fn test_subsample_with_replacement_repeats() {
        // more draws than rows forces duplicates
        let vecs = [1.0, 2.0];
        let mut rng = StdRng::seed_from_u64(0);
        let picked = subsample_with_replacement(5, &vecs, 1, &mut rng);
        assert_eq!(picked.len(), 5);
        assert!(picked.iter().all(|&v| v == 1.0 || v == 2.0));
    }

    #[test]
    fn test_seed_source_is_reproducible() {
        let a = SeedSource::from_seed(42);
        let b = SeedSource::from_seed(42);
        for _ in 0..4 {
            assert_eq!(a.fork().random::<u64>(), b.fork().random::<u64>());
        }
        let mut first = a.fork();
        let mut second = a.fork();
        assert_ne!(first.random::<u64>(), second.random::<u64>());
    }

    #[test]
    fn test_seed_source_shared_across_threads() {
        let source = Arc::new(SeedSource::from_os_rng());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let source = source.clone();
                std::thread::spawn(move || source.fork().random::<u64>())
            })
            .collect();
        let mut seen: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 8);
    }
}
