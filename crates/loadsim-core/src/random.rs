//! The pseudo-random processes driving the workload: a precomputed pool of
//! Poisson-like inter-arrival delays and a Box-Muller payload size draw.

use rand::prelude::*;

use crate::units::{Bytes, Millis};

/// Shape parameter of the discrete inter-arrival draw. `k / LAMBDA` has
/// mean 1, so pool entries center on the configured mean delay.
const LAMBDA: f64 = 100.0;

/// Number of delays held by an [`InterArrivalPool`].
const POOL_SIZE: usize = 500;

/// Draws the smallest `k` for which a running product of uniform(0, 1)
/// draws falls below `e^-LAMBDA`. `k` is Poisson-distributed with mean
/// `LAMBDA`.
fn next_poisson<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    let limit = (-LAMBDA).exp();
    let mut product: f64 = rng.gen();
    let mut k = 0;
    while product >= limit {
        product *= rng.gen::<f64>();
        k += 1;
    }
    k
}

/// A precomputed pool of randomized inter-arrival delays.
///
/// The sampling loop in [`next_poisson`] takes around `LAMBDA` uniform
/// draws per sample, so the pool is filled once per rate change and a delay
/// is then a uniformly-random pick from it, with replacement.
#[derive(Debug, Clone)]
pub struct InterArrivalPool {
    delays: Vec<Millis>,
}

impl InterArrivalPool {
    /// Builds a pool for `rate` requests per second.
    pub fn new<R: Rng + ?Sized>(rate: f64, rng: &mut R) -> Self {
        let mean = 1000.0 / rate;
        let mut factors = (0..POOL_SIZE)
            .map(|_| next_poisson(rng) as f64 / LAMBDA)
            .collect::<Vec<_>>();
        factors.shuffle(rng);
        let delays = factors
            .into_iter()
            .map(|factor| Millis::new((factor * mean).round() as u64))
            .collect();
        Self { delays }
    }

    /// Picks the next delay.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Millis {
        *self.delays.choose(rng).unwrap() // the pool is never empty
    }

    delegate::delegate! {
        to self.delays {
            /// Number of pooled delays.
            pub fn len(&self) -> usize;

            /// Whether the pool is empty. It never is.
            pub fn is_empty(&self) -> bool;
        }
    }
}

/// Draws a payload size from `N(mean, sigma)` via the Box-Muller transform,
/// rounded to the nearest byte. Negative draws clamp to zero.
pub fn next_size<R: Rng + ?Sized>(mean: f64, sigma: f64, rng: &mut R) -> Bytes {
    // `a` stays in (0, 1] so the logarithm is finite.
    let a: f64 = 1.0 - rng.gen::<f64>();
    let b: f64 = rng.gen();
    let radius = (-2.0 * a.ln()).sqrt();
    let angle = std::f64::consts::TAU * b;
    let z = if rng.gen::<bool>() {
        radius * angle.sin()
    } else {
        radius * angle.cos()
    };
    Bytes::new((z * sigma + mean).round().max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use rand_distr::{Distribution, Normal};

    use crate::testing;

    use super::*;

    #[test]
    fn pool_has_fixed_capacity() {
        let mut rng = testing::rng();
        let pool = InterArrivalPool::new(10.0, &mut rng);
        assert_eq!(pool.len(), POOL_SIZE);
    }

    #[test]
    fn pool_mean_tracks_rate() {
        let mut rng = testing::rng();
        let pool = InterArrivalPool::new(10.0, &mut rng);
        let total: u64 = (0..10_000)
            .map(|_| pool.draw(&mut rng).into_u64())
            .sum();
        let mean = total as f64 / 10_000.0;
        // 10 requests per second puts the mean delay at 100ms.
        assert!((90.0..110.0).contains(&mean), "mean delay was {mean}");
    }

    #[test]
    fn poisson_draw_centers_on_lambda() {
        let mut rng = testing::rng();
        let total: u64 = (0..2_000).map(|_| next_poisson(&mut rng)).sum();
        let mean = total as f64 / 2_000.0;
        assert!((95.0..105.0).contains(&mean), "mean draw was {mean}");
    }

    #[test]
    fn size_draw_matches_reference_normal() {
        let mut rng = testing::rng();
        let n = 10_000;
        let ours: u64 = (0..n)
            .map(|_| next_size(1000.0, 10.0, &mut rng).into_u64())
            .sum();
        let reference = Normal::new(1000.0, 10.0).unwrap();
        let theirs: f64 = (0..n).map(|_| reference.sample(&mut rng)).sum();
        let gap = (ours as f64 / n as f64 - theirs / n as f64).abs();
        assert!(gap < 2.0, "sample means diverged by {gap}");
    }

    #[test]
    fn size_draw_is_exact_with_zero_sigma() {
        let mut rng = testing::rng();
        for _ in 0..100 {
            assert_eq!(next_size(1234.0, 0.0, &mut rng), Bytes::new(1234));
        }
    }

    #[test]
    fn negative_size_draws_clamp_to_zero() {
        let mut rng = testing::rng();
        let sizes = (0..1_000)
            .map(|_| next_size(0.0, 100.0, &mut rng))
            .collect::<Vec<_>>();
        // Roughly half of the raw draws are negative, so the clamp must
        // show up as a zero.
        assert!(sizes.contains(&Bytes::ZERO));
    }
}
