// ── Jitter animator ──
//
// Purely cosmetic simulated movement so demo/test devices appear live
// between real updates. Each tick nudges every registered device by a
// random offset in a fixed degree band; the base position is replaced
// by the nudged one, so the motion is a random walk -- drift
// accumulates instead of oscillating around a fixed anchor.

use std::f64::consts::TAU;

use rand::Rng;

use crate::config::JitterConfig;
use crate::model::LngLat;

/// Random-walk displacement generator, generic over its random source
/// so tests can drive it with a seeded RNG.
pub struct JitterAnimator<R> {
    rng: R,
    config: JitterConfig,
}

impl<R: Rng> JitterAnimator<R> {
    pub fn new(rng: R, config: JitterConfig) -> Self {
        Self { rng, config }
    }

    pub fn config(&self) -> &JitterConfig {
        &self.config
    }

    /// Displace a base position by one random step: magnitude uniform
    /// in the configured band, direction uniform in [0, 2π).
    pub fn displace(&mut self, base: LngLat) -> LngLat {
        let magnitude = self
            .rng
            .gen_range(self.config.min_magnitude_deg..self.config.max_magnitude_deg);
        let angle = self.rng.gen_range(0.0..TAU);
        LngLat::new(
            base.lon + magnitude * angle.cos(),
            base.lat + magnitude * angle.sin(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn animator(seed: u64) -> JitterAnimator<SmallRng> {
        JitterAnimator::new(SmallRng::seed_from_u64(seed), JitterConfig::default())
    }

    #[test]
    fn each_step_stays_inside_the_magnitude_band() {
        let mut anim = animator(7);
        let config = JitterConfig::default();
        let mut position = LngLat::new(10.0, 20.0);
        for _ in 0..1000 {
            let next = anim.displace(position);
            let step = next.distance_deg(&position);
            assert!(step >= config.min_magnitude_deg);
            assert!(step <= config.max_magnitude_deg);
            position = next;
        }
    }

    #[test]
    fn seeded_walk_is_deterministic() {
        let base = LngLat::new(-3.0, 50.0);
        let a = animator(42).displace(base);
        let b = animator(42).displace(base);
        assert_eq!(a, b);
    }

    #[test]
    fn successive_steps_accumulate_from_the_new_base() {
        // Two ticks from the same animator walk away from the origin
        // via the intermediate position, not around it.
        let mut anim = animator(3);
        let origin = LngLat::new(0.0, 0.0);
        let first = anim.displace(origin);
        let second = anim.displace(first);

        assert!(first.distance_deg(&origin) > 0.0);
        assert!(second.distance_deg(&first) > 0.0);
        // The second step is measured from `first`, so its distance
        // from the origin can exceed the per-step upper bound only
        // through accumulation.
        let band = JitterConfig::default();
        assert!(second.distance_deg(&first) <= band.max_magnitude_deg);
    }
}
