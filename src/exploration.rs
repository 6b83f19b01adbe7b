use rand::Rng;

use crate::assert_interval;

/// Exploration policy result
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Choice {
    Explore,
    Exploit,
}

/// Epsilon greedy policy with a geometrically decaying epsilon threshold
///
/// The rate decays once per decision toward a floor. A stall counter tracks
/// decisions since the last large reward; past a threshold the rate is
/// boosted back up (capped) and the counter resets, so a stuck policy starts
/// exploring again.
pub struct EpsilonGreedy {
    rate: f32,
    min_rate: f32,
    decay: f32,
    boost_rate: f32,
    stall: u32,
    stall_threshold: u32,
}

impl EpsilonGreedy {
    /// Initialize epsilon greedy policy from start rate, floor, and decay factor
    ///
    /// **Panics** if `rate` is not in the interval `[0,1]`, if `min_rate` is
    /// not in `[0,rate]`, or if `decay` is not in `(0,1]`
    pub fn new(rate: f32, min_rate: f32, decay: f32) -> Self {
        assert_interval!(rate, 0.0, 1.0);
        assert_interval!(min_rate, 0.0, rate);
        assert_interval!(decay, f32::EPSILON, 1.0);
        Self {
            rate,
            min_rate,
            decay,
            boost_rate: 0.2f32.min(rate),
            stall: 0,
            stall_threshold: 200,
        }
    }

    /// Invoke the policy for one decision
    ///
    /// Decays the rate and advances the stall counter as a side effect, so
    /// call it exactly once per action taken.
    pub fn choose<R: Rng>(&mut self, rng: &mut R) -> Choice {
        let choice = if rng.gen::<f32>() < self.rate {
            Choice::Explore
        } else {
            Choice::Exploit
        };

        self.rate = self.min_rate.max(self.rate * self.decay);
        self.stall += 1;
        if self.stall > self.stall_threshold {
            self.rate = self.rate.max(self.boost_rate);
            self.stall = 0;
        }

        choice
    }

    /// Note that a large reward arrived, resetting the stall counter
    pub fn note_progress(&mut self) {
        self.stall = 0;
    }

    /// Current epsilon
    pub fn rate(&self) -> f32 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn rate_decays_toward_floor() {
        let mut eps = EpsilonGreedy::new(0.3, 0.01, 0.995);
        let mut rng = StdRng::seed_from_u64(1);

        let mut prev = eps.rate();
        for _ in 0..150 {
            eps.choose(&mut rng);
            let rate = eps.rate();
            assert!(rate <= prev, "monotone between stall resets");
            assert!((0.01..=1.0).contains(&rate));
            prev = rate;
        }
    }

    #[test]
    fn floor_is_never_crossed() {
        let mut eps = EpsilonGreedy::new(0.3, 0.01, 0.5);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            eps.choose(&mut rng);
            eps.note_progress();
        }
        assert_eq!(eps.rate(), 0.01);
    }

    #[test]
    fn stalling_boosts_the_rate() {
        let mut eps = EpsilonGreedy::new(0.3, 0.01, 0.9);
        let mut rng = StdRng::seed_from_u64(1);

        // No progress signals at all: the rate must come back up.
        for _ in 0..=200 {
            eps.choose(&mut rng);
        }
        assert_eq!(eps.rate(), 0.2);
    }

    #[test]
    fn progress_defers_the_boost() {
        let mut eps = EpsilonGreedy::new(0.3, 0.01, 0.9);
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..400 {
            eps.choose(&mut rng);
            eps.note_progress();
        }
        assert_eq!(eps.rate(), 0.01, "boost never fires while fed");
    }

    #[test]
    #[should_panic]
    fn rejects_floor_above_rate() {
        EpsilonGreedy::new(0.1, 0.5, 0.995);
    }
}
