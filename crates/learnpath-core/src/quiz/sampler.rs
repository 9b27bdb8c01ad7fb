//! Difficulty-weighted question sampling.
//!
//! Each difficulty pool is shuffled independently and contributes a share of
//! the sample:
//!
//! | mode       | easy | medium | hard |
//! |------------|------|--------|------|
//! | standard   | 40%  | 50%    | 10%  |
//! | fast track | 0%   | 60%    | 40%  |
//!
//! Shares are rounded half-up per pool. When rounding overshoots, the pool
//! that rounded up the most gives one back; a shortfall is backfilled from
//! the shuffled leftovers of every pool. The final
//! selection is shuffled again so position does not reveal difficulty.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use super::QuizMode;
use crate::course::{Difficulty, Question};

/// Percent of the sample drawn from the easy, medium and hard pools.
const STANDARD_SHARES: [usize; 3] = [40, 50, 10];
const FAST_TRACK_SHARES: [usize; 3] = [0, 60, 40];

pub struct QuestionSampler;

impl QuestionSampler {
    /// Per-pool targets `[easy, medium, hard]` before backfill. Never sums
    /// to more than `sample_size`.
    pub fn pool_targets(mode: QuizMode, sample_size: usize) -> [usize; 3] {
        let shares = match mode {
            QuizMode::Standard => STANDARD_SHARES,
            QuizMode::FastTrack => FAST_TRACK_SHARES,
        };
        let n = sample_size as u128;
        let mut targets = shares.map(|pct| ((n * pct as u128 + 50) / 100) as usize);

        while targets.iter().map(|&t| t as u128).sum::<u128>() > n {
            // Excess over the exact share, in hundredths; ties go to the larger share.
            let over = (0..3)
                .filter(|&i| targets[i] > 0)
                .max_by_key(|&i| {
                    let excess = (targets[i] as u128 * 100).saturating_sub(n * shares[i] as u128);
                    (excess, shares[i])
                });
            match over {
                Some(i) => targets[i] -= 1,
                None => break,
            }
        }
        targets
    }

    /// Draw `min(sample_size, distinct questions in bank)` questions.
    ///
    /// Pass a seeded RNG for reproducible samples.
    pub fn sample<R: Rng + ?Sized>(
        bank: &[Question],
        mode: QuizMode,
        sample_size: usize,
        rng: &mut R,
    ) -> Vec<Question> {
        let mut seen = HashSet::new();
        let mut pools: [Vec<&Question>; 3] = Default::default();
        for question in bank {
            if seen.insert(question.id.as_str()) {
                pools[pool_index(question.difficulty)].push(question);
            }
        }

        let requested = sample_size;
        let sample_size = sample_size.min(seen.len());
        let targets = Self::pool_targets(mode, sample_size);
        let mut selected: Vec<&Question> = Vec::with_capacity(sample_size);
        let mut leftovers: Vec<&Question> = Vec::new();
        for (pool, target) in pools.iter_mut().zip(targets) {
            pool.shuffle(rng);
            let take = target.min(pool.len());
            selected.extend_from_slice(&pool[..take]);
            leftovers.extend_from_slice(&pool[take..]);
        }

        if selected.len() < sample_size {
            leftovers.shuffle(rng);
            let missing = sample_size - selected.len();
            selected.extend(leftovers.into_iter().take(missing));
        }

        selected.shuffle(rng);
        tracing::debug!(
            %mode,
            requested,
            drawn = selected.len(),
            bank = seen.len(),
            "sampled quiz questions"
        );
        selected.into_iter().cloned().collect()
    }
}

fn pool_index(difficulty: Difficulty) -> usize {
    match difficulty {
        Difficulty::Easy => 0,
        Difficulty::Medium => 1,
        Difficulty::Hard => 2,
    }
}
