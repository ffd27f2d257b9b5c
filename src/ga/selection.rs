//! Parent selection strategies for the single-objective GA.
//!
//! Selection works on a slice of fitness values. Fitness is **maximized**:
//! every merit the scheduler optimizes is "higher is better".
//!
//! # References
//!
//! - Blickle & Thiele (1996), "A Comparison of Selection Schemes used in
//!   Evolutionary Algorithms"
//! - Baker (1985), "Adaptive Selection Methods for Genetic Algorithms"

use rand::Rng;

/// Selection strategy for choosing parents.
///
/// # Examples
///
/// ```
/// use u_obsched::ga::Selection;
/// use u_obsched::random::create_rng;
///
/// let fitness = [0.1, 0.9, 0.5];
/// let mut rng = create_rng(42);
/// let idx = Selection::Roulette.select(&fitness, &mut rng);
/// assert!(idx < fitness.len());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Selection {
    /// Fitness-proportionate (roulette wheel) selection.
    ///
    /// Probability of selection is `fitness_i / Σ fitness`. Negative
    /// fitness counts as zero; if every weight is zero the draw is uniform.
    ///
    /// # Complexity
    /// O(n) per selection
    #[default]
    Roulette,

    /// Tournament selection: pick `k` individuals at random, keep the best.
    ///
    /// # Complexity
    /// O(k) per selection
    Tournament(usize),

    /// Linear rank selection: weight `n - rank`, best rank first.
    ///
    /// # Complexity
    /// O(n log n) per selection
    Rank,
}

impl Selection {
    /// Selects an index from `fitness`.
    ///
    /// # Panics
    /// Panics if `fitness` is empty.
    pub fn select<R: Rng>(&self, fitness: &[f64], rng: &mut R) -> usize {
        assert!(!fitness.is_empty(), "cannot select from empty population");

        match self {
            Selection::Roulette => roulette(fitness, rng),
            Selection::Tournament(k) => tournament(fitness, *k, rng),
            Selection::Rank => rank(fitness, rng),
        }
    }
}

fn roulette<R: Rng>(fitness: &[f64], rng: &mut R) -> usize {
    let n = fitness.len();
    if n == 1 {
        return 0;
    }

    let weight = |f: f64| if f.is_finite() && f > 0.0 { f } else { 0.0 };
    let total: f64 = fitness.iter().map(|&f| weight(f)).sum();
    if total <= 0.0 {
        return rng.random_range(0..n);
    }

    let threshold = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    for (i, &f) in fitness.iter().enumerate() {
        cumulative += weight(f);
        if cumulative > threshold {
            return i;
        }
    }

    n - 1 // floating-point fallback
}

fn tournament<R: Rng>(fitness: &[f64], k: usize, rng: &mut R) -> usize {
    let k = k.max(1);
    let n = fitness.len();

    let mut best = rng.random_range(0..n);
    for _ in 1..k {
        let idx = rng.random_range(0..n);
        if fitness[idx] > fitness[best] {
            best = idx;
        }
    }
    best
}

fn rank<R: Rng>(fitness: &[f64], rng: &mut R) -> usize {
    let n = fitness.len();
    if n == 1 {
        return 0;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));

    let total = (n * (n + 1)) as f64 / 2.0;
    let threshold = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    for (rank, &idx) in order.iter().enumerate() {
        cumulative += (n - rank) as f64;
        if cumulative > threshold {
            return idx;
        }
    }

    order[n - 1]
}
