//! Pareto ranking utilities for the NSGA-II scheduler.
//!
//! Every objective is **maximized**. An optional per-solution violation
//! count turns plain Pareto dominance into constrained dominance: a
//! solution with fewer violations always dominates one with more, and
//! only solutions with equal violation counts are compared by objectives.
//!
//! # Algorithms
//!
//! - [`dominates`]: pairwise Pareto comparison
//! - [`non_dominated_sort`]: fast non-dominated sorting
//! - [`crowding_distance`]: per-front diversity measure
//! - [`environmental_selection`]: NSGA-II survivor selection
//!
//! # References
//!
//! - Deb et al. (2002), "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II"
//! - IEEE Transactions on Evolutionary Computation, 6(2), 182-197

use std::cmp::Ordering;

use rand::Rng;

/// Outcome of comparing two solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dominance {
    /// Left dominates right.
    Left,
    /// Right dominates left.
    Right,
    /// Neither dominates the other.
    Neither,
}

impl Dominance {
    /// `-1` if left dominates, `1` if right dominates, `0` otherwise.
    pub fn as_i8(self) -> i8 {
        match self {
            Dominance::Left => -1,
            Dominance::Right => 1,
            Dominance::Neither => 0,
        }
    }
}

/// Pareto comparison of two objective vectors (maximization).
///
/// `a` dominates `b` if it is no worse in every objective and strictly
/// better in at least one.
pub fn dominance(a: &[f64], b: &[f64]) -> Dominance {
    let mut a_better = false;
    let mut b_better = false;
    for (&va, &vb) in a.iter().zip(b) {
        if va > vb {
            a_better = true;
        } else if vb > va {
            b_better = true;
        }
    }
    match (a_better, b_better) {
        (true, false) => Dominance::Left,
        (false, true) => Dominance::Right,
        _ => Dominance::Neither,
    }
}

/// Pareto comparison as an integer.
///
/// Returns `-1` if `a` dominates `b`, `1` if `b` dominates `a` and `0`
/// otherwise. Antisymmetric: `dominates(a, b) == -dominates(b, a)`.
///
/// # Example
///
/// ```
/// use u_obsched::ga::multi_objective::dominates;
///
/// assert_eq!(dominates(&[2.0, 2.0], &[1.0, 2.0]), -1);
/// assert_eq!(dominates(&[1.0, 2.0], &[2.0, 2.0]), 1);
/// assert_eq!(dominates(&[1.0, 3.0], &[3.0, 1.0]), 0);
/// ```
pub fn dominates(a: &[f64], b: &[f64]) -> i8 {
    dominance(a, b).as_i8()
}

/// Constrained dominance: fewer violations first, then objectives.
pub fn constrained_dominance(a: &[f64], va: usize, b: &[f64], vb: usize) -> Dominance {
    match va.cmp(&vb) {
        Ordering::Less => Dominance::Left,
        Ordering::Greater => Dominance::Right,
        Ordering::Equal => dominance(a, b),
    }
}

/// Result of non-dominated sorting.
#[derive(Debug, Clone)]
pub struct NondominatedSortResult {
    /// Front index of each solution (0 = Pareto front).
    pub ranks: Vec<usize>,

    /// Indices grouped by front: `fronts[0]` holds the rank-0 solutions.
    pub fronts: Vec<Vec<usize>>,
}

/// Fast non-dominated sorting over maximized objectives.
///
/// `violations`, when given, must have one entry per solution and enables
/// constrained dominance.
///
/// # Complexity
///
/// O(m · n²) where m = number of objectives, n = number of solutions
///
/// # Panics
///
/// Panics if `violations` has a different length than `objectives`.
///
/// # Example
///
/// ```
/// use u_obsched::ga::multi_objective::non_dominated_sort;
///
/// let objectives = vec![
///     vec![5.0, 1.0],
///     vec![3.0, 3.0],
///     vec![1.0, 5.0],
///     vec![2.0, 2.0], // dominated by (3, 3)
/// ];
/// let result = non_dominated_sort(&objectives, None);
/// assert_eq!(result.fronts[0], vec![0, 1, 2]);
/// assert_eq!(result.ranks[3], 1);
/// ```
pub fn non_dominated_sort(
    objectives: &[Vec<f64>],
    violations: Option<&[usize]>,
) -> NondominatedSortResult {
    let n = objectives.len();
    if let Some(v) = violations {
        assert_eq!(v.len(), n, "one violation count per solution");
    }
    if n == 0 {
        return NondominatedSortResult {
            ranks: Vec::new(),
            fronts: Vec::new(),
        };
    }

    let violation = |i: usize| violations.map_or(0, |v| v[i]);
    let mut domination_count = vec![0usize; n];
    let mut dominated: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            let dominance =
                constrained_dominance(&objectives[i], violation(i), &objectives[j], violation(j));
            match dominance {
                Dominance::Left => {
                    dominated[i].push(j);
                    domination_count[j] += 1;
                }
                Dominance::Right => {
                    dominated[j].push(i);
                    domination_count[i] += 1;
                }
                Dominance::Neither => {}
            }
        }
    }

    let mut ranks = vec![0usize; n];
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    let mut fronts = Vec::new();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominated[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    ranks[j] = fronts.len() + 1;
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }

    NondominatedSortResult { ranks, fronts }
}

/// Crowding distance of each solution within one front.
///
/// For every objective the extreme solutions get `f64::INFINITY`; interior
/// solutions accumulate the gap between their neighbours, normalized by
/// the objective's range. Objectives with zero range contribute nothing.
///
/// # Example
///
/// ```
/// use u_obsched::ga::multi_objective::crowding_distance;
///
/// let front = vec![vec![1.0, 5.0], vec![3.0, 3.0], vec![5.0, 1.0]];
/// let d = crowding_distance(&front);
/// assert!(d[0].is_infinite() && d[2].is_infinite());
/// assert!((d[1] - 2.0).abs() < 1e-12);
/// ```
pub fn crowding_distance(objectives: &[Vec<f64>]) -> Vec<f64> {
    let n = objectives.len();
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }

    let m = objectives[0].len();
    let mut distances = vec![0.0f64; n];
    let mut order: Vec<usize> = (0..n).collect();

    for k in 0..m {
        order.sort_by(|&a, &b| objectives[a][k].total_cmp(&objectives[b][k]));
        let (first, last) = (order[0], order[n - 1]);
        distances[first] = f64::INFINITY;
        distances[last] = f64::INFINITY;

        let range = objectives[last][k] - objectives[first][k];
        if range <= 0.0 || !range.is_finite() {
            continue;
        }
        for w in order.windows(3) {
            let gap = objectives[w[2]][k] - objectives[w[0]][k];
            distances[w[1]] += gap / range;
        }
    }

    distances
}

/// Pareto annotation of one individual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParetoRank {
    /// Non-domination front (0 = best).
    pub front: usize,
    /// Crowding distance within the front.
    pub crowding: f64,
}

impl ParetoRank {
    /// Crowded-comparison order: lower front first, then larger crowding.
    ///
    /// `Ordering::Less` means `self` is preferred.
    pub fn crowded_cmp(&self, other: &ParetoRank) -> Ordering {
        self.front
            .cmp(&other.front)
            .then_with(|| other.crowding.total_cmp(&self.crowding))
    }
}

/// Front and crowding distance of every solution.
pub fn assign_ranks(objectives: &[Vec<f64>], violations: Option<&[usize]>) -> Vec<ParetoRank> {
    let sorted = non_dominated_sort(objectives, violations);
    let mut ranks = vec![
        ParetoRank {
            front: 0,
            crowding: 0.0,
        };
        objectives.len()
    ];
    for (f, front) in sorted.fronts.iter().enumerate() {
        let members: Vec<Vec<f64>> = front.iter().map(|&i| objectives[i].clone()).collect();
        for (&i, d) in front.iter().zip(crowding_distance(&members)) {
            ranks[i] = ParetoRank { front: f, crowding: d };
        }
    }
    ranks
}

/// Binary tournament on the crowded-comparison order.
///
/// # Panics
///
/// Panics if `ranks` is empty.
pub fn binary_tournament<R: Rng>(ranks: &[ParetoRank], rng: &mut R) -> usize {
    assert!(!ranks.is_empty(), "cannot select from empty population");
    let a = rng.random_range(0..ranks.len());
    let b = rng.random_range(0..ranks.len());
    if ranks[b].crowded_cmp(&ranks[a]) == Ordering::Less {
        b
    } else {
        a
    }
}

/// NSGA-II survivor selection.
///
/// Fills `n` slots front by front. The first front that does not fit
/// entirely is truncated by descending crowding distance. Returns the
/// chosen indices in selection order.
///
/// # Example
///
/// ```
/// use u_obsched::ga::multi_objective::environmental_selection;
///
/// let objectives = vec![vec![1.0], vec![3.0], vec![2.0]];
/// assert_eq!(environmental_selection(&objectives, None, 2), vec![1, 2]);
/// ```
pub fn environmental_selection(
    objectives: &[Vec<f64>],
    violations: Option<&[usize]>,
    n: usize,
) -> Vec<usize> {
    let sorted = non_dominated_sort(objectives, violations);
    let mut selected = Vec::with_capacity(n);
    for front in &sorted.fronts {
        if selected.len() + front.len() <= n {
            selected.extend_from_slice(front);
            if selected.len() == n {
                break;
            }
            continue;
        }
        let members: Vec<Vec<f64>> = front.iter().map(|&i| objectives[i].clone()).collect();
        let crowding = crowding_distance(&members);
        let mut by_crowding: Vec<usize> = (0..front.len()).collect();
        by_crowding.sort_by(|&a, &b| crowding[b].total_cmp(&crowding[a]));
        let missing = n - selected.len();
        selected.extend(by_crowding[..missing].iter().map(|&k| front[k]));
        break;
    }
    selected
}

// ============================================================================
// Tests
// ============================================================================
