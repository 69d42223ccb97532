//! Class rebalancing: SMOTE oversampling followed by edited-nearest-neighbour
//! cleaning.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub negative: usize,
    pub positive: usize,
}

impl ClassCounts {
    #[must_use]
    pub fn of(y: ArrayView1<'_, f64>) -> Self {
        let positive = y.iter().filter(|v| **v > 0.5).count();
        Self { negative: y.len() - positive, positive }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.negative + self.positive
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resampled {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(p, q)| (p - q) * (p - q)).sum()
}

/// The `k` rows of `candidates` closest to `query`, excluding `query` itself.
/// Ties go to the lower row index.
fn k_nearest(x: ArrayView2<'_, f64>, candidates: &[usize], query: usize, k: usize) -> Vec<usize> {
    let target = x.row(query);
    let mut dists: Vec<(f64, usize)> = candidates
        .iter()
        .filter(|&&i| i != query)
        .map(|&i| (squared_distance(target, x.row(i)), i))
        .collect();
    dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    dists.into_iter().take(k).map(|(_, i)| i).collect()
}

/// Oversamples the minority class up to the majority count.
///
/// Each synthetic row lies on the segment between a random minority row and
/// one of its `k` nearest minority neighbours. Originals keep their order and
/// synthetic rows are appended.
pub fn smote(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, k: usize, rng: &mut StdRng) -> Resampled {
    let counts = ClassCounts::of(y);
    let (minority_label, n_minority, n_majority) = if counts.positive <= counts.negative {
        (1.0, counts.positive, counts.negative)
    } else {
        (0.0, counts.negative, counts.positive)
    };

    if n_minority == n_majority || n_minority < 2 {
        if n_minority < 2 && n_minority != n_majority {
            warn!(n_minority, "too few minority rows to oversample");
        }
        return Resampled { x: x.to_owned(), y: y.to_owned() };
    }

    let minority: Vec<usize> = (0..y.len()).filter(|&i| (y[i] > 0.5) == (minority_label > 0.5)).collect();
    let k = k.min(n_minority - 1).max(1);
    let neighbours: Vec<Vec<usize>> = minority.par_iter().map(|&i| k_nearest(x, &minority, i, k)).collect();

    let n_new = n_majority - n_minority;
    let n_features = x.ncols();
    let mut out_x = Array2::<f64>::zeros((y.len() + n_new, n_features));
    out_x.slice_mut(s![..y.len(), ..]).assign(&x);
    let mut out_y = Array1::<f64>::from_elem(y.len() + n_new, minority_label);
    out_y.slice_mut(s![..y.len()]).assign(&y);

    for new_row in 0..n_new {
        let pick = rng.gen_range(0..minority.len());
        let base = minority[pick];
        let neighbour = neighbours[pick][rng.gen_range(0..neighbours[pick].len())];
        let gap: f64 = rng.gen_range(0.0..1.0);
        let synthetic = &x.row(base) + &((&x.row(neighbour) - &x.row(base)) * gap);
        out_x.row_mut(y.len() + new_row).assign(&synthetic);
    }

    debug!(minority = n_minority, majority = n_majority, synthetic = n_new, "smote oversampling done");
    Resampled { x: out_x, y: out_y }
}

/// Drops every row whose `k` nearest neighbours do not all share its label.
///
/// If cleaning would wipe out a class entirely the input is returned unchanged.
pub fn edited_nearest_neighbours(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, k: usize) -> Resampled {
    let all: Vec<usize> = (0..y.len()).collect();
    let keep: Vec<usize> = all
        .par_iter()
        .filter(|&&i| {
            let label = y[i] > 0.5;
            k_nearest(x, &all, i, k).iter().all(|&j| (y[j] > 0.5) == label)
        })
        .copied()
        .collect();

    let cleaned_y = y.select(Axis(0), &keep);
    let before = ClassCounts::of(y);
    let after = ClassCounts::of(cleaned_y.view());
    let lost_class = (before.positive > 0 && after.positive == 0) || (before.negative > 0 && after.negative == 0);
    if lost_class {
        warn!(?before, ?after, "neighbour cleaning would remove a whole class, skipping");
        return Resampled { x: x.to_owned(), y: y.to_owned() };
    }

    debug!(removed = y.len() - keep.len(), "neighbour cleaning done");
    Resampled { x: x.select(Axis(0), &keep), y: cleaned_y }
}

/// SMOTE then ENN, seeded.
pub fn smote_enn(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, smote_k: usize, enn_k: usize, seed: u64) -> Resampled {
    let mut rng = StdRng::seed_from_u64(seed);
    let oversampled = smote(x, y, smote_k, &mut rng);
    edited_nearest_neighbours(oversampled.x.view(), oversampled.y.view(), enn_k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn imbalanced() -> (Array2<f64>, Array1<f64>) {
        let mut x = Array2::zeros((12, 2));
        let mut y = Array1::zeros(12);
        for i in 0..9 {
            x[[i, 0]] = i as f64 * 0.1;
            x[[i, 1]] = 0.0;
        }
        for i in 9..12 {
            x[[i, 0]] = 10.0 + (i - 9) as f64 * 0.1;
            x[[i, 1]] = 10.0;
            y[i] = 1.0;
        }
        (x, y)
    }

    #[test]
    fn test_smote_balances_classes() {
        let (x, y) = imbalanced();
        let mut rng = StdRng::seed_from_u64(0);
        let out = smote(x.view(), y.view(), 5, &mut rng);

        assert_eq!(ClassCounts::of(out.y.view()), ClassCounts { negative: 9, positive: 9 });
        assert_eq!(out.x.slice(s![..12, ..]), x);
        // Synthetic rows stay inside the minority cluster's bounding box.
        for row in out.x.slice(s![12.., ..]).rows() {
            assert!(row[0] > 9.999 && row[0] < 10.201);
            assert!((row[1] - 10.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_smote_enn_is_seeded() {
        let (x, y) = imbalanced();
        assert_eq!(smote_enn(x.view(), y.view(), 5, 3, 7), smote_enn(x.view(), y.view(), 5, 3, 7));
    }

    #[test]
    fn test_enn_removes_mislabelled_point() {
        let mut values: Vec<f64> = (0..10).map(f64::from).collect();
        values.extend([50.0, 51.0, 52.0, 53.0, 4.5]);
        let x = Array2::from_shape_vec((values.len(), 1), values).unwrap();
        let mut y = Array1::zeros(15);
        y.slice_mut(s![10..]).fill(1.0);

        let out = edited_nearest_neighbours(x.view(), y.view(), 3);

        // The stray positive at 4.5 goes, and so do the negatives bordering it.
        assert!(!out.x.column(0).iter().any(|v| (*v - 4.5).abs() < 1e-12));
        assert_eq!(ClassCounts::of(out.y.view()), ClassCounts { negative: 6, positive: 4 });
    }

    #[test]
    fn test_balanced_input_untouched_by_smote() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 1.0];
        let mut rng = StdRng::seed_from_u64(0);
        let out = smote(x.view(), y.view(), 5, &mut rng);
        assert_eq!(out.x, x);
    }
}
