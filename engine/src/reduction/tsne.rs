use ndarray::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;

use super::TsneParams;

const PERPLEXITY_SEARCH_ITERS: usize = 50;
const PERPLEXITY_TOL: f32 = 1e-4;
const EXAGGERATION: f32 = 12.0;
const AFFINITY_FLOOR: f32 = 1e-12;

/// Embeds coordinate-major points (`dim × samples`) into
/// `params.dims × samples` with an exact (quadratic) t-SNE.
///
/// The embedding is seeded, so equal inputs and parameters reproduce the
/// same output.
pub fn embed(points: ArrayView2<f32>, params: &TsneParams) -> Array2<f32> {
    let n = points.ncols();
    let dims = params.dims;

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut y = Array2::from_shape_fn((dims, n), |_| {
        let v: f32 = rng.sample(StandardNormal);
        v * 1e-2
    });

    if n < 2 {
        return y;
    }

    let p = joint_affinities(points, params.perplexity);

    let exaggerated_iters = (params.iterations / 4).min(100);
    let mut velocity = Array2::<f32>::zeros((dims, n));
    let mut weights = Array2::<f32>::zeros((n, n));
    let mut grad = Array2::<f32>::zeros((dims, n));

    for iter in 0..params.iterations {
        let exaggeration = if iter < exaggerated_iters { EXAGGERATION } else { 1.0 };
        let momentum = if iter < params.iterations / 2 { 0.5 } else { 0.8 };

        // Student-t weights in embedding space.
        let mut z = 0.0;
        for i in 0..n {
            for j in i + 1..n {
                let mut d2 = 0.0;
                for k in 0..dims {
                    let diff = y[[k, i]] - y[[k, j]];
                    d2 += diff * diff;
                }
                let w = 1.0 / (1.0 + d2);
                weights[[i, j]] = w;
                weights[[j, i]] = w;
                z += 2.0 * w;
            }
        }
        let z = z.max(AFFINITY_FLOOR);

        grad.fill(0.0);
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let w = weights[[i, j]];
                let coeff = 4.0 * (exaggeration * p[[i, j]] - w / z) * w;
                for k in 0..dims {
                    grad[[k, i]] += coeff * (y[[k, i]] - y[[k, j]]);
                }
            }
        }

        velocity.zip_mut_with(&grad, |v, &g| {
            *v = momentum * *v - params.learning_rate * g;
        });
        y += &velocity;

        // Keep the embedding centered.
        for k in 0..dims {
            let mean = y.row(k).sum() / n as f32;
            y.row_mut(k).mapv_inplace(|v| v - mean);
        }
    }

    y
}

/// Symmetrized, perplexity-calibrated Gaussian affinities.
fn joint_affinities(points: ArrayView2<f32>, perplexity: f32) -> Array2<f32> {
    let n = points.ncols();
    let d2 = pairwise_sq_dists(points);

    // A perplexity above (n - 1) / 3 is unattainable for small clouds.
    let upper = ((n - 1) as f32 / 3.0).max(1.0);
    let target_entropy = perplexity.min(upper).max(1.0).ln();

    let mut conditional = Array2::<f32>::zeros((n, n));
    let mut row = vec![0.0f32; n];

    for i in 0..n {
        let mut beta = 1.0f32;
        let mut lo = 0.0f32;
        let mut hi = f32::INFINITY;
        let mut sum = 0.0f32;

        for _ in 0..PERPLEXITY_SEARCH_ITERS {
            sum = 0.0;
            let mut weighted = 0.0;
            for j in 0..n {
                if j == i {
                    row[j] = 0.0;
                    continue;
                }
                let e = (-beta * d2[[i, j]]).exp();
                row[j] = e;
                sum += e;
                weighted += e * d2[[i, j]];
            }

            let entropy = if sum > 0.0 { beta * weighted / sum + sum.ln() } else { 0.0 };
            let diff = entropy - target_entropy;
            if diff.abs() < PERPLEXITY_TOL {
                break;
            }

            if diff > 0.0 {
                lo = beta;
                beta = if hi.is_finite() { (beta + hi) / 2.0 } else { beta * 2.0 };
            } else {
                hi = beta;
                beta = (beta + lo) / 2.0;
            }
        }

        if sum > 0.0 {
            for j in 0..n {
                conditional[[i, j]] = row[j] / sum;
            }
        }
    }

    let mut joint = Array2::<f32>::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            if i != j {
                let p = (conditional[[i, j]] + conditional[[j, i]]) / (2.0 * n as f32);
                joint[[i, j]] = p.max(AFFINITY_FLOOR);
            }
        }
    }

    joint
}

fn pairwise_sq_dists(points: ArrayView2<f32>) -> Array2<f32> {
    let n = points.ncols();
    let mut d2 = Array2::<f32>::zeros((n, n));

    for i in 0..n {
        for j in i + 1..n {
            let mut acc = 0.0;
            for k in 0..points.nrows() {
                let diff = points[[k, i]] - points[[k, j]];
                acc += diff * diff;
            }
            d2[[i, j]] = acc;
            d2[[j, i]] = acc;
        }
    }

    d2
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn params(iterations: usize) -> TsneParams {
        TsneParams {
            dims: 2,
            perplexity: 2.0,
            learning_rate: 100.0,
            iterations,
            seed: 42,
        }
    }

    #[test]
    fn embedding_has_the_requested_shape() {
        let points = array![[0.0, 1.0, 2.0, 3.0], [0.0, 1.0, 0.0, 1.0]];

        let y = embed(points.view(), &params(50));
        assert_eq!(y.shape(), [2, 4]);
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn embedding_is_deterministic_for_a_seed() {
        let points = array![[0.0, 1.0, 2.0], [1.0, 0.0, 2.0]];

        let a = embed(points.view(), &params(60));
        let b = embed(points.view(), &params(60));
        assert_eq!(a, b);
    }

    #[test]
    fn well_separated_clusters_stay_separated() {
        let points = array![
            [0.0, 0.1, -0.1, 10.0, 10.1, 9.9],
            [0.0, -0.1, 0.1, 10.0, 9.9, 10.1]
        ];

        let y = embed(points.view(), &params(300));

        let centroid = |idx: &[usize]| -> [f32; 2] {
            let mut c = [0.0; 2];
            for &i in idx {
                c[0] += y[[0, i]] / idx.len() as f32;
                c[1] += y[[1, i]] / idx.len() as f32;
            }
            c
        };

        let a = centroid(&[0, 1, 2]);
        let b = centroid(&[3, 4, 5]);
        let between = ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt();

        let spread = (0..3)
            .map(|i| ((y[[0, i]] - a[0]).powi(2) + (y[[1, i]] - a[1]).powi(2)).sqrt())
            .fold(0.0f32, f32::max);

        assert!(between > spread);
    }

    #[test]
    fn tiny_clouds_do_not_panic() {
        let one = array![[1.0], [2.0]];
        assert_eq!(embed(one.view(), &params(20)).shape(), [2, 1]);

        let empty = Array2::<f32>::zeros((2, 0));
        assert_eq!(embed(empty.view(), &params(20)).shape(), [2, 0]);
    }
}
