use ndarray::prelude::*;

use super::pick_axes;

const MAX_SWEEPS: usize = 64;
const OFF_DIAG_TOL: f32 = 1e-10;

/// The result of one PCA pass over a layer's points.
pub struct PcaOutput {
    /// Chosen component scores, `picks × samples`.
    pub scores: Array2<f32>,
    /// Percentage of variance explained per component, descending.
    pub percent_variance: Vec<f32>,
    /// Loadings of the first principal component.
    pub loading_scores: Vec<f32>,
}

/// Runs PCA on coordinate-major points (`dim × samples`).
///
/// Features are standardized to zero mean and unit variance across the
/// sample axis before the covariance eigen-decomposition; zero-variance
/// features stay centered at zero rather than dividing by zero.
pub fn reduce(points: ArrayView2<f32>, components: &[usize]) -> PcaOutput {
    let dim = points.nrows();
    let samples = points.ncols();
    let picks = pick_axes(dim, components);

    if samples < 2 {
        return PcaOutput {
            scores: Array2::zeros((picks.len(), samples)),
            percent_variance: vec![0.0; dim],
            loading_scores: vec![0.0; dim],
        };
    }

    let x = standardize(points);
    let cov = x.dot(&x.t()) / (samples - 1) as f32;
    let (eigvals, eigvecs) = symmetric_eigen(cov);

    let mut order: Vec<usize> = (0..dim).collect();
    order.sort_by(|&a, &b| eigvals[b].total_cmp(&eigvals[a]));

    let clamped: Vec<f32> = order.iter().map(|&i| eigvals[i].max(0.0)).collect();
    let total: f32 = clamped.iter().sum();
    let percent_variance: Vec<f32> = clamped
        .iter()
        .map(|&v| if total > f32::EPSILON { 100.0 * v / total } else { 0.0 })
        .collect();

    // Fix each component's sign so its largest-magnitude loading is positive;
    // eigenvectors are otherwise only defined up to sign.
    let mut sorted_vecs = Array2::zeros((dim, dim));
    for (rank, &i) in order.iter().enumerate() {
        let mut column = eigvecs.column(i).to_owned();
        let extreme = column
            .iter()
            .copied()
            .fold(0.0f32, |acc, v| if v.abs() > acc.abs() { v } else { acc });
        if extreme < 0.0 {
            column.mapv_inplace(|v| -v);
        }
        sorted_vecs.column_mut(rank).assign(&column);
    }

    let mut scores = Array2::zeros((picks.len(), samples));
    for (row, &pick) in picks.iter().enumerate() {
        let component = sorted_vecs.column(pick);
        for s in 0..samples {
            scores[[row, s]] = component.dot(&x.column(s));
        }
    }

    PcaOutput {
        scores,
        percent_variance,
        loading_scores: sorted_vecs.column(0).to_vec(),
    }
}

/// Zero mean, unit variance per feature across the sample axis.
fn standardize(points: ArrayView2<f32>) -> Array2<f32> {
    let samples = points.ncols();
    let mut out = points.to_owned();

    for mut row in out.rows_mut() {
        let mean = row.sum() / samples as f32;
        row.mapv_inplace(|v| v - mean);

        let var = row.iter().map(|v| v * v).sum::<f32>() / (samples - 1) as f32;
        if var > f32::EPSILON {
            let std = var.sqrt();
            row.mapv_inplace(|v| v / std);
        }
    }

    out
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// # Returns
/// The eigenvalues and the matrix whose columns are the matching
/// eigenvectors.
fn symmetric_eigen(mut a: Array2<f32>) -> (Array1<f32>, Array2<f32>) {
    let n = a.nrows();
    let mut v = Array2::eye(n);

    for _ in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in p + 1..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off < OFF_DIAG_TOL {
            break;
        }

        for p in 0..n {
            for q in p + 1..n {
                let apq = a[[p, q]];
                if apq.abs() < f32::EPSILON {
                    continue;
                }

                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn eigen_of_diagonal_matrix_is_its_diagonal() {
        let (vals, vecs) = symmetric_eigen(array![[3.0, 0.0], [0.0, 1.0]]);

        assert!((vals[0] - 3.0).abs() < 1e-5);
        assert!((vals[1] - 1.0).abs() < 1e-5);
        assert!((vecs[[0, 0]].abs() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn eigen_recovers_known_rotation() {
        // Eigenvalues of [[2,1],[1,2]] are 3 and 1.
        let (vals, _) = symmetric_eigen(array![[2.0, 1.0], [1.0, 2.0]]);
        let mut sorted = vals.to_vec();
        sorted.sort_by(f32::total_cmp);

        assert!((sorted[0] - 1.0).abs() < 1e-4);
        assert!((sorted[1] - 3.0).abs() < 1e-4);
    }

    #[test]
    fn variance_percentages_are_sane() {
        let points = array![
            [1.0, 2.0, 3.0, 4.0, 5.0],
            [1.1, 2.3, 2.9, 4.2, 4.8],
            [0.5, 0.4, 0.6, 0.5, 0.5]
        ];

        let out = reduce(points.view(), &[0, 1]);
        let sum: f32 = out.percent_variance.iter().sum();

        assert!(out.percent_variance.iter().all(|&v| v >= 0.0));
        assert!(sum <= 100.0 + 1e-3);
        // Strongly correlated first two features concentrate the variance.
        assert!(out.percent_variance[0] > 60.0);
    }

    #[test]
    fn first_component_follows_the_correlated_axes() {
        let points = array![[1.0, 2.0, 3.0, 4.0], [2.0, 4.0, 6.0, 8.0]];

        let out = reduce(points.view(), &[0]);

        assert_eq!(out.scores.nrows(), 1);
        // Perfectly correlated features load the first component evenly.
        assert!((out.loading_scores[0] - out.loading_scores[1]).abs() < 1e-3);
    }

    #[test]
    fn zero_variance_features_do_not_explode() {
        let points = array![[1.0, 1.0, 1.0], [0.0, 1.0, 2.0]];

        let out = reduce(points.view(), &[0, 1]);
        assert!(out.scores.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn single_sample_yields_zero_scores() {
        let points = array![[1.0], [2.0]];

        let out = reduce(points.view(), &[0]);
        assert_eq!(out.scores, Array2::<f32>::zeros((1, 1)));
    }
}
