//! Softmax, categorical cross-entropy and accuracy

use ndarray::{Array2, ArrayView1, Axis};

/// Probability clipping used by the cross-entropy
pub const PROB_EPSILON: f32 = 1e-7;

/// Row-wise numerically stable softmax
pub fn softmax(logits: &Array2<f32>) -> Array2<f32> {
    let mut probs = logits.clone();
    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    probs
}

/// Mean over the batch of `-Σ target · ln(p)`, with `p` clipped away from 0 and 1
pub fn categorical_cross_entropy(probs: &Array2<f32>, targets: &Array2<f32>) -> f32 {
    let batch = probs.nrows().max(1) as f32;
    let total: f32 = probs
        .iter()
        .zip(targets.iter())
        .map(|(&p, &t)| -t * p.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON).ln())
        .sum();
    total / batch
}

/// Gradient of the mean cross-entropy w.r.t. the softmax logits
pub fn softmax_cross_entropy_grad(probs: &Array2<f32>, targets: &Array2<f32>) -> Array2<f32> {
    let batch = probs.nrows().max(1) as f32;
    (probs - targets) / batch
}

/// Fraction of rows whose arg-max matches the target's arg-max
pub fn categorical_accuracy(probs: &Array2<f32>, targets: &Array2<f32>) -> f32 {
    if probs.nrows() == 0 {
        return 0.0;
    }

    let correct = probs
        .axis_iter(Axis(0))
        .zip(targets.axis_iter(Axis(0)))
        .filter(|(p, t)| argmax(p.view()) == argmax(t.view()))
        .count();
    correct as f32 / probs.nrows() as f32
}

/// Index of the largest entry; first wins on ties
pub fn argmax(row: ArrayView1<f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_val), (i, &v)| {
            if v > best_val {
                (i, v)
            } else {
                (best, best_val)
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let probs = softmax(&array![[1.0, 2.0, 3.0], [1000.0, 1000.0, 1000.0]]);
        for row in probs.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-6);
        }
        assert!(probs[[0, 2]] > probs[[0, 1]]);
        assert!((probs[[1, 0]] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_cross_entropy() {
        let probs = array![[0.5, 0.5], [0.25, 0.75]];
        let targets = array![[1.0, 0.0], [0.0, 1.0]];
        let expected = -(0.5f32.ln() + 0.75f32.ln()) / 2.0;
        assert!((categorical_cross_entropy(&probs, &targets) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_cross_entropy_clips_zero_probability() {
        let loss = categorical_cross_entropy(&array![[0.0, 1.0]], &array![[1.0, 0.0]]);
        assert!(loss.is_finite());
        assert!((loss + PROB_EPSILON.ln()).abs() < 1e-3);
    }

    #[test]
    fn test_softmax_grad_matches_finite_differences() {
        let logits = array![[0.3f32, -1.2, 0.8], [1.5, 0.1, -0.4]];
        let targets = array![[0.0f32, 0.0, 1.0], [1.0, 0.0, 0.0]];
        let grad = softmax_cross_entropy_grad(&softmax(&logits), &targets);

        let eps = 1e-2;
        for ((i, j), &g) in grad.indexed_iter() {
            let mut plus = logits.clone();
            plus[[i, j]] += eps;
            let mut minus = logits.clone();
            minus[[i, j]] -= eps;
            let numeric = (categorical_cross_entropy(&softmax(&plus), &targets)
                - categorical_cross_entropy(&softmax(&minus), &targets))
                / (2.0 * eps);
            assert!((numeric - g).abs() < 1e-3, "({}, {}): {} vs {}", i, j, numeric, g);
        }
    }

    #[test]
    fn test_accuracy() {
        let probs = array![[0.9, 0.1], [0.4, 0.6], [0.7, 0.3]];
        let targets = array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0]];
        assert!((categorical_accuracy(&probs, &targets) - 2.0 / 3.0).abs() < 1e-6);
    }
}
