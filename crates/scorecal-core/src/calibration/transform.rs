//! Plain-array math for the calibration transform.
//!
//! The correction is a small N×N affine transform; explicit loops over
//! `Vec<f64>` keep the crate free of a linear-algebra dependency.

/// Element-wise arithmetic mean across rows of equal length.
pub(crate) fn mean_rows(rows: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let mut mean = vec![0.0; first.len()];
    for row in rows {
        for (acc, value) in mean.iter_mut().zip(row) {
            *acc += value;
        }
    }
    for acc in &mut mean {
        *acc /= rows.len() as f64;
    }
    mean
}

/// Rescales `values` to sum to 1.
pub(crate) fn renormalize(values: &[f64]) -> Vec<f64> {
    let sum: f64 = values.iter().sum();
    values.iter().map(|v| v / sum).collect()
}

/// Diagonal matrix holding the element-wise reciprocal of `p`.
pub(crate) fn diagonal_inverse(p: &[f64]) -> Vec<Vec<f64>> {
    let n = p.len();
    let mut w = vec![vec![0.0; n]; n];
    for (i, value) in p.iter().enumerate() {
        w[i][i] = 1.0 / value;
    }
    w
}

/// N×N identity matrix.
pub(crate) fn identity(n: usize) -> Vec<Vec<f64>> {
    let mut w = vec![vec![0.0; n]; n];
    for (i, row) in w.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    w
}

/// Computes `W · p + b`.
pub(crate) fn affine(w: &[Vec<f64>], p: &[f64], b: &[f64]) -> Vec<f64> {
    w.iter()
        .zip(b)
        .map(|(row, offset)| row.iter().zip(p).map(|(a, x)| a * x).sum::<f64>() + offset)
        .collect()
}

/// Index of the first maximal element.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = i;
        }
    }
    best
}
