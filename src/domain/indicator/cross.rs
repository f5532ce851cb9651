//! Crossover detection between two lines.
//!
//! Cross-up at i: (a[i-1] - b[i-1]) <= 0 and (a[i] - b[i]) > 0.
//! Cross-down at i: (a[i-1] - b[i-1]) >= 0 and (a[i] - b[i]) < 0.
//! Any undefined input is "no signal".

pub fn cross_up(
    prev_a: Option<f64>,
    prev_b: Option<f64>,
    a: Option<f64>,
    b: Option<f64>,
) -> bool {
    match (prev_a, prev_b, a, b) {
        (Some(pa), Some(pb), Some(ca), Some(cb)) => pa - pb <= 0.0 && ca - cb > 0.0,
        _ => false,
    }
}

pub fn cross_down(
    prev_a: Option<f64>,
    prev_b: Option<f64>,
    a: Option<f64>,
    b: Option<f64>,
) -> bool {
    match (prev_a, prev_b, a, b) {
        (Some(pa), Some(pb), Some(ca), Some(cb)) => pa - pb >= 0.0 && ca - cb < 0.0,
        _ => false,
    }
}
