pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }

    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation (divides by n, not n-1).
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let data_mean = mean(data)?;

    let variance = data
        .iter()
        .map(|value| {
            let diff = data_mean - *value;
            diff * diff
        })
        .sum::<f64>()
        / data.len() as f64;

    Some(variance.sqrt())
}

/// Linearly maps `x` from `[from_min, from_max]` onto `[to_min, to_max]`.
pub fn scale_range(from_min: f64, from_max: f64, to_min: f64, to_max: f64, x: f64) -> f64 {
    (((to_max - to_min) * (x - from_min)) / (from_max - from_min)) + to_min
}
