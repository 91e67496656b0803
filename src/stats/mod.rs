pub mod correction;
pub mod fisher;

pub use correction::benjamini_hochberg;
pub use fisher::fisher_combine;

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
