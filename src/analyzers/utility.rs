/// Computes the arithmetic mean of integer amounts, rounded up to the next
/// whole number. Returns `None` for empty input.
///
/// Integer arithmetic keeps the result exact for any realistic premium total.
pub fn ceil_mean(values: &[u64]) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    let sum: u64 = values.iter().sum();
    let n = values.len() as u64;
    Some(sum.div_ceil(n))
}
