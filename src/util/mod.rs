pub mod clock;
pub mod tracing;

/// Performs `&str` comparisons in constant time so that the API token check doesn't leak how
/// many leading bytes of a guess were correct
pub fn constant_time_cmp(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (l, r)| acc | std::hint::black_box(l ^ r))
        == 0
}
