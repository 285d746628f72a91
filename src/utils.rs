/// Truncates `v` to an integer and groups thousands with `.`, the way the
/// dashboard labels totals: `1234567.8` becomes `1.234.567`. Non-finite
/// values keep their plain `f64` spelling.
pub fn format_thousands(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let truncated = v.trunc();
    let digits = format!("{:.0}", truncated.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if truncated < 0.0 {
        grouped.insert(0, '-');
    }
    grouped
}
