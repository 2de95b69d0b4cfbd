/// Quarter-over-quarter EPS growth in percent.
///
/// A zero `prior` is replaced by 1 as the denominator, so the result keeps the
/// sign of `latest - prior` but its magnitude carries no financial meaning.
pub fn growth_pct(latest: f64, prior: f64) -> f64 {
    let denominator = if prior != 0.0 { prior } else { 1.0 };
    (latest - prior) / denominator * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_prior_divides_by_one() {
        assert_eq!(growth_pct(-1.0, 0.0), -100.0);
        assert_eq!(growth_pct(0.42, 0.0), 0.42 * 100.0);
        assert_eq!(growth_pct(0.0, 0.0), 0.0);
        assert!(growth_pct(3.0, -0.0).is_finite());
    }

    #[test]
    fn nonzero_prior_is_plain_percentage_change() {
        let g = growth_pct(2.0, 1.5);
        assert!((g - 33.333_333_333).abs() < 1e-6, "got {g}");
        assert_eq!(growth_pct(1.0, 2.0), (1.0 - 2.0) / 2.0 * 100.0);
        assert_eq!(growth_pct(-0.5, -1.0), (-0.5 - -1.0) / -1.0 * 100.0);
    }
}
