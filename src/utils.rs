use crate::error::{FinancialRecordError, Result};
use chrono::NaiveDate;

/// Parses a `YYYY-MM-DD` date as found in filing payloads.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        FinancialRecordError::DateError(format!(
            "Invalid date: {}. Expected YYYY-MM-DD",
            value
        ))
    })
}

pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// `numerator / denominator`, or `None` when either side is missing or the
/// denominator is exactly zero.
pub fn safe_ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => finite(n / d),
        _ => None,
    }
}

/// Like [`safe_ratio`] but also undefined for a negative denominator.
pub fn positive_ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match denominator {
        Some(d) if d > 0.0 => safe_ratio(numerator, denominator),
        _ => None,
    }
}

/// Year-over-year change relative to the magnitude of the prior value.
pub fn growth_rate(current: Option<f64>, prior: Option<f64>) -> Option<f64> {
    match (current, prior) {
        (Some(c), Some(p)) if p != 0.0 => finite((c - p) / p.abs()),
        _ => None,
    }
}

/// Compound annual growth from `start` to `end` over `years` years.
pub fn cagr(end: Option<f64>, start: Option<f64>, years: u32) -> Option<f64> {
    match (end, start) {
        (Some(e), Some(s)) if s > 0.0 && e >= 0.0 && years > 0 => {
            finite((e / s).powf(1.0 / years as f64) - 1.0)
        }
        _ => None,
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    finite(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample (n - 1) standard deviation; needs at least two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    finite(variance.sqrt())
}

/// Population (n) standard deviation; needs at least one value.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    finite(variance.sqrt())
}

/// Quantile `q` in [0, 1] of ascending `sorted`, interpolating linearly between
/// the two nearest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    finite(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(
            parse_iso_date("2023-12-31").unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
        assert!(matches!(
            parse_iso_date("2023-13-01"),
            Err(FinancialRecordError::DateError(_))
        ));
        assert!(parse_iso_date("").is_err());
    }

    #[test]
    fn test_ratio_denominators() {
        assert_eq!(safe_ratio(Some(1.0), Some(4.0)), Some(0.25));
        assert_eq!(safe_ratio(Some(1.0), Some(0.0)), None);
        assert_eq!(safe_ratio(None, Some(2.0)), None);
        assert_eq!(safe_ratio(Some(1.0), Some(-2.0)), Some(-0.5));
        assert_eq!(positive_ratio(Some(1.0), Some(-2.0)), None);
        assert_eq!(positive_ratio(Some(1.0), Some(2.0)), Some(0.5));
    }

    #[test]
    fn test_growth_rate_uses_prior_magnitude() {
        assert!((growth_rate(Some(110.0), Some(100.0)).unwrap() - 0.10).abs() < 1e-12);
        // A loss shrinking from -10 to -5 is an improvement.
        assert!((growth_rate(Some(-5.0), Some(-10.0)).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(growth_rate(Some(5.0), Some(0.0)), None);
        assert_eq!(growth_rate(None, Some(1.0)), None);
    }

    #[test]
    fn test_cagr_matches_yoy_for_one_year() {
        let yoy = growth_rate(Some(121.0), Some(100.0)).unwrap();
        let one_year = cagr(Some(121.0), Some(100.0), 1).unwrap();
        assert!((yoy - one_year).abs() < 1e-12);

        let two_year = cagr(Some(121.0), Some(100.0), 2).unwrap();
        assert!((two_year - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_cagr_undefined_cases() {
        assert_eq!(cagr(Some(100.0), Some(0.0), 3), None);
        assert_eq!(cagr(Some(100.0), Some(-50.0), 3), None);
        assert_eq!(cagr(Some(-10.0), Some(50.0), 3), None);
        assert_eq!(cagr(None, Some(50.0), 3), None);
        assert_eq!(cagr(Some(0.0), Some(50.0), 3), Some(-1.0));
    }

    #[test]
    fn test_mean_and_std_dev() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
        assert_eq!(sample_std_dev(&[1.0]), None);
        assert!((sample_std_dev(&[1.0, 2.0, 3.0]).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(population_std_dev(&[]), None);
        assert_eq!(population_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), Some(2.0));
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.0), Some(1.0));
        assert_eq!(quantile(&sorted, 1.0), Some(4.0));
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&sorted, 1.5), None);
    }
}
