use anyhow::{ensure, Context as _, Result};
use chrono::{Days, NaiveDate};
use regex::Regex;

/// Regex whose first two capture groups are the month and the day of a report.
#[derive(Debug, Clone)]
pub struct FilenamePattern {
    regex: Regex,
}

impl FilenamePattern {
    pub fn new(source: &str) -> Result<Self> {
        let regex = Regex::new(source)
            .with_context(|| format!("Invalid filename pattern {source:?}"))?;
        // captures_len() counts the implicit whole-match group
        ensure!(
            regex.captures_len() >= 3,
            "Filename pattern {source:?} needs two capture groups (month, day)"
        );
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, filename: &str) -> bool {
        self.regex.is_match(filename)
    }

    pub fn extract_date(&self, filename: &str, reference_year: i32) -> Option<NaiveDate> {
        extract_date(filename, &self.regex, reference_year)
    }
}

/// Infers the report date from a filename. Month must be in 1..=12 and day in
/// 1..=31; the day is not checked against the month's length, so a day past
/// the end of the month rolls over into the next one (Feb 30 -> Mar 1/2).
pub fn extract_date(filename: &str, pattern: &Regex, reference_year: i32) -> Option<NaiveDate> {
    let captures = pattern.captures(filename)?;
    let month: u32 = captures.get(1)?.as_str().trim().parse().ok()?;
    let day: u32 = captures.get(2)?.as_str().trim().parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    NaiveDate::from_ymd_opt(reference_year, month, 1)?.checked_add_days(Days::new(u64::from(day - 1)))
}

/// Same as [extract_date] for a pattern that has not been compiled yet. An
/// invalid pattern yields `None`.
pub fn extract_date_with_source(
    filename: &str,
    pattern: &str,
    reference_year: i32,
) -> Option<NaiveDate> {
    match Regex::new(pattern) {
        Ok(regex) => extract_date(filename, &regex, reference_year),
        Err(err) => {
            log::error!("Failed to compile filename pattern {pattern:?}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const PATTERN: &str = r"(\d+)月(\d+)日";

    fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, month, day)
    }

    #[rstest]
    #[case("8月5日财报.xlsx", date(2023, 8, 5))]
    #[case("12月31日财报.xlsx", date(2023, 12, 31))]
    #[case("01月09日.xlsx", date(2023, 1, 9))]
    #[case("13月1日.xlsx", None)]
    #[case("0月1日.xlsx", None)]
    #[case("8月0日.xlsx", None)]
    #[case("8月32日.xlsx", None)]
    #[case("季度调整.xlsx", None)]
    #[case("99999999999月1日.xlsx", None)]
    fn test_extract_date(#[case] filename: &str, #[case] expected: Option<NaiveDate>) {
        let regex = Regex::new(PATTERN).unwrap();
        assert_eq!(expected, extract_date(filename, &regex, 2023));
    }

    #[test]
    fn day_past_month_end_rolls_over() {
        let regex = Regex::new(PATTERN).unwrap();
        assert_eq!(date(2023, 3, 2), extract_date("2月30日.xlsx", &regex, 2023));
        assert_eq!(date(2024, 3, 1), extract_date("2月30日.xlsx", &regex, 2024));
    }

    #[test]
    fn single_group_never_matches() {
        let regex = Regex::new(r"(\d+)月").unwrap();
        assert_eq!(None, extract_date("8月5日.xlsx", &regex, 2023));
    }

    #[test]
    fn invalid_source_yields_none() {
        assert_eq!(None, extract_date_with_source("8月5日.xlsx", r"(\d+月", 2023));
        assert_eq!(
            date(2023, 8, 5),
            extract_date_with_source("8月5日.xlsx", PATTERN, 2023)
        );
    }

    #[test]
    fn pattern_needs_two_groups() {
        assert!(FilenamePattern::new(r"(\d+)月").is_err());
        assert!(FilenamePattern::new(r"(\d+月").is_err());
        let pattern = FilenamePattern::new(PATTERN).unwrap();
        assert!(pattern.is_match("8月5日财报.xlsx"));
        assert_eq!(date(2022, 8, 5), pattern.extract_date("8月5日财报.xlsx", 2022));
    }
}
