use regex::Regex;
use std::sync::OnceLock;

fn period_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^Period (\d+)$").expect("period column pattern is valid"))
}

/// A budget column holding the amounts of one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodColumn {
    /// Position of the column in the header.
    pub index: usize,
    pub number: u64,
    pub name: String,
}

/// Returns the period number of a `Period <n>` column name.
///
/// The match is exact and case-sensitive: `period 1`, `Period 1a` and
/// `Period  1` are not period columns.
pub fn parse_period_column(name: &str) -> Option<u64> {
    let caps = period_pattern().captures(name)?;
    // Digit runs too long for u64 still name a period column; they sort last.
    Some(caps[1].parse::<u64>().unwrap_or(u64::MAX))
}

pub fn period_column_name(period: u32) -> String {
    format!("Period {}", period)
}

/// Collects the period columns of a header, ordered by period number so that
/// `Period 2` precedes `Period 10`. Equal numbers keep header order.
pub fn period_columns(columns: &[String]) -> Vec<PeriodColumn> {
    let mut found: Vec<PeriodColumn> = columns
        .iter()
        .enumerate()
        .filter_map(|(index, name)| {
            parse_period_column(name).map(|number| PeriodColumn {
                index,
                number,
                name: name.clone(),
            })
        })
        .collect();

    found.sort_by_key(|c| (c.number, c.index));
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_period_column() {
        assert_eq!(parse_period_column("Period 1"), Some(1));
        assert_eq!(parse_period_column("Period 12"), Some(12));
        assert_eq!(parse_period_column("Period 007"), Some(7));
        assert_eq!(parse_period_column("period 1"), None);
        assert_eq!(parse_period_column("Period"), None);
        assert_eq!(parse_period_column("Period 1a"), None);
        assert_eq!(parse_period_column("Period 1 "), None);
        assert_eq!(parse_period_column("Old Period 1"), None);
    }

    #[test]
    fn test_period_columns_sort_numerically() {
        let header = names(&[
            "WBS Element",
            "Period 10",
            "Period 2",
            "Total",
            "Period 1",
            "Period 11",
        ]);

        let ordered: Vec<String> = period_columns(&header).into_iter().map(|c| c.name).collect();
        assert_eq!(ordered, names(&["Period 1", "Period 2", "Period 10", "Period 11"]));
    }

    #[test]
    fn test_period_columns_carry_header_positions() {
        let header = names(&["WBS Element", "Period 2", "Period 1", "Period 2"]);

        let found: Vec<(usize, u64)> = period_columns(&header)
            .into_iter()
            .map(|c| (c.index, c.number))
            .collect();
        assert_eq!(found, vec![(2, 1), (1, 2), (3, 2)]);
    }

    #[test]
    fn test_no_period_columns() {
        assert!(period_columns(&names(&["WBS Element", "Total"])).is_empty());
    }

    #[test]
    fn test_period_column_name_matches_pattern() {
        assert_eq!(period_column_name(3), "Period 3");
        assert_eq!(parse_period_column(&period_column_name(11)), Some(11));
    }
}
