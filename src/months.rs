//! Canonical calendar months.
//!
//! Source spreadsheets store the month as a number (`1`), a zero-padded
//! string (`"01"`), an integral float (`"1.0"`) or a name (`"Jan"`,
//! `"January"`). Everything downstream keys on [`Month`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Month {
    January = 1,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

pub const ALL_MONTHS: [Month; 12] = [
    Month::January,
    Month::February,
    Month::March,
    Month::April,
    Month::May,
    Month::June,
    Month::July,
    Month::August,
    Month::September,
    Month::October,
    Month::November,
    Month::December,
];

impl Month {
    pub fn from_number(n: u32) -> Option<Month> {
        match n {
            1..=12 => Some(ALL_MONTHS[(n - 1) as usize]),
            _ => None,
        }
    }

    pub fn number(self) -> u32 {
        self as u32
    }

    /// Canonical label used for display, joins and filters.
    pub fn name(self) -> &'static str {
        match self {
            Month::January => "January",
            Month::February => "February",
            Month::March => "March",
            Month::April => "April",
            Month::May => "May",
            Month::June => "June",
            Month::July => "July",
            Month::August => "August",
            Month::September => "September",
            Month::October => "October",
            Month::November => "November",
            Month::December => "December",
        }
    }

    /// Normalizes any of the representations found in the source data.
    ///
    /// Returns `None` for anything that is not unambiguously one of the
    /// twelve months (`"13"`, `"0"`, `"1.5"`, `"Janu"`, empty).
    pub fn normalize(raw: &str) -> Option<Month> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(n) = raw.parse::<u32>() {
            return Month::from_number(n);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() && f.fract() == 0.0 && (1.0..=12.0).contains(&f) {
                return Month::from_number(f as u32);
            }
            return None;
        }

        let lower = raw.to_ascii_lowercase();
        ALL_MONTHS.iter().copied().find(|m| {
            let name = m.name().to_ascii_lowercase();
            lower == name
                || (lower.len() == 3 && name.starts_with(&lower))
                || (lower == "sept" && *m == Month::September)
        })
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Month {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Month::normalize(s).ok_or_else(|| format!("'{s}' is not a calendar month"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_forms() {
        assert_eq!(Month::normalize("1"), Some(Month::January));
        assert_eq!(Month::normalize("01"), Some(Month::January));
        assert_eq!(Month::normalize(" 12 "), Some(Month::December));
        assert_eq!(Month::normalize("3.0"), Some(Month::March));
    }

    #[test]
    fn test_name_forms() {
        assert_eq!(Month::normalize("January"), Some(Month::January));
        assert_eq!(Month::normalize("feb"), Some(Month::February));
        assert_eq!(Month::normalize("SEPT"), Some(Month::September));
        assert_eq!(Month::normalize("Sep"), Some(Month::September));
        assert_eq!(Month::normalize("december"), Some(Month::December));
    }

    #[test]
    fn test_rejects_out_of_range_and_garbage() {
        for raw in ["0", "13", "-1", "1.5", "", "  ", "Janu", "Ju", "month", "NaN", "inf"] {
            assert_eq!(Month::normalize(raw), None, "{raw:?} should not normalize");
        }
    }

    #[test]
    fn test_every_number_maps_to_one_label() {
        for n in 1..=12 {
            let m = Month::from_number(n).unwrap();
            assert_eq!(m.number(), n);
            assert_eq!(Month::normalize(m.name()), Some(m));
        }
    }

    #[test]
    fn test_calendar_ordering() {
        assert!(Month::February < Month::March);
        assert!(Month::April < Month::August);
        let mut names: Vec<_> = ALL_MONTHS.iter().map(|m| m.name()).collect();
        names.sort();
        assert_ne!(names[0], Month::January.name());
    }
}
