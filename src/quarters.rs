use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuarterError {
    #[error("invalid period label `{0}` (expected two-digit year + Q + quarter 1-4, e.g. 25Q3)")]
    Format(String),
    #[error("period range start {start} is after end {end}")]
    Range { start: String, end: String },
}

/// A reporting quarter. Ordering is by `year * 4 + quarter`, never by the
/// label text, so `25Q2` always sorts before quarter labels of later years
/// regardless of lexicographic accidents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: u16,
    pub quarter: u8,
}

impl Period {
    pub fn ordinal(self) -> u32 {
        u32::from(self.year) * 4 + u32::from(self.quarter)
    }

    pub fn label(self) -> String {
        format!("{:02}Q{}", self.year % 100, self.quarter)
    }

    /// First calendar day of the quarter.
    pub fn start_date(self) -> NaiveDate {
        let month = (u32::from(self.quarter) - 1) * 3 + 1;
        NaiveDate::from_ymd_opt(i32::from(self.year), month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day of the quarter.
    pub fn end_date(self) -> NaiveDate {
        let (month, day) = match self.quarter {
            1 => (3, 31),
            2 => (6, 30),
            3 => (9, 30),
            _ => (12, 31),
        };
        NaiveDate::from_ymd_opt(i32::from(self.year), month, day).unwrap_or(NaiveDate::MAX)
    }

    fn next(self) -> Period {
        if self.quarter == 4 {
            Period {
                year: self.year + 1,
                quarter: 1,
            }
        } else {
            Period {
                year: self.year,
                quarter: self.quarter + 1,
            }
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Parses a strict `YYQn` label. Two-digit years are anchored in the 2000s.
pub fn parse_period(label: &str) -> Result<Period, QuarterError> {
    let bytes = label.as_bytes();
    if bytes.len() != 4
        || !bytes[0].is_ascii_digit()
        || !bytes[1].is_ascii_digit()
        || bytes[2] != b'Q'
        || !(b'1'..=b'4').contains(&bytes[3])
    {
        return Err(QuarterError::Format(label.to_string()));
    }

    let year = 2000 + u16::from(bytes[0] - b'0') * 10 + u16::from(bytes[1] - b'0');
    let quarter = bytes[3] - b'0';

    Ok(Period { year, quarter })
}

pub fn to_ordinal(label: &str) -> Result<u32, QuarterError> {
    parse_period(label).map(Period::ordinal)
}

/// Sorts labels by quarter ordinal. Fails on the first malformed label.
pub fn sort_quarters<S: AsRef<str>>(labels: &[S]) -> Result<Vec<String>, QuarterError> {
    let mut periods = Vec::with_capacity(labels.len());
    for label in labels {
        periods.push(parse_period(label.as_ref())?);
    }
    periods.sort();
    Ok(periods.into_iter().map(Period::label).collect())
}

/// Returns the at-most-`n` quarters from `all_periods` ending at `upper_bound`
/// (inclusive), in ascending order. Fewer are returned when the history is
/// shorter.
pub fn last_n_until<S: AsRef<str>>(
    all_periods: &[S],
    upper_bound: &str,
    n: usize,
) -> Result<Vec<String>, QuarterError> {
    let bound = parse_period(upper_bound)?;

    let mut eligible = Vec::new();
    for label in all_periods {
        let period = parse_period(label.as_ref())?;
        if period <= bound {
            eligible.push(period);
        }
    }
    eligible.sort();
    eligible.dedup();

    let skip = eligible.len().saturating_sub(n);
    Ok(eligible.into_iter().skip(skip).map(Period::label).collect())
}

/// Enumerates the quarters from `start` to `end`. With `inclusive` the range
/// is closed; otherwise `end` is excluded.
pub fn quarters_between(
    start: &str,
    end: &str,
    inclusive: bool,
) -> Result<Vec<String>, QuarterError> {
    let start_period = parse_period(start)?;
    let end_period = parse_period(end)?;

    if start_period > end_period {
        return Err(QuarterError::Range {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    let mut labels = Vec::new();
    let mut current = start_period;
    while current < end_period {
        labels.push(current.label());
        current = current.next();
    }
    if inclusive {
        labels.push(end_period.label());
    }

    Ok(labels)
}
