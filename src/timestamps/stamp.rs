use super::util::Scanner;
use std::fmt;
use thiserror::Error;
use time::Date;

/// A fixed-width layout in which a calendar date is written
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum DateStamp {
    /// `YYYYMMDD`
    Compact,

    /// `YYYY_MM_DD`
    Underscored,

    /// `YYYY-MM-DD`; only used for dates given on the command line
    Dashed,
}

impl DateStamp {
    /// Number of characters in a date written in this layout
    pub(crate) fn width(self) -> usize {
        match self {
            DateStamp::Compact => 8,
            DateStamp::Underscored | DateStamp::Dashed => 10,
        }
    }

    fn separator(self) -> Option<char> {
        match self {
            DateStamp::Compact => None,
            DateStamp::Underscored => Some('_'),
            DateStamp::Dashed => Some('-'),
        }
    }

    /// Parse the whole of `s` as a date in this layout
    pub(crate) fn parse(self, s: &str) -> Result<Date, DateStampError> {
        let mut scanner = Scanner::new(s, DateStampError(self));
        let year = scanner.scan_year()?;
        if let Some(c) = self.separator() {
            scanner.scan_char(c)?;
        }
        let month = scanner.scan_u8(1, 12)?;
        if let Some(c) = self.separator() {
            scanner.scan_char(c)?;
        }
        let day = scanner.scan_u8(1, 31)?;
        scanner.eof()?;
        scanner.calendar_date(year, month, day)
    }

    /// Parse the last [`width()`](DateStamp::width) characters of `stem` as a
    /// date in this layout.  Stems shorter than that never parse.
    pub(crate) fn parse_suffix(self, stem: &str) -> Result<Date, DateStampError> {
        let Some((start, _)) = stem.char_indices().rev().nth(self.width() - 1) else {
            return Err(DateStampError(self));
        };
        self.parse(&stem[start..])
    }
}

impl fmt::Display for DateStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateStamp::Compact => write!(f, "YYYYMMDD"),
            DateStamp::Underscored => write!(f, "YYYY_MM_DD"),
            DateStamp::Dashed => write!(f, "YYYY-MM-DD"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, Error, PartialEq)]
#[error("invalid date; expected {0}")]
pub(crate) struct DateStampError(DateStamp);

/// Parse a `YYYY-MM-DD` command-line argument
pub(crate) fn parse_cli_date(s: &str) -> Result<Date, DateStampError> {
    DateStamp::Dashed.parse(s)
}
