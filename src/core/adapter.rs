// orderlog-watcher - core/adapter.rs
//
// The three upstream log families (bankperso / sdc / exchange) share one
// engine. Rather than an `Abstract -> Perso/SDC/Exchange` class
// hierarchy, each family is a value of this one `Adapter` record holding
// its regexes, split char, column layout, severity set, and a handful of
// function pointers for the bits that genuinely differ per family. The
// correlation engine (core::correlate) takes an `&Adapter` and does not
// know which concrete family it is driving.

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

use super::model::SourceKind;
use super::time::{parse_dot_date, parse_date_stamp};
use crate::util::error::AdapterError;
use crate::util::constants::MIN_MESSAGE_SIZE;

/// How a line's columns map onto timestamp / module / severity / message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnLayout {
    /// `timestamp, severity, message` - no module column, count always 1.
    Basic,
    /// `timestamp, module, severity, message` - module string is
    /// `NAME[N]`, count parsed from `N`.
    WithModule,
}

pub type SplitCharFn = fn(file_name: &str) -> char;
pub type FilenameMatchesFn = fn(adapter: &Adapter, file_name: &str, today: NaiveDate) -> bool;

/// One record describing everything the shared engine needs to drive a
/// single upstream log family.
#[derive(Clone)]
pub struct Adapter {
    pub kind: SourceKind,
    pub column_layout: ColumnLayout,
    pub uses_aliases: bool,
    pub alarm_severities: Vec<String>,
    split_char: SplitCharFn,
    filename_matches: FilenameMatchesFn,
}

fn perso_split_char(_file_name: &str) -> char {
    '\t'
}

fn sdc_split_char(_file_name: &str) -> char {
    '\t'
}

fn exchange_split_char(file_name: &str) -> char {
    let upper = file_name.to_ascii_uppercase();
    if upper.starts_with("OCG") || upper.starts_with("PPCARD") {
        ' '
    } else {
        '\t'
    }
}

fn perso_filename_matches(_adapter: &Adapter, file_name: &str, today: NaiveDate) -> bool {
    let stamp = today.format(crate::util::constants::DATE_STAMP_FORMAT).to_string();
    file_name.contains(&stamp)
}

fn dotted_filename_matches(_adapter: &Adapter, file_name: &str, today: NaiveDate) -> bool {
    let stamp = today.format(crate::util::constants::DOT_DATE_FORMAT).to_string();
    file_name.contains(&stamp)
}

fn perso_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{8})_.*").expect("valid perso filename-date regex"))
}

fn dotted_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{2}\.\d{2}\.\d{4})").expect("valid dotted filename-date regex")
    })
}

impl Adapter {
    pub fn for_kind(kind: SourceKind) -> Self {
        match kind {
            SourceKind::BankPerso => Adapter {
                kind,
                column_layout: ColumnLayout::Basic,
                uses_aliases: false,
                alarm_severities: vec!["ERROR".into(), "WARNING".into()],
                split_char: perso_split_char,
                filename_matches: perso_filename_matches,
            },
            SourceKind::Sdc => Adapter {
                kind,
                column_layout: ColumnLayout::Basic,
                uses_aliases: true,
                alarm_severities: vec!["ERROR".into(), "WARNING".into()],
                split_char: sdc_split_char,
                filename_matches: dotted_filename_matches,
            },
            SourceKind::Exchange => Adapter {
                kind,
                column_layout: ColumnLayout::WithModule,
                uses_aliases: true,
                alarm_severities: vec!["ERROR".into(), "WARNING".into()],
                split_char: exchange_split_char,
                filename_matches: dotted_filename_matches,
            },
        }
    }

    /// Extracts the date a filename covers, per the adapter's own
    /// filename-date format (`YYYYMMDD` for Perso, `DD.MM.YYYY` for the
    /// other two).
    pub fn filename_date(&self, file_name: &str) -> Option<NaiveDate> {
        match self.kind {
            SourceKind::BankPerso => perso_date_regex()
                .captures(file_name)
                .and_then(|c| c.get(1))
                .and_then(|m| parse_date_stamp(m.as_str())),
            SourceKind::Sdc | SourceKind::Exchange => dotted_date_regex()
                .captures(file_name)
                .and_then(|c| c.get(1))
                .and_then(|m| parse_dot_date(m.as_str())),
        }
    }

    /// True when the filename should be watched/swept today, per the
    /// adapter's filename-filter policy.
    pub fn filename_matches_today(&self, file_name: &str, today: NaiveDate) -> bool {
        (self.filename_matches)(self, file_name, today)
    }

    /// The column delimiter to split a raw line on; depends on the
    /// filename for the Exchange adapter (`OCG`/`PPCARD` files use a
    /// space, everything else a tab).
    pub fn split_char(&self, file_name: &str) -> char {
        (self.split_char)(file_name)
    }

    /// `lineIsValid`: minimum column count, minimum message length, date
    /// parses. The "printable 8-bit" check already happened at decode
    /// time (core::encoding); a line that reached here decoded cleanly.
    pub fn line_is_valid(&self, columns: &[&str]) -> bool {
        let min_columns = match self.column_layout {
            ColumnLayout::Basic => 3,
            ColumnLayout::WithModule => 4,
        };
        if columns.len() < min_columns {
            return false;
        }
        let message = columns[min_columns - 1];
        if message.trim().len() < MIN_MESSAGE_SIZE {
            return false;
        }
        self.parse_timestamp(columns[0]).is_some()
    }

    fn parse_timestamp(&self, raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        NaiveDateTime::parse_from_str(raw, "%Y%m%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%d.%m.%Y %H:%M:%S"))
            .ok()
    }

    /// Parses `NAME[N]` module strings (Exchange only); Perso/SDC always
    /// report count 1 with no module name.
    pub fn module_info(&self, raw: &str) -> (Option<String>, Option<u32>) {
        match self.column_layout {
            ColumnLayout::Basic => (None, Some(1)),
            ColumnLayout::WithModule => {
                if let Some(open) = raw.find('[') {
                    if let Some(close) = raw[open..].find(']') {
                        let name = raw[..open].to_string();
                        let count_str = &raw[open + 1..open + close];
                        let count = count_str.parse::<u32>().ok();
                        return (Some(name), count);
                    }
                }
                (Some(raw.to_string()), Some(1))
            }
        }
    }

    /// Splits a decoded line into `(timestamp, module, severity, message)`,
    /// rejecting malformed lines via `AdapterError`.
    pub fn parse_line<'a>(
        &self,
        file_name: &str,
        line: &'a str,
    ) -> Result<(NaiveDateTime, Option<String>, Option<u32>, &'a str, &'a str), AdapterError> {
        let split = self.split_char(file_name);
        let columns: Vec<&str> = line.split(split).collect();

        if !self.line_is_valid(&columns) {
            return Err(AdapterError::MalformedLine {
                raw: line.to_string(),
                reason: "column count, message length, or timestamp invalid",
            });
        }

        let timestamp = self
            .parse_timestamp(columns[0])
            .expect("line_is_valid already confirmed the timestamp parses");

        match self.column_layout {
            ColumnLayout::Basic => {
                let severity = columns[1];
                let message = columns[2];
                Ok((timestamp, None, Some(1), severity, message))
            }
            ColumnLayout::WithModule => {
                let (module, count) = self.module_info(columns[1]);
                let severity = columns[2];
                let message = columns[3];
                Ok((timestamp, module, count, severity, message))
            }
        }
    }
}
