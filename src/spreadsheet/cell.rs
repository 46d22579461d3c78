use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use iso8601_duration::Duration as IsoDuration;
use std::borrow::Cow;
use std::fmt::Display;

/// Date systems used by serial date numbers.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum DateSystem {
    /// Day 1 is 1900-01-01, including the Lotus 1-2-3 leap year bug
    #[default]
    V1900,
    /// Day 0 is 1904-01-01
    V1904,
}

impl DateSystem {
    pub(crate) fn from_flag(is_1904: bool) -> Self {
        if is_1904 { Self::V1904 } else { Self::V1900 }
    }
}

/// Types of raw cell data found in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values stored as `1`/`0` or `true`/`false`
    Boolean,
    /// Numeric values
    Number,
    /// Serial numbers formatted as a date and time
    NumberDateTime(DateSystem),
    /// Serial numbers formatted as a date
    NumberDate(DateSystem),
    /// Serial numbers formatted as a time of day
    NumberTime,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// ISO 8601 duration strings
    IsoDuration,
    /// Inline or already resolved string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values such as `#DIV/0!`
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, system: DateSystem) -> Option<Self> {
        match id {
            "22" => Some(Self::NumberDateTime(system)),
            "14" | "15" | "16" | "17" => Some(Self::NumberDate(system)),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::NumberTime),
            _ => None,
        }
    }

    /// Parses custom number format codes, looking for date and time tokens
    /// outside of literals, escapes and `[...]` sections.
    pub(crate) fn parse_custom_number_format(format: &str, system: DateSystem) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time) {
            (true, true) => Self::NumberDateTime(system),
            (true, false) => Self::NumberDate(system),
            (false, true) => Self::NumberTime,
            (false, false) => Self::Number,
        }
    }
}

/// A decoded cell value as held by a grid.
///
/// `Missing` means there is no cell at all, which stays distinct from an
/// empty text cell until the value is normalized.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) enum Value {
    #[default]
    Missing,
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Error(String),
}

impl Value {
    /// Decodes a raw cell value according to its type.
    ///
    /// Shared strings must be resolved by the caller and passed as `InlineString`.
    pub(crate) fn parse(kind: CellType, raw: &str) -> Result<Value, String> {
        match kind {
            CellType::Empty => Ok(Value::Missing),
            CellType::Boolean => Ok(Value::Boolean(matches!(raw.trim(), "1" | "true" | "TRUE"))),
            CellType::Number => parse_number(raw).map(Value::Number),
            CellType::NumberDateTime(system) => {
                let serial = parse_number(raw)?;
                to_datetime(serial, system)
                    .map(Value::DateTime)
                    .ok_or_else(|| format!("parse '{raw}' to datetime failed"))
            }
            CellType::NumberDate(system) => {
                let serial = parse_number(raw)?;
                to_datetime(serial, system)
                    .map(|datetime| Value::Date(datetime.date()))
                    .ok_or_else(|| format!("parse '{raw}' to date failed"))
            }
            CellType::NumberTime => {
                let serial = parse_number(raw)?;
                to_time(serial)
                    .map(Value::Time)
                    .ok_or_else(|| format!("parse '{raw}' to time failed"))
            }
            CellType::IsoDateTime => parse_iso_datetime(raw),
            CellType::IsoDuration => {
                let duration = raw
                    .parse::<IsoDuration>()
                    .map_err(|_| format!("parse '{raw}' to iso8601 duration failed"))?;
                let hour = duration.hour as u32 % 24;
                let minute = duration.minute as u32;
                let second = duration.second as u32;
                NaiveTime::from_hms_opt(hour, minute, second)
                    .map(Value::Time)
                    .ok_or_else(|| format!("parse '{raw}' to time failed"))
            }
            CellType::InlineString | CellType::SharedString => Ok(Value::Text(raw.to_owned())),
            CellType::Error => Ok(Value::Error(raw.to_owned())),
        }
    }

    /// True when the value is missing or only whitespace once normalized.
    pub(crate) fn is_blank(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Normalized text: missing cells become the empty string, everything
    /// else its display form.
    pub(crate) fn text(&self) -> Cow<'_, str> {
        match self {
            Value::Missing => Cow::Borrowed(""),
            Value::Text(text) | Value::Error(text) => Cow::Borrowed(text),
            _ => Cow::Owned(self.to_string()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Text(text) | Value::Error(text) => write!(f, "{text}"),
            Value::Number(number) => write!(f, "{number}"),
            Value::Boolean(boolean) => write!(f, "{boolean}"),
            Value::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Value::Time(time) => write!(f, "{}", time.format("%H:%M:%S%.f")),
            Value::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

fn parse_number(raw: &str) -> Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| format!("parse '{raw}' to number failed"))
}

/// Converts a serial date number to a date and time.
fn to_datetime(serial: f64, system: DateSystem) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let offset = match system {
        DateSystem::V1904 => 1_462,
        DateSystem::V1900 if days < 60 => 1, // Lotus 1-2-3 leap year bug
        DateSystem::V1900 => 0,
    };
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let milliseconds = (serial.fract() * 86_400_000f64).round() as i64;
    epoch
        .checked_add_signed(Duration::try_days(days.checked_add(offset)?)?)?
        .checked_add_signed(Duration::try_milliseconds(milliseconds)?)
}

/// Converts the fractional part of a serial number to a time of day.
fn to_time(serial: f64) -> Option<NaiveTime> {
    if !serial.is_finite() {
        return None;
    }
    let milliseconds = ((serial.fract().abs() * 86_400_000f64).round() as i64).rem_euclid(86_400_000);
    NaiveTime::from_num_seconds_from_midnight_opt(
        (milliseconds / 1_000) as u32,
        (milliseconds % 1_000) as u32 * 1_000_000,
    )
}

fn parse_iso_datetime(raw: &str) -> Result<Value, String> {
    let value = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(Value::Date(date));
    }
    let value = value.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(Value::DateTime)
        .map_err(|_| format!("parse '{raw}' to datetime failed"))
}
