//! Timestamp grammar shared by the object parser, planning lines and clocks.
//!
//! ```text
//! <2024-01-15 Mon 10:00-12:00 +1w -2d>
//! [2024-01-15]--[2024-01-17]
//! ```

use super::{PResult, take_while_m_n};
use crate::core::*;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, one_of, satisfy, space0, space1},
    combinator::{map, map_res, opt, recognize},
    error::VerboseError,
    multi::many0,
    sequence::{pair, preceded, tuple},
};
use chrono::{NaiveDate, NaiveTime};

/// One bracketed timestamp, before range assembly.
struct Part {
    active: bool,
    date: NaiveDate,
    day_name: Option<String>,
    time: Option<NaiveTime>,
    time_end: Option<NaiveTime>,
    repeater: Option<Repeater>,
    warning: Option<Warning>,
}

enum Cookie {
    Repeater(Repeater),
    Warning(Warning),
}

/// Parse a timestamp at the start of `input`, including the `<a>--<b>` range form.
///
/// The range form is only taken when the second timestamp uses the same bracket
/// style; otherwise only the first one is consumed.
pub fn parse_timestamp(input: &str) -> PResult<'_, Timestamp> {
    let (i, first) = timestamp_part(input)?;

    let (rest, end_part) =
        match preceded(tag::<_, _, VerboseError<&str>>("--"), timestamp_part)(i) {
            Ok((r, p)) if p.active == first.active => (r, Some(p)),
            _ => (i, None),
        };

    let raw_value = input[..input.len() - rest.len()].to_string();
    let (timestamp_type, end) = match (&end_part, first.time_end) {
        (Some(p), _) => (
            range_type(first.active),
            Some(TimestampEnd {
                date: p.date,
                time: p.time,
            }),
        ),
        (None, Some(t)) => (
            range_type(first.active),
            Some(TimestampEnd {
                date: first.date,
                time: Some(t),
            }),
        ),
        (None, None) => (
            if first.active {
                TimestampType::Active
            } else {
                TimestampType::Inactive
            },
            None,
        ),
    };

    Ok((
        rest,
        Timestamp {
            timestamp_type,
            raw_value,
            date: first.date,
            day_name: first.day_name,
            time: first.time,
            end,
            repeater: first.repeater,
            warning: first.warning,
        },
    ))
}

/// Whole-string variant: `s` (trimmed) must be exactly one timestamp.
pub fn timestamp_from_str(s: &str) -> Option<Timestamp> {
    match parse_timestamp(s.trim()) {
        Ok(("", ts)) => Some(ts),
        _ => None,
    }
}

fn range_type(active: bool) -> TimestampType {
    if active {
        TimestampType::ActiveRange
    } else {
        TimestampType::InactiveRange
    }
}

fn timestamp_part(i: &str) -> PResult<'_, Part> {
    let (i, open) = one_of("<[")(i)?;
    let close = if open == '<' { '>' } else { ']' };
    let (i, date) = parse_date(i)?;
    let (i, day_name) = opt(preceded(space1, parse_day_name))(i)?;
    let (i, times) = opt(preceded(
        space1,
        tuple((parse_time, opt(preceded(char('-'), parse_time)))),
    ))(i)?;
    let (i, cookies) = many0(preceded(space1, parse_cookie))(i)?;
    let (i, _) = space0(i)?;
    let (i, _) = char(close)(i)?;

    let mut repeater = None;
    let mut warning = None;
    for c in cookies {
        match c {
            Cookie::Repeater(r) => {
                repeater.get_or_insert(r);
            }
            Cookie::Warning(w) => {
                warning.get_or_insert(w);
            }
        }
    }

    Ok((
        i,
        Part {
            active: open == '<',
            date,
            day_name: day_name.map(str::to_string),
            time: times.map(|(t, _)| t),
            time_end: times.and_then(|(_, e)| e),
            repeater,
            warning,
        },
    ))
}

pub(crate) fn parse_date(i: &str) -> PResult<'_, NaiveDate> {
    map_res(
        tuple((
            map_res(take_while_m_n(4, 4, char_is_digit), |s: &str| {
                s.parse::<i32>()
            }),
            char('-'),
            map_res(take_while_m_n(2, 2, char_is_digit), |s: &str| {
                s.parse::<u32>()
            }),
            char('-'),
            map_res(take_while_m_n(2, 2, char_is_digit), |s: &str| {
                s.parse::<u32>()
            }),
        )),
        |(y, _, m, _, d)| NaiveDate::from_ymd_opt(y, m, d).ok_or("invalid date"),
    )(i)
}

pub(crate) fn parse_time(i: &str) -> PResult<'_, NaiveTime> {
    map_res(
        tuple((
            map_res(take_while_m_n(1, 2, char_is_digit), |s: &str| {
                s.parse::<u32>()
            }),
            char(':'),
            map_res(take_while_m_n(2, 2, char_is_digit), |s: &str| {
                s.parse::<u32>()
            }),
        )),
        |(h, _, m)| NaiveTime::from_hms_opt(h, m, 0).ok_or("invalid time"),
    )(i)
}

/// `Mon`, `Tue`, `lun.`: starts with a letter, then anything without digits,
/// blanks or cookie/closing chars. `.+1d` is a repeater, not a day name.
fn parse_day_name(i: &str) -> PResult<'_, &str> {
    recognize(pair(
        satisfy(char::is_alphabetic),
        take_while(|c: char| {
            !c.is_whitespace() && !c.is_ascii_digit() && !matches!(c, '+' | '-' | '>' | ']')
        }),
    ))(i)
}

fn parse_cookie(i: &str) -> PResult<'_, Cookie> {
    alt((
        map(
            tuple((alt((tag(".+"), tag("++"), tag("+"))), parse_amount, parse_unit)),
            |(mark, value, unit)| {
                let kind = match mark {
                    ".+" => RepeaterKind::Restart,
                    "++" => RepeaterKind::CatchUp,
                    _ => RepeaterKind::Cumulate,
                };
                Cookie::Repeater(Repeater { kind, value, unit })
            },
        ),
        map(
            tuple((alt((tag("--"), tag("-"))), parse_amount, parse_unit)),
            |(mark, value, unit)| {
                let kind = if mark == "--" {
                    WarningKind::First
                } else {
                    WarningKind::All
                };
                Cookie::Warning(Warning { kind, value, unit })
            },
        ),
    ))(i)
}

fn parse_amount(i: &str) -> PResult<'_, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(i)
}

fn parse_unit(i: &str) -> PResult<'_, TimeUnit> {
    map_res(one_of("hdwmy"), |c| TimeUnit::from_char(c).ok_or("unit"))(i)
}

fn char_is_digit(c: char) -> bool {
    c.is_ascii_digit()
}
