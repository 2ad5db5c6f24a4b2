use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone};

//e.g. 4/16/2018,8:05 PM
const TIMESTAMP_FORMAT: &str = "%-m/%-d/%Y,%-I:%M %p";

pub fn format_timestamp<Tz>(time: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Local wall clock time in the relay's log and message format.
pub fn now() -> String {
    format_timestamp(&Local::now())
}
