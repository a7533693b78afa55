//! Normalization of localized `tf history` dates.
//!
//! `tf` prints dates in the client's regional format. On a Russian-locale
//! client that is `15 марта 2016 г. 14:22:10`; the regional year suffix is
//! dropped and the genitive month name replaced by its English name before
//! parsing.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// Trailing year marker printed after the year on Russian-locale clients.
const REGIONAL_SUFFIX: &str = " г.";

const MONTHS: [(&str, &str); 12] = [
    ("января", "January"),
    ("февраля", "February"),
    ("марта", "March"),
    ("апреля", "April"),
    ("мая", "May"),
    ("июня", "June"),
    ("июля", "July"),
    ("августа", "August"),
    ("сентября", "September"),
    ("октября", "October"),
    ("ноября", "November"),
    ("декабря", "December"),
];

/// Accepted layouts, tried in order after normalization.
const LAYOUTS: [&str; 2] = [
    // 15 March 2016 14:22:10
    "%d %B %Y %H:%M:%S",
    // Tuesday, March 15, 2016 2:22:10 PM
    "%A, %B %d, %Y %I:%M:%S %p",
];

/// Strip the regional suffix and translate the month name to English.
pub fn normalize_date(value: &str) -> String {
    let mut value = value.trim().replacen(REGIONAL_SUFFIX, "", 1);
    if let Some((local, english)) = MONTHS.iter().find(|(local, _)| value.contains(*local)) {
        value = value.replacen(*local, english, 1);
    }
    value
}

/// Parse a `Date:` value as local time. `None` when no layout fits.
pub fn parse_date(value: &str) -> Option<DateTime<Local>> {
    let value = normalize_date(value);
    let naive = LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(&value, layout).ok())?;
    Local.from_local_datetime(&naive).earliest()
}
