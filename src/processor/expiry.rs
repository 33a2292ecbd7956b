//! Expiry date normalization and urgency buckets.
//!
//! Every interpretation of a document's expiry value goes through [`normalize_expiry`]
//! and [`Bucket::for_days`], so the generator, the cleaner and the dashboard summary
//! can never disagree on whether a date is usable or which bucket it falls in.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{Error, Result};

/// Dates further than this many years past today's midnight are treated as typos.
pub const MAX_FUTURE_YEARS: u32 = 50;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Urgency bucket of an alert, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Bucket {
    #[serde(rename = "expired")]
    Expired,
    #[serde(rename = "3_days")]
    ThreeDays,
    #[serde(rename = "7_days")]
    SevenDays,
    #[serde(rename = "15_days")]
    FifteenDays,
    #[serde(rename = "30_days")]
    ThirtyDays,
}

impl Bucket {
    pub const ALL: [Bucket; 5] = [
        Bucket::Expired,
        Bucket::ThreeDays,
        Bucket::SevenDays,
        Bucket::FifteenDays,
        Bucket::ThirtyDays,
    ];

    /// Cascade from the most urgent tier down; ties go to the more urgent bucket.
    pub fn for_days(days_until_expiry: i64) -> Option<Bucket> {
        match days_until_expiry {
            d if d <= 0 => Some(Bucket::Expired),
            d if d <= 3 => Some(Bucket::ThreeDays),
            d if d <= 7 => Some(Bucket::SevenDays),
            d if d <= 15 => Some(Bucket::FifteenDays),
            d if d <= 30 => Some(Bucket::ThirtyDays),
            _ => None,
        }
    }

    /// Label stored in the `alerts.alert_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Expired => "expired",
            Bucket::ThreeDays => "3_days",
            Bucket::SevenDays => "7_days",
            Bucket::FifteenDays => "15_days",
            Bucket::ThirtyDays => "30_days",
        }
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self, Bucket::Expired | Bucket::ThreeDays)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown alert type '{0}'")]
pub struct UnknownBucket(pub String);

impl FromStr for Bucket {
    type Err = UnknownBucket;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Bucket::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| UnknownBucket(s.to_string()))
    }
}

/// Why an expiry value was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRejection {
    Unparsable,
    TooFarFuture,
    TooFarPast,
}

impl fmt::Display for DateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRejection::Unparsable => f.write_str("unparsable"),
            DateRejection::TooFarFuture => {
                write!(f, "more than {MAX_FUTURE_YEARS} years in the future")
            }
            DateRejection::TooFarPast => f.write_str("before 1970"),
        }
    }
}

/// Result of normalizing a raw expiry value against a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    Valid(NaiveDateTime),
    TooFarFuture,
    TooFarPast,
    Unparsable,
}

impl ExpiryCheck {
    pub fn rejection(&self) -> Option<DateRejection> {
        match self {
            ExpiryCheck::Valid(_) => None,
            ExpiryCheck::TooFarFuture => Some(DateRejection::TooFarFuture),
            ExpiryCheck::TooFarPast => Some(DateRejection::TooFarPast),
            ExpiryCheck::Unparsable => Some(DateRejection::Unparsable),
        }
    }

    pub fn into_valid(self, raw: &str) -> Result<NaiveDateTime> {
        match self {
            ExpiryCheck::Valid(at) => Ok(at),
            other => Err(Error::InvalidDate {
                value: raw.to_string(),
                reason: other.rejection().unwrap_or(DateRejection::Unparsable),
            }),
        }
    }
}

/// Normalize a raw expiry value (`DD/MM/YYYY` or ISO) and bounds-check it against `today`.
///
/// The result is wall-clock time in `tz`, the zone `today` was taken in; values
/// carrying a UTC offset are converted into it. Checks run in order: unparsable,
/// more than [`MAX_FUTURE_YEARS`] past today's midnight, before 1970-01-01.
pub fn normalize_expiry(raw: &str, today: NaiveDate, tz: Tz) -> ExpiryCheck {
    let Some(at) = parse_expiry(raw, tz) else {
        return ExpiryCheck::Unparsable;
    };

    let future_limit = midnight(today).checked_add_months(Months::new(12 * MAX_FUTURE_YEARS));
    if future_limit.is_some_and(|limit| at > limit) {
        return ExpiryCheck::TooFarFuture;
    }

    if at < DateTime::<Utc>::UNIX_EPOCH.naive_utc() {
        return ExpiryCheck::TooFarPast;
    }

    ExpiryCheck::Valid(at)
}

/// Whole days from today's midnight until `expiry`, rounded up.
pub fn days_until_expiry(expiry: NaiveDateTime, today: NaiveDate) -> i64 {
    let millis = (expiry - midnight(today)).num_milliseconds();
    let days = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) != 0 {
        days + 1
    } else {
        days
    }
}

/// The bucket a raw expiry value belongs in today, or an `InvalidDate` error.
pub fn bucket_for(raw: &str, today: NaiveDate, tz: Tz) -> Result<Option<Bucket>> {
    let expiry = normalize_expiry(raw, today, tz).into_valid(raw)?;
    Ok(Bucket::for_days(days_until_expiry(expiry, today)))
}

/// Coarse status shown on dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Valid,
    Warning,
    Expired,
}

impl From<Option<Bucket>> for DocumentStatus {
    fn from(bucket: Option<Bucket>) -> Self {
        match bucket {
            Some(Bucket::Expired) => DocumentStatus::Expired,
            Some(_) => DocumentStatus::Warning,
            None => DocumentStatus::Valid,
        }
    }
}

fn midnight(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

/// Slash dates must name a real calendar day in exactly three parts; `31/02/2027`
/// is rejected rather than rolled over into March.
fn parse_expiry(raw: &str, tz: Tz) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    // Day-first, built from integer parts rather than handed to a locale-aware parser.
    if raw.contains('/') {
        let parts: Vec<&str> = raw.split('/').map(str::trim).collect();
        let [day, month, year] = parts.as_slice() else {
            return None;
        };
        let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
        return Some(midnight(date));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(midnight(date));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&tz).naive_local());
    }
    // Postgres renders timestamptz as `2027-01-01 00:00:00+02` when cast to text.
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&tz).naive_local());
    }
    [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
