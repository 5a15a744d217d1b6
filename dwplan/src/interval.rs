//! Supported time-bucket widths.

use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::{fmt, str::FromStr};

use crate::errors::Error;

/// Width of one time-series bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, SerializeDisplay, DeserializeFromStr)]
pub enum QueryInterval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    #[default]
    OneHour,
    SixHours,
    TwelveHours,
    OneDay,
    OneWeek,
}

impl QueryInterval {
    pub const ALL: [QueryInterval; 9] = [
        QueryInterval::OneMinute,
        QueryInterval::FiveMinutes,
        QueryInterval::FifteenMinutes,
        QueryInterval::ThirtyMinutes,
        QueryInterval::OneHour,
        QueryInterval::SixHours,
        QueryInterval::TwelveHours,
        QueryInterval::OneDay,
        QueryInterval::OneWeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryInterval::OneMinute => "1m",
            QueryInterval::FiveMinutes => "5m",
            QueryInterval::FifteenMinutes => "15m",
            QueryInterval::ThirtyMinutes => "30m",
            QueryInterval::OneHour => "1h",
            QueryInterval::SixHours => "6h",
            QueryInterval::TwelveHours => "12h",
            QueryInterval::OneDay => "1d",
            QueryInterval::OneWeek => "1w",
        }
    }

    pub fn minutes(&self) -> u32 {
        match self {
            QueryInterval::OneMinute => 1,
            QueryInterval::FiveMinutes => 5,
            QueryInterval::FifteenMinutes => 15,
            QueryInterval::ThirtyMinutes => 30,
            QueryInterval::OneHour => 60,
            QueryInterval::SixHours => 360,
            QueryInterval::TwelveHours => 720,
            QueryInterval::OneDay => 1440,
            QueryInterval::OneWeek => 10080,
        }
    }
}

impl fmt::Display for QueryInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryInterval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryInterval::ALL
            .into_iter()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| Error::UnknownInterval { interval: s.to_string() })
    }
}
