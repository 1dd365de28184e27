/*!
The [`Timestamp`] type.

A timestamp is a point in time, represented as nanoseconds since the Unix
epoch, always in UTC. The console encoder and the rotating file sink use
[`Timestamp::to_parts`] to render calendar fields without a timezone
database.
*/

/*
The calendar conversions are adapted from other libraries:

prost:
https://github.com/tokio-rs/prost/blob/master/prost-types/src/datetime.rs
Licensed under Apache 2.0

humantime:
https://github.com/tailhook/humantime/blob/master/src/date.rs
Licensed under MIT
*/

use core::time::Duration;

/**
A Unix timestamp with nanosecond precision.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Duration);

/**
The individual date and time portions of a timestamp.

Values are represented exactly as they would be when formatted, so months
and days are one-based.
*/
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Parts {
    pub years: u16,
    pub months: u8,
    pub days: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub nanos: u32,
}

// 2000-03-01 (mod 400 year, immediately after feb29
const LEAPOCH_SECS: u64 = 946_684_800 + 86400 * (31 + 29);
const DAYS_PER_400Y: i32 = 365 * 400 + 97;
const DAYS_PER_100Y: i32 = 365 * 100 + 24;
const DAYS_PER_4Y: i32 = 365 * 4 + 1;
const DAYS_IN_MONTH: [u8; 12] = [31, 30, 31, 30, 31, 31, 30, 31, 30, 31, 31, 29];

impl Timestamp {
    /**
    A timestamp from nanoseconds since the Unix epoch.

    Times before the epoch clamp to the epoch.
    */
    pub fn from_ns(ns: i64) -> Self {
        Timestamp(Duration::from_nanos(ns.max(0) as u64))
    }

    /**
    A timestamp from time since the Unix epoch.
    */
    pub fn from_unix(unix_time: Duration) -> Self {
        Timestamp(unix_time)
    }

    pub fn to_unix(&self) -> Duration {
        self.0
    }

    /**
    A timestamp from its individual date and time parts.

    Fields that overflow their maximum value wrap into the next unit.
    */
    pub fn from_parts(parts: Parts) -> Option<Self> {
        let is_leap;
        let start_of_year;
        let year = (parts.years as i64) - 1900;

        // Fast path for years 1900 - 2038.
        if year as u64 <= 138 {
            let mut leaps: i64 = (year - 68) >> 2;
            if (year - 68).trailing_zeros() >= 2 {
                leaps -= 1;
                is_leap = true;
            } else {
                is_leap = false;
            }

            start_of_year = i128::from(31_536_000 * (year - 70) + 86400 * leaps);
        } else {
            let centuries: i64;
            let mut leaps: i64;

            let mut cycles: i64 = (year - 100) / 400;
            let mut rem: i64 = (year - 100) % 400;

            if rem < 0 {
                cycles -= 1;
                rem += 400
            }
            if rem == 0 {
                is_leap = true;
                centuries = 0;
                leaps = 0;
            } else {
                if rem >= 200 {
                    if rem >= 300 {
                        centuries = 3;
                        rem -= 300;
                    } else {
                        centuries = 2;
                        rem -= 200;
                    }
                } else if rem >= 100 {
                    centuries = 1;
                    rem -= 100;
                } else {
                    centuries = 0;
                }
                if rem == 0 {
                    is_leap = false;
                    leaps = 0;
                } else {
                    leaps = rem / 4;
                    rem %= 4;
                    is_leap = rem == 0;
                }
            }
            leaps += 97 * cycles + 24 * centuries - i64::from(is_leap);

            start_of_year = i128::from((year - 100) * 31_536_000)
                + i128::from(leaps * 86400 + 946_684_800 + 86400);
        }

        let seconds_within_month = 86400 * u32::from(parts.days - 1)
            + 3600 * u32::from(parts.hours)
            + 60 * u32::from(parts.minutes)
            + u32::from(parts.seconds);

        let mut seconds_within_year = [
            0,           // Jan
            31 * 86400,  // Feb
            59 * 86400,  // Mar
            90 * 86400,  // Apr
            120 * 86400, // May
            151 * 86400, // Jun
            181 * 86400, // Jul
            212 * 86400, // Aug
            243 * 86400, // Sep
            273 * 86400, // Oct
            304 * 86400, // Nov
            334 * 86400, // Dec
        ][usize::from(parts.months - 1)]
            + seconds_within_month;

        if is_leap && parts.months > 2 {
            seconds_within_year += 86400
        }

        let secs: u64 = (start_of_year + i128::from(seconds_within_year))
            .try_into()
            .ok()?;

        Some(Timestamp(Duration::new(secs, parts.nanos)))
    }

    /**
    Get the individual date and time parts of the timestamp.
    */
    pub fn to_parts(&self) -> Parts {
        let dur = self.0;
        let secs = dur.as_secs();
        let nanos = dur.subsec_nanos();

        // Note(dcb): this bit is rearranged slightly to avoid integer overflow.
        let mut days = (secs / 86_400) as i64 - (LEAPOCH_SECS / 86_400) as i64;
        let mut remsecs = (secs % 86_400) as i32;
        if remsecs < 0i32 {
            remsecs += 86_400;
            days -= 1
        }

        let mut qc_cycles: i32 = (days / (DAYS_PER_400Y as i64)) as i32;
        let mut remdays: i32 = (days % (DAYS_PER_400Y as i64)) as i32;
        if remdays < 0 {
            remdays += DAYS_PER_400Y;
            qc_cycles -= 1;
        }

        let mut c_cycles: i32 = remdays / DAYS_PER_100Y;
        if c_cycles == 4 {
            c_cycles -= 1;
        }
        remdays -= c_cycles * DAYS_PER_100Y;

        let mut q_cycles: i32 = remdays / DAYS_PER_4Y;
        if q_cycles == 25 {
            q_cycles -= 1;
        }
        remdays -= q_cycles * DAYS_PER_4Y;

        let mut remyears: i32 = remdays / 365;
        if remyears == 4 {
            remyears -= 1;
        }
        remdays -= remyears * 365;

        let mut years: i64 = i64::from(remyears)
            + 4 * i64::from(q_cycles)
            + 100 * i64::from(c_cycles)
            + 400 * i64::from(qc_cycles);

        let mut months: i32 = 0;
        while i32::from(DAYS_IN_MONTH[months as usize]) <= remdays {
            remdays -= i32::from(DAYS_IN_MONTH[months as usize]);
            months += 1
        }

        if months >= 10 {
            months -= 12;
            years += 1;
        }

        let years = (years + 2000) as u16;
        let months = (months + 3) as u8;
        let days = (remdays + 1) as u8;
        let hours = (remsecs / 3600) as u8;
        let minutes = (remsecs / 60 % 60) as u8;
        let seconds = (remsecs % 60) as u8;

        Parts {
            years,
            months,
            days,
            hours,
            minutes,
            seconds,
            nanos,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_roundtrip() {
        let parts = Parts {
            years: 2020,
            months: 1,
            days: 2,
            hours: 3,
            minutes: 4,
            seconds: 5,
            nanos: 6,
        };

        let ts = Timestamp::from_parts(parts).unwrap();

        assert_eq!(ts.to_parts(), parts);
    }

    #[test]
    fn epoch_parts() {
        let parts = Timestamp::from_ns(0).to_parts();

        assert_eq!(
            parts,
            Parts {
                years: 1970,
                months: 1,
                days: 1,
                ..Default::default()
            }
        );
    }

    #[test]
    fn leap_day() {
        let ts = Timestamp::from_parts(Parts {
            years: 2020,
            months: 2,
            days: 29,
            hours: 12,
            ..Default::default()
        })
        .unwrap();

        let parts = ts.to_parts();

        assert_eq!((parts.months, parts.days, parts.hours), (2, 29, 12));
    }

    #[test]
    fn negative_ns_clamps_to_epoch() {
        assert_eq!(Timestamp::from_ns(-1), Timestamp::from_ns(0));
    }
}
