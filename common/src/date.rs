//! Calendar [`Date`] utilities.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{fmt, str::FromStr};

use derive_more::{Display, Error};
#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use time::macros::format_description;

use crate::{DateTime, DateTimeOf};

/// Calendar date with a day granularity.
///
/// Night-based inventory is tracked per [`Date`], not per [`DateTime`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Date(time::Date);

impl Date {
    /// Creates a new [`Date`] from the provided calendar components.
    ///
    /// [`None`] is returned if the components don't form a valid date.
    #[must_use]
    pub fn from_calendar(year: i32, month: u8, day: u8) -> Option<Self> {
        let month = time::Month::try_from(month).ok()?;
        time::Date::from_calendar_date(year, month, day)
            .ok()
            .map(Self)
    }

    /// Returns the [`Date`] following this one.
    ///
    /// [`None`] is returned on calendar overflow.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.next_day().map(Self)
    }

    /// Returns the number of whole days from this [`Date`] until the provided
    /// one.
    ///
    /// Negative if the provided [`Date`] is earlier than this one.
    #[must_use]
    pub fn days_until(self, later: Self) -> i64 {
        i64::from(later.0.to_julian_day()) - i64::from(self.0.to_julian_day())
    }

    /// Returns a lazy ordered sequence of [`Date`]s in the half-open range
    /// from this [`Date`] (inclusive) until the provided one (exclusive).
    #[must_use]
    pub fn until(self, end: Self) -> Days {
        Days { next: self, end }
    }

    /// Returns the midnight UTC [`DateTime`] of this [`Date`].
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn midnight<Of: ?Sized>(self) -> DateTimeOf<Of> {
        self.0
            .midnight()
            .assume_utc()
            .try_into()
            .expect("UTC midnight is always representable")
    }

    /// Returns the current [`Date`] in UTC.
    #[must_use]
    pub fn today() -> Self {
        Self(time::OffsetDateTime::from(DateTime::now()).date())
    }
}

impl<Of: ?Sized> From<DateTimeOf<Of>> for Date {
    fn from(dt: DateTimeOf<Of>) -> Self {
        Self(time::OffsetDateTime::from(dt).date())
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fd = format_description!("[year]-[month]-[day]");
        f.write_str(
            &self.0.format(fd).map_err(|_| fmt::Error)?,
        )
    }
}

impl FromStr for Date {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fd = format_description!("[year]-[month]-[day]");
        time::Date::parse(s, fd).map(Self).map_err(ParseError)
    }
}

/// Error of parsing a [`Date`] from a string.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("invalid `Date`: {_0}")]
pub struct ParseError(time::error::Parse);

/// Lazy ordered sequence of [`Date`]s in a half-open range.
///
/// Restartable: [`Clone`] it to iterate again.
#[derive(Clone, Copy, Debug)]
pub struct Days {
    /// Next [`Date`] to yield.
    next: Date,

    /// First [`Date`] not yielded anymore.
    end: Date,
}

impl Iterator for Days {
    type Item = Date;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let current = self.next;
        self.next = current.next()?;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining =
            usize::try_from(self.next.days_until(self.end).max(0)).ok();
        (remaining.unwrap_or(0), remaining)
    }
}

#[cfg(feature = "postgres")]
impl FromSql<'_> for Date {
    accepts!(DATE);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        time::Date::from_sql(ty, raw).map(Self)
    }
}

#[cfg(feature = "postgres")]
impl ToSql for Date {
    accepts!(DATE);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, w)
    }
}

#[cfg(feature = "serde")]
mod serde {
    //! Module providing integration with [`serde`] crate.

    use std::str::FromStr as _;

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use super::Date;

    impl serde::Serialize for Date {
        fn serialize<S: Serializer>(
            &self,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.to_string())
        }
    }

    impl<'de> Deserialize<'de> for Date {
        fn deserialize<D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            Self::from_str(&s).map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod spec {
    use super::Date;

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    #[test]
    fn parses_and_displays_iso() {
        assert_eq!(date("2025-01-10").to_string(), "2025-01-10");
        assert!("2025-13-01".parse::<Date>().is_err());
        assert!("not-a-date".parse::<Date>().is_err());
    }

    #[test]
    fn days_until_counts_whole_days() {
        assert_eq!(date("2025-01-10").days_until(date("2025-01-12")), 2);
        assert_eq!(date("2025-01-12").days_until(date("2025-01-10")), -2);
        assert_eq!(date("2025-01-10").days_until(date("2025-01-10")), 0);
        assert_eq!(date("2025-02-28").days_until(date("2025-03-01")), 1);
        assert_eq!(date("2024-02-28").days_until(date("2024-03-01")), 2);
    }

    #[test]
    fn until_yields_half_open_range() {
        let days = date("2025-01-10").until(date("2025-01-13"));
        assert_eq!(
            days.collect::<Vec<_>>(),
            vec![
                date("2025-01-10"),
                date("2025-01-11"),
                date("2025-01-12"),
            ],
        );

        let empty = date("2025-01-10").until(date("2025-01-10"));
        assert_eq!(empty.count(), 0);

        let inverted = date("2025-01-10").until(date("2025-01-01"));
        assert_eq!(inverted.count(), 0);
    }

    #[test]
    fn until_is_restartable() {
        let days = date("2025-01-10").until(date("2025-01-12"));
        assert_eq!(days.count(), 2);
        assert_eq!(days.count(), 2);
    }
}
