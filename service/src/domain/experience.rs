//! [`Experience`] definitions.

use std::time::Duration;

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user;

/// Timed group experience offered by a host.
#[derive(Clone, Debug)]
pub struct Experience {
    /// ID of this [`Experience`].
    pub id: Id,

    /// ID of the [`User`] hosting this [`Experience`].
    ///
    /// [`User`]: crate::domain::User
    pub host_id: user::Id,

    /// [`Title`] of this [`Experience`].
    pub title: Title,

    /// Price of this [`Experience`] per attending person.
    pub price_per_person: Money,

    /// Fixed [`Duration`] of a single session.
    pub duration: Duration,

    /// Nominal number of [`Seats`] a single session offers.
    pub seats: Seats,

    /// Group size [`GroupTiers`] discounting the per-person price.
    pub tiers: GroupTiers,

    /// [`DateTime`] when this [`Experience`] was created.
    pub created_at: CreationDateTime,
}

/// ID of an [`Experience`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Title of an [`Experience`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct Title(String);

impl Title {
    /// Creates a new [`Title`] if the given `title` is valid.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Option<Self> {
        let title = title.into();
        Self::check(&title).then_some(Self(title))
    }

    /// Checks whether the given `title` is a valid [`Title`].
    fn check(title: impl AsRef<str>) -> bool {
        let title = title.as_ref();
        title.trim() == title && !title.is_empty() && title.len() <= 512
    }
}

impl FromStr for Title {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Title`")
    }
}

/// Number of seats in an [`Experience`] session.
pub type Seats = u16;

/// Group size attending an [`Experience`] session.
pub type GroupSize = u16;

/// Group size pricing tier of an [`Experience`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GroupTier {
    /// Minimum [`GroupSize`] this tier applies to, inclusive.
    pub min_size: GroupSize,

    /// Maximum [`GroupSize`] this tier applies to, inclusive.
    pub max_size: GroupSize,

    /// Discounted per-person price of this tier.
    pub per_person: Money,
}

impl GroupTier {
    /// Indicates whether this [`GroupTier`] applies to the provided
    /// [`GroupSize`].
    #[must_use]
    pub fn matches(&self, size: GroupSize) -> bool {
        self.min_size <= size && size <= self.max_size
    }
}

/// Validated set of [`GroupTier`]s of an [`Experience`].
///
/// Tiers never overlap, so any [`GroupSize`] matches at most one of them.
#[derive(AsRef, Clone, Debug, Default, Eq, PartialEq)]
#[as_ref(forward)]
pub struct GroupTiers(Vec<GroupTier>);

impl GroupTiers {
    /// Creates a new [`GroupTiers`] set from the provided [`GroupTier`]s.
    ///
    /// # Errors
    ///
    /// If any tier is inverted (`min > max`) or two tiers overlap.
    /// Overlapping tiers are a schedule configuration error, refused here
    /// rather than resolved by precedence at quote time.
    pub fn new(
        mut tiers: Vec<GroupTier>,
    ) -> Result<Self, InvalidTiers> {
        tiers.sort_by_key(|t| t.min_size);
        for (i, tier) in tiers.iter().enumerate() {
            if tier.min_size > tier.max_size {
                return Err(InvalidTiers::Inverted(*tier));
            }
            if let Some(next) = tiers.get(i + 1) {
                if next.min_size <= tier.max_size {
                    return Err(InvalidTiers::Overlapping(*tier, *next));
                }
            }
        }
        Ok(Self(tiers))
    }

    /// Returns the [`GroupTier`] matching the provided [`GroupSize`], if any.
    #[must_use]
    pub fn matching(&self, size: GroupSize) -> Option<&GroupTier> {
        self.0.iter().find(|t| t.matches(size))
    }
}

/// Error of constructing [`GroupTiers`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum InvalidTiers {
    /// A tier's minimum group size exceeds its maximum.
    #[display("tier `{_0:?}` has `min_size` greater than `max_size`")]
    Inverted(#[error(not(source))] GroupTier),

    /// Two tiers apply to the same group size.
    #[display("tiers `{_0:?}` and `{_1:?}` overlap")]
    Overlapping(GroupTier, GroupTier),
}

/// [`DateTime`] when an [`Experience`] was created.
pub type CreationDateTime = DateTimeOf<(Experience, unit::Creation)>;

#[cfg(test)]
mod spec {
    use common::money::Currency;
    use common::Money;

    use super::{GroupTier, GroupTiers};

    fn usd(amount: &str) -> Money {
        Money {
            amount: amount.parse().unwrap(),
            currency: Currency::Usd,
        }
    }

    fn tier(min: u16, max: u16, per_person: &str) -> GroupTier {
        GroupTier {
            min_size: min,
            max_size: max,
            per_person: usd(per_person),
        }
    }

    #[test]
    fn accepts_disjoint_tiers() {
        let tiers =
            GroupTiers::new(vec![tier(4, 10, "15"), tier(11, 20, "12")])
                .unwrap();

        assert_eq!(tiers.matching(3), None);
        assert_eq!(tiers.matching(4), Some(&tier(4, 10, "15")));
        assert_eq!(tiers.matching(10), Some(&tier(4, 10, "15")));
        assert_eq!(tiers.matching(11), Some(&tier(11, 20, "12")));
        assert_eq!(tiers.matching(21), None);
    }

    #[test]
    fn rejects_overlapping_tiers() {
        assert!(
            GroupTiers::new(vec![tier(4, 10, "15"), tier(8, 12, "12")])
                .is_err(),
        );
    }

    #[test]
    fn rejects_inverted_tier() {
        assert!(GroupTiers::new(vec![tier(10, 4, "15")]).is_err());
    }
}
