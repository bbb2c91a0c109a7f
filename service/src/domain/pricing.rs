//! Quote computation for prospective bookings.
//!
//! Pure and store-free: callers fetch the rate schedule and per-slot
//! overrides, this module only does the arithmetic.

use common::{money::CurrencyMismatch, Date, Money};
use derive_more::{Display, Error, From};

use crate::domain::{
    experience::{GroupSize, GroupTiers},
    inventory::{self, Span},
};

/// Number of nights after which a weekly discount applies.
pub const WEEKLY_MIN_NIGHTS: u32 = 7;

/// Default number of nights after which a monthly discount applies.
pub const MONTHLY_MIN_NIGHTS: u32 = 28;

/// Length-of-stay discounts of a listing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StayDiscounts {
    /// Flat amount subtracted once from stays of at least
    /// [`WEEKLY_MIN_NIGHTS`] nights.
    pub weekly: Option<Money>,

    /// Flat amount subtracted once from stays of at least the monthly
    /// threshold. Replaces the weekly discount, never stacks with it.
    pub monthly: Option<Money>,

    /// Host-configured monthly threshold overriding
    /// [`MONTHLY_MIN_NIGHTS`], if any.
    pub monthly_min_nights: Option<u32>,
}

impl StayDiscounts {
    /// Returns the discount applying to a stay of the provided number of
    /// nights, if any.
    ///
    /// The monthly discount takes precedence once its threshold is met.
    #[must_use]
    pub fn applying_to(&self, nights: u32) -> Option<Money> {
        let monthly_min =
            self.monthly_min_nights.unwrap_or(MONTHLY_MIN_NIGHTS);
        if nights >= monthly_min {
            if let Some(monthly) = self.monthly {
                return Some(monthly);
            }
        }
        if nights >= WEEKLY_MIN_NIGHTS {
            return self.weekly;
        }
        None
    }
}

/// Quotes the total price of a nightly stay.
///
/// Total = `rate` × nights, minus at most one length-of-stay discount,
/// clamped at zero.
///
/// # Errors
///
/// - [`QuoteError::InvalidRange`] if the range contains no nights.
/// - [`QuoteError::CurrencyMismatch`] if a discount is configured in another
///   currency than the rate.
pub fn quote_stay(
    rate: Money,
    check_in: Date,
    check_out: Date,
    discounts: &StayDiscounts,
) -> Result<Money, QuoteError> {
    let nights = Span::nights(check_in, check_out)
        .map_err(QuoteError::InvalidRange)?
        .num_nights()
        .unwrap_or(0);
    if nights == 0 {
        return Err(QuoteError::InvalidRange(inventory::InvalidRange {
            check_in,
            check_out,
        }));
    }

    let base = rate.times(nights);
    match discounts.applying_to(nights) {
        Some(discount) => Ok(base.saturating_sub(discount)?),
        None => Ok(base),
    }
}

/// Quotes the total price of an experience session for a group.
///
/// A per-slot `price_override` replaces the per-person rate entirely;
/// otherwise the matching group tier's per-person price applies; otherwise
/// the base rate.
///
/// # Errors
///
/// [`QuoteError::EmptyGroup`] if the group has no attendees.
pub fn quote_session(
    base_per_person: Money,
    price_override: Option<Money>,
    group_size: GroupSize,
    tiers: &GroupTiers,
) -> Result<Money, QuoteError> {
    if group_size == 0 {
        return Err(QuoteError::EmptyGroup);
    }

    let per_person = price_override.unwrap_or_else(|| {
        tiers
            .matching(group_size)
            .map_or(base_per_person, |t| t.per_person)
    });
    Ok(per_person.times(u32::from(group_size)))
}

/// Error of computing a quote.
#[derive(Clone, Copy, Debug, Display, Error, From)]
pub enum QuoteError {
    /// The requested date range contains no nights.
    #[display("invalid date range: {_0}")]
    InvalidRange(inventory::InvalidRange),

    /// A session was quoted for a group of zero.
    #[display("cannot quote a session for an empty group")]
    EmptyGroup,

    /// Rate schedule combines amounts in different currencies.
    #[display("rate schedule is inconsistent: {_0}")]
    CurrencyMismatch(CurrencyMismatch),
}

#[cfg(test)]
mod spec {
    use common::{money::Currency, Date, Money};

    use crate::domain::experience::{GroupTier, GroupTiers};

    use super::{quote_session, quote_stay, QuoteError, StayDiscounts};

    fn date(s: &str) -> Date {
        s.parse().unwrap()
    }

    fn usd(amount: &str) -> Money {
        Money {
            amount: amount.parse().unwrap(),
            currency: Currency::Usd,
        }
    }

    #[test]
    fn stay_multiplies_rate_by_nights() {
        let total = quote_stay(
            usd("100"),
            date("2025-01-10"),
            date("2025-01-13"),
            &StayDiscounts::default(),
        )
        .unwrap();

        assert_eq!(total, usd("300"));
    }

    #[test]
    fn stay_rejects_empty_or_inverted_range() {
        for check_out in ["2025-01-10", "2025-01-09"] {
            assert!(matches!(
                quote_stay(
                    usd("100"),
                    date("2025-01-10"),
                    date(check_out),
                    &StayDiscounts::default(),
                ),
                Err(QuoteError::InvalidRange(_)),
            ));
        }
    }

    #[test]
    fn week_long_stay_gets_weekly_discount_once() {
        let discounts = StayDiscounts {
            weekly: Some(usd("50")),
            ..StayDiscounts::default()
        };

        // 7 nights at $100 with a $50 weekly discount.
        let total = quote_stay(
            usd("100"),
            date("2025-01-10"),
            date("2025-01-17"),
            &discounts,
        )
        .unwrap();
        assert_eq!(total, usd("650"));

        // 6 nights: below the threshold.
        let total = quote_stay(
            usd("100"),
            date("2025-01-10"),
            date("2025-01-16"),
            &discounts,
        )
        .unwrap();
        assert_eq!(total, usd("600"));
    }

    #[test]
    fn monthly_discount_replaces_weekly() {
        let discounts = StayDiscounts {
            weekly: Some(usd("50")),
            monthly: Some(usd("300")),
            monthly_min_nights: None,
        };

        // 28 nights meet both thresholds: only the monthly applies.
        let total = quote_stay(
            usd("100"),
            date("2025-01-01"),
            date("2025-01-29"),
            &discounts,
        )
        .unwrap();
        assert_eq!(total, usd("2500"));

        // 27 nights: back to the weekly discount.
        let total = quote_stay(
            usd("100"),
            date("2025-01-01"),
            date("2025-01-28"),
            &discounts,
        )
        .unwrap();
        assert_eq!(total, usd("2650"));
    }

    #[test]
    fn custom_monthly_threshold_is_honored() {
        let discounts = StayDiscounts {
            weekly: Some(usd("50")),
            monthly: Some(usd("200")),
            monthly_min_nights: Some(14),
        };

        let total = quote_stay(
            usd("100"),
            date("2025-01-01"),
            date("2025-01-15"),
            &discounts,
        )
        .unwrap();
        assert_eq!(total, usd("1200"));
    }

    #[test]
    fn discount_never_drives_total_negative() {
        let discounts = StayDiscounts {
            weekly: Some(usd("10000")),
            ..StayDiscounts::default()
        };

        let total = quote_stay(
            usd("100"),
            date("2025-01-10"),
            date("2025-01-17"),
            &discounts,
        )
        .unwrap();
        assert_eq!(total, usd("0"));
    }

    #[test]
    fn session_uses_matching_tier() {
        let tiers = GroupTiers::new(vec![GroupTier {
            min_size: 4,
            max_size: 10,
            per_person: usd("15"),
        }])
        .unwrap();

        // Group of 5 falls into the tier.
        let total = quote_session(usd("20"), None, 5, &tiers).unwrap();
        assert_eq!(total, usd("75"));

        // Group of 3 pays the base rate.
        let total = quote_session(usd("20"), None, 3, &tiers).unwrap();
        assert_eq!(total, usd("60"));
    }

    #[test]
    fn session_override_replaces_per_person_rate() {
        let tiers = GroupTiers::new(vec![GroupTier {
            min_size: 4,
            max_size: 10,
            per_person: usd("15"),
        }])
        .unwrap();

        let total =
            quote_session(usd("20"), Some(usd("12")), 5, &tiers).unwrap();
        assert_eq!(total, usd("60"));
    }

    #[test]
    fn session_rejects_empty_group() {
        assert!(matches!(
            quote_session(usd("20"), None, 0, &GroupTiers::default()),
            Err(QuoteError::EmptyGroup),
        ));
    }

    #[test]
    fn session_total_is_monotonic_in_group_size() {
        let tiers = GroupTiers::default();
        let mut last = usd("0");
        for size in 1..=12 {
            let total =
                quote_session(usd("20"), None, size, &tiers).unwrap();
            assert!(total.amount >= last.amount);
            last = total;
        }
    }
}
