use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::model::{RoomAttrs, RoomRateState, StayRange};

// ── Availability predicate ───────────────────────────────────────
//
// A stay over [check_in, check_out) is sellable for `rooms` units iff:
//   (a) every covered night has a ledger record (a gap is a refusal, never
//       an assumption of supply),
//   (b) min(available) across covered nights >= rooms,
//   (c) no covered night has stop_sell,
//   (d) the first night is not closed_to_arrival,
//   (e) the last covered night is not closed_to_departure,
//   (f) nights >= max(min_stay) across covered nights,
//   (g) the party fits the room's capacity attributes.
// Checks run in date order; the first violated night wins.

/// Why a stay cannot be sold. Carried inside `EngineError::Availability`
/// and rendered as the user-facing refusal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityViolation {
    MissingDay(NaiveDate),
    Insufficient {
        date: NaiveDate,
        available: u32,
        requested: u32,
    },
    StopSell(NaiveDate),
    ClosedToArrival(NaiveDate),
    ClosedToDeparture(NaiveDate),
    MinStay {
        required: u32,
        nights: u32,
    },
    PartyExceeds {
        field: &'static str,
        max: u32,
        requested: u32,
    },
    CurrencyMix {
        date: NaiveDate,
        expected: String,
        found: String,
    },
}

impl std::fmt::Display for AvailabilityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AvailabilityViolation::MissingDay(d) => {
                write!(f, "no inventory on {d}")
            }
            AvailabilityViolation::Insufficient { date, available, requested } => {
                write!(f, "only {available} room(s) left on {date}, {requested} requested")
            }
            AvailabilityViolation::StopSell(d) => write!(f, "sales stopped on {d}"),
            AvailabilityViolation::ClosedToArrival(d) => {
                write!(f, "arrivals closed on {d}")
            }
            AvailabilityViolation::ClosedToDeparture(d) => {
                write!(f, "departures closed after {d}")
            }
            AvailabilityViolation::MinStay { required, nights } => {
                write!(f, "minimum stay is {required} night(s), requested {nights}")
            }
            AvailabilityViolation::PartyExceeds { field, max, requested } => {
                write!(f, "{field} limit is {max}, requested {requested}")
            }
            AvailabilityViolation::CurrencyMix { date, expected, found } => {
                write!(f, "currency changes from {expected} to {found} on {date}")
            }
        }
    }
}

/// Price and supply summary for a sellable stay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StayQuote {
    pub nights: u32,
    /// min(available) across covered nights.
    pub rooms_available: u32,
    /// Σ per-night price for one room.
    pub base_total: Decimal,
    pub price_min: Decimal,
    pub price_avg: Decimal,
    pub price_max: Decimal,
    pub currency: String,
}

/// Evaluate the full predicate against one unit's calendar. Pure: the
/// caller decides whether the state is under a read lock (search) or the
/// exclusive write lock (booking re-validation).
pub fn evaluate_stay(
    state: &RoomRateState,
    stay: &StayRange,
    rooms: u32,
) -> Result<StayQuote, AvailabilityViolation> {
    let nights = stay.nights();
    let mut expected = stay.check_in;

    let mut min_available: Option<(NaiveDate, u32)> = None;
    let mut max_min_stay: u32 = 0;
    let mut base_total = Decimal::ZERO;
    let mut price_min: Option<Decimal> = None;
    let mut price_max: Option<Decimal> = None;
    let mut currency: Option<String> = None;

    for (date, day) in state.days_in(stay) {
        // BTreeMap::range walks dates in order; any jump is a gap.
        if *date != expected {
            return Err(AvailabilityViolation::MissingDay(expected));
        }
        expected = *date + chrono::Days::new(1);

        if day.stop_sell {
            return Err(AvailabilityViolation::StopSell(*date));
        }
        if *date == stay.check_in && day.closed_to_arrival {
            return Err(AvailabilityViolation::ClosedToArrival(*date));
        }
        if *date == stay.last_night() && day.closed_to_departure {
            return Err(AvailabilityViolation::ClosedToDeparture(*date));
        }

        match &currency {
            None => currency = Some(day.currency.clone()),
            Some(c) if *c != day.currency => {
                return Err(AvailabilityViolation::CurrencyMix {
                    date: *date,
                    expected: c.clone(),
                    found: day.currency.clone(),
                });
            }
            Some(_) => {}
        }

        if min_available.is_none_or(|(_, avail)| day.available < avail) {
            min_available = Some((*date, day.available));
        }
        max_min_stay = max_min_stay.max(day.min_stay);
        base_total += day.price;
        price_min = Some(price_min.map_or(day.price, |p| p.min(day.price)));
        price_max = Some(price_max.map_or(day.price, |p| p.max(day.price)));
    }

    // A trailing gap (or an entirely empty window) also fails (a).
    if expected != stay.check_out {
        return Err(AvailabilityViolation::MissingDay(expected));
    }

    let (bottleneck, rooms_available) = min_available.expect("nights >= 1");
    if rooms_available < rooms {
        return Err(AvailabilityViolation::Insufficient {
            date: bottleneck,
            available: rooms_available,
            requested: rooms,
        });
    }
    if nights < max_min_stay {
        return Err(AvailabilityViolation::MinStay {
            required: max_min_stay,
            nights,
        });
    }

    let price_avg = (base_total / Decimal::from(nights)).round_dp(2);
    Ok(StayQuote {
        nights,
        rooms_available,
        base_total,
        price_min: price_min.expect("nights >= 1"),
        price_avg,
        price_max: price_max.expect("nights >= 1"),
        currency: currency.expect("nights >= 1"),
    })
}

/// Check the party against the room's capacity attributes — predicate (g).
pub fn check_party(
    room: &RoomAttrs,
    adults: u32,
    children: u32,
) -> Result<(), AvailabilityViolation> {
    if adults > room.max_adults {
        return Err(AvailabilityViolation::PartyExceeds {
            field: "adults",
            max: room.max_adults,
            requested: adults,
        });
    }
    if children > room.max_children {
        return Err(AvailabilityViolation::PartyExceeds {
            field: "children",
            max: room.max_children,
            requested: children,
        });
    }
    let party = adults + children;
    if party > room.max_occupancy {
        return Err(AvailabilityViolation::PartyExceeds {
            field: "occupancy",
            max: room.max_occupancy,
            requested: party,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InventoryDay;
    use std::collections::BTreeMap;
    use ulid::Ulid;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn day(available: u32, price: i64) -> InventoryDay {
        InventoryDay {
            available,
            total: available.max(1),
            price: Decimal::new(price, 2),
            currency: "USD".into(),
            min_stay: 1,
            closed_to_arrival: false,
            closed_to_departure: false,
            stop_sell: false,
            restrictions: BTreeMap::new(),
            updated_at: 0,
        }
    }

    fn unit(days: &[(&str, InventoryDay)]) -> RoomRateState {
        let mut rs = RoomRateState::new(Ulid::new(), Ulid::new());
        for (date, rec) in days {
            rs.calendar.insert(d(date), rec.clone());
        }
        rs
    }

    fn stay(check_in: &str, check_out: &str) -> StayRange {
        StayRange::new(d(check_in), d(check_out))
    }

    #[test]
    fn sellable_two_nights() {
        let rs = unit(&[
            ("2030-06-01", day(3, 10000)),
            ("2030-06-02", day(2, 12000)),
        ]);
        let quote = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-03"), 2).unwrap();
        assert_eq!(quote.nights, 2);
        assert_eq!(quote.rooms_available, 2);
        assert_eq!(quote.base_total, Decimal::new(22000, 2));
        assert_eq!(quote.price_min, Decimal::new(10000, 2));
        assert_eq!(quote.price_max, Decimal::new(12000, 2));
        assert_eq!(quote.price_avg, Decimal::new(11000, 2));
        assert_eq!(quote.currency, "USD");
    }

    #[test]
    fn missing_first_day() {
        let rs = unit(&[("2030-06-02", day(3, 10000))]);
        let err = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-03"), 1).unwrap_err();
        assert_eq!(err, AvailabilityViolation::MissingDay(d("2030-06-01")));
    }

    #[test]
    fn missing_middle_day() {
        let rs = unit(&[
            ("2030-06-01", day(3, 10000)),
            ("2030-06-03", day(3, 10000)),
        ]);
        let err = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-04"), 1).unwrap_err();
        assert_eq!(err, AvailabilityViolation::MissingDay(d("2030-06-02")));
    }

    #[test]
    fn missing_last_day() {
        let rs = unit(&[
            ("2030-06-01", day(3, 10000)),
            ("2030-06-02", day(3, 10000)),
        ]);
        let err = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-04"), 1).unwrap_err();
        assert_eq!(err, AvailabilityViolation::MissingDay(d("2030-06-03")));
    }

    #[test]
    fn empty_calendar() {
        let rs = unit(&[]);
        let err = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-02"), 1).unwrap_err();
        assert_eq!(err, AvailabilityViolation::MissingDay(d("2030-06-01")));
    }

    #[test]
    fn insufficient_reports_bottleneck_night() {
        let rs = unit(&[
            ("2030-06-01", day(5, 10000)),
            ("2030-06-02", day(1, 10000)),
            ("2030-06-03", day(5, 10000)),
        ]);
        let err = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-04"), 2).unwrap_err();
        assert_eq!(
            err,
            AvailabilityViolation::Insufficient {
                date: d("2030-06-02"),
                available: 1,
                requested: 2,
            }
        );
    }

    #[test]
    fn zero_available_day_blocks() {
        let rs = unit(&[
            ("2030-06-01", day(2, 10000)),
            ("2030-06-02", day(0, 10000)),
        ]);
        let err = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-03"), 1).unwrap_err();
        assert!(matches!(err, AvailabilityViolation::Insufficient { available: 0, .. }));
    }

    #[test]
    fn stop_sell_blocks_any_night() {
        let mut blocked = day(5, 10000);
        blocked.stop_sell = true;
        let rs = unit(&[
            ("2030-06-01", day(5, 10000)),
            ("2030-06-02", blocked),
        ]);
        let err = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-03"), 1).unwrap_err();
        assert_eq!(err, AvailabilityViolation::StopSell(d("2030-06-02")));
    }

    #[test]
    fn closed_to_arrival_only_matters_on_check_in() {
        let mut cta = day(5, 10000);
        cta.closed_to_arrival = true;

        // CTA on the check-in night blocks
        let rs = unit(&[
            ("2030-06-01", cta.clone()),
            ("2030-06-02", day(5, 10000)),
        ]);
        let err = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-03"), 1).unwrap_err();
        assert_eq!(err, AvailabilityViolation::ClosedToArrival(d("2030-06-01")));

        // CTA mid-stay is fine
        let rs = unit(&[
            ("2030-06-01", day(5, 10000)),
            ("2030-06-02", cta),
            ("2030-06-03", day(5, 10000)),
        ]);
        assert!(evaluate_stay(&rs, &stay("2030-06-01", "2030-06-04"), 1).is_ok());
    }

    #[test]
    fn closed_to_departure_only_matters_on_last_night() {
        let mut ctd = day(5, 10000);
        ctd.closed_to_departure = true;

        // CTD on the last covered night blocks
        let rs = unit(&[
            ("2030-06-01", day(5, 10000)),
            ("2030-06-02", ctd.clone()),
        ]);
        let err = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-03"), 1).unwrap_err();
        assert_eq!(err, AvailabilityViolation::ClosedToDeparture(d("2030-06-02")));

        // CTD on the first night of a longer stay is fine
        let rs = unit(&[
            ("2030-06-01", ctd),
            ("2030-06-02", day(5, 10000)),
        ]);
        assert!(evaluate_stay(&rs, &stay("2030-06-01", "2030-06-03"), 1).is_ok());
    }

    #[test]
    fn one_night_stay_checks_both_flags_on_same_day() {
        let mut rec = day(5, 10000);
        rec.closed_to_departure = true;
        let rs = unit(&[("2030-06-01", rec)]);
        let err = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-02"), 1).unwrap_err();
        assert_eq!(err, AvailabilityViolation::ClosedToDeparture(d("2030-06-01")));
    }

    #[test]
    fn min_stay_uses_max_across_nights() {
        let mut strict = day(5, 10000);
        strict.min_stay = 3;
        let rs = unit(&[
            ("2030-06-01", day(5, 10000)),
            ("2030-06-02", strict),
        ]);
        let err = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-03"), 1).unwrap_err();
        assert_eq!(err, AvailabilityViolation::MinStay { required: 3, nights: 2 });
    }

    #[test]
    fn min_stay_satisfied_at_boundary() {
        let mut strict = day(5, 10000);
        strict.min_stay = 3;
        let rs = unit(&[
            ("2030-06-01", strict.clone()),
            ("2030-06-02", strict.clone()),
            ("2030-06-03", strict),
        ]);
        assert!(evaluate_stay(&rs, &stay("2030-06-01", "2030-06-04"), 1).is_ok());
    }

    #[test]
    fn day_after_checkout_ignored() {
        // Stop-sell on the check-out date itself must not block the stay.
        let mut blocked = day(5, 10000);
        blocked.stop_sell = true;
        let rs = unit(&[
            ("2030-06-01", day(5, 10000)),
            ("2030-06-02", day(5, 10000)),
            ("2030-06-03", blocked),
        ]);
        assert!(evaluate_stay(&rs, &stay("2030-06-01", "2030-06-03"), 1).is_ok());
    }

    #[test]
    fn currency_mix_rejected() {
        let mut eur = day(5, 10000);
        eur.currency = "EUR".into();
        let rs = unit(&[
            ("2030-06-01", day(5, 10000)),
            ("2030-06-02", eur),
        ]);
        let err = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-03"), 1).unwrap_err();
        assert_eq!(
            err,
            AvailabilityViolation::CurrencyMix {
                date: d("2030-06-02"),
                expected: "USD".into(),
                found: "EUR".into(),
            }
        );
    }

    #[test]
    fn avg_price_rounds_to_cents() {
        let rs = unit(&[
            ("2030-06-01", day(5, 10000)),
            ("2030-06-02", day(5, 10000)),
            ("2030-06-03", day(5, 10001)),
        ]);
        let quote = evaluate_stay(&rs, &stay("2030-06-01", "2030-06-04"), 1).unwrap();
        // (100.00 + 100.00 + 100.01) / 3 = 100.003… → 100.00
        assert_eq!(quote.price_avg, Decimal::new(10000, 2));
        assert_eq!(quote.base_total, Decimal::new(30001, 2));
    }

    #[test]
    fn party_within_limits() {
        let room = room_attrs(4, 2, 2);
        assert!(check_party(&room, 2, 2).is_ok());
        assert!(check_party(&room, 1, 0).is_ok());
    }

    #[test]
    fn party_too_many_adults() {
        let room = room_attrs(4, 2, 2);
        let err = check_party(&room, 3, 0).unwrap_err();
        assert_eq!(
            err,
            AvailabilityViolation::PartyExceeds { field: "adults", max: 2, requested: 3 }
        );
    }

    #[test]
    fn party_too_many_children() {
        let room = room_attrs(4, 2, 2);
        let err = check_party(&room, 1, 3).unwrap_err();
        assert_eq!(
            err,
            AvailabilityViolation::PartyExceeds { field: "children", max: 2, requested: 3 }
        );
    }

    #[test]
    fn party_exceeds_total_occupancy() {
        let room = room_attrs(3, 2, 2);
        let err = check_party(&room, 2, 2).unwrap_err();
        assert_eq!(
            err,
            AvailabilityViolation::PartyExceeds { field: "occupancy", max: 3, requested: 4 }
        );
    }

    fn room_attrs(occupancy: u32, adults: u32, children: u32) -> RoomAttrs {
        RoomAttrs {
            id: Ulid::new(),
            property_id: None,
            name: "Test Room".into(),
            max_occupancy: occupancy,
            max_adults: adults,
            max_children: children,
            rating: None,
        }
    }
}
