use std::cmp::Ordering;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::{check_party, evaluate_stay};
use super::{Engine, EngineError};

impl Engine {
    /// Search sellable (room, rate plan) candidates for a stay. Read-only
    /// and advisory: every hit is re-validated under the unit's write lock
    /// before a booking commits.
    pub async fn search(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<AvailabilityResult>, EngineError> {
        if criteria.check_out <= criteria.check_in {
            return Err(EngineError::Validation(format!(
                "check_out {} must be after check_in {}",
                criteria.check_out, criteria.check_in
            )));
        }
        if criteria.check_in < today() {
            return Err(EngineError::Validation(format!(
                "check_in {} is in the past",
                criteria.check_in
            )));
        }
        let stay = StayRange::new(criteria.check_in, criteria.check_out);
        if stay.nights() > MAX_STAY_NIGHTS {
            return Err(EngineError::LimitExceeded("stay too long"));
        }
        if criteria.rooms == 0 {
            return Err(EngineError::Validation("rooms_requested must be at least 1".into()));
        }
        if criteria.adults == 0 {
            return Err(EngineError::Validation("at least one adult is required".into()));
        }

        let keys: Vec<UnitKey> = self
            .units
            .iter()
            .map(|e| *e.key())
            .filter(|(room_id, plan_id)| {
                criteria.room_id.is_none_or(|r| r == *room_id)
                    && criteria.rate_plan_id.is_none_or(|p| p == *plan_id)
            })
            .collect();

        let mut results = Vec::new();
        for key in keys {
            let Some(room) = self.rooms.get(&key.0).map(|e| e.value().clone()) else {
                continue;
            };
            if criteria
                .property_id
                .is_some_and(|p| room.property_id != Some(p))
            {
                continue;
            }
            if check_party(&room, criteria.adults, criteria.children).is_err() {
                continue;
            }
            let Some(plan) = self.rate_plans.get(&key.1).map(|e| e.value().clone()) else {
                continue;
            };
            let Some(unit) = self.get_unit(&key) else { continue };
            let guard = unit.read().await;
            let Ok(quote) = evaluate_stay(&guard, &stay, criteria.rooms) else {
                continue;
            };
            results.push(AvailabilityResult {
                room_id: key.0,
                rate_plan_id: key.1,
                room_name: room.name,
                rate_plan_name: plan.name,
                rating: room.rating,
                nights: quote.nights,
                rooms_available: quote.rooms_available,
                price_min: quote.price_min,
                price_avg: quote.price_avg,
                price_max: quote.price_max,
                base_total: quote.base_total,
                currency: quote.currency,
            });
        }

        sort_results(&mut results, criteria.sort);
        Ok(results)
    }

    /// Read-only ledger dump over a bounded window: `[from, to)`.
    pub async fn inventory_calendar(
        &self,
        room_id: Option<Ulid>,
        rate_plan_id: Option<Ulid>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<InventoryRow>, EngineError> {
        if to <= from {
            return Err(EngineError::Validation(format!(
                "window end {to} must be after start {from}"
            )));
        }
        if (to - from).num_days() > MAX_QUERY_WINDOW_DAYS {
            return Err(EngineError::LimitExceeded("query window too wide"));
        }

        let keys: Vec<UnitKey> = self
            .units
            .iter()
            .map(|e| *e.key())
            .filter(|(r, p)| {
                room_id.is_none_or(|want| want == *r) && rate_plan_id.is_none_or(|want| want == *p)
            })
            .collect();

        let mut rows = Vec::new();
        for key in keys {
            let Some(unit) = self.get_unit(&key) else { continue };
            let guard = unit.read().await;
            for (date, day) in guard.calendar.range(from..to) {
                rows.push(InventoryRow {
                    room_id: key.0,
                    rate_plan_id: key.1,
                    date: *date,
                    day: day.clone(),
                });
            }
        }
        rows.sort_by(|a, b| {
            (a.room_id, a.rate_plan_id, a.date).cmp(&(b.room_id, b.rate_plan_id, b.date))
        });
        Ok(rows)
    }

    pub async fn get_booking(&self, booking_id: &Ulid) -> Option<Booking> {
        let key = self.unit_for_booking(booking_id)?;
        let unit = self.get_unit(&key)?;
        let guard = unit.read().await;
        guard.bookings.get(booking_id).cloned()
    }

    pub async fn find_booking_by_reference(&self, reference: &str) -> Option<Booking> {
        let id = self.references.get(reference).map(|e| *e.value())?;
        self.get_booking(&id).await
    }

    /// Bookings, optionally narrowed to one room, newest first.
    pub async fn list_bookings(&self, room_id: Option<Ulid>) -> Vec<Booking> {
        let keys: Vec<UnitKey> = self
            .units
            .iter()
            .map(|e| *e.key())
            .filter(|(r, _)| room_id.is_none_or(|want| want == *r))
            .collect();

        let mut bookings = Vec::new();
        for key in keys {
            let Some(unit) = self.get_unit(&key) else { continue };
            let guard = unit.read().await;
            bookings.extend(guard.bookings.values().cloned());
        }
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        bookings
    }

    pub fn list_rooms(&self) -> Vec<RoomAttrs> {
        let mut rooms: Vec<RoomAttrs> = self.rooms.iter().map(|e| e.value().clone()).collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }

    pub fn list_rate_plans(&self) -> Vec<RatePlanAttrs> {
        let mut plans: Vec<RatePlanAttrs> =
            self.rate_plans.iter().map(|e| e.value().clone()).collect();
        plans.sort_by(|a, b| a.id.cmp(&b.id));
        plans
    }

    pub fn room(&self, id: &Ulid) -> Option<RoomAttrs> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn guest_by_email(&self, email: &str) -> Option<Guest> {
        self.guests
            .get(&email.trim().to_lowercase())
            .map(|e| e.value().clone())
    }
}

/// Caller-selectable ordering; every key breaks ties by price ascending,
/// then name ascending.
fn sort_results(results: &mut [AvailabilityResult], key: SortKey) {
    results.sort_by(|a, b| {
        let by_price = a
            .price_avg
            .cmp(&b.price_avg)
            .then_with(|| a.room_name.cmp(&b.room_name))
            .then_with(|| a.rate_plan_name.cmp(&b.rate_plan_name));
        match key {
            SortKey::Price => by_price,
            // Higher-rated rooms first; unrated sink to the end.
            SortKey::Rating => match (b.rating, a.rating) {
                (Some(x), Some(y)) => x.cmp(&y).then(by_price),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => by_price,
            },
            SortKey::Name => a
                .room_name
                .cmp(&b.room_name)
                .then_with(|| a.price_avg.cmp(&b.price_avg))
                .then_with(|| a.rate_plan_name.cmp(&b.rate_plan_name)),
        }
    });
}

#[cfg(test)]
mod sort_tests {
    use super::*;
    use rust_decimal::Decimal;

    fn result(name: &str, plan: &str, avg: i64, rating: Option<u8>) -> AvailabilityResult {
        AvailabilityResult {
            room_id: Ulid::new(),
            rate_plan_id: Ulid::new(),
            room_name: name.into(),
            rate_plan_name: plan.into(),
            rating,
            nights: 1,
            rooms_available: 1,
            price_min: Decimal::new(avg, 2),
            price_avg: Decimal::new(avg, 2),
            price_max: Decimal::new(avg, 2),
            base_total: Decimal::new(avg, 2),
            currency: "USD".into(),
        }
    }

    #[test]
    fn price_sort_ascending_with_name_tiebreak() {
        let mut rows = vec![
            result("Zeta", "Flex", 5000, None),
            result("Alpha", "Flex", 5000, None),
            result("Mid", "Flex", 3000, None),
        ];
        sort_results(&mut rows, SortKey::Price);
        assert_eq!(rows[0].room_name, "Mid");
        assert_eq!(rows[1].room_name, "Alpha");
        assert_eq!(rows[2].room_name, "Zeta");
    }

    #[test]
    fn rating_sort_descending_unrated_last() {
        let mut rows = vec![
            result("Budget", "Flex", 1000, Some(2)),
            result("Luxe", "Flex", 9000, Some(5)),
            result("Mystery", "Flex", 500, None),
        ];
        sort_results(&mut rows, SortKey::Rating);
        assert_eq!(rows[0].room_name, "Luxe");
        assert_eq!(rows[1].room_name, "Budget");
        assert_eq!(rows[2].room_name, "Mystery");
    }

    #[test]
    fn rating_ties_break_by_price() {
        let mut rows = vec![
            result("Pricier", "Flex", 9000, Some(4)),
            result("Cheaper", "Flex", 4000, Some(4)),
        ];
        sort_results(&mut rows, SortKey::Rating);
        assert_eq!(rows[0].room_name, "Cheaper");
    }

    #[test]
    fn name_sort_alphabetical() {
        let mut rows = vec![
            result("Beta", "Flex", 1000, None),
            result("Alpha", "Flex", 9000, None),
        ];
        sort_results(&mut rows, SortKey::Name);
        assert_eq!(rows[0].room_name, "Alpha");
    }
}
