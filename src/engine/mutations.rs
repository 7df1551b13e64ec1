use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::{oneshot, OwnedRwLockWriteGuard};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::{check_party, evaluate_stay};
use super::{Engine, EngineError, SharedUnit, WalCommand};

impl Engine {
    // ── Reference data ───────────────────────────────────────

    pub async fn register_room(&self, attrs: RoomAttrs) -> Result<(), EngineError> {
        if self.rooms.len() >= MAX_ROOMS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if attrs.name.trim().is_empty() {
            return Err(EngineError::Validation("room name must not be empty".into()));
        }
        if attrs.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("room name too long"));
        }
        if attrs.max_occupancy == 0 {
            return Err(EngineError::Validation("max_occupancy must be at least 1".into()));
        }
        if let Some(rating) = attrs.rating
            && rating > 5 {
                return Err(EngineError::Validation(format!("rating {rating} out of range 0..=5")));
            }
        if self.rooms.contains_key(&attrs.id) {
            return Err(EngineError::Validation(format!("room {} already registered", attrs.id)));
        }

        let event = Event::RoomRegistered {
            id: attrs.id,
            property_id: attrs.property_id,
            name: attrs.name,
            max_occupancy: attrs.max_occupancy,
            max_adults: attrs.max_adults,
            max_children: attrs.max_children,
            rating: attrs.rating,
        };
        self.persist_registry(&event).await
    }

    pub async fn register_rate_plan(&self, attrs: RatePlanAttrs) -> Result<(), EngineError> {
        if self.rate_plans.len() >= MAX_RATE_PLANS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many rate plans"));
        }
        if attrs.name.trim().is_empty() {
            return Err(EngineError::Validation("rate plan name must not be empty".into()));
        }
        if attrs.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("rate plan name too long"));
        }
        if self.rate_plans.contains_key(&attrs.id) {
            return Err(EngineError::Validation(format!(
                "rate plan {} already registered",
                attrs.id
            )));
        }

        let event = Event::RatePlanRegistered {
            id: attrs.id,
            name: attrs.name,
            refundable: attrs.refundable,
        };
        self.persist_registry(&event).await
    }

    // ── Booking transaction ──────────────────────────────────

    /// Create a booking as one atomic unit: validate, lock the (room, rate
    /// plan) unit, re-validate availability against the locked rows, price,
    /// upsert the guest, reserve a unique reference, then durably append
    /// and apply. No in-memory state changes before the WAL append
    /// succeeds, so a failure at any step leaves zero partial effect on the
    /// ledger.
    pub async fn create_booking(&self, req: BookingRequest) -> Result<Booking, EngineError> {
        let stay = validate_request(&req, today())?;

        let room = self
            .rooms
            .get(&req.room_id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound { kind: "room", id: req.room_id })?;
        if !self.rate_plans.contains_key(&req.rate_plan_id) {
            return Err(EngineError::NotFound { kind: "rate plan", id: req.rate_plan_id });
        }
        if self.booking_units.contains_key(&req.id) {
            return Err(EngineError::Validation(format!("booking {} already exists", req.id)));
        }
        check_party(&room, req.adults, req.children)?;

        let key = (req.room_id, req.rate_plan_id);
        let unit = self.get_unit(&key).ok_or(EngineError::Availability(
            super::AvailabilityViolation::MissingDay(req.check_in),
        ))?;
        let mut guard = lock_unit(&unit).await?;

        // Re-validate against the locked rows — never against the advisory
        // read a search produced earlier.
        let quote = match evaluate_stay(&guard, &stay, req.rooms) {
            Ok(q) => q,
            Err(v) => {
                metrics::counter!(crate::observability::BOOKINGS_REJECTED_TOTAL).increment(1);
                return Err(v.into());
            }
        };

        let base_price = quote.base_total * Decimal::from(req.rooms);
        let taxes = (base_price * self.pricing.tax_rate).round_dp(2);
        let fees = (base_price * self.pricing.fee_rate).round_dp(2);

        let guest_id = self
            .upsert_guest(&req.guest_email, &req.guest_name, req.guest_phone.as_deref())
            .await?;

        let reference = self.reserve_reference(req.id)?;
        let now = now_ms();
        let booking = Booking {
            id: req.id,
            reference: reference.clone(),
            property_id: room.property_id,
            room_id: req.room_id,
            rate_plan_id: req.rate_plan_id,
            guest_id,
            channel: req.channel.unwrap_or_else(|| "direct".into()),
            stay,
            rooms: req.rooms,
            adults: req.adults,
            children: req.children,
            base_price,
            taxes,
            fees,
            total_amount: base_price + taxes + fees,
            currency: quote.currency,
            special_requests: req.special_requests,
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
            cancellation_reason: None,
        };

        let event = Event::BookingCreated { booking: booking.clone() };
        if let Err(e) = self.persist_and_apply(&mut guard, &event).await {
            // The reference was reserved optimistically; give it back.
            self.references.remove(&reference);
            return Err(e);
        }

        metrics::counter!(crate::observability::BOOKINGS_CONFIRMED_TOTAL).increment(1);
        Ok(booking)
    }

    // ── Cancellation transaction ─────────────────────────────

    /// Cancel a booking and restore its held capacity. Rejects a second
    /// cancel and cancel-after-completion with DomainState and touches
    /// nothing — the idempotence guard against double increments.
    pub async fn cancel_booking(
        &self,
        booking_id: Ulid,
        reason: Option<String>,
    ) -> Result<Booking, EngineError> {
        if let Some(r) = &reason
            && r.len() > MAX_SPECIAL_REQUESTS_LEN {
                return Err(EngineError::LimitExceeded("cancellation reason too long"));
            }
        let key = self
            .unit_for_booking(&booking_id)
            .ok_or(EngineError::NotFound { kind: "booking", id: booking_id })?;
        let unit = self
            .get_unit(&key)
            .ok_or(EngineError::NotFound { kind: "booking", id: booking_id })?;
        let mut guard = lock_unit(&unit).await?;

        let booking = guard
            .bookings
            .get(&booking_id)
            .ok_or(EngineError::NotFound { kind: "booking", id: booking_id })?;
        match booking.status {
            BookingStatus::Cancelled => {
                return Err(EngineError::DomainState("booking is already cancelled"));
            }
            BookingStatus::Completed => {
                return Err(EngineError::DomainState("completed bookings cannot be cancelled"));
            }
            BookingStatus::Confirmed => {}
        }

        let event = Event::BookingCancelled {
            id: booking_id,
            room_id: key.0,
            rate_plan_id: key.1,
            reason,
            at: now_ms(),
        };
        self.persist_and_apply(&mut guard, &event).await?;

        metrics::counter!(crate::observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
        Ok(guard.bookings[&booking_id].clone())
    }

    /// Update non-capacity fields on a confirmed booking. Dates, rooms and
    /// party size are immutable — rebook instead.
    pub async fn update_booking(
        &self,
        booking_id: Ulid,
        special_requests: Option<String>,
    ) -> Result<Booking, EngineError> {
        if let Some(s) = &special_requests
            && s.len() > MAX_SPECIAL_REQUESTS_LEN {
                return Err(EngineError::LimitExceeded("special requests too long"));
            }
        let key = self
            .unit_for_booking(&booking_id)
            .ok_or(EngineError::NotFound { kind: "booking", id: booking_id })?;
        let unit = self
            .get_unit(&key)
            .ok_or(EngineError::NotFound { kind: "booking", id: booking_id })?;
        let mut guard = lock_unit(&unit).await?;

        let booking = guard
            .bookings
            .get(&booking_id)
            .ok_or(EngineError::NotFound { kind: "booking", id: booking_id })?;
        if booking.status != BookingStatus::Confirmed {
            return Err(EngineError::DomainState("only confirmed bookings can be updated"));
        }

        let event = Event::BookingUpdated {
            id: booking_id,
            room_id: key.0,
            rate_plan_id: key.1,
            special_requests,
            at: now_ms(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(guard.bookings[&booking_id].clone())
    }

    // ── Bulk inventory updates ───────────────────────────────

    /// Best-effort batch upsert: every item stands alone. A bad key, an
    /// out-of-range date or an invalid count fails that item's result and
    /// leaves the rest committed. Items for the same unit are grouped so
    /// the unit lock is taken once per group.
    pub async fn bulk_update_inventory(
        &self,
        items: Vec<InventoryUpsert>,
    ) -> Result<Vec<BulkResult>, EngineError> {
        if items.len() > MAX_BATCH_ITEMS {
            return Err(EngineError::LimitExceeded("batch too large"));
        }

        let today = today();
        let mut results: Vec<BulkResult> = items
            .iter()
            .enumerate()
            .map(|(index, item)| BulkResult {
                index,
                room_id: item.room_id,
                rate_plan_id: item.rate_plan_id,
                date: item.date,
                error: None,
            })
            .collect();

        // Group by unit, keeping batch order within each group.
        let mut groups: BTreeMap<UnitKey, Vec<usize>> = BTreeMap::new();
        for (index, item) in items.iter().enumerate() {
            groups
                .entry((item.room_id, item.rate_plan_id))
                .or_default()
                .push(index);
        }

        for (key, indexes) in groups {
            if let Err(msg) = self.validate_unit_key(&key) {
                for i in indexes {
                    results[i].error = Some(msg.clone());
                }
                continue;
            }
            let unit = self.unit_or_create(key);
            let mut guard = unit.write().await;

            for i in indexes {
                let item = &items[i];
                let outcome = self.apply_upsert(&mut guard, item, today).await;
                if let Err(msg) = outcome {
                    results[i].error = Some(msg);
                }
            }
        }

        Ok(results)
    }

    fn validate_unit_key(&self, key: &UnitKey) -> Result<(), String> {
        if !self.rooms.contains_key(&key.0) {
            return Err(format!("unknown room {}", key.0));
        }
        if !self.rate_plans.contains_key(&key.1) {
            return Err(format!("unknown rate plan {}", key.1));
        }
        if !self.units.contains_key(key) && self.units.len() >= MAX_UNITS_PER_TENANT {
            return Err("too many inventory units".into());
        }
        Ok(())
    }

    async fn apply_upsert(
        &self,
        guard: &mut RoomRateState,
        item: &InventoryUpsert,
        today: NaiveDate,
    ) -> Result<(), String> {
        let backfill = (today - item.date).num_days();
        let advance = (item.date - today).num_days();
        if backfill > MAX_BACKFILL_DAYS || advance > MAX_ADVANCE_DAYS {
            return Err(format!("date {} out of the accepted window", item.date));
        }

        let day = coalesce(guard.calendar.get(&item.date), item, now_ms())?;
        let event = Event::InventoryUpserted {
            room_id: item.room_id,
            rate_plan_id: item.rate_plan_id,
            date: item.date,
            day,
        };
        self.persist_and_apply(guard, &event)
            .await
            .map_err(|e| e.to_string())
    }

    // ── Departure sweep ──────────────────────────────────────

    /// Confirmed bookings whose check-out has passed, ready for the
    /// completed transition. Skips units whose lock is contended — the next
    /// sweep catches them.
    pub fn collect_departed(&self, today: NaiveDate) -> Vec<Ulid> {
        let mut departed = Vec::new();
        for entry in self.units.iter() {
            let unit = entry.value().clone();
            if let Ok(guard) = unit.try_read() {
                for booking in guard.bookings.values() {
                    if booking.status == BookingStatus::Confirmed
                        && booking.stay.check_out <= today
                    {
                        departed.push(booking.id);
                    }
                }
            }
        }
        departed
    }

    /// Transition a confirmed booking to completed. Completed bookings no
    /// longer accept cancellation and hold no capacity (their nights are in
    /// the past).
    pub async fn complete_booking(&self, booking_id: Ulid) -> Result<(), EngineError> {
        let key = self
            .unit_for_booking(&booking_id)
            .ok_or(EngineError::NotFound { kind: "booking", id: booking_id })?;
        let unit = self
            .get_unit(&key)
            .ok_or(EngineError::NotFound { kind: "booking", id: booking_id })?;
        let mut guard = lock_unit(&unit).await?;

        let booking = guard
            .bookings
            .get(&booking_id)
            .ok_or(EngineError::NotFound { kind: "booking", id: booking_id })?;
        if booking.status != BookingStatus::Confirmed {
            return Err(EngineError::DomainState("booking is not confirmed"));
        }

        let event = Event::BookingCompleted {
            id: booking_id,
            room_id: key.0,
            rate_plan_id: key.1,
            at: now_ms(),
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    // ── Guests & references ──────────────────────────────────

    /// Upsert a guest keyed by (tenant, email). Idempotent: a repeat upsert
    /// refreshes contact fields and returns the same guest id.
    async fn upsert_guest(
        &self,
        email: &str,
        name: &str,
        phone: Option<&str>,
    ) -> Result<Ulid, EngineError> {
        let key = email.trim().to_lowercase();
        let now = now_ms();
        let existing = self.guests.get(&key).map(|e| e.value().clone());
        let guest = match existing {
            Some(g) => Guest {
                id: g.id,
                email: g.email,
                name: name.to_string(),
                phone: phone.map(str::to_string),
                created_at: g.created_at,
                updated_at: now,
            },
            None => Guest {
                id: Ulid::new(),
                email: email.trim().to_string(),
                name: name.to_string(),
                phone: phone.map(str::to_string),
                created_at: now,
                updated_at: now,
            },
        };
        let id = guest.id;
        self.persist_registry(&Event::GuestUpserted { guest }).await?;
        Ok(id)
    }

    /// Reserve a booking reference, unique per tenant. Insert-if-absent on
    /// the reference index is the store-enforced constraint; on collision
    /// regenerate rather than failing the caller's request.
    fn reserve_reference(&self, booking_id: Ulid) -> Result<String, EngineError> {
        for _ in 0..MAX_REFERENCE_ATTEMPTS {
            let tail = Ulid::new().to_string();
            let candidate = format!("BK-{}", &tail[tail.len() - 10..]);
            match self.references.entry(candidate.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(booking_id);
                    return Ok(candidate);
                }
            }
        }
        Err(EngineError::Conflict(
            "could not allocate a unique booking reference".into(),
        ))
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Rewrite the WAL with the minimal event set that recreates current
    /// state: reference data, guests, the calendar as it stands, and
    /// booking snapshots (which replay without ledger side effects).
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        for room in self.rooms.iter() {
            let r = room.value();
            events.push(Event::RoomRegistered {
                id: r.id,
                property_id: r.property_id,
                name: r.name.clone(),
                max_occupancy: r.max_occupancy,
                max_adults: r.max_adults,
                max_children: r.max_children,
                rating: r.rating,
            });
        }
        for plan in self.rate_plans.iter() {
            let p = plan.value();
            events.push(Event::RatePlanRegistered {
                id: p.id,
                name: p.name.clone(),
                refundable: p.refundable,
            });
        }
        for guest in self.guests.iter() {
            events.push(Event::GuestUpserted { guest: guest.value().clone() });
        }

        let keys: Vec<UnitKey> = self.units.iter().map(|e| *e.key()).collect();
        for key in keys {
            let Some(unit) = self.get_unit(&key) else { continue };
            let guard = unit.read().await;
            for (date, day) in &guard.calendar {
                events.push(Event::InventoryUpserted {
                    room_id: key.0,
                    rate_plan_id: key.1,
                    date: *date,
                    day: day.clone(),
                });
            }
            for booking in guard.bookings.values() {
                events.push(Event::BookingRestored { booking: booking.clone() });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// Acquire a unit's exclusive lock within the bounded timeout. A timeout is
/// a retryable conflict, never an indefinite block.
async fn lock_unit(unit: &SharedUnit) -> Result<OwnedRwLockWriteGuard<RoomRateState>, EngineError> {
    match tokio::time::timeout(
        Duration::from_millis(UNIT_LOCK_TIMEOUT_MS),
        unit.clone().write_owned(),
    )
    .await
    {
        Ok(guard) => Ok(guard),
        Err(_) => {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            Err(EngineError::Conflict(
                "timed out waiting for the inventory unit lock".into(),
            ))
        }
    }
}

fn validate_request(req: &BookingRequest, today: NaiveDate) -> Result<StayRange, EngineError> {
    if req.check_out <= req.check_in {
        return Err(EngineError::Validation(format!(
            "check_out {} must be after check_in {}",
            req.check_out, req.check_in
        )));
    }
    if req.check_in < today {
        return Err(EngineError::Validation(format!(
            "check_in {} is in the past",
            req.check_in
        )));
    }
    if (req.check_in - today).num_days() > MAX_ADVANCE_DAYS {
        return Err(EngineError::LimitExceeded("check-in too far in the future"));
    }
    let stay = StayRange::new(req.check_in, req.check_out);
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    if req.rooms == 0 {
        return Err(EngineError::Validation("rooms_requested must be at least 1".into()));
    }
    if req.rooms > MAX_ROOMS_PER_BOOKING {
        return Err(EngineError::LimitExceeded("too many rooms in one booking"));
    }
    if req.adults == 0 {
        return Err(EngineError::Validation("at least one adult is required".into()));
    }
    let email = req.guest_email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(EngineError::Validation(format!("invalid guest email {email:?}")));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(EngineError::LimitExceeded("guest email too long"));
    }
    if req.guest_name.trim().is_empty() {
        return Err(EngineError::Validation("guest name must not be empty".into()));
    }
    if req.guest_name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("guest name too long"));
    }
    if let Some(c) = &req.channel
        && c.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("channel tag too long"));
        }
    if let Some(s) = &req.special_requests
        && s.len() > MAX_SPECIAL_REQUESTS_LEN {
            return Err(EngineError::LimitExceeded("special requests too long"));
        }
    Ok(stay)
}

/// Merge an upsert item over the existing record (coalesce semantics). On
/// first insert, total, price and currency are mandatory.
fn coalesce(
    existing: Option<&InventoryDay>,
    item: &InventoryUpsert,
    now: Ms,
) -> Result<InventoryDay, String> {
    if let Some(price) = item.price
        && price < Decimal::ZERO {
            return Err(format!("price {price} must not be negative"));
        }
    if let Some(currency) = &item.currency
        && !(currency.len() == 3 && currency.chars().all(|c| c.is_ascii_uppercase())) {
            return Err(format!("currency {currency:?} must be a 3-letter uppercase code"));
        }
    if let Some(restrictions) = &item.restrictions
        && restrictions.len() > MAX_RESTRICTION_ENTRIES {
            return Err("too many restriction entries".into());
        }

    let (total, mut available, price, currency, min_stay, cta, ctd, stop_sell, restrictions) =
        match existing {
            Some(cur) => (
                item.total.unwrap_or(cur.total),
                item.available.unwrap_or(cur.available),
                item.price.unwrap_or(cur.price),
                item.currency.clone().unwrap_or_else(|| cur.currency.clone()),
                item.min_stay.unwrap_or(cur.min_stay),
                item.closed_to_arrival.unwrap_or(cur.closed_to_arrival),
                item.closed_to_departure.unwrap_or(cur.closed_to_departure),
                item.stop_sell.unwrap_or(cur.stop_sell),
                item.restrictions.clone().unwrap_or_else(|| cur.restrictions.clone()),
            ),
            None => {
                let total = item.total.ok_or("total_rooms required for a new record")?;
                let price = item.price.ok_or("price required for a new record")?;
                let currency = item
                    .currency
                    .clone()
                    .ok_or("currency required for a new record")?;
                (
                    total,
                    item.available.unwrap_or(total),
                    price,
                    currency,
                    item.min_stay.unwrap_or(1),
                    item.closed_to_arrival.unwrap_or(false),
                    item.closed_to_departure.unwrap_or(false),
                    item.stop_sell.unwrap_or(false),
                    item.restrictions.clone().unwrap_or_default(),
                )
            }
        };

    if let Some(requested) = item.available
        && requested > total {
            return Err(format!("available_rooms {requested} exceeds total_rooms {total}"));
        }
    if available > total {
        // total was lowered below the current availability; the channel is
        // authoritative for supply, so follow it down.
        tracing::warn!(
            date = %item.date,
            available,
            total,
            "total_rooms reduced below available_rooms; clamping availability"
        );
        available = total;
    }

    Ok(InventoryDay {
        available,
        total,
        price,
        currency,
        min_stay,
        closed_to_arrival: cta,
        closed_to_departure: ctd,
        stop_sell,
        restrictions,
        updated_at: now,
    })
}
