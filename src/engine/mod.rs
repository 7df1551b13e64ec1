mod availability;
mod error;
mod mutations;
mod queries;

pub use availability::{check_party, evaluate_stay, AvailabilityViolation, StayQuote};
pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedUnit = Arc<RwLock<RoomRateState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush the batch first, then the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// One tenant's booking engine: the inventory ledger partitioned into
/// per-(room, rate plan) units, the bookings held against them, and the
/// reference data both depend on. All of it is rebuilt from the WAL on open.
#[derive(Debug)]
pub struct Engine {
    pub(super) units: DashMap<UnitKey, SharedUnit>,
    pub(super) rooms: DashMap<Ulid, RoomAttrs>,
    pub(super) rate_plans: DashMap<Ulid, RatePlanAttrs>,
    /// Guests keyed by lowercased email — the upsert identity.
    pub(super) guests: DashMap<String, Guest>,
    /// Booking id → owning unit, for cancellation and lookup routing.
    pub(super) booking_units: DashMap<Ulid, UnitKey>,
    /// Booking reference → id. Uniqueness is enforced by insert-if-absent.
    pub(super) references: DashMap<String, Ulid>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) pricing: PricingConfig,
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        pricing: PricingConfig,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            units: DashMap::new(),
            rooms: DashMap::new(),
            rate_plans: DashMap::new(),
            guests: DashMap::new(),
            booking_units: DashMap::new(),
            references: DashMap::new(),
            wal_tx,
            notify,
            pricing,
        };

        // Replay. We are the sole owner of every unit Arc here, so try_write
        // always succeeds instantly. Never block in this loop — it may run
        // inside an async context (lazy tenant creation).
        for event in &events {
            match event {
                Event::RoomRegistered { .. }
                | Event::RatePlanRegistered { .. }
                | Event::GuestUpserted { .. } => engine.apply_registry_event(event),
                _ => {
                    let Some(key) = event.unit_key() else { continue };
                    let unit = engine.unit_or_create(key);
                    let mut guard = unit.try_write().expect("replay: uncontended write");
                    engine.apply_unit_event(&mut guard, event);
                }
            }
        }

        Ok(engine)
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    pub fn get_unit(&self, key: &UnitKey) -> Option<SharedUnit> {
        self.units.get(key).map(|e| e.value().clone())
    }

    pub(super) fn unit_or_create(&self, key: UnitKey) -> SharedUnit {
        self.units
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(RoomRateState::new(key.0, key.1))))
            .clone()
    }

    pub fn unit_for_booking(&self, booking_id: &Ulid) -> Option<UnitKey> {
        self.booking_units.get(booking_id).map(|e| *e.value())
    }

    /// Write an event to the WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    /// WAL-append + apply + notify in one call. Nothing in memory changes
    /// unless the append was durable, and the notify is fire-and-forget.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut RoomRateState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.apply_unit_event(rs, event);
        self.notify.send(rs.room_id, event);
        Ok(())
    }

    /// WAL-append + apply for engine-level reference data (no unit, no
    /// notification).
    pub(super) async fn persist_registry(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.apply_registry_event(event);
        Ok(())
    }

    fn apply_registry_event(&self, event: &Event) {
        match event {
            Event::RoomRegistered {
                id,
                property_id,
                name,
                max_occupancy,
                max_adults,
                max_children,
                rating,
            } => {
                self.rooms.insert(
                    *id,
                    RoomAttrs {
                        id: *id,
                        property_id: *property_id,
                        name: name.clone(),
                        max_occupancy: *max_occupancy,
                        max_adults: *max_adults,
                        max_children: *max_children,
                        rating: *rating,
                    },
                );
            }
            Event::RatePlanRegistered { id, name, refundable } => {
                self.rate_plans.insert(
                    *id,
                    RatePlanAttrs {
                        id: *id,
                        name: name.clone(),
                        refundable: *refundable,
                    },
                );
            }
            Event::GuestUpserted { guest } => {
                self.guests.insert(guest.email.to_lowercase(), guest.clone());
            }
            other => {
                debug_assert!(false, "not a registry event: {other:?}");
            }
        }
    }

    /// Apply a unit-scoped event to a locked unit state plus the engine
    /// indexes. Used by both the live path and replay, so the two can never
    /// disagree about what an event means.
    pub(super) fn apply_unit_event(&self, rs: &mut RoomRateState, event: &Event) {
        match event {
            Event::InventoryUpserted { date, day, .. } => {
                rs.calendar.insert(*date, day.clone());
            }
            Event::BookingCreated { booking } => {
                for date in booking.stay.days() {
                    if let Some(rec) = rs.calendar.get_mut(&date) {
                        match rec.available.checked_sub(booking.rooms) {
                            Some(left) => rec.available = left,
                            None => {
                                // Only reachable on a corrupt WAL: live
                                // creations are validated under the lock.
                                tracing::error!(
                                    booking = %booking.id,
                                    %date,
                                    available = rec.available,
                                    rooms = booking.rooms,
                                    "ledger underflow applying booking; clamping to 0"
                                );
                                metrics::counter!(crate::observability::LEDGER_CLAMPS_TOTAL)
                                    .increment(1);
                                rec.available = 0;
                            }
                        }
                        rec.updated_at = booking.created_at;
                    }
                }
                self.index_booking(booking);
                rs.bookings.insert(booking.id, booking.clone());
            }
            Event::BookingRestored { booking } => {
                // Snapshot restore: the calendar already reflects this
                // booking's holds.
                self.index_booking(booking);
                rs.bookings.insert(booking.id, booking.clone());
            }
            Event::BookingCancelled { id, reason, at, .. } => {
                if let Some(booking) = rs.bookings.get_mut(id) {
                    booking.status = BookingStatus::Cancelled;
                    booking.cancelled_at = Some(*at);
                    booking.cancellation_reason = reason.clone();
                    booking.updated_at = *at;
                    let (stay, rooms) = (booking.stay, booking.rooms);
                    for date in stay.days() {
                        if let Some(rec) = rs.calendar.get_mut(&date) {
                            let restored = rec.available + rooms;
                            if restored > rec.total {
                                // Restoring more capacity than the day ever
                                // had means the ledger was corrupted by an
                                // overlapping overwrite. Clamp, but loudly.
                                tracing::error!(
                                    booking = %id,
                                    %date,
                                    available = rec.available,
                                    rooms,
                                    total = rec.total,
                                    "cancellation would exceed total_rooms; ledger inconsistency"
                                );
                                metrics::counter!(crate::observability::LEDGER_CLAMPS_TOTAL)
                                    .increment(1);
                                rec.available = rec.total;
                            } else {
                                rec.available = restored;
                            }
                            rec.updated_at = *at;
                        }
                    }
                }
            }
            Event::BookingUpdated { id, special_requests, at, .. } => {
                if let Some(booking) = rs.bookings.get_mut(id) {
                    booking.special_requests = special_requests.clone();
                    booking.updated_at = *at;
                }
            }
            Event::BookingCompleted { id, at, .. } => {
                if let Some(booking) = rs.bookings.get_mut(id) {
                    booking.status = BookingStatus::Completed;
                    booking.updated_at = *at;
                }
            }
            other => {
                debug_assert!(false, "not a unit event: {other:?}");
            }
        }
    }

    fn index_booking(&self, booking: &Booking) {
        self.booking_units
            .insert(booking.id, (booking.room_id, booking.rate_plan_id));
        self.references.insert(booking.reference.clone(), booking.id);
    }
}
