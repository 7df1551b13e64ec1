use std::collections::{BTreeMap, HashMap};

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only wall-clock type.
pub type Ms = i64;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Today's date in UTC. Hotel calendars are day-granular; the property's
/// local timezone is a front-desk concern, not a ledger concern.
pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Half-open stay `[check_in, check_out)`. The check-out date is never a
/// covered night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "check_in must precede check_out");
        Self { check_in, check_out }
    }

    pub fn nights(&self) -> u32 {
        (self.check_out - self.check_in).num_days() as u32
    }

    /// The covered nights, in order: check_in, check_in+1, ..., check_out-1.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.check_in.iter_days().take_while(|d| *d < self.check_out)
    }

    /// The final covered night (check_out − 1 day). Closed-to-departure is
    /// evaluated here.
    pub fn last_night(&self) -> NaiveDate {
        self.check_out - Days::new(1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }

    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

/// One ledger day for a (room, rate plan) unit. Invariant:
/// `0 <= available <= total` at all times, under all concurrent writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDay {
    pub available: u32,
    pub total: u32,
    pub price: Decimal,
    pub currency: String,
    pub min_stay: u32,
    pub closed_to_arrival: bool,
    pub closed_to_departure: bool,
    pub stop_sell: bool,
    pub restrictions: BTreeMap<String, String>,
    pub updated_at: Ms,
}

/// Capacity attributes of a room type, as registered by the property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAttrs {
    pub id: Ulid,
    pub property_id: Option<Ulid>,
    pub name: String,
    pub max_occupancy: u32,
    pub max_adults: u32,
    pub max_children: u32,
    /// Star rating, when the property publishes one.
    pub rating: Option<u8>,
}

/// A priced, ruled variant of a room product (refundable vs non-refundable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePlanAttrs {
    pub id: Ulid,
    pub name: String,
    pub refundable: bool,
}

/// The locking unit: every booking touches exactly one of these.
pub type UnitKey = (Ulid, Ulid); // (room_id, rate_plan_id)

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    /// Unique per tenant, store-enforced.
    pub reference: String,
    pub property_id: Option<Ulid>,
    pub room_id: Ulid,
    pub rate_plan_id: Ulid,
    pub guest_id: Ulid,
    pub channel: String,
    pub stay: StayRange,
    /// Units of capacity held on every covered night while confirmed.
    pub rooms: u32,
    pub adults: u32,
    pub children: u32,
    pub base_price: Decimal,
    pub taxes: Decimal,
    pub fees: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub special_requests: Option<String>,
    pub status: BookingStatus,
    pub created_at: Ms,
    pub updated_at: Ms,
    pub cancelled_at: Option<Ms>,
    pub cancellation_reason: Option<String>,
}

impl Booking {
    pub fn nights(&self) -> u32 {
        self.stay.nights()
    }

    /// True while this booking holds capacity on `date`.
    pub fn holds(&self, date: NaiveDate) -> bool {
        self.status == BookingStatus::Confirmed && self.stay.contains(date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: Ulid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

/// In-memory state of one (room, rate plan) unit: its day ledger plus every
/// booking ever taken against it. Guarded by one RwLock — the write lock is
/// the row-level lock of the booking transaction.
#[derive(Debug, Clone)]
pub struct RoomRateState {
    pub room_id: Ulid,
    pub rate_plan_id: Ulid,
    pub calendar: BTreeMap<NaiveDate, InventoryDay>,
    pub bookings: HashMap<Ulid, Booking>,
}

impl RoomRateState {
    pub fn new(room_id: Ulid, rate_plan_id: Ulid) -> Self {
        Self {
            room_id,
            rate_plan_id,
            calendar: BTreeMap::new(),
            bookings: HashMap::new(),
        }
    }

    /// Ledger days covered by `stay`, in date order. Days with no record are
    /// simply absent — callers must treat a gap as unavailable.
    pub fn days_in(&self, stay: &StayRange) -> impl Iterator<Item = (&NaiveDate, &InventoryDay)> {
        self.calendar.range(stay.check_in..stay.check_out)
    }

    /// Total capacity held by confirmed bookings on `date`.
    pub fn confirmed_rooms_on(&self, date: NaiveDate) -> u32 {
        self.bookings
            .values()
            .filter(|b| b.holds(date))
            .map(|b| b.rooms)
            .sum()
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomRegistered {
        id: Ulid,
        property_id: Option<Ulid>,
        name: String,
        max_occupancy: u32,
        max_adults: u32,
        max_children: u32,
        rating: Option<u8>,
    },
    RatePlanRegistered {
        id: Ulid,
        name: String,
        refundable: bool,
    },
    InventoryUpserted {
        room_id: Ulid,
        rate_plan_id: Ulid,
        date: NaiveDate,
        /// The post-coalesce record; replay applies it verbatim.
        day: InventoryDay,
    },
    GuestUpserted {
        guest: Guest,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingCancelled {
        id: Ulid,
        room_id: Ulid,
        rate_plan_id: Ulid,
        reason: Option<String>,
        at: Ms,
    },
    BookingUpdated {
        id: Ulid,
        room_id: Ulid,
        rate_plan_id: Ulid,
        special_requests: Option<String>,
        at: Ms,
    },
    BookingCompleted {
        id: Ulid,
        room_id: Ulid,
        rate_plan_id: Ulid,
        at: Ms,
    },
    /// Compaction snapshot of a booking: restores the row and its indexes
    /// without replaying its ledger side effects.
    BookingRestored {
        booking: Booking,
    },
}

impl Event {
    /// The unit this event routes to, for unit-scoped events.
    pub fn unit_key(&self) -> Option<UnitKey> {
        match self {
            Event::InventoryUpserted { room_id, rate_plan_id, .. }
            | Event::BookingCancelled { room_id, rate_plan_id, .. }
            | Event::BookingUpdated { room_id, rate_plan_id, .. }
            | Event::BookingCompleted { room_id, rate_plan_id, .. } => {
                Some((*room_id, *rate_plan_id))
            }
            Event::BookingCreated { booking } | Event::BookingRestored { booking } => {
                Some((booking.room_id, booking.rate_plan_id))
            }
            Event::RoomRegistered { .. }
            | Event::RatePlanRegistered { .. }
            | Event::GuestUpserted { .. } => None,
        }
    }
}

// ── Request / result types ───────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub id: Ulid,
    pub room_id: Ulid,
    pub rate_plan_id: Ulid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub rooms: u32,
    pub adults: u32,
    pub children: u32,
    pub guest_email: String,
    pub guest_name: String,
    pub guest_phone: Option<String>,
    pub channel: Option<String>,
    pub special_requests: Option<String>,
}

/// One bulk-update item. `None` fields are left unchanged on an existing
/// record (coalesce); on first insert, total, price and currency are
/// mandatory.
#[derive(Debug, Clone)]
pub struct InventoryUpsert {
    pub room_id: Ulid,
    pub rate_plan_id: Ulid,
    pub date: NaiveDate,
    pub total: Option<u32>,
    pub available: Option<u32>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub min_stay: Option<u32>,
    pub closed_to_arrival: Option<bool>,
    pub closed_to_departure: Option<bool>,
    pub stop_sell: Option<bool>,
    pub restrictions: Option<BTreeMap<String, String>>,
}

impl InventoryUpsert {
    pub fn new(room_id: Ulid, rate_plan_id: Ulid, date: NaiveDate) -> Self {
        Self {
            room_id,
            rate_plan_id,
            date,
            total: None,
            available: None,
            price: None,
            currency: None,
            min_stay: None,
            closed_to_arrival: None,
            closed_to_departure: None,
            stop_sell: None,
            restrictions: None,
        }
    }
}

/// Per-item outcome of a bulk update. The batch is best-effort: one failed
/// item never disturbs its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkResult {
    pub index: usize,
    pub room_id: Ulid,
    pub rate_plan_id: Ulid,
    pub date: NaiveDate,
    pub error: Option<String>,
}

impl BulkResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Price,
    Rating,
    Name,
}

#[derive(Debug, Clone)]
pub struct SearchCriteria {
    pub property_id: Option<Ulid>,
    pub room_id: Option<Ulid>,
    pub rate_plan_id: Option<Ulid>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: u32,
    pub children: u32,
    pub rooms: u32,
    pub sort: SortKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityResult {
    pub room_id: Ulid,
    pub rate_plan_id: Ulid,
    pub room_name: String,
    pub rate_plan_name: String,
    pub rating: Option<u8>,
    pub nights: u32,
    /// min(available) across the stay — how many parties of this size fit.
    pub rooms_available: u32,
    pub price_min: Decimal,
    pub price_avg: Decimal,
    pub price_max: Decimal,
    /// Σ per-day price for one room across the stay.
    pub base_total: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRow {
    pub room_id: Ulid,
    pub rate_plan_id: Ulid,
    pub date: NaiveDate,
    pub day: InventoryDay,
}

/// Per-tenant pricing configuration. Rates are fractions, not percents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingConfig {
    pub tax_rate: Decimal,
    pub fee_rate: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(10, 2), // 0.10
            fee_rate: Decimal::new(5, 2),  // 0.05
        }
    }
}
