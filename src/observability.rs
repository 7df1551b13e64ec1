use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total commands executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "roomledger_queries_total";

/// Histogram: command latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "roomledger_query_duration_seconds";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: bookings confirmed.
pub const BOOKINGS_CONFIRMED_TOTAL: &str = "roomledger_bookings_confirmed_total";

/// Counter: bookings cancelled.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "roomledger_bookings_cancelled_total";

/// Counter: booking attempts rejected by the availability predicate.
pub const BOOKINGS_REJECTED_TOTAL: &str = "roomledger_bookings_rejected_total";

/// Counter: booking attempts that lost a concurrency race (lock timeout or
/// guarded decrement failure).
pub const BOOKING_CONFLICTS_TOTAL: &str = "roomledger_booking_conflicts_total";

/// Counter: cancellation increments clamped at total_rooms — each one is a
/// ledger-consistency violation and is also logged at error level.
pub const LEDGER_CLAMPS_TOTAL: &str = "roomledger_ledger_clamps_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "roomledger_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "roomledger_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "roomledger_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "roomledger_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roomledger_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roomledger_wal_flush_batch_size";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertRoom { .. } => "insert_room",
        Command::InsertRatePlan { .. } => "insert_rate_plan",
        Command::UpsertInventory { .. } => "upsert_inventory",
        Command::InsertBooking { .. } => "insert_booking",
        Command::CancelBooking { .. } => "cancel_booking",
        Command::UpdateBookingRequests { .. } => "update_booking",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectInventory { .. } => "select_inventory",
        Command::SelectBookings { .. } => "select_bookings",
        Command::SelectRooms => "select_rooms",
        Command::SelectRatePlans => "select_rate_plans",
    }
}
