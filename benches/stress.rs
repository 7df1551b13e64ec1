//! Booking-race stress harness. Run a server first:
//!   ROOMLEDGER_PORT=5433 cargo run --release
//! then:
//!   cargo bench --bench stress

use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use tokio_postgres::{Config, NoTls};
use ulid::Ulid;

async fn connect(host: &str, port: u16, dbname: &str) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(dbname)
        .user("roomledger")
        .password("roomledger");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

fn day(offset: u64) -> NaiveDate {
    chrono::Utc::now().date_naive() + Days::new(30 + offset)
}

struct Unit {
    room: Ulid,
    plan: Ulid,
    total: u32,
}

const CALENDAR_DAYS: u64 = 30;

async fn setup(client: &tokio_postgres::Client) -> Vec<Unit> {
    let capacities = [1u32, 1, 2, 3, 5, 5, 10, 10, 20, 50];
    let mut units = Vec::new();

    for &total in &capacities {
        let room = Ulid::new();
        let plan = Ulid::new();
        client
            .simple_query(&format!(
                "INSERT INTO rooms (id, name, max_occupancy, max_adults, max_children) VALUES ('{room}', 'Room {total}', 4, 3, 2)"
            ))
            .await
            .unwrap();
        client
            .simple_query(&format!(
                "INSERT INTO rate_plans (id, name, refundable) VALUES ('{plan}', 'Flexible', true)"
            ))
            .await
            .unwrap();

        let rows: Vec<String> = (0..CALENDAR_DAYS)
            .map(|i| format!("('{room}', '{plan}', '{}', {total}, 99.00, 'USD')", day(i)))
            .collect();
        client
            .simple_query(&format!(
                "INSERT INTO room_inventory (room_id, rate_plan_id, date, total_rooms, price, currency) VALUES {}",
                rows.join(", ")
            ))
            .await
            .unwrap();

        units.push(Unit { room, plan, total });
    }

    println!("  created {} units × {CALENDAR_DAYS} days", units.len());
    units
}

/// Hammer one unit with `workers` concurrent single-room bookings over
/// random-ish overlapping windows; returns (successes, rejections,
/// latencies).
async fn booking_storm(
    host: &str,
    port: u16,
    dbname: &str,
    unit: &Unit,
    workers: usize,
) -> (usize, usize, Vec<Duration>) {
    let mut handles = Vec::new();
    for w in 0..workers {
        let host = host.to_string();
        let dbname = dbname.to_string();
        let room = unit.room;
        let plan = unit.plan;
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &dbname).await;
            // overlapping 3-night windows staggered across the calendar
            let start = (w as u64 * 3) % (CALENDAR_DAYS - 3);
            let sql = format!(
                "INSERT INTO bookings (id, room_id, rate_plan_id, check_in, check_out, rooms, adults, children, guest_email, guest_name) VALUES ('{}', '{room}', '{plan}', '{}', '{}', 1, 2, 0, 'w{w}@example.com', 'Worker {w}')",
                Ulid::new(),
                day(start),
                day(start + 3)
            );
            let t = Instant::now();
            let result = client.simple_query(&sql).await;
            (result.is_ok(), t.elapsed())
        }));
    }

    let mut ok = 0;
    let mut rejected = 0;
    let mut latencies = Vec::new();
    for h in handles {
        let (success, latency) = h.await.unwrap();
        if success {
            ok += 1;
        } else {
            rejected += 1;
        }
        latencies.push(latency);
    }
    (ok, rejected, latencies)
}

#[tokio::main]
async fn main() {
    let host = std::env::var("ROOMLEDGER_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("ROOMLEDGER_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5433);
    let dbname = format!("bench_{}", Ulid::new());

    println!("roomledger stress bench → {host}:{port} ({dbname})");

    let client = connect(&host, port, &dbname).await;
    println!("setup:");
    let units = setup(&client).await;

    println!("booking storm (64 workers per unit):");
    let mut all_latencies = Vec::new();
    for unit in &units {
        let (ok, rejected, mut latencies) =
            booking_storm(&host, port, &dbname, unit, 64).await;
        println!("  unit cap={:>2}: {ok} confirmed, {rejected} rejected", unit.total);
        all_latencies.append(&mut latencies);

        // Sanity: the ledger must never go negative — every day of the
        // window still reports a non-negative availability.
        let rows = client
            .simple_query(&format!(
                "SELECT * FROM room_inventory WHERE room_id = '{}' AND rate_plan_id = '{}' AND date >= '{}' AND date < '{}'",
                unit.room,
                unit.plan,
                day(0),
                day(CALENDAR_DAYS)
            ))
            .await
            .unwrap();
        let negative = rows.iter().any(|m| {
            matches!(m, tokio_postgres::SimpleQueryMessage::Row(r)
                if r.get("available_rooms").unwrap_or("0").starts_with('-'))
        });
        assert!(!negative, "oversell detected on unit {}", unit.room);
    }

    print_latency("create_booking", &mut all_latencies);
    println!("done");
}
