use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tokio::net::TcpListener;
use tokio_postgres::{Config, NoTls, SimpleQueryMessage, SimpleQueryRow};
use ulid::Ulid;

use roomledger::model::PricingConfig;
use roomledger::tenant::TenantManager;
use roomledger::wire;

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server() -> (SocketAddr, Arc<TenantManager>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("roomledger_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let tm = Arc::new(TenantManager::new(dir, 1000, PricingConfig::default()));

    let tm2 = tm.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let tm = tm2.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, tm, "roomledger".to_string(), None).await;
            });
        }
    });

    (addr, tm)
}

async fn connect(addr: SocketAddr, dbname: &str) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname(dbname)
        .user("roomledger")
        .password("roomledger");

    let (client, connection) = config.connect(NoTls).await.unwrap();
    tokio::spawn(async move {
        let _ = connection.await;
    });
    client
}

fn data_rows(messages: Vec<SimpleQueryMessage>) -> Vec<SimpleQueryRow> {
    messages
        .into_iter()
        .filter_map(|m| match m {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect()
}

fn day(offset: u64) -> NaiveDate {
    chrono::Utc::now().date_naive() + Days::new(30 + offset)
}

/// Register a room and rate plan, then seed `days` nights of inventory.
async fn seed(
    client: &tokio_postgres::Client,
    total: u32,
    price: &str,
    days: u64,
) -> (Ulid, Ulid) {
    let room = Ulid::new();
    let plan = Ulid::new();
    client
        .simple_query(&format!(
            "INSERT INTO rooms (id, name, max_occupancy, max_adults, max_children) VALUES ('{room}', 'Deluxe King', 4, 3, 2)"
        ))
        .await
        .unwrap();
    client
        .simple_query(&format!(
            "INSERT INTO rate_plans (id, name, refundable) VALUES ('{plan}', 'Flexible', true)"
        ))
        .await
        .unwrap();

    let rows: Vec<String> = (0..days)
        .map(|i| format!("('{room}', '{plan}', '{}', {total}, {price}, 'USD')", day(i)))
        .collect();
    let sql = format!(
        "INSERT INTO room_inventory (room_id, rate_plan_id, date, total_rooms, price, currency) VALUES {}",
        rows.join(", ")
    );
    let results = data_rows(client.simple_query(&sql).await.unwrap());
    assert_eq!(results.len(), days as usize);
    assert!(results.iter().all(|r| r.get("status") == Some("ok")));

    (room, plan)
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn search_book_and_cancel_round_trip() {
    let (addr, _tm) = start_test_server().await;
    let client = connect(addr, "grand_hotel").await;
    let (room, plan) = seed(&client, 3, "120.00", 3).await;

    // Search the full window
    let hits = data_rows(
        client
            .simple_query(&format!(
                "SELECT * FROM availability WHERE check_in = '{}' AND check_out = '{}' AND adults = 2 AND rooms = 2 ORDER BY price",
                day(0),
                day(3)
            ))
            .await
            .unwrap(),
    );
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].get("room_name"), Some("Deluxe King"));
    assert_eq!(hits[0].get("rooms_available"), Some("3"));
    assert_eq!(hits[0].get("price_avg"), Some("120.00"));
    assert_eq!(hits[0].get("base_total"), Some("360.00"));

    // Book 2 rooms for the whole window
    let booking_id = Ulid::new();
    let rows = data_rows(
        client
            .simple_query(&format!(
                "INSERT INTO bookings (id, room_id, rate_plan_id, check_in, check_out, rooms, adults, children, guest_email, guest_name) VALUES ('{booking_id}', '{room}', '{plan}', '{}', '{}', 2, 2, 0, 'ada@example.com', 'Ada Lovelace')",
                day(0),
                day(3)
            ))
            .await
            .unwrap(),
    );
    assert_eq!(rows.len(), 1);
    let booked = &rows[0];
    assert_eq!(booked.get("status"), Some("confirmed"));
    assert_eq!(booked.get("nights"), Some("3"));
    // base 2 × 3 × 120 = 720, tax 10% = 72, fees 5% = 36
    assert_eq!(booked.get("base_price"), Some("720.00"));
    assert_eq!(booked.get("taxes"), Some("72.00"));
    assert_eq!(booked.get("fees"), Some("36.00"));
    assert_eq!(booked.get("total_amount"), Some("828.00"));
    let reference = booked.get("reference").unwrap().to_string();
    assert!(reference.starts_with("BK-"));

    // The ledger shows the decrement
    let ledger = data_rows(
        client
            .simple_query(&format!(
                "SELECT * FROM room_inventory WHERE room_id = '{room}' AND rate_plan_id = '{plan}' AND date >= '{}' AND date < '{}'",
                day(0),
                day(3)
            ))
            .await
            .unwrap(),
    );
    assert_eq!(ledger.len(), 3);
    assert!(ledger.iter().all(|r| r.get("available_rooms") == Some("1")));

    // Look the booking up by reference
    let by_ref = data_rows(
        client
            .simple_query(&format!("SELECT * FROM bookings WHERE reference = '{reference}'"))
            .await
            .unwrap(),
    );
    assert_eq!(by_ref.len(), 1);
    assert_eq!(by_ref[0].get("id"), Some(booking_id.to_string().as_str()));

    // Cancel and verify the capacity returns
    let cancelled = data_rows(
        client
            .simple_query(&format!(
                "UPDATE bookings SET status = 'cancelled', cancellation_reason = 'plans changed' WHERE id = '{booking_id}'"
            ))
            .await
            .unwrap(),
    );
    assert_eq!(cancelled[0].get("status"), Some("cancelled"));
    assert_eq!(cancelled[0].get("cancellation_reason"), Some("plans changed"));

    let ledger = data_rows(
        client
            .simple_query(&format!(
                "SELECT * FROM room_inventory WHERE room_id = '{room}' AND rate_plan_id = '{plan}' AND date >= '{}' AND date < '{}'",
                day(0),
                day(3)
            ))
            .await
            .unwrap(),
    );
    assert!(ledger.iter().all(|r| r.get("available_rooms") == Some("3")));
}

#[tokio::test]
async fn concurrent_bookings_over_the_wire_never_oversell() {
    let (addr, _tm) = start_test_server().await;
    let client1 = connect(addr, "race_hotel").await;
    let client2 = connect(addr, "race_hotel").await;
    let (room, plan) = seed(&client1, 3, "100.00", 2).await;

    let sql = |id: Ulid| {
        format!(
            "INSERT INTO bookings (id, room_id, rate_plan_id, check_in, check_out, rooms, adults, children, guest_email, guest_name) VALUES ('{id}', '{room}', '{plan}', '{}', '{}', 2, 2, 0, 'race@example.com', 'Racer')",
            day(0),
            day(2)
        )
    };

    let sql1 = sql(Ulid::new());
    let sql2 = sql(Ulid::new());
    let (a, b) = tokio::join!(
        client1.simple_query(&sql1),
        client2.simple_query(&sql2)
    );

    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one of two overlapping bookings may win");

    let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    let code = loser.code().expect("expected a SQLSTATE").code();
    assert!(
        code == "P0001" || code == "40001",
        "loser must fail as availability or conflict, got {code}"
    );

    // 3 − 2 = 1 room left on both nights
    let ledger = data_rows(
        client1
            .simple_query(&format!(
                "SELECT * FROM room_inventory WHERE room_id = '{room}' AND rate_plan_id = '{plan}' AND date >= '{}' AND date < '{}'",
                day(0),
                day(2)
            ))
            .await
            .unwrap(),
    );
    assert!(ledger.iter().all(|r| r.get("available_rooms") == Some("1")));
}

#[tokio::test]
async fn bulk_update_is_best_effort_over_the_wire() {
    let (addr, _tm) = start_test_server().await;
    let client = connect(addr, "channel_hotel").await;
    let (room, plan) = seed(&client, 2, "80.00", 1).await;

    // Three rows: the middle one has a malformed date
    let sql = format!(
        "INSERT INTO room_inventory (room_id, rate_plan_id, date, total_rooms, price, currency) VALUES \
         ('{room}', '{plan}', '{}', 4, 90.00, 'USD'), \
         ('{room}', '{plan}', 'junk', 4, 90.00, 'USD'), \
         ('{room}', '{plan}', '{}', 4, 90.00, 'USD')",
        day(1),
        day(2)
    );
    let results = data_rows(client.simple_query(&sql).await.unwrap());
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].get("status"), Some("ok"));
    assert_eq!(results[1].get("status"), Some("error"));
    assert!(results[1].get("detail").unwrap().contains("bad date"));
    assert_eq!(results[2].get("status"), Some("ok"));

    // The two good rows are committed
    let ledger = data_rows(
        client
            .simple_query(&format!(
                "SELECT * FROM room_inventory WHERE room_id = '{room}' AND rate_plan_id = '{plan}' AND date >= '{}' AND date < '{}'",
                day(1),
                day(3)
            ))
            .await
            .unwrap(),
    );
    assert_eq!(ledger.len(), 2);
    assert!(ledger.iter().all(|r| r.get("total_rooms") == Some("4")));
}

#[tokio::test]
async fn error_classification_sqlstates() {
    let (addr, _tm) = start_test_server().await;
    let client = connect(addr, "error_hotel").await;
    let (room, plan) = seed(&client, 1, "50.00", 2).await;

    // Validation: inverted date range → 22023
    let err = client
        .simple_query(&format!(
            "INSERT INTO bookings (id, room_id, rate_plan_id, check_in, check_out, rooms, adults, children, guest_email, guest_name) VALUES ('{}', '{room}', '{plan}', '{}', '{}', 1, 1, 0, 'a@b.c', 'A')",
            Ulid::new(),
            day(2),
            day(0)
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code().unwrap().code(), "22023");

    // Availability: more rooms than exist → P0001
    let err = client
        .simple_query(&format!(
            "INSERT INTO bookings (id, room_id, rate_plan_id, check_in, check_out, rooms, adults, children, guest_email, guest_name) VALUES ('{}', '{room}', '{plan}', '{}', '{}', 2, 1, 0, 'a@b.c', 'A')",
            Ulid::new(),
            day(0),
            day(2)
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code().unwrap().code(), "P0001");

    // NotFound: cancelling an unknown booking → P0002
    let err = client
        .simple_query(&format!(
            "UPDATE bookings SET status = 'cancelled' WHERE id = '{}'",
            Ulid::new()
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code().unwrap().code(), "P0002");

    // DomainState: double cancel → 55000
    let booking_id = Ulid::new();
    client
        .simple_query(&format!(
            "INSERT INTO bookings (id, room_id, rate_plan_id, check_in, check_out, rooms, adults, children, guest_email, guest_name) VALUES ('{booking_id}', '{room}', '{plan}', '{}', '{}', 1, 1, 0, 'a@b.c', 'A')",
            day(0),
            day(2)
        ))
        .await
        .unwrap();
    client
        .simple_query(&format!(
            "UPDATE bookings SET status = 'cancelled' WHERE id = '{booking_id}'"
        ))
        .await
        .unwrap();
    let err = client
        .simple_query(&format!(
            "UPDATE bookings SET status = 'cancelled' WHERE id = '{booking_id}'"
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code().unwrap().code(), "55000");
}

#[tokio::test]
async fn tenants_are_isolated_by_database_name() {
    let (addr, _tm) = start_test_server().await;
    let client_a = connect(addr, "hotel_a").await;
    let client_b = connect(addr, "hotel_b").await;

    let (room, plan) = seed(&client_a, 2, "70.00", 1).await;

    // Tenant B sees none of tenant A's rooms or inventory
    let rooms_b = data_rows(client_b.simple_query("SELECT * FROM rooms").await.unwrap());
    assert!(rooms_b.is_empty());

    let err = client_b
        .simple_query(&format!(
            "INSERT INTO bookings (id, room_id, rate_plan_id, check_in, check_out, rooms, adults, children, guest_email, guest_name) VALUES ('{}', '{room}', '{plan}', '{}', '{}', 1, 1, 0, 'a@b.c', 'A')",
            Ulid::new(),
            day(0),
            day(1)
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code().unwrap().code(), "P0002"); // room not found over there
}

#[tokio::test]
async fn booking_survives_reconnect() {
    let (addr, _tm) = start_test_server().await;
    let client = connect(addr, "persist_hotel").await;
    let (room, plan) = seed(&client, 2, "60.00", 1).await;

    let booking_id = Ulid::new();
    client
        .simple_query(&format!(
            "INSERT INTO bookings (id, room_id, rate_plan_id, check_in, check_out, rooms, adults, children, guest_email, guest_name) VALUES ('{booking_id}', '{room}', '{plan}', '{}', '{}', 1, 1, 0, 'a@b.c', 'A')",
            day(0),
            day(1)
        ))
        .await
        .unwrap();
    drop(client);

    let client = connect(addr, "persist_hotel").await;
    let rows = data_rows(
        client
            .simple_query(&format!("SELECT * FROM bookings WHERE id = '{booking_id}'"))
            .await
            .unwrap(),
    );
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("status"), Some("confirmed"));
}
