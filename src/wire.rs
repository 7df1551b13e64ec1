use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use ulid::Ulid;

use crate::auth::RoomLedgerAuthSource;
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::sql::{self, BookingFilter, Command};
use crate::tenant::TenantManager;

pub struct RoomLedgerHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<RoomLedgerQueryParser>,
}

impl RoomLedgerHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(RoomLedgerQueryParser),
        }
    }

    fn resolve_tenant<C: ClientInfo>(&self, client: &C) -> PgWireResult<(String, Arc<Engine>)> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        let engine = self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })?;
        Ok((db, engine))
    }

    async fn execute_command(
        &self,
        tenant: &str,
        engine: &Engine,
        cmd: Command,
    ) -> PgWireResult<Vec<Response>> {
        let label = crate::observability::command_label(&cmd);
        let start = std::time::Instant::now();
        let result = self.dispatch(tenant, engine, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(
            crate::observability::QUERIES_TOTAL,
            "command" => label,
            "status" => status
        )
        .increment(1);
        metrics::histogram!(crate::observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn dispatch(
        &self,
        tenant: &str,
        engine: &Engine,
        cmd: Command,
    ) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::InsertRoom {
                id,
                name,
                max_occupancy,
                max_adults,
                max_children,
                rating,
                property_id,
            } => {
                engine
                    .register_room(RoomAttrs {
                        id,
                        property_id,
                        name,
                        max_occupancy,
                        max_adults,
                        max_children,
                        rating,
                    })
                    .await
                    .map_err(|e| engine_err(tenant, "insert_room", e))?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::InsertRatePlan { id, name, refundable } => {
                engine
                    .register_rate_plan(RatePlanAttrs { id, name, refundable })
                    .await
                    .map_err(|e| engine_err(tenant, "insert_rate_plan", e))?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpsertInventory { items } => {
                // Split parse failures from parseable items; the engine sees
                // only the latter, and the response reports both.
                let mut parsed = Vec::new();
                let mut origin = Vec::new();
                let mut failed: Vec<(usize, String)> = Vec::new();
                for (row, item) in items.into_iter().enumerate() {
                    match item {
                        Ok(item) => {
                            origin.push(row);
                            parsed.push(item);
                        }
                        Err(e) => failed.push((row, e)),
                    }
                }
                let results = engine
                    .bulk_update_inventory(parsed)
                    .await
                    .map_err(|e| engine_err(tenant, "upsert_inventory", e))?;

                let mut rows: Vec<(usize, Option<BulkResult>, Option<String>)> = Vec::new();
                for r in results {
                    rows.push((origin[r.index], Some(r), None));
                }
                for (row, e) in failed {
                    rows.push((row, None, Some(e)));
                }
                rows.sort_by_key(|(row, _, _)| *row);
                Ok(vec![bulk_result_response(rows)])
            }
            Command::InsertBooking { request } => {
                let booking = engine
                    .create_booking(request)
                    .await
                    .map_err(|e| engine_err(tenant, "insert_booking", e))?;
                Ok(vec![bookings_response(vec![booking])])
            }
            Command::CancelBooking { id, reason } => {
                let booking = engine
                    .cancel_booking(id, reason)
                    .await
                    .map_err(|e| engine_err(tenant, "cancel_booking", e))?;
                Ok(vec![bookings_response(vec![booking])])
            }
            Command::UpdateBookingRequests { id, special_requests } => {
                let booking = engine
                    .update_booking(id, special_requests)
                    .await
                    .map_err(|e| engine_err(tenant, "update_booking", e))?;
                Ok(vec![bookings_response(vec![booking])])
            }
            Command::SelectAvailability { criteria } => {
                let results = engine
                    .search(&criteria)
                    .await
                    .map_err(|e| engine_err(tenant, "select_availability", e))?;
                Ok(vec![availability_response(results)])
            }
            Command::SelectInventory { room_id, rate_plan_id, from, to } => {
                let rows = engine
                    .inventory_calendar(room_id, rate_plan_id, from, to)
                    .await
                    .map_err(|e| engine_err(tenant, "select_inventory", e))?;
                Ok(vec![inventory_response(rows)])
            }
            Command::SelectBookings { filter } => {
                let bookings = match filter {
                    BookingFilter::ById(id) => engine.get_booking(&id).await.into_iter().collect(),
                    BookingFilter::ByReference(r) => {
                        engine.find_booking_by_reference(&r).await.into_iter().collect()
                    }
                    BookingFilter::ByRoom(room) => engine.list_bookings(Some(room)).await,
                    BookingFilter::All => engine.list_bookings(None).await,
                };
                Ok(vec![bookings_response(bookings)])
            }
            Command::SelectRooms => Ok(vec![rooms_response(engine.list_rooms())]),
            Command::SelectRatePlans => Ok(vec![rate_plans_response(engine.list_rate_plans())]),
        }
    }
}

// ── Result-set schemas & encoders ────────────────────────────────

fn text_field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        text_field("room_id", Type::VARCHAR),
        text_field("rate_plan_id", Type::VARCHAR),
        text_field("room_name", Type::VARCHAR),
        text_field("rate_plan_name", Type::VARCHAR),
        text_field("rating", Type::INT4),
        text_field("nights", Type::INT4),
        text_field("rooms_available", Type::INT4),
        text_field("price_min", Type::NUMERIC),
        text_field("price_avg", Type::NUMERIC),
        text_field("price_max", Type::NUMERIC),
        text_field("base_total", Type::NUMERIC),
        text_field("currency", Type::VARCHAR),
    ]
}

fn availability_response(results: Vec<AvailabilityResult>) -> Response {
    let schema = Arc::new(availability_schema());
    let rows: Vec<PgWireResult<_>> = results
        .into_iter()
        .map(|r| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&r.room_id.to_string())?;
            encoder.encode_field(&r.rate_plan_id.to_string())?;
            encoder.encode_field(&r.room_name)?;
            encoder.encode_field(&r.rate_plan_name)?;
            encoder.encode_field(&r.rating.map(i32::from))?;
            encoder.encode_field(&(r.nights as i32))?;
            encoder.encode_field(&(r.rooms_available as i32))?;
            encoder.encode_field(&r.price_min.to_string())?;
            encoder.encode_field(&r.price_avg.to_string())?;
            encoder.encode_field(&r.price_max.to_string())?;
            encoder.encode_field(&r.base_total.to_string())?;
            encoder.encode_field(&r.currency)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn inventory_schema() -> Vec<FieldInfo> {
    vec![
        text_field("room_id", Type::VARCHAR),
        text_field("rate_plan_id", Type::VARCHAR),
        text_field("date", Type::DATE),
        text_field("available_rooms", Type::INT8),
        text_field("total_rooms", Type::INT8),
        text_field("price", Type::NUMERIC),
        text_field("currency", Type::VARCHAR),
        text_field("min_stay", Type::INT8),
        text_field("closed_to_arrival", Type::BOOL),
        text_field("closed_to_departure", Type::BOOL),
        text_field("stop_sell", Type::BOOL),
        text_field("restrictions", Type::VARCHAR),
        text_field("updated_at", Type::INT8),
    ]
}

fn inventory_response(rows: Vec<InventoryRow>) -> Response {
    let schema = Arc::new(inventory_schema());
    let encoded: Vec<PgWireResult<_>> = rows
        .into_iter()
        .map(|r| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&r.room_id.to_string())?;
            encoder.encode_field(&r.rate_plan_id.to_string())?;
            encoder.encode_field(&r.date.to_string())?;
            encoder.encode_field(&(r.day.available as i64))?;
            encoder.encode_field(&(r.day.total as i64))?;
            encoder.encode_field(&r.day.price.to_string())?;
            encoder.encode_field(&r.day.currency)?;
            encoder.encode_field(&(r.day.min_stay as i64))?;
            encoder.encode_field(&pg_bool(r.day.closed_to_arrival))?;
            encoder.encode_field(&pg_bool(r.day.closed_to_departure))?;
            encoder.encode_field(&pg_bool(r.day.stop_sell))?;
            let restrictions = serde_json::to_string(&r.day.restrictions)
                .unwrap_or_else(|_| "{}".to_string());
            encoder.encode_field(&restrictions)?;
            encoder.encode_field(&r.day.updated_at)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(encoded)))
}

fn booking_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("reference", Type::VARCHAR),
        text_field("status", Type::VARCHAR),
        text_field("room_id", Type::VARCHAR),
        text_field("rate_plan_id", Type::VARCHAR),
        text_field("guest_id", Type::VARCHAR),
        text_field("channel", Type::VARCHAR),
        text_field("check_in", Type::DATE),
        text_field("check_out", Type::DATE),
        text_field("nights", Type::INT4),
        text_field("rooms", Type::INT4),
        text_field("adults", Type::INT4),
        text_field("children", Type::INT4),
        text_field("base_price", Type::NUMERIC),
        text_field("taxes", Type::NUMERIC),
        text_field("fees", Type::NUMERIC),
        text_field("total_amount", Type::NUMERIC),
        text_field("currency", Type::VARCHAR),
        text_field("special_requests", Type::VARCHAR),
        text_field("created_at", Type::INT8),
        text_field("cancelled_at", Type::INT8),
        text_field("cancellation_reason", Type::VARCHAR),
    ]
}

fn bookings_response(bookings: Vec<Booking>) -> Response {
    let schema = Arc::new(booking_schema());
    let rows: Vec<PgWireResult<_>> = bookings
        .into_iter()
        .map(|b| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&b.id.to_string())?;
            encoder.encode_field(&b.reference)?;
            encoder.encode_field(&b.status.as_str())?;
            encoder.encode_field(&b.room_id.to_string())?;
            encoder.encode_field(&b.rate_plan_id.to_string())?;
            encoder.encode_field(&b.guest_id.to_string())?;
            encoder.encode_field(&b.channel)?;
            encoder.encode_field(&b.stay.check_in.to_string())?;
            encoder.encode_field(&b.stay.check_out.to_string())?;
            encoder.encode_field(&(b.nights() as i32))?;
            encoder.encode_field(&(b.rooms as i32))?;
            encoder.encode_field(&(b.adults as i32))?;
            encoder.encode_field(&(b.children as i32))?;
            encoder.encode_field(&b.base_price.to_string())?;
            encoder.encode_field(&b.taxes.to_string())?;
            encoder.encode_field(&b.fees.to_string())?;
            encoder.encode_field(&b.total_amount.to_string())?;
            encoder.encode_field(&b.currency)?;
            encoder.encode_field(&b.special_requests)?;
            encoder.encode_field(&b.created_at)?;
            encoder.encode_field(&b.cancelled_at)?;
            encoder.encode_field(&b.cancellation_reason)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn bulk_result_schema() -> Vec<FieldInfo> {
    vec![
        text_field("item", Type::INT4),
        text_field("room_id", Type::VARCHAR),
        text_field("rate_plan_id", Type::VARCHAR),
        text_field("date", Type::DATE),
        text_field("status", Type::VARCHAR),
        text_field("detail", Type::VARCHAR),
    ]
}

fn bulk_result_response(
    rows: Vec<(usize, Option<BulkResult>, Option<String>)>,
) -> Response {
    let schema = Arc::new(bulk_result_schema());
    let encoded: Vec<PgWireResult<_>> = rows
        .into_iter()
        .map(|(row, result, parse_error)| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&(row as i32))?;
            match (result, parse_error) {
                (Some(r), _) => {
                    encoder.encode_field(&r.room_id.to_string())?;
                    encoder.encode_field(&r.rate_plan_id.to_string())?;
                    encoder.encode_field(&r.date.to_string())?;
                    encoder.encode_field(&if r.is_ok() { "ok" } else { "error" })?;
                    encoder.encode_field(&r.error)?;
                }
                (None, parse_error) => {
                    encoder.encode_field(&None::<String>)?;
                    encoder.encode_field(&None::<String>)?;
                    encoder.encode_field(&None::<String>)?;
                    encoder.encode_field(&"error")?;
                    encoder.encode_field(&parse_error)?;
                }
            }
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(encoded)))
}

fn rooms_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("name", Type::VARCHAR),
        text_field("max_occupancy", Type::INT4),
        text_field("max_adults", Type::INT4),
        text_field("max_children", Type::INT4),
        text_field("rating", Type::INT4),
        text_field("property_id", Type::VARCHAR),
    ]
}

fn rooms_response(rooms: Vec<RoomAttrs>) -> Response {
    let schema = Arc::new(rooms_schema());
    let rows: Vec<PgWireResult<_>> = rooms
        .into_iter()
        .map(|r| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&r.id.to_string())?;
            encoder.encode_field(&r.name)?;
            encoder.encode_field(&(r.max_occupancy as i32))?;
            encoder.encode_field(&(r.max_adults as i32))?;
            encoder.encode_field(&(r.max_children as i32))?;
            encoder.encode_field(&r.rating.map(i32::from))?;
            encoder.encode_field(&r.property_id.map(|p| p.to_string()))?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn rate_plans_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("name", Type::VARCHAR),
        text_field("refundable", Type::BOOL),
    ]
}

fn rate_plans_response(plans: Vec<RatePlanAttrs>) -> Response {
    let schema = Arc::new(rate_plans_schema());
    let rows: Vec<PgWireResult<_>> = plans
        .into_iter()
        .map(|p| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&p.id.to_string())?;
            encoder.encode_field(&p.name)?;
            encoder.encode_field(&pg_bool(p.refundable))?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn pg_bool(b: bool) -> &'static str {
    if b { "t" } else { "f" }
}

// ── Simple query protocol ────────────────────────────────────────

#[async_trait]
impl SimpleQueryHandler for RoomLedgerHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let (tenant, engine) = self.resolve_tenant(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute_command(&tenant, &engine, cmd).await
    }
}

// ── Extended query protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct RoomLedgerQueryParser;

#[async_trait]
impl QueryParser for RoomLedgerQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(statement_schema(stmt))
    }
}

/// Best-effort schema prediction for Describe. The statement is only a
/// string at this point; execution re-derives the real schema.
fn statement_schema(stmt: &str) -> Vec<FieldInfo> {
    let upper = stmt.to_uppercase();
    if upper.contains("AVAILABILITY") {
        availability_schema()
    } else if upper.contains("ROOM_INVENTORY") && upper.starts_with("SELECT") {
        inventory_schema()
    } else if upper.contains("ROOM_INVENTORY") {
        bulk_result_schema()
    } else if upper.contains("BOOKINGS") {
        booking_schema()
    } else if upper.contains("RATE_PLANS") && upper.starts_with("SELECT") {
        rate_plans_schema()
    } else if upper.contains("ROOMS") && upper.starts_with("SELECT") {
        rooms_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl ExtendedQueryHandler for RoomLedgerHandler {
    type Statement = String;
    type QueryParser = RoomLedgerQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let (tenant, engine) = self.resolve_tenant(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.execute_command(&tenant, &engine, cmd).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            statement_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(statement_schema(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
                && n > max {
                    max = n;
                }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text
/// format).
fn substitute_params(portal: &Portal<String>) -> String {
    let sql = portal.statement.statement.to_string();
    let params = &portal.parameters;
    let mut result = sql;

    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory & connection entry point ─────────────────────────────

pub struct RoomLedgerFactory {
    handler: Arc<RoomLedgerHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<RoomLedgerAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl RoomLedgerFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = RoomLedgerAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(RoomLedgerHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for RoomLedgerFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = RoomLedgerFactory::new(tenant_manager, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Error classification ─────────────────────────────────────────

/// Map an engine error to a SQLSTATE the caller can branch on. Unexpected
/// infrastructure failures get a correlation id and a full log line; the
/// caller sees only the generic message.
fn engine_err(tenant: &str, stage: &'static str, e: EngineError) -> PgWireError {
    let (code, message) = match &e {
        EngineError::Validation(_) | EngineError::LimitExceeded(_) => {
            ("22023".to_string(), e.to_string())
        }
        EngineError::Availability(_) => ("P0001".to_string(), e.to_string()),
        EngineError::Conflict(_) => ("40001".to_string(), e.to_string()),
        EngineError::NotFound { .. } => ("P0002".to_string(), e.to_string()),
        EngineError::DomainState(_) => ("55000".to_string(), e.to_string()),
        EngineError::Wal(detail) => {
            let correlation = Ulid::new();
            tracing::error!(%tenant, stage, %correlation, detail, "internal error");
            (
                "XX000".to_string(),
                format!("internal error; correlation id {correlation}"),
            )
        }
    };
    PgWireError::UserError(Box::new(ErrorInfo::new("ERROR".into(), code, message)))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
