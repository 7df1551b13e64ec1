use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, OrderByKind, SetExpr, Statement, TableFactor,
    TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::{BookingRequest, InventoryUpsert, SearchCriteria, SortKey};

/// Parsed command from SQL input. The surface is a closed set of statements
/// over five tables; anything else is rejected up front.
#[derive(Debug)]
pub enum Command {
    InsertRoom {
        id: Ulid,
        name: String,
        max_occupancy: u32,
        max_adults: u32,
        max_children: u32,
        rating: Option<u8>,
        property_id: Option<Ulid>,
    },
    InsertRatePlan {
        id: Ulid,
        name: String,
        refundable: bool,
    },
    /// Best-effort batch: a row that fails to parse is carried as an error
    /// item so its siblings still commit.
    UpsertInventory {
        items: Vec<Result<InventoryUpsert, String>>,
    },
    InsertBooking {
        request: BookingRequest,
    },
    CancelBooking {
        id: Ulid,
        reason: Option<String>,
    },
    UpdateBookingRequests {
        id: Ulid,
        special_requests: Option<String>,
    },
    SelectAvailability {
        criteria: SearchCriteria,
    },
    SelectInventory {
        room_id: Option<Ulid>,
        rate_plan_id: Option<Ulid>,
        from: NaiveDate,
        to: NaiveDate,
    },
    SelectBookings {
        filter: BookingFilter,
    },
    SelectRooms,
    SelectRatePlans,
}

#[derive(Debug, PartialEq, Eq)]
pub enum BookingFilter {
    ById(Ulid),
    ByReference(String),
    ByRoom(Ulid),
    All,
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update { table, assignments, selection, .. } => {
            parse_update(table, assignments, selection)
        }
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── INSERT ────────────────────────────────────────────────────

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    match table.as_str() {
        "rooms" => {
            let values = single_insert_row(insert)?;
            if values.len() < 5 {
                return Err(SqlError::WrongArity("rooms", 5, values.len()));
            }
            Ok(Command::InsertRoom {
                id: parse_ulid(&values[0])?,
                name: parse_string(&values[1])?,
                max_occupancy: parse_u32(&values[2])?,
                max_adults: parse_u32(&values[3])?,
                max_children: parse_u32(&values[4])?,
                rating: if values.len() >= 6 { parse_u8_or_null(&values[5])? } else { None },
                property_id: if values.len() >= 7 { parse_ulid_or_null(&values[6])? } else { None },
            })
        }
        "rate_plans" => {
            let values = single_insert_row(insert)?;
            if values.len() < 2 {
                return Err(SqlError::WrongArity("rate_plans", 2, values.len()));
            }
            Ok(Command::InsertRatePlan {
                id: parse_ulid(&values[0])?,
                name: parse_string(&values[1])?,
                refundable: if values.len() >= 3 { parse_bool(&values[2])? } else { true },
            })
        }
        "room_inventory" => parse_inventory_insert(insert),
        "bookings" => {
            let values = single_insert_row(insert)?;
            if values.len() < 10 {
                return Err(SqlError::WrongArity("bookings", 10, values.len()));
            }
            Ok(Command::InsertBooking {
                request: BookingRequest {
                    id: parse_ulid(&values[0])?,
                    room_id: parse_ulid(&values[1])?,
                    rate_plan_id: parse_ulid(&values[2])?,
                    check_in: parse_date(&values[3])?,
                    check_out: parse_date(&values[4])?,
                    rooms: parse_u32(&values[5])?,
                    adults: parse_u32(&values[6])?,
                    children: parse_u32(&values[7])?,
                    guest_email: parse_string(&values[8])?,
                    guest_name: parse_string(&values[9])?,
                    guest_phone: if values.len() >= 11 { parse_string_or_null(&values[10])? } else { None },
                    channel: if values.len() >= 12 { parse_string_or_null(&values[11])? } else { None },
                    special_requests: if values.len() >= 13 { parse_string_or_null(&values[12])? } else { None },
                },
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// `INSERT INTO room_inventory (...) VALUES (...), (...)` — the bulk upsert.
/// A column list is mandatory because partial updates hang on field names.
fn parse_inventory_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    if insert.columns.is_empty() {
        return Err(SqlError::Parse(
            "room_inventory INSERT requires an explicit column list".into(),
        ));
    }
    let columns: Vec<String> = insert.columns.iter().map(|c| c.value.to_lowercase()).collect();
    for required in ["room_id", "rate_plan_id", "date"] {
        if !columns.iter().any(|c| c == required) {
            return Err(SqlError::MissingFilter(match required {
                "room_id" => "room_id",
                "rate_plan_id" => "rate_plan_id",
                _ => "date",
            }));
        }
    }

    let rows = all_insert_rows(insert)?;
    let items = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            parse_inventory_row(&columns, row).map_err(|e| format!("row {i}: {e}"))
        })
        .collect();
    Ok(Command::UpsertInventory { items })
}

fn parse_inventory_row(columns: &[String], row: &[Expr]) -> Result<InventoryUpsert, SqlError> {
    if row.len() != columns.len() {
        return Err(SqlError::WrongArity("room_inventory", columns.len(), row.len()));
    }

    let mut room_id = None;
    let mut rate_plan_id = None;
    let mut date = None;
    let mut item = InventoryUpsert::new(Ulid::nil(), Ulid::nil(), NaiveDate::MIN);

    for (col, expr) in columns.iter().zip(row) {
        match col.as_str() {
            "room_id" => room_id = Some(parse_ulid(expr)?),
            "rate_plan_id" => rate_plan_id = Some(parse_ulid(expr)?),
            "date" => date = Some(parse_date(expr)?),
            "total_rooms" => item.total = parse_u32_or_null(expr)?,
            "available_rooms" => item.available = parse_u32_or_null(expr)?,
            "price" => item.price = parse_decimal_or_null(expr)?,
            "currency" => item.currency = parse_string_or_null(expr)?,
            "min_stay" => item.min_stay = parse_u32_or_null(expr)?,
            "closed_to_arrival" => item.closed_to_arrival = parse_bool_or_null(expr)?,
            "closed_to_departure" => item.closed_to_departure = parse_bool_or_null(expr)?,
            "stop_sell" => item.stop_sell = parse_bool_or_null(expr)?,
            "restrictions" => item.restrictions = parse_restrictions(expr)?,
            other => return Err(SqlError::Parse(format!("unknown column: {other}"))),
        }
    }

    item.room_id = room_id.ok_or(SqlError::MissingFilter("room_id"))?;
    item.rate_plan_id = rate_plan_id.ok_or(SqlError::MissingFilter("rate_plan_id"))?;
    item.date = date.ok_or(SqlError::MissingFilter("date"))?;
    Ok(item)
}

// ── UPDATE ────────────────────────────────────────────────────

/// `UPDATE bookings SET status = 'cancelled' [, cancellation_reason = '…']
/// WHERE id = '…'` cancels; `SET special_requests = …` edits the one
/// mutable field. Everything else on a booking is immutable.
fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    if table != "bookings" {
        return Err(SqlError::UnknownTable(table));
    }
    let id = extract_where_id(selection)?;

    let mut status: Option<String> = None;
    let mut reason: Option<String> = None;
    let mut special_requests: Option<Option<String>> = None;

    for assignment in assignments {
        let col = assignment_column(assignment)?;
        match col.as_str() {
            "status" => status = Some(parse_string(&assignment.value)?),
            "cancellation_reason" => reason = parse_string_or_null(&assignment.value)?,
            "special_requests" => {
                special_requests = Some(parse_string_or_null(&assignment.value)?)
            }
            other => {
                return Err(SqlError::Unsupported(format!(
                    "bookings column {other} is not updatable"
                )));
            }
        }
    }

    match (status.as_deref(), special_requests) {
        (Some("cancelled"), None) => Ok(Command::CancelBooking { id, reason }),
        (Some(other), _) => Err(SqlError::Unsupported(format!(
            "status can only be set to 'cancelled', got {other:?}"
        ))),
        (None, Some(special_requests)) => {
            Ok(Command::UpdateBookingRequests { id, special_requests })
        }
        (None, None) => Err(SqlError::Parse("UPDATE bookings changes nothing".into())),
        (Some(_), Some(_)) => Err(SqlError::Unsupported(
            "cannot combine a cancellation with field updates".into(),
        )),
    }
}

fn assignment_column(assignment: &ast::Assignment) -> Result<String, SqlError> {
    match &assignment.target {
        ast::AssignmentTarget::ColumnName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))
        }
        other => Err(SqlError::Parse(format!("unsupported assignment target: {other}"))),
    }
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    match table.as_str() {
        "availability" => parse_select_availability(query, select),
        "room_inventory" => parse_select_inventory(select),
        "bookings" => parse_select_bookings(select),
        "rooms" => Ok(Command::SelectRooms),
        "rate_plans" => Ok(Command::SelectRatePlans),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select_availability(
    query: &ast::Query,
    select: &ast::Select,
) -> Result<Command, SqlError> {
    let mut check_in = None;
    let mut check_out = None;
    let mut adults = None;
    let mut children = None;
    let mut rooms = None;
    let mut room_id = None;
    let mut rate_plan_id = None;
    let mut property_id = None;

    if let Some(selection) = &select.selection {
        collect_eq_filters(selection, &mut |col, expr| {
            match col {
                "check_in" => check_in = Some(parse_date(expr)?),
                "check_out" => check_out = Some(parse_date(expr)?),
                "adults" => adults = Some(parse_u32(expr)?),
                "children" => children = Some(parse_u32(expr)?),
                "rooms" => rooms = Some(parse_u32(expr)?),
                "room_id" => room_id = Some(parse_ulid(expr)?),
                "rate_plan_id" => rate_plan_id = Some(parse_ulid(expr)?),
                "property_id" => property_id = Some(parse_ulid(expr)?),
                _ => {}
            }
            Ok(())
        })?;
    }

    let sort = match &query.order_by {
        Some(order_by) => match &order_by.kind {
            OrderByKind::Expressions(exprs) => match exprs.first() {
                Some(first) => sort_key(&first.expr)?,
                None => SortKey::default(),
            },
            _ => SortKey::default(),
        },
        None => SortKey::default(),
    };

    Ok(Command::SelectAvailability {
        criteria: SearchCriteria {
            property_id,
            room_id,
            rate_plan_id,
            check_in: check_in.ok_or(SqlError::MissingFilter("check_in"))?,
            check_out: check_out.ok_or(SqlError::MissingFilter("check_out"))?,
            adults: adults.unwrap_or(1),
            children: children.unwrap_or(0),
            rooms: rooms.unwrap_or(1),
            sort,
        },
    })
}

fn sort_key(expr: &Expr) -> Result<SortKey, SqlError> {
    match expr_column_name(expr).as_deref() {
        Some("price") => Ok(SortKey::Price),
        Some("rating") => Ok(SortKey::Rating),
        Some("name") | Some("room_name") => Ok(SortKey::Name),
        other => Err(SqlError::Parse(format!("unsupported sort key: {other:?}"))),
    }
}

fn parse_select_inventory(select: &ast::Select) -> Result<Command, SqlError> {
    let mut room_id = None;
    let mut rate_plan_id = None;
    let mut from = None;
    let mut to = None;

    if let Some(selection) = &select.selection {
        collect_range_filters(selection, &mut |col, op, expr| {
            match (col, op) {
                ("room_id", RangeOp::Eq) => room_id = Some(parse_ulid(expr)?),
                ("rate_plan_id", RangeOp::Eq) => rate_plan_id = Some(parse_ulid(expr)?),
                ("date", RangeOp::GtEq) => from = Some(parse_date(expr)?),
                ("date", RangeOp::Lt) => to = Some(parse_date(expr)?),
                ("date", RangeOp::LtEq) => {
                    to = Some(parse_date(expr)? + chrono::Days::new(1));
                }
                _ => {}
            }
            Ok(())
        })?;
    }

    Ok(Command::SelectInventory {
        room_id,
        rate_plan_id,
        from: from.ok_or(SqlError::MissingFilter("date >="))?,
        to: to.ok_or(SqlError::MissingFilter("date <"))?,
    })
}

fn parse_select_bookings(select: &ast::Select) -> Result<Command, SqlError> {
    let mut filter = BookingFilter::All;
    if let Some(selection) = &select.selection {
        collect_eq_filters(selection, &mut |col, expr| {
            match col {
                "id" => filter = BookingFilter::ById(parse_ulid(expr)?),
                "reference" => filter = BookingFilter::ByReference(parse_string(expr)?),
                "room_id" => filter = BookingFilter::ByRoom(parse_ulid(expr)?),
                _ => {}
            }
            Ok(())
        })?;
    }
    Ok(Command::SelectBookings { filter })
}

// ── WHERE-clause walking ──────────────────────────────────────

fn collect_eq_filters(
    expr: &Expr,
    visit: &mut impl FnMut(&str, &Expr) -> Result<(), SqlError>,
) -> Result<(), SqlError> {
    if let Expr::BinaryOp { left, op, right } = expr {
        match op {
            ast::BinaryOperator::And => {
                collect_eq_filters(left, visit)?;
                collect_eq_filters(right, visit)?;
            }
            ast::BinaryOperator::Eq => {
                if let Some(col) = expr_column_name(left) {
                    visit(&col, right)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

enum RangeOp {
    Eq,
    GtEq,
    Lt,
    LtEq,
}

fn collect_range_filters(
    expr: &Expr,
    visit: &mut impl FnMut(&str, RangeOp, &Expr) -> Result<(), SqlError>,
) -> Result<(), SqlError> {
    if let Expr::BinaryOp { left, op, right } = expr {
        let range_op = match op {
            ast::BinaryOperator::And => {
                collect_range_filters(left, visit)?;
                collect_range_filters(right, visit)?;
                return Ok(());
            }
            ast::BinaryOperator::Eq => RangeOp::Eq,
            ast::BinaryOperator::GtEq => RangeOp::GtEq,
            ast::BinaryOperator::Lt => RangeOp::Lt,
            ast::BinaryOperator::LtEq => RangeOp::LtEq,
            _ => return Ok(()),
        };
        if let Some(col) = expr_column_name(left) {
            visit(&col, range_op, right)?;
        }
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

#[allow(dead_code)]
fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn single_insert_row(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let rows = all_insert_rows(insert)?;
    if rows.len() != 1 {
        return Err(SqlError::Parse("expected exactly one VALUES row".into()));
    }
    Ok(rows.into_iter().next().unwrap())
}

fn all_insert_rows(insert: &ast::Insert) -> Result<Vec<Vec<Expr>>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(values.rows.clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp { left, op: ast::BinaryOperator::Eq, right } => {
            if expr_column_name(left).as_deref() == Some("id") {
                parse_ulid(right)
            } else {
                Err(SqlError::MissingFilter("id"))
            }
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) | Value::Number(s, _) => {
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
            }
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_ulid_or_null(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => Ok(Some(parse_ulid(expr)?)),
    }
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp { op: ast::UnaryOperator::Minus, expr } = expr {
        Ok(-parse_i64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_u32_or_null(expr: &Expr) -> Result<Option<u32>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => Ok(Some(parse_u32(expr)?)),
    }
}

fn parse_u8_or_null(expr: &Expr) -> Result<Option<u8>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => {
            let v = parse_i64(expr)?;
            u8::try_from(v)
                .map(Some)
                .map_err(|_| SqlError::Parse(format!("{v} out of u8 range")))
        }
    }
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::SingleQuotedString(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
            },
            Value::Number(n, _) => Ok(n != "0"),
            _ => Err(SqlError::Parse(format!("expected bool, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_bool_or_null(expr: &Expr) -> Result<Option<bool>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => Ok(Some(parse_bool(expr)?)),
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) => Ok(s.clone()),
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => Ok(Some(parse_string(expr)?)),
    }
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

fn parse_decimal_or_null(expr: &Expr) -> Result<Option<Decimal>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::Number(s, _)) | Some(Value::SingleQuotedString(s)) => s
            .parse::<Decimal>()
            .map(Some)
            .map_err(|e| SqlError::Parse(format!("bad decimal {s:?}: {e}"))),
        _ => Err(SqlError::Parse(format!("expected decimal, got {expr:?}"))),
    }
}

/// Restrictions ride as a quoted JSON object of string values.
fn parse_restrictions(expr: &Expr) -> Result<Option<BTreeMap<String, String>>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => {
            let raw = parse_string(expr)?;
            serde_json::from_str::<BTreeMap<String, String>>(&raw)
                .map(Some)
                .map_err(|e| SqlError::Parse(format!("bad restrictions JSON: {e}")))
        }
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
