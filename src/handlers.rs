use crate::errors::{AppError, TableError};
use crate::ledger::{
    append_record, compute_new_row, global_from_table, records_from_table, update_global_state,
};
use crate::models::{
    EntryInputs, EntryResponse, ExportFormat, ExportQuery, GlobalFuelState, GlobalResponse,
    GlobalUpdateRequest, ImportResponse, IndexQuery, LedgerResponse,
};
use crate::schema::{self, GLOBAL_BALANCE_COLUMNS, LEDGER_COLUMNS, LEDGER_NUMERIC_COLUMNS};
use crate::state::AppState;
use crate::storage::file_stem;
use crate::table::Table;
use crate::ui::render_index;
use axum::{
    Form, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Local;
use tracing::{info, warn};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub async fn index(State(state): State<AppState>, Query(query): Query<IndexQuery>) -> Html<String> {
    let selected = query
        .vehicle
        .filter(|vehicle| state.config.has_vehicle(vehicle))
        .or_else(|| state.config.vehicles.first().cloned());

    let store = state.store.lock().await;
    let global = store.load_global().await;
    let remaining = global_from_table(&global.balance, state.config.initial_remaining_fuel);
    let mut warnings = global.warnings;

    let rows = match &selected {
        Some(vehicle) => {
            let ledger = store.load_ledger(vehicle).await;
            warnings.extend(ledger.warnings);
            records_from_table(&ledger.table)
        }
        None => Vec::new(),
    };

    Html(render_index(
        &state.config.vehicles,
        selected.as_deref(),
        &rows,
        remaining,
        &warnings,
    ))
}

pub async fn list_vehicles(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.config.vehicles.clone())
}

pub async fn get_ledger(
    State(state): State<AppState>,
    Path(vehicle): Path<String>,
) -> Result<Json<LedgerResponse>, AppError> {
    ensure_vehicle(&state, &vehicle)?;
    let store = state.store.lock().await;
    let ledger = store.load_ledger(&vehicle).await;

    Ok(Json(LedgerResponse {
        rows: records_from_table(&ledger.table),
        vehicle,
        warnings: ledger.warnings,
    }))
}

pub async fn create_entry(
    State(state): State<AppState>,
    Path(vehicle): Path<String>,
    Json(inputs): Json<EntryInputs>,
) -> Result<Json<EntryResponse>, AppError> {
    let response = apply_entry(&state, &vehicle, inputs).await?;
    Ok(Json(response))
}

pub async fn submit_entry(
    State(state): State<AppState>,
    Path(vehicle): Path<String>,
    Form(inputs): Form<EntryInputs>,
) -> Result<Redirect, AppError> {
    apply_entry(&state, &vehicle, inputs).await?;
    Ok(redirect_to_vehicle(&vehicle))
}

pub async fn delete_row(
    State(state): State<AppState>,
    Path((vehicle, index)): Path<(String, usize)>,
) -> Result<Json<LedgerResponse>, AppError> {
    let response = apply_delete(&state, vehicle, index).await?;
    Ok(Json(response))
}

pub async fn submit_delete_row(
    State(state): State<AppState>,
    Path((vehicle, index)): Path<(String, usize)>,
) -> Result<Redirect, AppError> {
    let response = apply_delete(&state, vehicle, index).await?;
    Ok(redirect_to_vehicle(&response.vehicle))
}

pub async fn import_ledger(
    State(state): State<AppState>,
    Path(vehicle): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ImportResponse>, AppError> {
    ensure_vehicle(&state, &vehicle)?;

    let mut upload = parse_upload(&headers, &body)
        .map_err(|err| AppError::bad_request(format!("uploaded table could not be parsed: {err}")))?;
    let merged = schema::normalize_columns(&mut upload);
    let nulled_cells = schema::coerce_numeric(&mut upload, &LEDGER_NUMERIC_COLUMNS);
    let reconciled = schema::reconcile_schema(upload, &LEDGER_COLUMNS);

    let mut warnings: Vec<String> = merged
        .iter()
        .map(|name| format!("merged duplicate column '{name}'"))
        .collect();
    if nulled_cells > 0 {
        warn!(%vehicle, nulled_cells, "non-numeric values in upload were nulled");
        warnings.push(format!("{nulled_cells} non-numeric value(s) were replaced by empty cells"));
    }
    for name in &reconciled.missing {
        warnings.push(format!("uploaded table had no '{name}' column"));
    }

    let store = state.store.lock().await;
    let mut ledger = store.load_ledger(&vehicle).await;
    ledger.table.append(&reconciled.table);
    store.persist_ledger(&vehicle, &ledger.table).await?;

    let imported = reconciled.table.len();
    info!(%vehicle, imported, "imported ledger rows");
    warnings.extend(ledger.warnings);

    Ok(Json(ImportResponse {
        imported,
        nulled_cells,
        warnings,
    }))
}

pub async fn export_ledger(
    State(state): State<AppState>,
    Path(vehicle): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    ensure_vehicle(&state, &vehicle)?;
    let store = state.store.lock().await;
    let ledger = store.load_ledger(&vehicle).await;
    export_response(
        &ledger.table,
        &LEDGER_NUMERIC_COLUMNS,
        query.format,
        &file_stem(&vehicle),
    )
}

pub async fn get_global(State(state): State<AppState>) -> Json<GlobalResponse> {
    let store = state.store.lock().await;
    let global = store.load_global().await;
    let current = global_from_table(&global.balance, state.config.initial_remaining_fuel);

    Json(GlobalResponse {
        remaining_fuel: current.remaining_fuel,
        warnings: global.warnings,
    })
}

pub async fn update_global(
    State(state): State<AppState>,
    Json(request): Json<GlobalUpdateRequest>,
) -> Result<Json<GlobalResponse>, AppError> {
    let response = apply_global_update(&state, request).await?;
    Ok(Json(response))
}

pub async fn submit_global_update(
    State(state): State<AppState>,
    Form(request): Form<GlobalUpdateRequest>,
) -> Result<Redirect, AppError> {
    apply_global_update(&state, request).await?;
    Ok(Redirect::to("/"))
}

pub async fn export_global(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let store = state.store.lock().await;
    let global = store.load_global().await;
    export_response(
        &global.balance,
        &GLOBAL_BALANCE_COLUMNS,
        query.format,
        "global_remaining_fuel",
    )
}

/// One entry cycle: read the ledger and the global state, derive the new
/// row, append it, then write the ledger followed by both global tables.
async fn apply_entry(
    state: &AppState,
    vehicle: &str,
    mut inputs: EntryInputs,
) -> Result<EntryResponse, AppError> {
    ensure_vehicle(state, vehicle)?;
    ensure_quantity("odometer", inputs.odometer)?;
    ensure_quantity("fuel_received", inputs.fuel_received)?;
    ensure_quantity("depot_intake", inputs.depot_intake)?;
    ensure_quantity("other_fuel_given", inputs.other_fuel_given)?;
    inputs.date = inputs.date.trim().to_string();
    if inputs.date.is_empty() {
        inputs.date = today_string();
    }
    inputs.reason = inputs.reason.trim().to_string();

    let store = state.store.lock().await;
    let mut ledger = store.load_ledger(vehicle).await;
    let mut global = store.load_global().await;
    let previous = global_from_table(&global.balance, state.config.initial_remaining_fuel);

    let history = records_from_table(&ledger.table);
    let record = compute_new_row(&history, &previous, &inputs);
    append_record(&mut ledger.table, &record);
    store.persist_ledger(vehicle, &ledger.table).await?;

    let remaining_fuel = update_global_state(previous.remaining_fuel, inputs.other_fuel_given);
    store.persist_global(&mut global, remaining_fuel).await?;

    info!(
        vehicle,
        distance_delta = record.distance_delta,
        fuel_total = record.fuel_total,
        remaining_fuel,
        "recorded fuel entry"
    );

    let mut warnings = ledger.warnings;
    warnings.extend(global.warnings);
    Ok(EntryResponse {
        record,
        global: GlobalFuelState { remaining_fuel },
        warnings,
    })
}

async fn apply_delete(
    state: &AppState,
    vehicle: String,
    index: usize,
) -> Result<LedgerResponse, AppError> {
    ensure_vehicle(state, &vehicle)?;
    let store = state.store.lock().await;
    let mut ledger = store.load_ledger(&vehicle).await;
    ledger.table.remove_row(index)?;
    store.persist_ledger(&vehicle, &ledger.table).await?;
    info!(%vehicle, index, "deleted ledger row");

    Ok(LedgerResponse {
        rows: records_from_table(&ledger.table),
        vehicle,
        warnings: ledger.warnings,
    })
}

async fn apply_global_update(
    state: &AppState,
    request: GlobalUpdateRequest,
) -> Result<GlobalResponse, AppError> {
    ensure_quantity("other_fuel_given", request.other_fuel_given)?;

    let store = state.store.lock().await;
    let mut global = store.load_global().await;
    let previous = global_from_table(&global.balance, state.config.initial_remaining_fuel);
    let remaining_fuel = update_global_state(previous.remaining_fuel, request.other_fuel_given);
    store.persist_global(&mut global, remaining_fuel).await?;

    info!(
        other_fuel_given = request.other_fuel_given,
        reason = %request.reason.trim(),
        remaining_fuel,
        "updated global fuel balance"
    );

    Ok(GlobalResponse {
        remaining_fuel,
        warnings: global.warnings,
    })
}

/// Uploads are read as xlsx when declared so or when they carry the zip
/// signature, as CSV otherwise.
fn parse_upload(headers: &HeaderMap, body: &[u8]) -> Result<Table, TableError> {
    let declared_xlsx = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(XLSX_CONTENT_TYPE));

    if declared_xlsx || body.starts_with(b"PK") {
        Table::from_xlsx(body)
    } else {
        Table::from_csv(body)
    }
}

fn export_response(
    table: &Table,
    numeric_columns: &[&str],
    format: ExportFormat,
    stem: &str,
) -> Result<Response, AppError> {
    let (payload, content_type, extension) = match format {
        ExportFormat::Csv => (table.to_csv()?, "text/csv; charset=utf-8", "csv"),
        ExportFormat::Xlsx => (table.to_xlsx(numeric_columns)?, XLSX_CONTENT_TYPE, "xlsx"),
    };
    let disposition = format!("attachment; filename=\"{stem}.{extension}\"");

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        payload,
    )
        .into_response())
}

fn ensure_vehicle(state: &AppState, vehicle: &str) -> Result<(), AppError> {
    if state.config.has_vehicle(vehicle) {
        Ok(())
    } else {
        Err(AppError::not_found(format!("unknown vehicle '{vehicle}'")))
    }
}

fn ensure_quantity(field: &str, value: f64) -> Result<(), AppError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AppError::bad_request(format!(
            "{field} must be a non-negative number"
        )))
    }
}

fn redirect_to_vehicle(vehicle: &str) -> Redirect {
    Redirect::to(&format!("/?vehicle={}", urlencoding::encode(vehicle)))
}

fn today_string() -> String {
    Local::now().date_naive().to_string()
}
