use serde::{Deserialize, Serialize};

/// One fill-up event in a vehicle's ledger.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct VehicleRecord {
    pub date: String,
    pub odometer: f64,
    pub fuel_received: f64,
    pub distance_delta: f64,
    pub distance_total: f64,
    pub fuel_total: f64,
    pub rate_per_100_delta: f64,
    pub rate_per_100_cumulative: f64,
    pub depot_intake: f64,
    pub depot_fuel_balance: f64,
    pub global_remaining_fuel_snapshot: f64,
    pub other_fuel_given: f64,
    pub reason_for_other: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct GlobalFuelState {
    pub remaining_fuel: f64,
}

/// Raw values of a new ledger entry as submitted by the form.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryInputs {
    #[serde(default)]
    pub date: String,
    pub odometer: f64,
    pub fuel_received: f64,
    pub depot_intake: f64,
    pub other_fuel_given: f64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalUpdateRequest {
    pub other_fuel_given: f64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub vehicle: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    #[default]
    Xlsx,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    pub vehicle: String,
    pub rows: Vec<VehicleRecord>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub record: VehicleRecord,
    pub global: GlobalFuelState,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GlobalResponse {
    pub remaining_fuel: f64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
    pub nulled_cells: usize,
    pub warnings: Vec<String>,
}
