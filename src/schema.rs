//! Column sets for the persisted tables and the repairs applied when a
//! loaded or uploaded table does not match them.
//!
//! Repair never drops data: missing columns are backfilled with nulls and
//! reported, unknown columns are kept as they are.

use crate::table::{Table, number_cell};
use serde::Serialize;
use tracing::{info, warn};

pub const LEDGER_COLUMNS: [&str; 13] = [
    "date",
    "odometer",
    "fuel_received",
    "distance_delta",
    "distance_total",
    "fuel_total",
    "rate_per_100_delta",
    "rate_per_100_cumulative",
    "depot_intake",
    "depot_fuel_balance",
    "global_remaining_fuel_snapshot",
    "other_fuel_given",
    "reason_for_other",
];

pub const LEDGER_NUMERIC_COLUMNS: [&str; 11] = [
    "odometer",
    "fuel_received",
    "distance_delta",
    "distance_total",
    "fuel_total",
    "rate_per_100_delta",
    "rate_per_100_cumulative",
    "depot_intake",
    "depot_fuel_balance",
    "global_remaining_fuel_snapshot",
    "other_fuel_given",
];

/// Columns introduced with the depot balance. Ledgers written before that
/// only carry the distance and consumption columns.
const DEPOT_COLUMNS: [&str; 5] = [
    "depot_intake",
    "depot_fuel_balance",
    "global_remaining_fuel_snapshot",
    "other_fuel_given",
    "reason_for_other",
];

/// Depot movements a ledger from before the depot columns never recorded.
/// Migrating such a ledger fills them with 0 rather than null.
const V1_ZERO_COLUMNS: [&str; 2] = ["depot_intake", "other_fuel_given"];

pub const GLOBAL_BALANCE_COLUMNS: [&str; 1] = ["remaining_fuel"];
pub const FUEL_DATA_COLUMNS: [&str; 1] = ["depot_remaining"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchemaVersion {
    V1,
    V2,
}

impl SchemaVersion {
    pub const CURRENT: Self = Self::V2;

    pub fn detect(table: &Table) -> Self {
        if DEPOT_COLUMNS.iter().all(|name| table.has_column(name)) {
            Self::V2
        } else {
            Self::V1
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub table: Table,
    pub missing: Vec<String>,
}

/// Adds every expected column the table lacks, filled with nulls.
/// Extra columns are left alone.
pub fn reconcile_schema(mut table: Table, expected: &[&str]) -> Reconciled {
    let mut missing = Vec::new();
    for name in expected {
        if !table.has_column(name) {
            warn!(column = %name, "missing expected column, backfilling with nulls");
            table.add_column(name);
            missing.push(name.to_string());
        }
    }
    Reconciled { table, missing }
}

/// `" Fuel Received "` and `"fuel-received"` both become `"fuel_received"`.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Normalizes every header in place. Columns that collide after
/// normalization are merged into the first one: its nulls are filled from
/// the later column, which is then removed. Returns the merged names.
pub fn normalize_columns(table: &mut Table) -> Vec<String> {
    let mut merged = Vec::new();
    let mut idx = 0;
    while idx < table.columns().len() {
        let name = normalize_column_name(&table.columns()[idx]);
        match table.column_index(&name) {
            Some(existing) if existing < idx => {
                let cells = table.remove_column(idx);
                for (target, cell) in table.column_cells_mut(existing).zip(cells) {
                    if target.is_none() {
                        *target = cell;
                    }
                }
                merged.push(name);
            }
            _ => {
                table.rename_column(idx, name);
                idx += 1;
            }
        }
    }
    merged
}

/// Rewrites numeric columns to canonical numbers. Cells that do not parse
/// become null; returns how many were nulled.
pub fn coerce_numeric(table: &mut Table, columns: &[&str]) -> usize {
    let mut nulled = 0;
    for name in columns {
        let Some(idx) = table.column_index(name) else {
            continue;
        };
        for cell in table.column_cells_mut(idx) {
            let Some(value) = cell.as_deref() else {
                continue;
            };
            let parsed = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite());
            match parsed {
                Some(number) => *cell = number_cell(number),
                None => {
                    *cell = None;
                    nulled += 1;
                }
            }
        }
    }
    nulled
}

#[derive(Debug, Clone)]
pub struct Migrated {
    pub table: Table,
    pub from: SchemaVersion,
    pub merged: Vec<String>,
    pub backfilled: Vec<String>,
}

impl Migrated {
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for name in &self.merged {
            warnings.push(format!("merged duplicate column '{name}'"));
        }
        for name in &self.backfilled {
            warnings.push(format!("column '{name}' was missing and has been backfilled"));
        }
        warnings
    }
}

/// Brings a vehicle ledger to the current schema. `from = None` detects the
/// version from the columns present.
///
/// Missing columns are backfilled in schema order. From `V1` the depot
/// movement columns among them are then set to 0 on every existing row. From
/// `V2` a missing column is drift and stays null. Applying it
/// twice changes nothing.
pub fn migrate(mut table: Table, from: Option<SchemaVersion>) -> Migrated {
    let merged = normalize_columns(&mut table);
    let from = from.unwrap_or_else(|| SchemaVersion::detect(&table));

    let Reconciled { mut table, missing } = reconcile_schema(table, &LEDGER_COLUMNS);
    if from == SchemaVersion::V1 {
        info!(to = ?SchemaVersion::CURRENT, "migrating ledger from V1 schema");
        for name in V1_ZERO_COLUMNS {
            if !missing.iter().any(|column| column == name) {
                continue;
            }
            if let Some(idx) = table.column_index(name) {
                for cell in table.column_cells_mut(idx) {
                    *cell = number_cell(0.0);
                }
            }
        }
    }

    Migrated {
        table,
        from,
        merged,
        backfilled: missing,
    }
}
