use crate::models::{EntryInputs, GlobalFuelState, VehicleRecord};
use crate::table::{Cell, Table, number_cell};
use tracing::warn;

/// Derives the next ledger row from the vehicle's history.
///
/// The first entry of a vehicle always has zero distance. A decreasing
/// odometer is not rejected; the negative delta flows into the totals and
/// the rates fall back to 0. The depot balance is the running sum of
/// `depot_intake - fuel_received` over every row including this one.
pub fn compute_new_row(
    history: &[VehicleRecord],
    previous_global: &GlobalFuelState,
    inputs: &EntryInputs,
) -> VehicleRecord {
    let distance_delta = match history.last() {
        Some(previous) => inputs.odometer - previous.odometer,
        None => 0.0,
    };
    if distance_delta < 0.0 {
        warn!(
            odometer = inputs.odometer,
            distance_delta, "odometer is lower than the previous reading"
        );
    }

    let distance_total = history.iter().map(|row| row.distance_delta).sum::<f64>() + distance_delta;
    let fuel_total = history.iter().map(|row| row.fuel_received).sum::<f64>() + inputs.fuel_received;
    let depot_fuel_balance = history
        .iter()
        .map(|row| row.depot_intake - row.fuel_received)
        .sum::<f64>()
        + inputs.depot_intake
        - inputs.fuel_received;

    VehicleRecord {
        date: inputs.date.clone(),
        odometer: inputs.odometer,
        fuel_received: inputs.fuel_received,
        distance_delta,
        distance_total,
        fuel_total,
        rate_per_100_delta: rate_per_100(inputs.fuel_received, distance_delta),
        rate_per_100_cumulative: rate_per_100(inputs.fuel_received, distance_total),
        depot_intake: inputs.depot_intake,
        depot_fuel_balance,
        global_remaining_fuel_snapshot: previous_global.remaining_fuel,
        other_fuel_given: inputs.other_fuel_given,
        reason_for_other: inputs.reason.clone(),
    }
}

fn rate_per_100(fuel: f64, distance: f64) -> f64 {
    if distance > 0.0 {
        100.0 * fuel / distance
    } else {
        0.0
    }
}

/// Negative results are kept.
pub fn update_global_state(current_balance: f64, other_given: f64) -> f64 {
    current_balance - other_given
}

/// Reads ledger rows. Null or non-numeric cells count as 0.
pub fn records_from_table(table: &Table) -> Vec<VehicleRecord> {
    let number = |row: usize, column: &str| table.get_f64(row, column).unwrap_or(0.0);
    let text = |row: usize, column: &str| table.get(row, column).unwrap_or_default().to_string();

    (0..table.len())
        .map(|row| VehicleRecord {
            date: text(row, "date"),
            odometer: number(row, "odometer"),
            fuel_received: number(row, "fuel_received"),
            distance_delta: number(row, "distance_delta"),
            distance_total: number(row, "distance_total"),
            fuel_total: number(row, "fuel_total"),
            rate_per_100_delta: number(row, "rate_per_100_delta"),
            rate_per_100_cumulative: number(row, "rate_per_100_cumulative"),
            depot_intake: number(row, "depot_intake"),
            depot_fuel_balance: number(row, "depot_fuel_balance"),
            global_remaining_fuel_snapshot: number(row, "global_remaining_fuel_snapshot"),
            other_fuel_given: number(row, "other_fuel_given"),
            reason_for_other: text(row, "reason_for_other"),
        })
        .collect()
}

fn text_cell(value: &str) -> Cell {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn append_record(table: &mut Table, record: &VehicleRecord) {
    table.push_row([
        ("date", text_cell(&record.date)),
        ("odometer", number_cell(record.odometer)),
        ("fuel_received", number_cell(record.fuel_received)),
        ("distance_delta", number_cell(record.distance_delta)),
        ("distance_total", number_cell(record.distance_total)),
        ("fuel_total", number_cell(record.fuel_total)),
        ("rate_per_100_delta", number_cell(record.rate_per_100_delta)),
        ("rate_per_100_cumulative", number_cell(record.rate_per_100_cumulative)),
        ("depot_intake", number_cell(record.depot_intake)),
        ("depot_fuel_balance", number_cell(record.depot_fuel_balance)),
        (
            "global_remaining_fuel_snapshot",
            number_cell(record.global_remaining_fuel_snapshot),
        ),
        ("other_fuel_given", number_cell(record.other_fuel_given)),
        ("reason_for_other", text_cell(&record.reason_for_other)),
    ]);
}

pub fn global_from_table(table: &Table, default_remaining: f64) -> GlobalFuelState {
    GlobalFuelState {
        remaining_fuel: table
            .get_f64(0, "remaining_fuel")
            .unwrap_or(default_remaining),
    }
}

/// Overwrites the single value row of a global table, creating it if needed.
pub fn set_single_value(table: &mut Table, column: &str, value: f64) {
    table.add_column(column);
    if table.is_empty() {
        table.push_row([(column, number_cell(value))]);
    } else {
        table.set(0, column, number_cell(value));
    }
}
