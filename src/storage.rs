use crate::errors::AppError;
use crate::ledger::set_single_value;
use crate::schema::{self, FUEL_DATA_COLUMNS, GLOBAL_BALANCE_COLUMNS, LEDGER_COLUMNS};
use crate::table::Table;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const GLOBAL_BALANCE_FILE: &str = "global_remaining_fuel.csv";
const FUEL_DATA_FILE: &str = "global_fuel_data.csv";
const VEHICLES_DIR: &str = "vehicles";

/// Layout of the data directory: the two global tables at the root and one
/// ledger per vehicle under `vehicles/`.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

/// A table as loaded from disk, after repair.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub table: Table,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GlobalTables {
    pub balance: Table,
    pub fuel_data: Table,
    pub warnings: Vec<String>,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn global_balance_path(&self) -> PathBuf {
        self.root.join(GLOBAL_BALANCE_FILE)
    }

    pub fn fuel_data_path(&self) -> PathBuf {
        self.root.join(FUEL_DATA_FILE)
    }

    pub fn vehicle_path(&self, vehicle: &str) -> PathBuf {
        self.root
            .join(VEHICLES_DIR)
            .join(format!("{}.csv", file_stem(vehicle)))
    }

    pub async fn ensure(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(self.root.join(VEHICLES_DIR)).await
    }

    pub async fn load_ledger(&self, vehicle: &str) -> Loaded {
        let path = self.vehicle_path(vehicle);
        let Some((table, mut warnings)) = read_table(&path).await else {
            return Loaded {
                table: Table::with_columns(&LEDGER_COLUMNS),
                warnings: Vec::new(),
            };
        };

        let migrated = schema::migrate(table, None);
        warnings.extend(migrated.warnings());
        Loaded {
            table: migrated.table,
            warnings,
        }
    }

    pub async fn persist_ledger(&self, vehicle: &str, table: &Table) -> Result<(), AppError> {
        persist_table(&self.vehicle_path(vehicle), table).await
    }

    pub async fn load_global(&self) -> GlobalTables {
        let balance = load_single_row(&self.global_balance_path(), &GLOBAL_BALANCE_COLUMNS).await;
        let fuel_data = load_single_row(&self.fuel_data_path(), &FUEL_DATA_COLUMNS).await;

        let mut warnings = balance.warnings;
        warnings.extend(fuel_data.warnings);
        GlobalTables {
            balance: balance.table,
            fuel_data: fuel_data.table,
            warnings,
        }
    }

    /// Writes the new balance to both global tables. The two writes are not
    /// atomic as a pair.
    pub async fn persist_global(
        &self,
        tables: &mut GlobalTables,
        remaining_fuel: f64,
    ) -> Result<(), AppError> {
        set_single_value(&mut tables.balance, "remaining_fuel", remaining_fuel);
        set_single_value(&mut tables.fuel_data, "depot_remaining", remaining_fuel);
        persist_table(&self.global_balance_path(), &tables.balance).await?;
        persist_table(&self.fuel_data_path(), &tables.fuel_data).await?;
        Ok(())
    }
}

/// Reads and parses a table. `None` means the file does not exist yet. A
/// file that cannot be read or parsed yields an empty table and a warning;
/// it is recreated on the next write.
async fn read_table(path: &Path) -> Option<(Table, Vec<String>)> {
    match fs::read(path).await {
        Ok(bytes) => match Table::from_csv(&bytes) {
            Ok(table) => {
                debug!(path = %path.display(), rows = table.len(), "loaded table");
                Some((table, Vec::new()))
            }
            Err(err) => {
                warn!(path = %path.display(), "failed to parse table: {err}");
                Some((
                    Table::default(),
                    vec![format!("{} was unreadable and has been reset: {err}", display_name(path))],
                ))
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            warn!(path = %path.display(), "failed to read table: {err}");
            Some((
                Table::default(),
                vec![format!("{} could not be read and has been reset: {err}", display_name(path))],
            ))
        }
    }
}

async fn load_single_row(path: &Path, expected: &[&str]) -> Loaded {
    let Some((mut table, mut warnings)) = read_table(path).await else {
        return Loaded {
            table: Table::with_columns(expected),
            warnings: Vec::new(),
        };
    };

    schema::normalize_columns(&mut table);
    let reconciled = schema::reconcile_schema(table, expected);
    for name in &reconciled.missing {
        warnings.push(format!(
            "{}: column '{name}' was missing and has been backfilled",
            display_name(path)
        ));
    }
    Loaded {
        table: reconciled.table,
        warnings,
    }
}

pub async fn persist_table(path: &Path, table: &Table) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let payload = table.to_csv()?;
    fs::write(path, payload).await?;
    Ok(())
}

/// Percent-encoded identifier. Distinct vehicles always get distinct files
/// and `/` can never leave the vehicles directory.
pub fn file_stem(vehicle: &str) -> String {
    urlencoding::encode(vehicle).into_owned()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
