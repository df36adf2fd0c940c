use std::{env, path::PathBuf};
use tracing::warn;

pub const DEFAULT_VEHICLES: [&str; 4] = ["06 ABC 101", "06 ABC 102", "06 DEF 201", "06 DEF 202"];

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub port: u16,
    pub vehicles: Vec<String>,
    pub initial_remaining_fuel: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            port: 8080,
            vehicles: DEFAULT_VEHICLES.iter().map(|id| id.to_string()).collect(),
            initial_remaining_fuel: 0.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("FUEL_DATA_DIR").filter(|value| !value.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(value) = lookup("PORT") {
            match value.trim().parse::<u16>() {
                Ok(port) => config.port = port,
                Err(err) => warn!(%value, "ignoring PORT: {err}"),
            }
        }

        if let Some(value) = lookup("FUEL_VEHICLES") {
            let vehicles = parse_vehicle_list(&value);
            if vehicles.is_empty() {
                warn!("FUEL_VEHICLES is empty, using the default vehicle list");
            } else {
                config.vehicles = vehicles;
            }
        }

        if let Some(value) = lookup("FUEL_INITIAL_REMAINING") {
            match value.trim().parse::<f64>() {
                Ok(amount) if amount.is_finite() => config.initial_remaining_fuel = amount,
                _ => warn!(%value, "ignoring FUEL_INITIAL_REMAINING: not a number"),
            }
        }

        config
    }

    pub fn has_vehicle(&self, id: &str) -> bool {
        self.vehicles.iter().any(|vehicle| vehicle == id)
    }
}

fn parse_vehicle_list(value: &str) -> Vec<String> {
    let mut vehicles: Vec<String> = Vec::new();
    for id in value.split(',').map(str::trim).filter(|id| !id.is_empty()) {
        if !vehicles.iter().any(|existing| existing == id) {
            vehicles.push(id.to_string());
        }
    }
    vehicles
}
