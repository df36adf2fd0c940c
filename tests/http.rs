use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct Record {
    date: String,
    odometer: f64,
    fuel_received: f64,
    distance_delta: f64,
    distance_total: f64,
    fuel_total: f64,
    rate_per_100_delta: f64,
    depot_fuel_balance: f64,
    global_remaining_fuel_snapshot: f64,
    reason_for_other: String,
}

#[derive(Debug, Deserialize)]
struct EntryResponse {
    record: Record,
    global: GlobalState,
}

#[derive(Debug, Deserialize)]
struct GlobalState {
    remaining_fuel: f64,
}

#[derive(Debug, Deserialize)]
struct LedgerResponse {
    vehicle: String,
    rows: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct ImportResponse {
    imported: usize,
    nulled_cells: usize,
    warnings: Vec<String>,
}

struct TestServer {
    base_url: String,
    child: Child,
    _data_dir: tempfile::TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::Once;
    use std::sync::atomic::{AtomicI32, Ordering};

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/global")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_dir = tempfile::tempdir().expect("create data dir");
    let child = Command::new(env!("CARGO_BIN_EXE_fuel_ledger"))
        .env("PORT", port.to_string())
        .env("FUEL_DATA_DIR", data_dir.path())
        .env("FUEL_VEHICLES", "T-1,T-2,T-3,T-4")
        .env("FUEL_INITIAL_REMAINING", "1000")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer {
        base_url,
        child,
        _data_dir: data_dir,
    }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn remaining_fuel(client: &Client, base_url: &str) -> f64 {
    let state: GlobalState = client
        .get(format!("{base_url}/api/global"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    state.remaining_fuel
}

#[tokio::test]
async fn http_entries_derive_running_metrics() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let before = remaining_fuel(&client, &server.base_url).await;

    let first: EntryResponse = client
        .post(format!("{}/api/vehicles/T-1/entries", server.base_url))
        .json(&serde_json::json!({
            "date": "01.03.2024",
            "odometer": 1000.0,
            "fuel_received": 40.0,
            "depot_intake": 50.0,
            "other_fuel_given": 0.0,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first.record.distance_delta, 0.0);
    assert_eq!(first.record.distance_total, 0.0);
    assert_eq!(first.record.fuel_total, 40.0);
    assert_eq!(first.record.rate_per_100_delta, 0.0);
    assert_eq!(first.record.depot_fuel_balance, 10.0);
    assert_eq!(first.record.global_remaining_fuel_snapshot, before);
    assert_eq!(first.global.remaining_fuel, before);

    let second: EntryResponse = client
        .post(format!("{}/api/vehicles/T-1/entries", server.base_url))
        .json(&serde_json::json!({
            "date": "08.03.2024",
            "odometer": 1400.0,
            "fuel_received": 35.0,
            "depot_intake": 0.0,
            "other_fuel_given": 5.0,
            "reason": "generator",
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second.record.distance_delta, 400.0);
    assert_eq!(second.record.distance_total, 400.0);
    assert_eq!(second.record.fuel_total, 75.0);
    assert_eq!(second.record.rate_per_100_delta, 8.75);
    assert_eq!(second.record.reason_for_other, "generator");
    assert_eq!(second.global.remaining_fuel, before - 5.0);

    let ledger: LedgerResponse = client
        .get(format!("{}/api/vehicles/T-1", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ledger.vehicle, "T-1");
    assert_eq!(ledger.rows.len(), 2);
    assert_eq!(ledger.rows[1].odometer, 1400.0);
    assert_eq!(ledger.rows[1].fuel_received, 35.0);
    assert_eq!(remaining_fuel(&client, &server.base_url).await, before - 5.0);
}

#[tokio::test]
async fn http_global_update_allows_negative_balance() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let before = remaining_fuel(&client, &server.base_url).await;

    let response = client
        .post(format!("{}/api/global/update", server.base_url))
        .json(&serde_json::json!({ "other_fuel_given": before + 30.0, "reason": "transfer" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let updated: GlobalState = response.json().await.unwrap();
    assert_eq!(updated.remaining_fuel, -30.0);

    let response = client
        .post(format!("{}/api/global/update", server.base_url))
        .json(&serde_json::json!({ "other_fuel_given": -30.0 - before }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(remaining_fuel(&client, &server.base_url).await, -30.0);
}

#[tokio::test]
async fn http_rejects_unknown_vehicle_and_negative_input() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/vehicles/NOPE", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .post(format!("{}/api/vehicles/T-4/entries", server.base_url))
        .json(&serde_json::json!({
            "odometer": 100.0,
            "fuel_received": -1.0,
            "depot_intake": 0.0,
            "other_fuel_given": 0.0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_import_coerces_and_keeps_extra_columns() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let upload = "Date, Odometer ,Fuel Received,Driver\n01.02,900,30,Ali\n02.02,abc,25,Veli\n";
    let imported: ImportResponse = client
        .post(format!("{}/api/vehicles/T-2/import", server.base_url))
        .body(upload)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(imported.imported, 2);
    assert_eq!(imported.nulled_cells, 1);
    assert!(!imported.warnings.is_empty());

    let ledger: LedgerResponse = client
        .get(format!("{}/api/vehicles/T-2", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ledger.rows.len(), 2);
    assert_eq!(ledger.rows[0].odometer, 900.0);
    assert_eq!(ledger.rows[1].odometer, 0.0);

    let exported = client
        .get(format!("{}/api/vehicles/T-2/export?format=csv", server.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let header = exported.lines().next().unwrap();
    assert!(header.starts_with("date,odometer,fuel_received"));
    assert!(header.ends_with(",driver"));
    assert!(exported.contains("Veli"));
}

#[tokio::test]
async fn http_xlsx_export_imports_back_unchanged() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let upload = "date,odometer,fuel_received\n01.02,900,30\n09.02,1150,25\n";
    let response = client
        .post(format!("{}/api/vehicles/T-4/import", server.base_url))
        .body(upload)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let response = client
        .get(format!("{}/api/vehicles/T-4/export", server.base_url))
        .send()
        .await
        .unwrap();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let workbook = response.bytes().await.unwrap();
    assert!(workbook.starts_with(b"PK"));

    let imported: ImportResponse = client
        .post(format!("{}/api/vehicles/T-4/import", server.base_url))
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .body(workbook)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(imported.imported, 2);
    assert_eq!(imported.nulled_cells, 0);

    let ledger: LedgerResponse = client
        .get(format!("{}/api/vehicles/T-4", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ledger.rows.len(), 4);
    assert_eq!(ledger.rows[2].date, "01.02");
    assert_eq!(ledger.rows[2].odometer, 900.0);
    assert_eq!(ledger.rows[3].date, "09.02");
    assert_eq!(ledger.rows[3].odometer, 1150.0);
    assert_eq!(ledger.rows[3].fuel_received, 25.0);
}

#[tokio::test]
async fn http_delete_row_checks_bounds() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    for odometer in [100.0, 250.0] {
        let response = client
            .post(format!("{}/api/vehicles/T-3/entries", server.base_url))
            .json(&serde_json::json!({
                "odometer": odometer,
                "fuel_received": 10.0,
                "depot_intake": 0.0,
                "other_fuel_given": 0.0,
            }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    let response = client
        .delete(format!("{}/api/vehicles/T-3/rows/5", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let ledger: LedgerResponse = client
        .delete(format!("{}/api/vehicles/T-3/rows/0", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ledger.rows.len(), 1);
    assert_eq!(ledger.rows[0].odometer, 250.0);
}

#[tokio::test]
async fn http_global_export_is_xlsx_by_default() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/global/export", server.base_url))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let disposition = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("global_remaining_fuel.xlsx"));
    let bytes = response.bytes().await.unwrap();
    assert!(bytes.starts_with(b"PK"));

    let page = client
        .get(format!("{}/?vehicle=T-2", server.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains(r#"<option value="T-2" selected>"#));
}
