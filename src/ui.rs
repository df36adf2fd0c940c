use crate::models::{GlobalFuelState, VehicleRecord};

pub fn render_index(
    vehicles: &[String],
    selected: Option<&str>,
    rows: &[VehicleRecord],
    global: GlobalFuelState,
    warnings: &[String],
) -> String {
    let mut options = String::new();
    for vehicle in vehicles {
        let marker = if Some(vehicle.as_str()) == selected { " selected" } else { "" };
        options.push_str(&format!(
            r#"<option value="{value}"{marker}>{value}</option>"#,
            value = escape_html(vehicle)
        ));
    }

    let mut notices = String::new();
    for warning in warnings {
        notices.push_str(&format!(r#"<li>{}</li>"#, escape_html(warning)));
    }

    let vehicle_path = selected
        .map(|vehicle| urlencoding::encode(vehicle).into_owned())
        .unwrap_or_default();
    let mut table_rows = String::new();
    for (idx, row) in rows.iter().enumerate() {
        table_rows.push_str(&format!(
            "<tr><td>{idx}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td>{:.2}</td><td>{:.2}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td><form method=\"post\" action=\"/vehicles/{vehicle_path}/rows/{idx}/delete\">\
             <button class=\"btn-small\" type=\"submit\">Delete</button></form></td></tr>",
            escape_html(&row.date),
            row.odometer,
            row.fuel_received,
            row.distance_delta,
            row.distance_total,
            row.fuel_total,
            row.rate_per_100_delta,
            row.rate_per_100_cumulative,
            row.depot_intake,
            row.depot_fuel_balance,
            row.global_remaining_fuel_snapshot,
            row.other_fuel_given,
            escape_html(&row.reason_for_other),
        ));
    }
    if rows.is_empty() {
        table_rows.push_str(r#"<tr><td colspan="15" class="empty">No entries yet</td></tr>"#);
    }

    INDEX_HTML
        .replace("{{OPTIONS}}", &options)
        .replace("{{NOTICES}}", &notices)
        .replace("{{NOTICES_HIDDEN}}", if warnings.is_empty() { "hidden" } else { "" })
        .replace("{{REMAINING}}", &global.remaining_fuel.to_string())
        .replace("{{VEHICLE}}", &vehicle_path)
        .replace("{{ROWS}}", &table_rows)
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Fuel Ledger</title>
  <style>
    :root {
      --bg-1: #f3f1ea;
      --ink: #2b2a28;
      --accent: #d9822b;
      --accent-2: #2f4858;
      --card: rgba(255, 255, 255, 0.9);
      --shadow: 0 24px 60px rgba(47, 72, 88, 0.18);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: linear-gradient(135deg, var(--bg-1), #e8edf0 100%);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      padding: 32px 18px 48px;
    }

    .app {
      max-width: 1200px;
      margin: 0 auto;
      background: var(--card);
      border-radius: 24px;
      box-shadow: var(--shadow);
      padding: 32px;
      display: grid;
      gap: 24px;
    }

    h1 {
      margin: 0;
    }

    .panel {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(260px, 1fr));
      gap: 16px;
    }

    form.card, .card {
      background: white;
      border-radius: 16px;
      padding: 18px;
      border: 1px solid rgba(47, 72, 88, 0.08);
      display: grid;
      gap: 10px;
    }

    label {
      display: grid;
      gap: 4px;
      font-size: 0.85rem;
      color: #6b645d;
    }

    input, select {
      padding: 8px 10px;
      border-radius: 10px;
      border: 1px solid #cfd6da;
      font-size: 1rem;
    }

    button {
      border: none;
      border-radius: 999px;
      padding: 10px 16px;
      font-weight: 600;
      cursor: pointer;
      background: var(--accent-2);
      color: white;
    }

    button.primary {
      background: var(--accent);
    }

    .btn-small {
      padding: 4px 10px;
      font-size: 0.8rem;
    }

    .balance {
      font-size: 1.8rem;
      font-weight: 600;
      color: var(--accent-2);
    }

    .notices {
      background: #fff4e0;
      border-radius: 12px;
      padding: 12px 18px;
      margin: 0;
    }

    .notices[hidden] {
      display: none;
    }

    .ledger {
      overflow-x: auto;
    }

    table {
      border-collapse: collapse;
      width: 100%;
      font-size: 0.85rem;
    }

    th, td {
      padding: 6px 8px;
      border-bottom: 1px solid #e3e7ea;
      text-align: right;
      white-space: nowrap;
    }

    td.empty {
      text-align: center;
      color: #8b857d;
    }
  </style>
</head>
<body>
  <main class="app">
    <header>
      <h1>Fuel Ledger</h1>
    </header>

    <ul class="notices" {{NOTICES_HIDDEN}}>{{NOTICES}}</ul>

    <section class="panel">
      <form class="card" method="get" action="/">
        <label>Vehicle
          <select name="vehicle" onchange="this.form.submit()">{{OPTIONS}}</select>
        </label>
        <span>Depot remaining fuel</span>
        <span class="balance">{{REMAINING}}</span>
      </form>

      <form class="card" method="post" action="/vehicles/{{VEHICLE}}/entry">
        <label>Date <input name="date" type="text" placeholder="today" /></label>
        <label>Odometer <input name="odometer" type="number" min="0" step="any" required /></label>
        <label>Fuel received <input name="fuel_received" type="number" min="0" step="any" required /></label>
        <label>Depot intake <input name="depot_intake" type="number" min="0" step="any" value="0" required /></label>
        <label>Other fuel given <input name="other_fuel_given" type="number" min="0" step="any" value="0" required /></label>
        <label>Reason <input name="reason" type="text" /></label>
        <button class="primary" type="submit">Save entry</button>
      </form>

      <form class="card" method="post" action="/global/update">
        <label>Other fuel given <input name="other_fuel_given" type="number" min="0" step="any" required /></label>
        <label>Reason <input name="reason" type="text" /></label>
        <button type="submit">Update depot balance</button>
      </form>

      <div class="card">
        <label>Import CSV or xlsx <input id="import-file" type="file" accept=".csv,.xlsx,text/csv" /></label>
        <button type="button" onclick="importLedger()">Import</button>
        <a href="/api/vehicles/{{VEHICLE}}/export?format=xlsx">Download ledger</a>
        <a href="/api/global/export?format=xlsx">Download depot balance</a>
      </div>
    </section>

    <section class="card ledger">
      <table>
        <thead>
          <tr>
            <th>#</th><th>Date</th><th>Odometer</th><th>Fuel</th><th>Distance</th><th>Total distance</th>
            <th>Total fuel</th><th>Per 100</th><th>Per 100 (cum.)</th><th>Depot intake</th>
            <th>Depot balance</th><th>Global snapshot</th><th>Other given</th><th>Reason</th><th></th>
          </tr>
        </thead>
        <tbody>{{ROWS}}</tbody>
      </table>
    </section>
  </main>

  <script>
    async function importLedger() {
      const input = document.getElementById('import-file');
      if (!input.files.length) {
        return;
      }
      const file = input.files[0];
      const res = await fetch('/api/vehicles/{{VEHICLE}}/import', {
        method: 'POST',
        headers: { 'Content-Type': file.type || 'text/csv' },
        body: file,
      });
      if (!res.ok) {
        alert(await res.text());
        return;
      }
      window.location.reload();
    }
  </script>
</body>
</html>
"#;
