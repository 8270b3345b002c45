/// Text rendering helpers used by the engine's `to_string` / `to_json`.

use crate::column::ColumnValue;

/// Convert days since Unix epoch (1970-01-01) to (year, month, day)
fn ymd_from_days(days: i64) -> (i64, u32, u32) {
    // Algorithm from https://howardhinnant.github.io/date_algorithms.html
    let z = days + 719_468;
    let era = if z >= 0 { z / 146_097 } else { (z - 146_096) / 146_097 };
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if m <= 2 { y + 1 } else { y };
    (year, m, d)
}

/// Format milliseconds since epoch as an ISO 8601 datetime string
pub(crate) fn format_timestamp(ms: i64) -> String {
    let days = ms.div_euclid(86_400_000);
    let time_ms = ms.rem_euclid(86_400_000);

    let (year, month, day) = ymd_from_days(days);
    let hour = time_ms / 3_600_000;
    let minute = (time_ms % 3_600_000) / 60_000;
    let second = (time_ms % 60_000) / 1000;
    let millisecond = time_ms % 1000;

    if millisecond > 0 {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}",
            year, month, day, hour, minute, second, millisecond
        )
    } else {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            year, month, day, hour, minute, second
        )
    }
}

/// Render a scalar cell for the text grid. Subtable cells are rendered by
/// the caller, which knows the nested row count.
pub(crate) fn display_scalar(value: &ColumnValue) -> String {
    match value {
        ColumnValue::Int(n) => n.to_string(),
        ColumnValue::Bool(b) => b.to_string(),
        ColumnValue::Float(f) => f.to_string(),
        ColumnValue::Double(f) => f.to_string(),
        ColumnValue::String(s) => s.clone(),
        ColumnValue::Binary(bytes) => format!("<binary: {} bytes>", bytes.len()),
        ColumnValue::Timestamp(ms) => format_timestamp(*ms),
        ColumnValue::Subtable(_) => "<table>".to_string(),
        ColumnValue::Null => "null".to_string(),
    }
}

/// Convert a scalar cell to JSON. Non-finite floats become null.
pub(crate) fn scalar_to_json(value: &ColumnValue) -> serde_json::Value {
    match value {
        ColumnValue::Int(n) => serde_json::Value::Number((*n).into()),
        ColumnValue::Bool(b) => serde_json::Value::Bool(*b),
        ColumnValue::Float(f) => serde_json::Number::from_f64(*f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ColumnValue::Double(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ColumnValue::String(s) => serde_json::Value::String(s.clone()),
        ColumnValue::Binary(bytes) => serde_json::Value::Array(
            bytes.iter().map(|b| serde_json::Value::Number((*b).into())).collect(),
        ),
        ColumnValue::Timestamp(ms) => serde_json::Value::String(format_timestamp(*ms)),
        ColumnValue::Subtable(_) | ColumnValue::Null => serde_json::Value::Null,
    }
}

/// Lay out a header and rows as a left-aligned grid. Each row is prefixed by
/// its position. When `total` exceeds the rendered rows a trailer is added.
pub(crate) fn render_grid(header: &[&str], rows: &[(usize, Vec<String>)], total: usize) -> String {
    let index_width = rows
        .iter()
        .map(|(i, _)| i.to_string().len())
        .max()
        .unwrap_or(1);
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for (_, cells) in rows {
        for (w, cell) in widths.iter_mut().zip(cells) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = String::new();
    out.push_str(&" ".repeat(index_width));
    for (name, w) in header.iter().zip(&widths) {
        out.push_str(&format!("  {:<width$}", name, width = w));
    }
    out.push('\n');

    for (index, cells) in rows {
        out.push_str(&format!("{:>width$}", index, width = index_width));
        for (cell, w) in cells.iter().zip(&widths) {
            out.push_str(&format!("  {:<width$}", cell, width = w));
        }
        out.push('\n');
    }

    if total > rows.len() {
        out.push_str(&format!("... and {} more rows\n", total - rows.len()));
    }
    out
}
