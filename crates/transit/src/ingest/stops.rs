use std::path::Path;

use rusqlite::{params, Connection};
use tracing::{info, warn};

use super::{feed_rows, open_feed, ImportReport, IngestError};

const UPSERT_STOP: &str = "INSERT OR REPLACE INTO stops \
    (stop_id, stop_name, stop_code, stop_lat, stop_lon, stop_url, agency) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)";

pub(super) fn import(conn: &mut Connection, path: &Path, report: &mut ImportReport) -> Result<(), IngestError> {
    let Some(reader) = open_feed(path)? else {
        return Ok(());
    };
    let [id_col, name_col, code_col, lat_col, lon_col, url_col] = reader.columns().resolve([
        "stop_id",
        "stop_name",
        "stop_code",
        "stop_lat",
        "stop_lon",
        "stop_url",
    ]);

    let tx = conn.transaction()?;
    {
        let mut upsert = tx.prepare(UPSERT_STOP)?;
        for row in feed_rows(reader, path) {
            let row = row?;

            let (Some(stop_id), Some(stop_name)) = (row.get(id_col), row.get(name_col)) else {
                warn!(stop_id = ?row.get(id_col), "Skipping stop without id or name");
                report.stops_skipped += 1;
                continue;
            };

            let lat = parse_coordinate(row.get(lat_col), 90.0);
            let lon = parse_coordinate(row.get(lon_col), 180.0);
            let (Some(lat), Some(lon)) = (lat, lon) else {
                warn!(stop_id, "Skipping stop without valid coordinates");
                report.stops_skipped += 1;
                continue;
            };

            match upsert.execute(params![stop_id, stop_name, row.get(code_col), lat, lon, row.get(url_col)]) {
                Ok(_) => report.stops_written += 1,
                Err(e) => {
                    warn!(stop_id, error = %e, "Failed to write stop");
                    report.stops_skipped += 1;
                }
            }
        }
    }
    tx.commit()?;

    info!(written = report.stops_written, skipped = report.stops_skipped, "Imported stops");
    Ok(())
}

/// Decimal degrees within `[-limit, limit]`.
fn parse_coordinate(value: Option<&str>, limit: f64) -> Option<f64> {
    value?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() <= limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate(Some("37.7749"), 90.0), Some(37.7749));
        assert_eq!(parse_coordinate(Some("-122.4194"), 180.0), Some(-122.4194));
        assert_eq!(parse_coordinate(Some("91"), 90.0), None);
        assert_eq!(parse_coordinate(Some("NaN"), 90.0), None);
        assert_eq!(parse_coordinate(Some("north"), 90.0), None);
        assert_eq!(parse_coordinate(None, 90.0), None);
    }
}
