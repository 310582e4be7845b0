use std::path::Path;

use rusqlite::{params, Connection};
use tracing::{info, warn};

use super::{feed_rows, open_feed, ImportReport, IngestError};

const UPSERT_ROUTE: &str = "INSERT OR REPLACE INTO routes \
    (route_id, route_short_name, route_long_name, route_type, route_color, route_text_color, route_url, agency_id) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

pub(super) fn import(conn: &mut Connection, path: &Path, report: &mut ImportReport) -> Result<(), IngestError> {
    let Some(reader) = open_feed(path)? else {
        return Ok(());
    };
    let [id_col, short_col, long_col, type_col, color_col, text_color_col, url_col, agency_col] =
        reader.columns().resolve([
            "route_id",
            "route_short_name",
            "route_long_name",
            "route_type",
            "route_color",
            "route_text_color",
            "route_url",
            "agency_id",
        ]);

    let tx = conn.transaction()?;
    {
        let mut upsert = tx.prepare(UPSERT_ROUTE)?;
        for row in feed_rows(reader, path) {
            let row = row?;

            let Some(route_id) = row.get(id_col) else {
                warn!(short_name = ?row.get(short_col), "Skipping route without id");
                report.routes_skipped += 1;
                continue;
            };
            let route_type = row.get(type_col).and_then(|t| t.parse::<i64>().ok());

            let result = upsert.execute(params![
                route_id,
                row.get(short_col),
                row.get(long_col),
                route_type,
                row.get(color_col),
                row.get(text_color_col),
                row.get(url_col),
                row.get(agency_col),
            ]);
            match result {
                Ok(_) => report.routes_written += 1,
                Err(e) => {
                    warn!(route_id, error = %e, "Failed to write route");
                    report.routes_skipped += 1;
                }
            }
        }
    }
    tx.commit()?;

    info!(written = report.routes_written, skipped = report.routes_skipped, "Imported routes");
    Ok(())
}
