//! Stop → agency resolution.
//!
//! Two passes. The explicit mapping file is applied first; inference only
//! fills stops that are still unassigned, so a mapped stop keeps its agency
//! even when its id prefix says otherwise.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use super::{ImportReport, IngestError};
use crate::models::Agency;

const SET_AGENCY: &str = "UPDATE stops SET agency = ?1 WHERE stop_id = ?2";

/// Agency for a stop the mapping file does not cover: id prefix first, then
/// the stop URL.
pub fn infer_agency(stop_id: &str, stop_url: Option<&str>) -> Option<Agency> {
    Agency::from_stop_id(stop_id).or_else(|| stop_url.and_then(Agency::from_url))
}

pub(super) fn apply_mapping(conn: &mut Connection, path: &Path, report: &mut ImportReport) -> Result<(), IngestError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(file = %path.display(), "No stop agency mapping, skipping");
            return Ok(());
        }
        Err(source) => {
            return Err(IngestError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mapping: BTreeMap<String, String> = match serde_json::from_str(&contents) {
        Ok(mapping) => mapping,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Ignoring malformed stop agency mapping");
            return Ok(());
        }
    };

    let tx = conn.transaction()?;
    {
        let mut update = tx.prepare(SET_AGENCY)?;
        for (stop_id, code) in &mapping {
            let agency = Agency::translate_mapped_code(code);
            match update.execute(params![agency, stop_id]) {
                Ok(changed) => report.agencies_mapped += changed,
                Err(e) => warn!(stop_id = %stop_id, error = %e, "Failed to set stop agency"),
            }
        }
    }
    tx.commit()?;

    info!(entries = mapping.len(), applied = report.agencies_mapped, "Applied stop agency mapping");
    Ok(())
}

pub(super) fn infer_missing(conn: &mut Connection, report: &mut ImportReport) -> Result<(), IngestError> {
    let tx = conn.transaction()?;
    {
        let pending: Vec<(String, Option<String>)> = {
            let mut select =
                tx.prepare("SELECT stop_id, stop_url FROM stops WHERE agency IS NULL ORDER BY stop_id")?;
            let rows = select.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut update = tx.prepare(SET_AGENCY)?;
        for (stop_id, stop_url) in pending {
            let Some(agency) = infer_agency(&stop_id, stop_url.as_deref()) else {
                debug!(stop_id = %stop_id, "No agency could be inferred");
                report.stops_without_agency += 1;
                continue;
            };
            match update.execute(params![agency.code(), stop_id]) {
                Ok(changed) => report.agencies_inferred += changed,
                Err(e) => warn!(stop_id = %stop_id, error = %e, "Failed to set stop agency"),
            }
        }
    }
    tx.commit()?;

    info!(
        inferred = report.agencies_inferred,
        unresolved = report.stops_without_agency,
        "Inferred missing agencies"
    );
    Ok(())
}
