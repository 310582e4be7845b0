//! Operating agencies the cache can resolve and query live.
//!
//! Stops carry their agency as a plain code string so that unrecognized codes
//! from the explicit mapping file survive ingestion unchanged. This enum is
//! the fixed set of codes the inference rules and the live route lookup
//! understand.

use strum::{EnumIter, IntoEnumIterator};

/// Separator between the agency prefix and the local part of a stop id
/// (e.g. `SF:13915`).
pub const STOP_ID_SEPARATOR: char = ':';

/// Agencies whose code starts with this prefix are regional aggregates and
/// are hidden from stop search.
pub const EXCLUDED_AGENCY_PREFIX: &str = "mtc:";

/// Declaration order is the precedence order for URL inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter)]
pub enum Agency {
    Muni,
    Bart,
    AcTransit,
    Caltrain,
    GoldenGate,
    SamTrans,
    Vta,
}

impl Agency {
    pub fn code(self) -> &'static str {
        match self {
            Self::Muni => "SF",
            Self::Bart => "BA",
            Self::AcTransit => "AC",
            Self::Caltrain => "CM",
            Self::GoldenGate => "GG",
            Self::SamTrans => "SC",
            Self::Vta => "VT",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Muni => "SF Muni",
            Self::Bart => "BART",
            Self::AcTransit => "AC Transit",
            Self::Caltrain => "Caltrain",
            Self::GoldenGate => "Golden Gate",
            Self::SamTrans => "SamTrans",
            Self::Vta => "VTA",
        }
    }

    /// Substring that identifies the agency's stop pages in a stop URL.
    fn url_hint(self) -> &'static str {
        match self {
            Self::Muni => "sfmta.com",
            Self::Bart => "bart.gov",
            Self::AcTransit => "actransit.org",
            Self::Caltrain => "caltrain.com",
            Self::GoldenGate => "goldengate.org",
            Self::SamTrans => "samtrans.com",
            Self::Vta => "vta.org",
        }
    }

    /// Exact lookup of a canonical code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::iter().find(|agency| agency.code() == code)
    }

    /// Translate a code from the explicit stop→agency mapping file into the
    /// code stored on the stop. Unrecognized codes pass through unchanged.
    pub fn translate_mapped_code(raw: &str) -> String {
        match Self::from_code(raw.trim()) {
            Some(agency) => agency.code().to_string(),
            None => raw.to_string(),
        }
    }

    /// Infer from an id of the form `PREFIX:rest`.
    pub fn from_stop_id(stop_id: &str) -> Option<Self> {
        let (prefix, _) = stop_id.split_once(STOP_ID_SEPARATOR)?;
        Self::from_code(&prefix.to_uppercase())
    }

    /// Infer from the stop's public URL. First hint that matches wins.
    pub fn from_url(url: &str) -> Option<Self> {
        Self::iter().find(|agency| url.contains(agency.url_hint()))
    }
}
