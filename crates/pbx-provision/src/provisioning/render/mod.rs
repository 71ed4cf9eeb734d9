//! Pure transformation from a validated snapshot to the engine's
//! configuration documents.
//!
//! Rendering performs no I/O and never consults engine state; the same
//! snapshot always produces byte-identical documents, which keeps repeated
//! compilation passes for an unchanged tenant a safe no-op.

mod dialplan;
mod directory;
mod profile;

use std::path::PathBuf;

use serde::Serialize;

use super::validate::ValidatedRecords;

/// One configuration document, addressed relative to the engine's
/// configuration-tree root. Paths are stable across passes so atomic
/// replacement works.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDocument {
    pub relative_path: PathBuf,
    pub contents: String,
}

/// Rendering takes a validated snapshot, so failures here are internal
/// defects; they are surfaced verbatim rather than retried.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("validated snapshot is internally inconsistent: {0}")]
    Inconsistent(String),
}

/// Render the tenant's three document families, in publish order.
pub fn render(validated: &ValidatedRecords) -> Result<Vec<RenderedDocument>, RenderError> {
    let records = validated.records();
    Ok(vec![
        RenderedDocument {
            relative_path: PathBuf::from(format!("directory/{}.xml", records.tenant.domain)),
            contents: directory::render(records),
        },
        RenderedDocument {
            relative_path: PathBuf::from(format!("dialplan/{}.xml", records.tenant.context)),
            contents: dialplan::render(records)?,
        },
        RenderedDocument {
            relative_path: PathBuf::from(format!("sip_profiles/{}.xml", records.tenant.profile)),
            contents: profile::render(records),
        },
    ])
}

pub(crate) fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
