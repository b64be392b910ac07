use std::fmt::Write as _;
use std::path::Path;

use tracing::debug;

use crate::core::lineage::Lineage;
use crate::core::table::AbundanceTable;
use crate::parsing::{read_text, ParseError};

/// First header cell of every taxatable
pub const OTU_HEADER: &str = "#OTU ID";

/// Read a taxatable from disk (optionally gzipped)
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or
/// `ParseError::InvalidFormat` naming the file and line if the content is invalid.
pub fn read_taxatable(path: &Path) -> Result<AbundanceTable, ParseError> {
    let content = read_text(path)?;
    parse_taxatable_text(&content).map_err(|e| e.in_file(path))
}

/// Parse a tab-separated taxatable.
///
/// The header is the first line that is not a `#` comment, or a line starting
/// with `#OTU ID` (BIOM-converted tables put a comment before it). Cells may be
/// integers or floats; floats are rounded to the nearest count. Rows without a
/// lineage are skipped, rows whose lineages normalize to the same taxon are
/// summed, and zero cells are not stored.
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for a missing header, rows wider than the
/// header, duplicate sample names, or negative/unparsable counts.
pub fn parse_taxatable_text(text: &str) -> Result<AbundanceTable, ParseError> {
    let mut table: Option<AbundanceTable> = None;
    let mut skipped = 0usize;

    for (i, line) in text.lines().enumerate() {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        let line_num = i + 1;

        if table.is_none() {
            if line.starts_with('#') && !line.starts_with("#OTU") {
                continue;
            }
            table = Some(parse_header(line, line_num)?);
            continue;
        }
        let Some(table) = table.as_mut() else {
            continue;
        };

        if line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields[0].trim().is_empty() {
            skipped += 1;
            continue;
        }
        let lineage = Lineage::new(fields[0]);

        if fields.len() - 1 > table.samples().len() {
            return Err(ParseError::InvalidFormat(format!(
                "Line {line_num} has {} count columns but the header names {} samples",
                fields.len() - 1,
                table.samples().len()
            )));
        }

        for (sample, raw) in fields.iter().skip(1).enumerate() {
            let count = parse_count(raw.trim()).ok_or_else(|| {
                ParseError::InvalidFormat(format!(
                    "Invalid count on line {line_num}: '{}'",
                    raw.trim()
                ))
            })?;
            if count > 0 {
                table.add(lineage.clone(), sample, count);
            }
        }
    }

    if skipped > 0 {
        debug!(rows = skipped, "Skipped taxatable rows without a lineage");
    }

    table.ok_or_else(|| ParseError::InvalidFormat("No header line found".to_string()))
}

fn parse_header(line: &str, line_num: usize) -> Result<AbundanceTable, ParseError> {
    let samples: Vec<&str> = line.split('\t').skip(1).map(str::trim).collect();
    let mut table = AbundanceTable::default();
    for sample in samples {
        if table.sample_index(sample).is_some() {
            return Err(ParseError::InvalidFormat(format!(
                "Duplicate sample '{sample}' in header on line {line_num}"
            )));
        }
        table.sample_index_or_insert(sample);
    }
    Ok(table)
}

fn parse_count(raw: &str) -> Option<u64> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("nan") {
        return Some(0);
    }
    if let Ok(count) = raw.parse::<u64>() {
        return Some(count);
    }
    let value: f64 = raw.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(value.round() as u64)
}

/// Render a taxatable: `#OTU ID` header, one row per lineage, 0 for absent cells
#[must_use]
pub fn format_taxatable(table: &AbundanceTable) -> String {
    let mut out = String::new();
    out.push_str(OTU_HEADER);
    for sample in table.samples() {
        out.push('\t');
        out.push_str(sample);
    }
    out.push('\n');

    for (lineage, row) in table.rows() {
        out.push_str(lineage.as_str());
        for sample in 0..table.samples().len() {
            let _ = write!(out, "\t{}", row.get(&sample).copied().unwrap_or(0));
        }
        out.push('\n');
    }
    out
}
