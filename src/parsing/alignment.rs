//! Alignment output parsers.
//!
//! | Format | Producer | Columns used |
//! |--------|----------|--------------|
//! | `Blast6` | BURST (`.b6`) | qseqid, sseqid, sstart, send, optional 13th taxonomy column |
//! | `Utree` | UTree (`.tsv`) | read, lineage |
//! | `Sam` | Bowtie2 (`.sam`) | QNAME, FLAG, RNAME, POS, CIGAR |
//!
//! Every hit keeps the read identifier verbatim; [`sample_from_read_id`]
//! recovers the sample under the QIIME `<sample>_<n>` convention.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::lineage::Lineage;
use crate::parsing::{read_text, ParseError};

/// SAM flag bit for an unmapped segment
const SAM_UNMAPPED: u32 = 0x4;

/// Fixed BLAST tabular columns before BURST's optional taxonomy column
const BLAST6_COLUMNS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentFormat {
    Blast6,
    Utree,
    Sam,
}

impl AlignmentFormat {
    /// Guess the format from a file extension (`.gz` is looked through)
    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        let ext = name.rsplit_once('.').map(|(_, ext)| ext)?;
        match ext {
            "b6" => Some(Self::Blast6),
            "sam" => Some(Self::Sam),
            "tsv" | "txt" => Some(Self::Utree),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlignmentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blast6 => write!(f, "b6"),
            Self::Utree => write!(f, "utree"),
            Self::Sam => write!(f, "sam"),
        }
    }
}

/// One read-to-reference hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentHit {
    pub read: String,

    /// Subject name as written by the aligner (accession or lineage)
    pub reference: String,

    /// 1-based inclusive start on the reference (0 when the aligner reports none)
    pub start: u64,

    /// 1-based inclusive end on the reference
    pub end: u64,

    /// Lineage reported by the aligner itself, when it reports one
    pub lineage: Option<Lineage>,
}

impl AlignmentHit {
    /// Number of reference bases the hit spans
    #[must_use]
    pub fn span(&self) -> u64 {
        if self.start == 0 || self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }
}

/// Hits parsed from one alignment file, in file order
#[derive(Debug, Clone)]
pub struct RawAlignment {
    pub format: AlignmentFormat,
    pub hits: Vec<AlignmentHit>,
}

impl RawAlignment {
    /// Hits grouped by read, reads in first-seen order
    #[must_use]
    pub fn by_read(&self) -> Vec<(&str, Vec<&AlignmentHit>)> {
        let mut order: Vec<(&str, Vec<&AlignmentHit>)> = Vec::new();
        let mut index: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        for hit in &self.hits {
            let slot = *index.entry(hit.read.as_str()).or_insert_with(|| {
                order.push((hit.read.as_str(), Vec::new()));
                order.len() - 1
            });
            order[slot].1.push(hit);
        }
        order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Read an alignment file (optionally gzipped)
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or
/// `ParseError::InvalidFormat` naming the file and line for malformed records.
pub fn read_alignment(path: &Path, format: AlignmentFormat) -> Result<RawAlignment, ParseError> {
    let content = read_text(path)?;
    parse_alignment_text(&content, format).map_err(|e| e.in_file(path))
}

/// Parse alignment text in the given format
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` naming the line of the first malformed record.
pub fn parse_alignment_text(text: &str, format: AlignmentFormat) -> Result<RawAlignment, ParseError> {
    let mut hits = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let parsed = match format {
            AlignmentFormat::Blast6 => parse_blast6_line(line),
            AlignmentFormat::Utree => parse_utree_line(line),
            AlignmentFormat::Sam => parse_sam_line(line),
        };
        match parsed {
            Ok(Some(hit)) => hits.push(hit),
            Ok(None) => {}
            Err(msg) => {
                return Err(ParseError::InvalidFormat(format!("line {}: {msg}", i + 1)));
            }
        }
    }
    Ok(RawAlignment { format, hits })
}

fn parse_position(raw: &str, column: &str) -> Result<u64, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("invalid {column} '{raw}'"))
}

fn parse_blast6_line(line: &str) -> Result<Option<AlignmentHit>, String> {
    if line.starts_with('#') {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < BLAST6_COLUMNS {
        return Err(format!(
            "expected at least {BLAST6_COLUMNS} tab-separated columns, found {}",
            fields.len()
        ));
    }
    let sstart = parse_position(fields[8], "sstart")?;
    let send = parse_position(fields[9], "send")?;
    let lineage = fields
        .get(BLAST6_COLUMNS)
        .map(|raw| raw.trim())
        .filter(|raw| !raw.is_empty())
        .map(Lineage::new);

    Ok(Some(AlignmentHit {
        read: fields[0].to_string(),
        reference: fields[1].to_string(),
        start: sstart.min(send),
        end: sstart.max(send),
        lineage,
    }))
}

fn parse_utree_line(line: &str) -> Result<Option<AlignmentHit>, String> {
    let Some((read, lineage)) = line.split_once('\t') else {
        return Err("expected '<read>\\t<lineage>'".to_string());
    };
    let lineage = lineage.split('\t').next().unwrap_or_default().trim();
    Ok(Some(AlignmentHit {
        read: read.to_string(),
        reference: lineage.to_string(),
        start: 0,
        end: 0,
        lineage: Some(Lineage::new(lineage)),
    }))
}

fn parse_sam_line(line: &str) -> Result<Option<AlignmentHit>, String> {
    if line.starts_with('@') {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 6 {
        return Err(format!(
            "expected at least 6 tab-separated SAM fields, found {}",
            fields.len()
        ));
    }
    let flag: u32 = fields[1]
        .parse()
        .map_err(|_| format!("invalid FLAG '{}'", fields[1]))?;
    let reference = fields[2];
    if flag & SAM_UNMAPPED != 0 || reference == "*" {
        return Ok(None);
    }
    let pos = parse_position(fields[3], "POS")?;
    let ref_len = cigar_reference_length(fields[5])?;
    let end = if ref_len == 0 { pos } else { pos + ref_len - 1 };

    Ok(Some(AlignmentHit {
        read: fields[0].to_string(),
        reference: reference.to_string(),
        start: pos,
        end,
        lineage: None,
    }))
}

/// Reference bases consumed by a CIGAR string (`M`, `D`, `N`, `=`, `X`)
fn cigar_reference_length(cigar: &str) -> Result<u64, String> {
    if cigar == "*" {
        return Ok(0);
    }
    let mut total = 0u64;
    let mut run = 0u64;
    for c in cigar.chars() {
        if let Some(digit) = c.to_digit(10) {
            run = run
                .checked_mul(10)
                .and_then(|r| r.checked_add(u64::from(digit)))
                .ok_or_else(|| format!("invalid CIGAR length in '{cigar}'"))?;
            continue;
        }
        match c {
            'M' | 'D' | 'N' | '=' | 'X' => {
                total = total
                    .checked_add(run)
                    .ok_or_else(|| format!("invalid CIGAR length in '{cigar}'"))?;
            }
            'I' | 'S' | 'H' | 'P' => {}
            _ => return Err(format!("invalid CIGAR operation '{c}' in '{cigar}'")),
        }
        run = 0;
    }
    Ok(total)
}

/// Sample name of a QIIME-style read identifier (`<sample>_<n>`).
///
/// Text after the first whitespace is ignored; identifiers without `_` are
/// their own sample.
#[must_use]
pub fn sample_from_read_id(read: &str) -> &str {
    let id = read.split_whitespace().next().unwrap_or(read);
    id.rsplit_once('_').map_or(id, |(sample, _)| sample)
}
