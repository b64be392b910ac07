//! Readers and writers for the tabular files exchanged with aligners and users.
//!
//! - **Taxatables**: tab-separated lineage × sample counts headed by `#OTU ID`
//! - **Alignments**: BURST `.b6`, UTree `.tsv` and Bowtie2 `.sam` outputs
//!
//! Every reader accepts gzip-compressed input when the file name ends in `.gz`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use shogun::parsing::taxatable::{format_taxatable, read_taxatable};
//! use std::path::Path;
//!
//! let table = read_taxatable(Path::new("taxatable.burst.txt")).unwrap();
//! print!("{}", format_taxatable(&table));
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use thiserror::Error;

pub mod alignment;
pub mod taxatable;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl ParseError {
    /// Prefix a format error with the file it came from
    #[must_use]
    pub fn in_file(self, path: &Path) -> Self {
        match self {
            Self::InvalidFormat(msg) => Self::InvalidFormat(format!("{}: {msg}", path.display())),
            Self::Io(e) => Self::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {e}", path.display()),
            )),
        }
    }
}

/// Open a text file for buffered reading, transparently decompressing `.gz`
///
/// # Errors
///
/// Returns an IO error if the file cannot be opened.
pub fn open_text(path: &Path) -> std::io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let is_gz = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

    Ok(if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    })
}

/// Read a whole (possibly gzipped) text file
///
/// # Errors
///
/// Returns `ParseError::Io` naming the path if the file cannot be read.
pub fn read_text(path: &Path) -> Result<String, ParseError> {
    let mut content = String::new();
    open_text(path)
        .and_then(|mut reader| reader.read_to_string(&mut content))
        .map_err(|e| ParseError::Io(e).in_file(path))?;
    Ok(content)
}
