//! Output naming helpers.

use std::path::{Path, PathBuf};

use chrono::Local;

/// Insert `part` as a new dot-separated component before the extension.
///
/// ```
/// use shogun::utils::paths::insert_before_extension;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(
///     insert_before_extension(Path::new("out/taxatable.all.txt"), "strain"),
///     PathBuf::from("out/taxatable.all.strain.txt")
/// );
/// assert_eq!(
///     insert_before_extension(Path::new("table"), "genus"),
///     PathBuf::from("table.genus")
/// );
/// ```
#[must_use]
pub fn insert_before_extension(path: &Path, part: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let renamed = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}.{part}.{ext}"),
        _ => format!("{name}.{part}"),
    };
    path.with_file_name(renamed)
}

/// `path`'s file stem plus `suffix`, placed in `dir`
/// (`taxatable.strain.txt` + `kegg.txt` -> `dir/taxatable.strain.kegg.txt`)
#[must_use]
pub fn sibling_with_suffix(path: &Path, dir: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!("{stem}.{suffix}"))
}

/// Today's date rendered into a `strftime` template
#[must_use]
pub fn dated(template: &str) -> String {
    Local::now().format(template).to_string()
}

/// Default results directory, `results-YYMMDD` in the working directory
#[must_use]
pub fn default_results_dir() -> PathBuf {
    PathBuf::from(dated("results-%y%m%d"))
}

/// Default taxatable path, `taxatable-YYMMDD.txt`
#[must_use]
pub fn default_taxatable() -> PathBuf {
    PathBuf::from(dated("taxatable-%y%m%d.txt"))
}

/// Default normalized taxatable path, `taxatable.normalized-YYMMDD.txt`
#[must_use]
pub fn default_normalized_taxatable() -> PathBuf {
    PathBuf::from(dated("taxatable.normalized-%y%m%d.txt"))
}

/// Default coverage table path, `coverage-YYMMDD.txt`
#[must_use]
pub fn default_coverage_table() -> PathBuf {
    PathBuf::from(dated("coverage-%y%m%d.txt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_before_extension() {
        assert_eq!(
            insert_before_extension(Path::new("/r/taxatable.burst.all.txt"), "kingdom"),
            PathBuf::from("/r/taxatable.burst.all.kingdom.txt")
        );
        assert_eq!(
            insert_before_extension(Path::new(".hidden"), "x"),
            PathBuf::from(".hidden.x")
        );
    }

    #[test]
    fn test_sibling_with_suffix() {
        assert_eq!(
            sibling_with_suffix(Path::new("/a/taxatable.strain.txt"), Path::new("/b"), "kegg.txt"),
            PathBuf::from("/b/taxatable.strain.kegg.txt")
        );
    }

    #[test]
    fn test_dated_defaults() {
        let name = default_results_dir().to_string_lossy().into_owned();
        assert!(name.starts_with("results-"));
        assert_eq!(name.len(), "results-".len() + 6);
        assert!(default_coverage_table().to_string_lossy().ends_with(".txt"));
    }
}
