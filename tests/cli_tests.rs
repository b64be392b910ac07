//! End-to-end tests of the `shogun` binary against a small scratch database.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SHEAR: &str = "#OTU ID\tgenome_length\t1\t2\t3\t4\t5\t6\t7\t8
k__Bacteria;p__Firmicutes;c__Bacilli;o__Bacillales;f__Bacillaceae;g__Bacillus;s__subtilis;t__168\t4200\t0\t0\t0\t0\t0\t70\t10\t20
k__Bacteria;p__Firmicutes;c__Bacilli;o__Bacillales;f__Bacillaceae;g__Bacillus;s__cereus;t__ATCC\t5400\t0\t0\t0\t0\t0\t30\t10\t60
";

const FUNCTION_DB: &str = "k__Bacteria;p__Firmicutes;c__Bacilli;o__Bacillales;f__Bacillaceae;g__Bacillus;s__subtilis;t__168\tK00001:2,K00002
";

const GENUS: &str = "k__Bacteria;p__Firmicutes;c__Bacilli;o__Bacillales;f__Bacillaceae;g__Bacillus";

fn database() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("metadata.yaml"),
        "general:\n  shear: sheared_bayes.txt\nfunction: ko.tsv\nburst: burst/db\n",
    )
    .unwrap();
    fs::write(dir.path().join("sheared_bayes.txt"), SHEAR).unwrap();
    fs::write(dir.path().join("ko.tsv"), FUNCTION_DB).unwrap();
    dir
}

fn shogun() -> Command {
    Command::cargo_bin("shogun").unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    shogun()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("redistribute"))
        .stdout(predicate::str::contains("assign-taxonomy"))
        .stdout(predicate::str::contains("pipeline"));
}

#[test]
fn test_redistribute_splits_by_model() {
    let db = database();
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("taxatable.txt");
    let output = work.path().join("out/taxatable.species.txt");
    fs::write(&input, format!("#OTU ID\tS1\n{GENUS}\t100\n")).unwrap();

    shogun()
        .args(["redistribute", "-l", "species"])
        .arg("-i")
        .arg(&input)
        .arg("-d")
        .arg(db.path())
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(
        written,
        format!("#OTU ID\tS1\n{GENUS};s__cereus\t30\n{GENUS};s__subtilis\t70\n")
    );
}

#[test]
fn test_redistribute_all_writes_every_rank() {
    let db = database();
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("taxatable.txt");
    fs::write(&input, format!("#OTU ID\tS1\n{GENUS}\t10\n")).unwrap();

    shogun()
        .args(["redistribute", "-l", "all"])
        .arg("-i")
        .arg(&input)
        .arg("-d")
        .arg(db.path())
        .arg("-o")
        .arg(work.path().join("taxatable.all.txt"))
        .assert()
        .success();

    for rank in ["kingdom", "phylum", "class", "order", "family", "genus", "species", "strain"] {
        let path = work.path().join(format!("taxatable.all.{rank}.txt"));
        assert!(path.is_file(), "missing {}", path.display());
    }
}

#[test]
fn test_invalid_level_fails_before_io() {
    let work = tempfile::tempdir().unwrap();
    shogun()
        .args(["redistribute", "-i", "missing.txt", "-d", "missing-db", "-l", "superkingdom"])
        .current_dir(work.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("superkingdom"));
    assert!(fs::read_dir(work.path()).unwrap().next().is_none());
}

#[test]
fn test_missing_database_names_path() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("taxatable.txt");
    fs::write(&input, "#OTU ID\tS1\n").unwrap();

    shogun()
        .args(["redistribute", "-l", "genus"])
        .arg("-i")
        .arg(&input)
        .arg("-d")
        .arg(work.path().join("nodb"))
        .arg("-o")
        .arg(work.path().join("out.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("metadata.yaml"));
}

#[test]
fn test_normalize_by_median_depth() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("taxatable.txt");
    let output = work.path().join("normalized.txt");
    fs::write(&input, "#OTU ID\tS1\tS2\tS3\nk__A\t10\t20\t40\n").unwrap();

    shogun()
        .arg("normalize")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "#OTU ID\tS1\tS2\tS3\nk__A\t20\t20\t20\n"
    );
}

#[test]
fn test_assign_taxonomy_sniffs_utree() {
    let db = database();
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("alignment.utree.tsv");
    let output = work.path().join("taxatable.txt");
    fs::write(
        &input,
        "S1_1\tk__A;p__B\nS1_2\tk__A;p__B\nS2_1\tk__A;p__C\n",
    )
    .unwrap();

    shogun()
        .arg("assign-taxonomy")
        .arg("-i")
        .arg(&input)
        .arg("-d")
        .arg(db.path())
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "#OTU ID\tS1\tS2\nk__A;p__B\t2\t0\nk__A;p__C\t0\t1\n"
    );
}

#[test]
fn test_coverage_table_header() {
    let db = database();
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("alignment.burst.b6");
    let output = work.path().join("coverage.txt");
    fs::write(
        &input,
        "S1_1\t168\t99.0\t100\t0\t0\t1\t100\t1\t100\t0\t180\n",
    )
    .unwrap();

    shogun()
        .args(["coverage", "-l", "species"])
        .arg("-i")
        .arg(&input)
        .arg("-d")
        .arg(db.path())
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    let written = fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("#OTU ID\thits\tpercent_coverage\texpected_coverage\tconfidence\n"));
    assert!(written.contains(&format!("{GENUS};s__subtilis\t1.00000\t")));
}

/// Install a `burst15` stand-in that records each invocation and writes a
/// capitalist BURST alignment to its `-o` argument
#[cfg(unix)]
fn fake_burst(bin: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
        r#"#!/bin/sh
echo run >> "$SHOGUN_FAKE_COUNTER"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
printf 'S1_1\t168\t99.0\t100\t0\t0\t1\t100\t1\t100\t0\t180\t{GENUS};s__subtilis;t__168\n' > "$out"
printf 'S1_2\tATCC\t99.0\t100\t0\t0\t1\t100\t1\t100\t0\t180\t{GENUS};s__cereus;t__ATCC\n' >> "$out"
printf 'S2_1\t168\t99.0\t100\t0\t0\t1\t100\t1\t100\t0\t180\t{GENUS};s__subtilis;t__168\n' >> "$out"
"#
    );
    let path = bin.join("burst15");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[test]
fn test_pipeline_second_run_skips_completed_stages() {
    let db = database();
    let work = tempfile::tempdir().unwrap();
    let bin = work.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    fake_burst(&bin);

    let input = work.path().join("combined_seqs.fna");
    fs::write(&input, ">S1_1\nACGT\n>S1_2\nACGT\n>S2_1\nACGT\n").unwrap();
    let output = work.path().join("results");
    let counter = work.path().join("invocations.txt");
    let path = format!(
        "{}:{}",
        bin.display(),
        std::env::var("PATH").unwrap_or_default()
    );

    let run = || {
        shogun()
            .args(["pipeline", "-l", "species", "-t", "1"])
            .arg("-i")
            .arg(&input)
            .arg("-d")
            .arg(db.path())
            .arg("-o")
            .arg(&output)
            .env("PATH", &path)
            .env("SHOGUN_FAKE_COUNTER", &counter)
            .assert()
            .success();
    };

    run();
    let species = output.join("taxatable.species.txt");
    let kegg = output.join("taxatable.species.kegg.txt");
    let first_species = fs::read(&species).unwrap();
    let first_kegg = fs::read(&kegg).unwrap();
    assert_eq!(
        String::from_utf8_lossy(&first_species),
        format!("#OTU ID\tS1\tS2\n{GENUS};s__cereus\t1\t0\n{GENUS};s__subtilis\t1\t1\n")
    );
    assert!(output.join("alignment.burst.b6").is_file());
    assert!(output.join("taxatable.burst.txt").is_file());
    assert!(output.join("taxatable.species.normalized.txt").is_file());
    assert!(output.join(".shogun-cache.json").is_file());
    assert_eq!(fs::read_to_string(&counter).unwrap().lines().count(), 1);

    run();
    assert_eq!(fs::read_to_string(&counter).unwrap().lines().count(), 1);
    assert_eq!(fs::read(&species).unwrap(), first_species);
    assert_eq!(fs::read(&kegg).unwrap(), first_kegg);
}

#[cfg(unix)]
#[test]
fn test_pipeline_reuses_alignment_from_align_command() {
    let db = database();
    let work = tempfile::tempdir().unwrap();
    let bin = work.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    fake_burst(&bin);

    let input = work.path().join("combined_seqs.fna");
    fs::write(&input, ">S1_1\nACGT\n>S1_2\nACGT\n>S2_1\nACGT\n").unwrap();
    let output = work.path().join("results");
    let counter = work.path().join("invocations.txt");
    let path = format!(
        "{}:{}",
        bin.display(),
        std::env::var("PATH").unwrap_or_default()
    );

    shogun()
        .args(["align", "-t", "1"])
        .arg("-i")
        .arg(&input)
        .arg("-d")
        .arg(db.path())
        .arg("-o")
        .arg(&output)
        .env("PATH", &path)
        .env("SHOGUN_FAKE_COUNTER", &counter)
        .assert()
        .success();
    assert!(output.join("alignment.burst.b6").is_file());
    assert!(!output.join("taxatable.burst.txt").exists());
    assert_eq!(fs::read_to_string(&counter).unwrap().lines().count(), 1);

    shogun()
        .args(["pipeline", "-l", "species", "--no-function", "-t", "1"])
        .arg("-i")
        .arg(&input)
        .arg("-d")
        .arg(db.path())
        .arg("-o")
        .arg(&output)
        .env("PATH", &path)
        .env("SHOGUN_FAKE_COUNTER", &counter)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&counter).unwrap().lines().count(), 1);
    assert!(output.join("taxatable.burst.txt").is_file());
    assert_eq!(
        fs::read_to_string(output.join("taxatable.species.txt")).unwrap(),
        format!("#OTU ID\tS1\tS2\n{GENUS};s__cereus\t1\t0\n{GENUS};s__subtilis\t1\t1\n")
    );
}

#[cfg(unix)]
#[test]
fn test_pipeline_reports_missing_aligner() {
    let db = database();
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("combined_seqs.fna");
    fs::write(&input, ">S1_1\nACGT\n").unwrap();

    shogun()
        .args(["pipeline", "-l", "species", "-t", "1"])
        .arg("-i")
        .arg(&input)
        .arg("-d")
        .arg(db.path())
        .arg("-o")
        .arg(work.path().join("results"))
        .env("PATH", work.path().join("empty-bin"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("burst15"));
}
