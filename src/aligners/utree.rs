use std::path::Path;
use std::process::Command;

use crate::aligners::{assign_alignment, Aligner, AlignerConfig, AlignerError};
use crate::core::table::AbundanceTable;
use crate::engine::assign::AssignmentMode;
use crate::parsing::alignment::AlignmentFormat;

const BINARY: &str = "utree-search_gg";

/// UTree: writes one `read<TAB>lineage` line per classified read
#[derive(Debug, Clone)]
pub struct Utree {
    config: AlignerConfig,
}

impl Utree {
    #[must_use]
    pub fn new(config: AlignerConfig) -> Self {
        Self { config }
    }
}

impl Aligner for Utree {
    fn name(&self) -> &'static str {
        "utree"
    }

    fn format(&self) -> AlignmentFormat {
        AlignmentFormat::Utree
    }

    fn parameters(&self) -> Vec<String> {
        vec![format!("index={:?}", self.config.database.metadata().utree)]
    }

    fn command(&self, input: &Path, output: &Path) -> Result<Command, AlignerError> {
        let index = self.config.database.aligner_index("utree")?;
        let mut command = Command::new(BINARY);
        command
            .arg(index)
            .arg(input)
            .arg(output)
            .arg(self.config.threads.to_string())
            .arg("1");
        Ok(command)
    }

    fn post_align(&self, alignment: &Path) -> Result<AbundanceTable, AlignerError> {
        assign_alignment(
            &self.config.database,
            alignment,
            AlignmentFormat::Utree,
            AssignmentMode::Lca,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligners::command_line;
    use crate::model::metadata::{Database, DatabaseMetadata};

    #[test]
    fn test_command_line() {
        let metadata = DatabaseMetadata {
            utree: Some("utree/rep82.ctr".to_string()),
            ..DatabaseMetadata::default()
        };
        let utree = Utree::new(AlignerConfig {
            database: Database::new("/db", metadata),
            threads: 2,
            capitalist: true,
        });
        let command = utree
            .command(Path::new("reads.fna"), Path::new("alignment.utree.tsv"))
            .unwrap();
        assert_eq!(
            command_line(&command),
            "utree-search_gg /db/utree/rep82.ctr reads.fna alignment.utree.tsv 2 1"
        );
    }

    #[test]
    fn test_post_align_uses_reported_lineages() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = dir.path().join("alignment.utree.tsv");
        std::fs::write(&tsv, "S1_1\tk__A;p__B\nS2_1\tk__A;p__C\nS2_2\tk__A;p__C\n").unwrap();

        let utree = Utree::new(AlignerConfig {
            database: Database::new(dir.path(), DatabaseMetadata::default()),
            threads: 1,
            capitalist: true,
        });
        let table = utree.post_align(&tsv).unwrap();
        assert_eq!(table.get_by_name("k__A;p__B", "S1"), 1);
        assert_eq!(table.get_by_name("k__A;p__C", "S2"), 2);
    }
}
