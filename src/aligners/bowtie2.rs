use std::path::Path;
use std::process::Command;

use crate::aligners::{assign_alignment, Aligner, AlignerConfig, AlignerError};
use crate::core::table::AbundanceTable;
use crate::engine::assign::AssignmentMode;
use crate::parsing::alignment::AlignmentFormat;

const BINARY: &str = "bowtie2";

/// Up to this many alignments are reported per read
const MAX_HITS: &str = "16";

/// Bowtie2 in end-to-end mode, reporting up to 16 alignments per read
#[derive(Debug, Clone)]
pub struct Bowtie2 {
    config: AlignerConfig,
}

impl Bowtie2 {
    #[must_use]
    pub fn new(config: AlignerConfig) -> Self {
        Self { config }
    }
}

impl Aligner for Bowtie2 {
    fn name(&self) -> &'static str {
        "bowtie2"
    }

    fn format(&self) -> AlignmentFormat {
        AlignmentFormat::Sam
    }

    fn parameters(&self) -> Vec<String> {
        vec![
            format!("index={:?}", self.config.database.metadata().bowtie2),
            format!("k={MAX_HITS}"),
        ]
    }

    fn command(&self, input: &Path, output: &Path) -> Result<Command, AlignerError> {
        let index = self.config.database.aligner_index("bowtie2")?;
        let mut command = Command::new(BINARY);
        command
            .arg("--no-unal")
            .arg("-x")
            .arg(index)
            .arg("-S")
            .arg(output)
            .args(["--np", "0", "--mp", "1,1", "--rdg", "0,1", "--rfg", "0,1"])
            .args(["--score-min", "L,0,-0.02"])
            .arg("-f")
            .arg(input)
            .args(["--very-sensitive", "-k", MAX_HITS, "-p"])
            .arg(self.config.threads.to_string())
            .args(["--reorder", "--no-hd"]);
        Ok(command)
    }

    fn post_align(&self, alignment: &Path) -> Result<AbundanceTable, AlignerError> {
        assign_alignment(
            &self.config.database,
            alignment,
            AlignmentFormat::Sam,
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
            bowtie2: Some("bowtie2/rep82".to_string()),
            ..DatabaseMetadata::default()
        };
        let bowtie2 = Bowtie2::new(AlignerConfig {
            database: Database::new("/db", metadata),
            threads: 3,
            capitalist: true,
        });
        let command = bowtie2
            .command(Path::new("reads.fna"), Path::new("alignment.bowtie2.sam"))
            .unwrap();
        assert_eq!(
            command_line(&command),
            "bowtie2 --no-unal -x /db/bowtie2/rep82 -S alignment.bowtie2.sam --np 0 --mp 1,1 \
             --rdg 0,1 --rfg 0,1 --score-min L,0,-0.02 -f reads.fna --very-sensitive -k 16 \
             -p 3 --reorder --no-hd"
        );
    }
}
