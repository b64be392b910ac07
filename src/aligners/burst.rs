use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::aligners::{assign_alignment, Aligner, AlignerConfig, AlignerError};
use crate::core::table::AbundanceTable;
use crate::engine::assign::AssignmentMode;
use crate::parsing::alignment::AlignmentFormat;

const BINARY: &str = "burst15";

/// Minimum identity for a BURST hit
const MIN_IDENTITY: &str = "0.98";

/// BURST, in capitalist (`-m CAPITALIST`) or all-paths (`-m ALLPATHS`) mode
#[derive(Debug, Clone)]
pub struct Burst {
    config: AlignerConfig,
    capitalist: bool,
}

impl Burst {
    #[must_use]
    pub fn new(config: AlignerConfig, capitalist: bool) -> Self {
        Self { config, capitalist }
    }

    #[must_use]
    pub fn is_capitalist(&self) -> bool {
        self.capitalist
    }

    fn index(&self) -> Result<PathBuf, AlignerError> {
        Ok(self.config.database.aligner_index("burst")?)
    }
}

/// `prefix` with `ext` appended to its final component
fn with_extension_appended(prefix: &Path, ext: &str) -> PathBuf {
    let mut path: OsString = prefix.as_os_str().to_owned();
    path.push(ext);
    PathBuf::from(path)
}

impl Aligner for Burst {
    fn name(&self) -> &'static str {
        "burst"
    }

    fn format(&self) -> AlignmentFormat {
        AlignmentFormat::Blast6
    }

    fn parameters(&self) -> Vec<String> {
        vec![
            format!("index={:?}", self.config.database.metadata().burst),
            format!("capitalist={}", self.capitalist),
            format!("identity={MIN_IDENTITY}"),
        ]
    }

    fn command(&self, input: &Path, output: &Path) -> Result<Command, AlignerError> {
        let index = self.index()?;
        let mut command = Command::new(BINARY);
        command
            .arg("-q")
            .arg(input)
            .arg("-a")
            .arg(with_extension_appended(&index, ".acx"))
            .arg("-r")
            .arg(with_extension_appended(&index, ".edx"))
            .arg("-o")
            .arg(output)
            .args(["-i", MIN_IDENTITY])
            .arg("-t")
            .arg(self.config.threads.to_string())
            .arg("-m")
            .arg(if self.capitalist { "CAPITALIST" } else { "ALLPATHS" })
            .args(["-fr", "-sa"]);
        if self.capitalist {
            command.arg("-b").arg(with_extension_appended(&index, ".tax"));
        }
        Ok(command)
    }

    fn post_align(&self, alignment: &Path) -> Result<AbundanceTable, AlignerError> {
        let mode = if self.capitalist {
            AssignmentMode::Capitalist
        } else {
            AssignmentMode::Lca
        };
        assign_alignment(&self.config.database, alignment, AlignmentFormat::Blast6, mode)
    }
}
