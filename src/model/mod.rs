//! Database-side inputs: the shear confusion model, reference taxonomy and
//! the `metadata.yaml` that locates them.
//!
//! A SHOGUN database is a directory holding a `metadata.yaml` whose paths are
//! relative to the directory itself:
//!
//! ```text
//! rep82/
//! ├── metadata.yaml
//! ├── rep82.tax              general.taxonomy
//! ├── sheared_bayes.txt      general.shear
//! ├── function/ko.tsv        function
//! └── burst/rep82.{acx,edx}  burst
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use shogun::model::{ConfusionModel, Database};
//! use std::path::Path;
//!
//! let db = Database::load(Path::new("rep82")).unwrap();
//! let model = ConfusionModel::load(&db.shear_path().unwrap()).unwrap();
//! println!("{} sheared references", model.len());
//! ```

pub mod metadata;
pub mod shear;
pub mod taxonomy;

pub use metadata::{Database, DatabaseMetadata, MetadataError};
pub use shear::{ConfusionModel, ModelError, ShearEntry};
pub use taxonomy::ReferenceTaxonomy;
