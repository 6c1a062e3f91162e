//! Data pipeline: catalog acquisition, synthetic generation, upload parsing, validation.

pub mod dataset;
pub mod provider;
pub mod schema;
pub mod source;
pub mod split;
pub mod synthetic;
pub mod table;
pub mod validate;

pub use dataset::{LabeledDataset, Provenance};
pub use provider::DatasetProvider;
pub use schema::{ColumnType, MatchStrategy, MatchedSchema};
pub use source::{CatalogSource, DataSourceInfo, HttpCatalogSource, InMemoryCatalogSource};
pub use split::{SplitIndices, stratified_split};
pub use table::DataTable;
pub use validate::DatasetInsights;
