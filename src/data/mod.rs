//! Master table construction for MEA analysis

pub mod builder;
pub mod discover;
pub mod table;

pub use builder::MasterTableBuilder;
pub use discover::discover_csv_files;
pub use table::{MasterRecord, MasterTable};
