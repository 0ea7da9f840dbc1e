//! Reading and writing of raw exports and result tables

pub mod export;
pub mod loader;
pub mod tables;

pub use export::{export_metric_tables, ExportOptions};
pub use loader::{load_well_averages, LongRow};
pub use tables::{read_master_table, write_master_table};
