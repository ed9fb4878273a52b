pub mod absence_table;
pub mod error;
pub mod helpers;
pub mod models;
pub mod run_tool;
pub mod schedule_import;
pub mod schedule_mapper;
pub mod substitution;
pub mod template;
