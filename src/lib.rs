pub mod commands;
pub mod config;
pub mod field_names;
pub mod path;
pub mod progress;
pub mod reconcile;
pub mod remote;
pub mod sync;
pub mod table;
pub mod vault;

#[cfg(test)]
mod tests;
