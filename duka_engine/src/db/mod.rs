pub mod common;
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;
