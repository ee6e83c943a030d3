//! Helpers shared by tests that need a real database. Enabled with the `test_utils` feature.
#[cfg(feature = "sqlite")]
pub mod prepare_env;
