/// Database model definitions.
pub mod models;
/// Poll and vote storage backends.
pub mod poll_store;
/// Storage abstraction layer for database operations.
pub mod storage;
