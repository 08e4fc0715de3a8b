/// Database model definitions.
pub mod models;
/// Room, player, assignment and vote persistence.
pub mod room_store;
/// Storage abstraction layer for database operations.
pub mod storage;
