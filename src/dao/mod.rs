/// Raw document shapes and typed encode/decode helpers.
pub mod document;
/// Document store trait and its backends.
pub mod document_store;
/// Database model definitions.
pub mod models;
/// Typed data access over the collections.
pub mod repository;
/// Storage abstraction layer errors.
pub mod storage;
/// ISO-8601 timestamp helpers.
pub mod timestamp;
