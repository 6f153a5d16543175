// src/transform/mod.rs
pub mod clean;
pub mod dedupe;
pub mod document;
pub mod mapping;
pub mod normalize;
pub mod records;
pub mod transactions;
pub mod validate;

// Re-export key transform types for convenience
pub use clean::FieldCleaner;
pub use mapping::MappingTransformer;
pub use transactions::TransactionTransformer;
pub use validate::Validator;
