//! Dimension definitions and their disk-backed store.
//!
//! A dimension bundles the prompt templates and configuration for one
//! test category (consistency, safety, ...). Definitions live as YAML
//! files under a dimensions directory, with compiled-in defaults
//! guaranteeing a usable baseline.

pub mod builtin;
pub mod definition;
pub mod store;

pub use builtin::BUILTIN_NAMES;
pub use definition::{
    DimensionCategory, DimensionComplexity, DimensionConfiguration, DimensionContext,
    DimensionDefinition, DimensionMetadata, DimensionPrompts, DimensionValidation,
};
pub use store::DimensionStore;
