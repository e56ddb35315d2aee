//! Template-driven parsing: YAML selector rules matched to URL families.

pub mod loader;
pub mod parser;
pub mod types;
pub mod xpath;

pub use loader::{TemplateLoader, GENERIC_TEMPLATE};
pub use parser::parse;
pub use types::{
    FieldConfig, ParseResult, PostProcess, SelectorMap, SelectorStrategy, SelectorVariant,
    Template, Validation,
};
