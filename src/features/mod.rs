//! Feature templates and their extraction from configurations
//!
//! A template such as `S0h|p+N0|w` names relative addresses (`S0h`: head of
//! the stack top) and the attributes read off them (`p`: POS). Each template
//! that resolves in a configuration yields one interned feature ID.

mod address;
mod extractor;
mod template;

pub use self::address::{Address, Attribute, Source, Step, Target};
pub use self::extractor::FeatureExtractor;
pub use self::template::{Element, FeatureSetup, FeatureTemplate, TemplateSpec};
