//! Publish pipeline
//!
//! Turns uploaded key batches into normalized exposure records.

pub mod transformer;

pub use transformer::{PublishInfo, TransformResponse, Transformer, TransformerConfig};
