//! Report renderers

pub mod json;
pub mod markdown;
