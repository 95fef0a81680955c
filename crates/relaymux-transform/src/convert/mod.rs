//! Bidirectional dialect converters

pub mod anthropic;
