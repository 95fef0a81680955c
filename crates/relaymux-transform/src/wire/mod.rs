//! Wire-format types for dialects the Transformer layer converts to/from

pub mod anthropic;
