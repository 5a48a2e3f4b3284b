//! URL handling module for Site-Mapper
//!
//! This module turns raw `href` values into comparable, canonical URLs and
//! decides which of them belong to the site being mapped.

mod normalize;
mod scope;

// Re-export main functions
pub use normalize::{normalize, normalize_with, NormalizeOptions, NormalizedUrl};
pub use scope::{in_scope, in_scope_with, ScopePolicy};
