//! Navigate module
//!
//! Resolves user-relative paths into directories contained in the user's
//! sandbox, creating them on demand.

mod resolver;
mod results;

// Re-export public types
pub use resolver::{PathResolver, STAGING_DIR};
pub use results::ResolvedDir;
