//! Optimization framework: line searches and the optimizer interface.

pub mod line_search;
pub mod line_search_manager;
pub mod optimizer;

// Re-export optimization components
pub use line_search::*;
pub use line_search_manager::*;
pub use optimizer::*;
