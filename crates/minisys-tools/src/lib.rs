pub mod summary;
pub mod writers;

// Re-export commonly used types/functions for the CLI
pub use summary::Summary;
pub use writers::{coe, hex, pack_words, serial, OutputPaths};
