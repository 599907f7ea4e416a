// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod analyzer;
pub mod app_dirs;
pub mod classifier;
pub mod config;
pub mod oracle;
pub mod progress;
pub mod puzzle;
pub mod refutation;
pub mod runtime;
pub mod session;
pub mod timer;
pub mod util;
