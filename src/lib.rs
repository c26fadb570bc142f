// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod client;
pub mod problem;
pub mod runtime;
pub mod session;
