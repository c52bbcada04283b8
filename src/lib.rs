// Library surface for headless/integration tests and reuse.
// The TUI (ui.rs) and App wiring stay in the binary; they render types that
// only exist there.
pub mod config;
pub mod dataset;
pub mod history;
pub mod runtime;
pub mod stats;
pub mod typewriter;
pub mod util;
pub mod words;
