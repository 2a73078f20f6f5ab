/// Callback tables exchanged with the host
///
/// - `kernel`: privileged operations (context, memory, submission)
/// - `runtime`: upcalls to the graphics runtime (error reporting)
/// - `callback_table`: the swappable slot both tables are reached through

pub mod kernel;
pub mod runtime;
mod callback_table;

pub use kernel::*;
pub use runtime::*;
pub use callback_table::CallbackTable;

// Mock callbacks for tests (no kernel required)
#[cfg(test)]
pub mod mock_callbacks;

#[cfg(test)]
#[path = "callback_table_tests.rs"]
mod tests;
