/// Compilation and execution engine
///
/// The heart of the system:
/// - `compiler` turns a canvas flow graph into a canonical action tree
/// - `executor` interprets that tree against a per-run context
/// - `resolver` substitutes `{{path}}` templates at runtime
/// - `rules` evaluates nested AND/OR condition trees

pub mod compiler;
pub mod executor;
pub mod resolver;
pub mod rules;

pub use compiler::{compile, CompiledFlow};
pub use executor::{ChainExecutor, RunOutcome};
