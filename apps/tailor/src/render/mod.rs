// LaTeX → PDF rendering.
// The compiler itself is an external program; `driver` owns the attempt/fallback policy.

pub mod compiler;
pub mod driver;

pub use compiler::{Engine, LatexCompiler};
pub use driver::{Artifact, CompilationDriver, CompilationError, EnginePlan};
