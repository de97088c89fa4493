//! gobuild-core
//!
//! Turns a Go source tree and a target command package into a declarative
//! build plan: a content-addressed graph of toolchain invocations (compile,
//! asm, pack, cgo, gcc, link) that an external engine executes.
//!
//! Resolution walks the import graph from the command package, honoring
//! `vendor` directories, and synthesizes each package's archive once no
//! matter how many importers reach it. Nothing here runs a compiler.

pub mod config;
pub mod graph;
pub mod package;
pub mod plan;
pub mod resolve;
pub mod source;
pub mod synth;
pub mod vendor;

mod error;

pub use error::PlanError;
pub use plan::plan_executable;

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
