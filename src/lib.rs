//! Purpose: Library crate behind the `colxor` CLI.
//! Exports: `core` (selection, loading, comparison, writing, errors), `pipeline`, `notice`.
//! Role: Keeps the binary a thin argument/console layer over testable stages.
//! Invariants: No process-wide state; every run builds its sets from scratch.
pub mod core;
pub mod notice;
pub mod pipeline;
