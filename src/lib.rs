//! a09 is a two-pass assembler and embedded test harness for the Motorola 6809.
//!
//! It translates 6809 assembly source into one of several output-container formats (flat binary,
//! RSDOS, S-record, a Color BASIC loader, or a Dragon executable) and can optionally run the
//! assembled code against programmer-written assertions in an embedded 6809 emulator.

#![warn(missing_docs)]

pub mod addressing;
pub mod assert;
pub mod backend;
pub mod buffer;
pub mod cpu;
pub mod diag;
pub mod driver;
pub mod encode;
pub mod expr;
pub mod fexpr;
pub mod label;
pub mod opcode;
pub mod pseudo;
pub mod symbol;
pub mod testrunner;

pub use backend::{Backend, BasicBackend, BinBackend, DragonBackend, FloatEncoding, RsdosBackend, SrecBackend};
pub use diag::{AssembleError, DiagSink, Diagnostic, Severity, SourceLoc};
pub use driver::{assemble, AssembleOptions, AssembleOutcome};
