//! Inter-process plumbing: line framing and the one-shot chunk handoff.

pub mod codec;
pub mod handoff;
