//! Domain model module declarations.

pub mod account;
pub mod persona;
pub mod points;
