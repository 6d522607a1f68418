//! Turn-based party battles in the terminal.
//!
//! This library exposes the battle core for the binary and the tests.

pub mod action;
pub mod effect;
pub mod reducer;
pub mod roster;
pub mod rules;
pub mod state;
pub mod ui;
