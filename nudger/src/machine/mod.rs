//! Phase state machine
//!
//! Holds the current phase, the interrupt context and the current daily
//! plan. States are the five phases plus "interrupted"; transitions are
//! advance (cyclic), enter_interrupt and resume.

mod core;

pub use core::{MachineError, PhaseMachine, Transition};
