//! tally-domain
//!
//! Pure domain models for recurring charges: definitions, generated instances,
//! categories, invoices and payments, plus recurrence rule arithmetic.
//! No I/O, no CLI, no storage.

pub mod actor;
pub mod billing;
pub mod category;
pub mod common;
pub mod definition;
pub mod instance;
pub mod recurrence;

pub use actor::*;
pub use billing::*;
pub use category::*;
pub use common::*;
pub use definition::*;
pub use instance::*;
pub use recurrence::*;
