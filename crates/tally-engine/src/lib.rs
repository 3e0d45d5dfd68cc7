//! tally-engine
//!
//! Recurrence engine and administrative services for recurring charges.
//! Depends on tally-domain. No CLI, no terminal I/O; persistence goes through
//! the [`ChargeStore`] seam.

pub mod advance_service;
pub mod category_service;
pub mod definition_service;
pub mod engine;
pub mod error;
pub mod invoice_service;
pub mod memory;
pub mod policy;
pub mod settings;
pub mod storage;
pub mod time;

pub use advance_service::*;
pub use category_service::*;
pub use definition_service::*;
pub use engine::*;
pub use error::CoreError;
pub use invoice_service::*;
pub use memory::*;
pub use policy::*;
pub use settings::*;
pub use storage::*;
pub use time::*;
