//! Folio admin core: the data-lifecycle subsystem of the portfolio backend.
//!
//! Pure domain logic behind port traits: the audited reset lifecycle, the
//! reconciliation engine and the field-protection gate. Storage lives in
//! `folio_postgres`; HTTP lives in `folio_server`.

pub mod audit;
pub mod clock;
pub mod error;
pub mod jobs;
pub mod memory;
pub mod ports;
pub mod protection;
pub mod reconcile;
pub mod types;
