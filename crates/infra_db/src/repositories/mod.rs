//! Repository helpers and the settlement store adapter
//!
//! The helper modules operate on a borrowed connection so the store can
//! compose them inside one transaction per engine operation.

pub(crate) mod billing;
pub(crate) mod provisioning;
mod settlement;

pub use settlement::PgSettlementStore;
