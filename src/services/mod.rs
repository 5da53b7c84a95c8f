//! Business logic. Handlers validate and translate; services own the
//! database work.

pub mod audit;
pub mod identity;
pub mod items;
pub mod ledger;
