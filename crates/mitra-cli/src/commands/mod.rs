pub mod account;
pub mod client;
pub mod ledger;
pub mod offline;
