pub mod reminders;
pub mod store;
pub mod views;

pub use reminders::OverdueSweep;
pub use store::ContractStore;
