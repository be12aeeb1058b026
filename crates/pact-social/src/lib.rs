pub mod directory;
pub mod grouping;

pub use directory::{SEARCH_PAGE_SIZE, USERS_PAGE_SIZE, UserDirectory};
pub use grouping::{PartnerChoices, group_alphabetically, partition_users};
