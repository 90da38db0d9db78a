pub mod create_account;
pub mod delete_account;
pub mod delete_accounts;
pub mod events;
pub mod get_account;
pub mod get_accounts;
