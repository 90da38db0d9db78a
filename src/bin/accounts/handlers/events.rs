//! Event handlers: they only log.

use mqbus::dispatcher::{Context, HandlerError};
use tracing::info;

use crate::model::{AccountCreatedEvent, AccountDeletedEvent, AccountStore, AccountsDeletedEvent};

pub fn on_account_created(
    event: AccountCreatedEvent,
    ctx: &Context<AccountStore>,
) -> Result<(), HandlerError> {
    info!(
        id = event.account.id,
        name = %event.account.name,
        worker = ctx.worker_id(),
        "account created"
    );
    Ok(())
}

pub fn on_account_deleted(
    event: AccountDeletedEvent,
    _ctx: &Context<AccountStore>,
) -> Result<(), HandlerError> {
    info!(id = event.id, "account deleted");
    Ok(())
}

pub fn on_accounts_deleted(
    event: AccountsDeletedEvent,
    _ctx: &Context<AccountStore>,
) -> Result<(), HandlerError> {
    info!(count = event.count, "all accounts deleted");
    Ok(())
}
