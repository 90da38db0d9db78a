use mqbus::dispatcher::{Context, HandlerError};

use crate::model::{AccountStore, AccountsDeletedEvent, DeleteAccounts, DeleteAccountsResponse};

pub const WORKERS: usize = 4;

pub fn handle(
    _req: DeleteAccounts,
    ctx: &Context<AccountStore>,
) -> Result<DeleteAccountsResponse, HandlerError> {
    let count = ctx.state().clear()?;
    ctx.bus().send_one_way(&AccountsDeletedEvent { count })?;

    Ok(DeleteAccountsResponse { result: None })
}
