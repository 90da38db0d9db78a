use mqbus::dispatcher::{Context, HandlerError};

use crate::model::{AccountStore, GetAccounts, GetAccountsResponse};

pub const WORKERS: usize = 4;

pub fn handle(
    _req: GetAccounts,
    ctx: &Context<AccountStore>,
) -> Result<GetAccountsResponse, HandlerError> {
    Ok(GetAccountsResponse {
        accounts: ctx.state().all()?,
    })
}
