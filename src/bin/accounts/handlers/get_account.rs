use mqbus::dispatcher::{Context, HandlerError};

use crate::model::{AccountStore, GetAccount, GetAccountResponse};

pub const WORKERS: usize = 4;

pub fn handle(
    req: GetAccount,
    ctx: &Context<AccountStore>,
) -> Result<GetAccountResponse, HandlerError> {
    match ctx.state().get(req.id)? {
        Some(account) => Ok(GetAccountResponse { account }),
        None => Err(HandlerError::NotFound(format!("account {}", req.id))),
    }
}
