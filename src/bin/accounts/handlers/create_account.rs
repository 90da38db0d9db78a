use mqbus::dispatcher::{Context, HandlerError};

use crate::model::{AccountCreatedEvent, AccountStore, CreateAccount, CreateAccountResponse};

pub const WORKERS: usize = 4;

pub fn handle(
    req: CreateAccount,
    ctx: &Context<AccountStore>,
) -> Result<CreateAccountResponse, HandlerError> {
    if req.name.trim().is_empty() {
        return Err(HandlerError::Rejected("account name is empty".into()));
    }

    let account = ctx.state().create(&req.name)?;
    ctx.bus().publish(&AccountCreatedEvent {
        account: account.clone(),
    });

    Ok(CreateAccountResponse {
        account,
        result: None,
    })
}
