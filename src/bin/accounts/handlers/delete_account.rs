use mqbus::dispatcher::{Context, HandlerError};

use crate::model::{AccountDeletedEvent, AccountStore, DeleteAccount, DeleteAccountResponse};

pub const WORKERS: usize = 4;

/// Deleting an unknown id succeeds; the event is sent either way.
pub fn handle(
    req: DeleteAccount,
    ctx: &Context<AccountStore>,
) -> Result<DeleteAccountResponse, HandlerError> {
    let existed = ctx.state().delete(req.id)?;
    ctx.bus().send_one_way(&AccountDeletedEvent { id: req.id })?;

    Ok(DeleteAccountResponse {
        result: (!existed).then(|| format!("account {} did not exist", req.id)),
    })
}
