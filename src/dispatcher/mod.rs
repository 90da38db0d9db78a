//! Handler registry and dispatch.
//!
//! A [`Dispatcher`] binds one handler per message type (or per type and
//! subscriber) and runs it on a pool of OS threads. For every delivery a
//! worker:
//!
//! 1. drops requests whose sender has already timed out
//! 2. decodes the payload; an undecodable message goes straight to the
//!    dead-letter queue
//! 3. runs the handler, catching panics
//! 4. replies to `reply_to` and acknowledges, or on failure republishes with
//!    `retry_attempts + 1` until `max_retries`, then dead-letters the message
//!    and sends an error reply so a waiting `send` fails fast
//!
//! ## Handler convention
//!
//! ```ignore
//! // src/handlers/create_account.rs
//!
//! pub const WORKERS: usize = 2;
//!
//! pub fn handle(
//!     req: CreateAccount,
//!     ctx: &Context<AccountStore>,
//! ) -> Result<CreateAccountResponse, HandlerError> {
//!     let account = ctx.state().create(&req.name);
//!     Ok(CreateAccountResponse { account })
//! }
//! ```

mod context;
mod dispatcher;
mod error;
mod registry;
mod worker;

pub use context::Context;
pub use dispatcher::{Dispatcher, DispatcherHandle, DispatcherStats};
pub use error::HandlerError;
pub use worker::WorkerStats;

/// Register request-handler modules with a dispatcher using the convention above.
///
/// Each handler module must export:
/// - `WORKERS: usize`, the worker thread count for its queue
/// - `handle(req, ctx) -> Result<Response, HandlerError>`
///
/// Expands to a `Result<Dispatcher<S>, BusError>`.
///
/// # Example
/// ```ignore
/// let dispatcher = mqbus::register_handlers!(
///     Dispatcher::with_state(bus.clone(), AccountStore::default()),
///     handlers::create_account,
///     handlers::get_account,
/// )?;
/// ```
#[macro_export]
macro_rules! register_handlers {
    ($dispatcher:expr, $( $($seg:ident)::+ ),+ $(,)?) => {
        ::core::result::Result::<_, $crate::BusError>::Ok($dispatcher)
        $(
            .and_then(|d| d.handle($($seg)::+::WORKERS, $($seg)::+::handle))
        )+
    };
}
