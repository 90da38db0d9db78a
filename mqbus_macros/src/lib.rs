mod message;

use proc_macro::TokenStream;

/// Derive macro for the `Message` trait (and `Request` when a response is named).
///
/// # Usage
///
/// ```ignore
/// #[derive(Serialize, Deserialize, Message)]
/// #[message(response = CreateAccountResponse)]
/// struct CreateAccount {
///     pub name: String,
/// }
///
/// #[derive(Serialize, Deserialize, Message)]
/// #[message(name = "accounts.created.v1")]
/// struct AccountCreated {
///     pub id: u64,
/// }
/// ```
///
/// - `#[message(name = "...")]` sets the stable type name used to derive
///   queue names. If omitted, defaults to the struct name.
/// - `#[message(response = Type)]` also implements `Request` with the given
///   response type, making the message usable with `Bus::send`.
#[proc_macro_derive(Message, attributes(message))]
pub fn derive_message(input: TokenStream) -> TokenStream {
    message::derive_message(input)
}
