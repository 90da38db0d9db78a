use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, LitStr, Type};

struct MessageArgs {
    name: Option<LitStr>,
    response: Option<Type>,
}

pub fn derive_message(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let args = match extract_args(&input) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error().into(),
    };

    // Default: the bare struct name, so queues read `mq:CreateAccount.inq`
    let type_name = match args.name {
        Some(name) => name.value(),
        None => ident.to_string(),
    };

    let request_impl = args.response.map(|response| {
        quote! {
            impl #impl_generics mqbus::Request for #ident #ty_generics #where_clause {
                type Response = #response;
            }
        }
    });

    let expanded = quote! {
        impl #impl_generics mqbus::Message for #ident #ty_generics #where_clause {
            const TYPE: &'static str = #type_name;
        }

        #request_impl
    };

    TokenStream::from(expanded)
}

fn extract_args(input: &DeriveInput) -> syn::Result<MessageArgs> {
    let mut args = MessageArgs {
        name: None,
        response: None,
    };

    for attr in &input.attrs {
        if !attr.path().is_ident("message") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().trim().is_empty() {
                    return Err(meta.error("message name must not be empty"));
                }
                args.name = Some(value);
                Ok(())
            } else if meta.path.is_ident("response") {
                args.response = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"` or `response = Type`"))
            }
        })?;
    }

    Ok(args)
}
