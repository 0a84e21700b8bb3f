extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{parse_macro_input, FnArg, ItemFn, Pat};

///
/// Turns an `async fn` taking the request context into a handler that can be
/// registered on an `Engine` or a `RouterGroup`.
///
/// ```rust, ignore
/// #[middleware_fn]
/// async fn hello(ctx: &mut Context) -> MiddlewareResult {
///     ctx.respond_text(200, "hello");
///     Ok(())
/// }
/// ```
///
/// The function body is kept as `__async_<name>` and `<name>` becomes a plain
/// function returning a boxed future. Inside the ignite crate itself use
/// `#[middleware_fn(_internal)]` so the generated paths start at `crate`.
///
#[proc_macro_attribute]
pub fn middleware_fn(attr: TokenStream, item: TokenStream) -> TokenStream {
    let is_internal = attr.to_string().trim() == "_internal";
    let mut function_item = parse_macro_input!(item as ItemFn);

    if function_item.sig.asyncness.is_none() {
        return syn::Error::new_spanned(
            function_item.sig.fn_token,
            "#[middleware_fn] can only be applied to an async fn",
        )
        .to_compile_error()
        .into();
    }

    if function_item.sig.inputs.len() != 1 {
        return syn::Error::new_spanned(
            &function_item.sig.inputs,
            "#[middleware_fn] expects exactly one argument, the context",
        )
        .to_compile_error()
        .into();
    }

    let context_ident = match function_item.sig.inputs.first() {
        Some(FnArg::Typed(arg)) => match &*arg.pat {
            Pat::Ident(pat_ident) => pat_ident.ident.clone(),
            _ => Ident::new("ctx", Span::call_site()),
        },
        _ => {
            return syn::Error::new_spanned(
                &function_item.sig.inputs,
                "#[middleware_fn] cannot be used on methods",
            )
            .to_compile_error()
            .into();
        }
    };

    let root: TokenStream2 = if is_internal {
        quote! { crate }
    } else {
        quote! { ::ignite }
    };

    let name = function_item.sig.ident.clone();
    let new_name = Ident::new(&format!("__async_{}", name), Span::call_site());
    let visibility = function_item.vis.clone();
    let docs: Vec<_> = function_item
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .cloned()
        .collect();

    function_item.sig.ident = new_name.clone();
    function_item.attrs.retain(|attr| !attr.path().is_ident("doc"));

    let gen = quote! {
        #[doc(hidden)]
        #[allow(non_snake_case)]
        #function_item

        #(#docs)*
        #visibility fn #name(
            #context_ident: &mut #root::Context,
        ) -> #root::BoxFuture<'_, #root::MiddlewareResult> {
            ::std::boxed::Box::pin(#new_name(#context_ident))
        }
    };

    gen.into()
}
