use proc_macro::TokenStream;
use quote::quote;
use syn::*;

/// Optional `"name"` argument of the region attributes
fn parse_name(attr: TokenStream) -> Result<Option<String>> {
    if attr.is_empty() {
        return Ok(None);
    }

    let name: LitStr = syn::parse(attr)?;
    if name.value().is_empty() {
        return Err(Error::new(name.span(), "region name cannot be empty"));
    }

    Ok(Some(name.value()))
}

/// Open a region named `name` before the first statement of `block`
fn bracket(block: &mut Block, name: &str) {
    let guard: Stmt = syn::parse_quote! {
        streamtrace::region!(#name);
    };

    block.stmts.insert(0, guard);
}

/// Bracket the whole body of a function with the globally installed instruments.
///
/// The region is named after the function unless a name is given:
/// `#[region_fn]` or `#[region_fn("triad_pass")]`.
#[proc_macro_attribute]
pub fn region_fn(attr: TokenStream, item: TokenStream) -> TokenStream {
    let name = match parse_name(attr) {
        Ok(name) => name,
        Err(err) => return err.to_compile_error().into(),
    };

    let mut func = parse_macro_input!(item as ItemFn);
    let name = name.unwrap_or_else(|| func.sig.ident.to_string());

    bracket(&mut func.block, &name);

    quote! { #func }.into()
}

// Last path segment of the implementing type, generics dropped
fn type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(TypePath { path, .. }) => {
            path.segments.last().map(|segment| segment.ident.to_string())
        }
        Type::Reference(reference) => type_name(&reference.elem),
        _ => None,
    }
}

/// Bracket every method of an impl block, naming each region `Prefix::method`.
///
/// The prefix is the implementing type unless one is given, as in
/// `#[region_impl("solver")]`. Only the outermost call opens the tools, so
/// methods calling each other are bracketed once.
#[proc_macro_attribute]
pub fn region_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let prefix = match parse_name(attr) {
        Ok(prefix) => prefix,
        Err(err) => return err.to_compile_error().into(),
    };

    let mut impl_block = parse_macro_input!(item as ItemImpl);

    let prefix = prefix
        .or_else(|| type_name(&impl_block.self_ty))
        .unwrap_or_else(|| "UnknownType".to_string());

    for method in impl_block.items.iter_mut().filter_map(|item| match item {
        ImplItem::Fn(method) => Some(method),
        _ => None,
    }) {
        let name = format!("{prefix}::{}", method.sig.ident);
        bracket(&mut method.block, &name);
    }

    quote! { #impl_block }.into()
}
