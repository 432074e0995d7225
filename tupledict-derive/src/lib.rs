use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// Derive macro for the `HasIdentity` trait.
///
/// The identity is the type's tag followed by every field marked
/// `#[identity]`, in declaration order, each rendered with `Display` and
/// separated by `:`.
///
/// # Example
///
/// ```ignore
/// use tupledict_core::HasIdentity;
///
/// #[derive(HasIdentity)]
/// struct Account {
///     #[identity]
///     bank: String,
///     #[identity]
///     number: u64,
///     balance: i64,
/// }
///
/// // identity() == "Account:acme:42"
/// ```
///
/// # Attributes
///
/// - `#[identity]` on a field - include the field in the identity
/// - `#[identity(tag = "name")]` on the struct - use a custom tag instead of the type name
#[proc_macro_derive(HasIdentity, attributes(identity))]
pub fn derive_has_identity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_has_identity_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_has_identity_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let data = match &input.data {
        syn::Data::Struct(data) => data,
        syn::Data::Enum(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "HasIdentity can only be derived for structs",
            ));
        }
        syn::Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "HasIdentity cannot be derived for unions",
            ));
        }
    };

    let tag = parse_container_attrs(&input.attrs)?
        .tag
        .unwrap_or_else(|| name.to_string());
    let parts = identity_fields(&data.fields)?;

    if parts.is_empty() {
        return Err(syn::Error::new_spanned(
            name,
            "HasIdentity requires at least one field marked #[identity]",
        ));
    }

    Ok(quote! {
        impl #impl_generics ::tupledict_core::HasIdentity for #name #ty_generics #where_clause {
            fn identity(&self) -> ::std::string::String {
                let mut identity = ::std::string::String::from(#tag);
                #(
                    identity.push(':');
                    identity.push_str(&::std::string::ToString::to_string(&#parts));
                )*
                identity
            }
        }
    })
}

/// Accessor expressions for the fields marked `#[identity]`.
fn identity_fields(fields: &syn::Fields) -> syn::Result<Vec<proc_macro2::TokenStream>> {
    let mut parts = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        if !is_identity_field(&field.attrs)? {
            continue;
        }
        match &field.ident {
            Some(ident) => parts.push(quote! { self.#ident }),
            None => {
                let idx = syn::Index::from(i);
                parts.push(quote! { self.#idx });
            }
        }
    }
    Ok(parts)
}

/// A field is marked by a bare `#[identity]`; arguments belong on the struct.
fn is_identity_field(attrs: &[syn::Attribute]) -> syn::Result<bool> {
    let mut marked = false;
    for attr in attrs {
        if !attr.path().is_ident("identity") {
            continue;
        }
        if !matches!(attr.meta, syn::Meta::Path(_)) {
            return Err(syn::Error::new_spanned(
                attr,
                "#[identity] on a field takes no arguments",
            ));
        }
        marked = true;
    }
    Ok(marked)
}

#[derive(Default)]
struct ContainerAttrs {
    tag: Option<String>,
}

fn parse_container_attrs(attrs: &[syn::Attribute]) -> syn::Result<ContainerAttrs> {
    let mut result = ContainerAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("identity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("tag") {
                let value: syn::LitStr = meta.value()?.parse()?;
                result.tag = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported identity attribute"))
            }
        })?;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn bare_field_marker_accepted() {
        let input: DeriveInput = parse_quote! {
            struct Account {
                #[identity]
                number: u64,
                balance: i64,
            }
        };
        let tokens = derive_has_identity_impl(&input).unwrap().to_string();
        assert!(tokens.contains("number"));
        assert!(!tokens.contains("balance"));
    }

    #[test]
    fn field_marker_with_arguments_rejected() {
        let input: DeriveInput = parse_quote! {
            struct Account {
                #[identity(tag = "x")]
                number: u64,
            }
        };
        let err = derive_has_identity_impl(&input).unwrap_err();
        assert!(err.to_string().contains("takes no arguments"));
    }

    #[test]
    fn unmarked_struct_rejected() {
        let input: DeriveInput = parse_quote! {
            struct Account(u64);
        };
        assert!(derive_has_identity_impl(&input).is_err());
    }
}
