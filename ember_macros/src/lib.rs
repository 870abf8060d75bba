//! Derive macros for `ember`.
//!
//! `#[derive(ToSchema)]` turns a struct or unit-only enum into an explicit schema
//! descriptor: one entry per field carrying its external name, whether it is
//! required, and the format/example/bounds hints given through `#[schema(...)]`.
//!
//! Container attributes:
//! - `#[schema(rename = "...")]` - component name (defaults to the type name)
//! - `#[schema(template = "item.html")]` - render responses of this type through templates
//! - `#[schema(transform)]` - the type provides its own `InTransform` impl
//! - `#[schema(description = "...")]`
//!
//! Field attributes:
//! - `#[schema(rename = "...")]`, `#[schema(required)]`, `#[schema(skip)]`, `#[schema(flatten)]`
//! - `#[schema(format = "...")]`, `#[schema(example = "...")]`, `#[schema(description = "...")]`
//! - `#[schema(min_length = N, max_length = N, minimum = N, maximum = N, pattern = "...")]`
//!
//! `#[serde(rename = "...")]`, `#[serde(rename_all = "...")]`, `#[serde(skip)]` and
//! `#[serde(flatten)]` are honoured so the schema matches the wire names serde produces.
//! One-directional skips (`skip_serializing`, `skip_deserializing`) keep the field,
//! since the same schema describes both request and response bodies.
//!
//! Generic types get one component per instantiation: `Page<User>` is named
//! `Page_User` so it never collides with `Page<i64>`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    meta::ParseNestedMeta, parenthesized, parse_macro_input, parse_quote, Attribute, Data,
    DeriveInput, Expr, ExprLit, Fields, Lit, LitStr, Meta, MetaNameValue, Token,
};

#[proc_macro_derive(ToSchema, attributes(schema))]
pub fn derive_to_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct ContainerAttrs {
    rename: Option<String>,
    template: Option<String>,
    description: Option<String>,
    transform: bool,
    rename_all: Option<String>,
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    required: bool,
    skip: bool,
    flatten: bool,
    format: Option<String>,
    example: Option<String>,
    description: Option<String>,
    pattern: Option<String>,
    min_length: Option<Expr>,
    max_length: Option<Expr>,
    minimum: Option<Expr>,
    maximum: Option<Expr>,
}

fn string_value(meta: &ParseNestedMeta) -> syn::Result<String> {
    let lit: LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

/// Consume whatever follows a serde key we do not care about.
fn skip_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        parenthesized!(content in meta.input);
        content.parse::<TokenStream2>()?;
    }
    Ok(())
}

fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(MetaNameValue {
                value: Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }),
                ..
            }) => Some(s.value().trim().to_string()),
            _ => None,
        })
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

impl ContainerAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();
        for attr in attrs {
            if attr.path().is_ident("schema") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") {
                        out.rename = Some(string_value(&meta)?);
                    } else if meta.path.is_ident("template") {
                        out.template = Some(string_value(&meta)?);
                    } else if meta.path.is_ident("description") {
                        out.description = Some(string_value(&meta)?);
                    } else if meta.path.is_ident("transform") {
                        out.transform = true;
                    } else {
                        return Err(meta.error("unsupported schema container attribute"));
                    }
                    Ok(())
                })?;
            } else if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename_all") {
                        out.rename_all = Some(string_value(&meta)?);
                    } else {
                        skip_value(&meta)?;
                    }
                    Ok(())
                })?;
            }
        }
        if out.description.is_none() {
            out.description = doc_comment(attrs);
        }
        Ok(out)
    }
}

impl FieldAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();
        let mut serde_rename = None;
        for attr in attrs {
            if attr.path().is_ident("schema") {
                attr.parse_nested_meta(|meta| {
                    let path = &meta.path;
                    if path.is_ident("rename") {
                        out.rename = Some(string_value(&meta)?);
                    } else if path.is_ident("required") {
                        out.required = true;
                    } else if path.is_ident("skip") {
                        out.skip = true;
                    } else if path.is_ident("flatten") {
                        out.flatten = true;
                    } else if path.is_ident("format") {
                        out.format = Some(string_value(&meta)?);
                    } else if path.is_ident("example") {
                        out.example = Some(string_value(&meta)?);
                    } else if path.is_ident("description") {
                        out.description = Some(string_value(&meta)?);
                    } else if path.is_ident("pattern") {
                        out.pattern = Some(string_value(&meta)?);
                    } else if path.is_ident("min_length") {
                        out.min_length = Some(meta.value()?.parse()?);
                    } else if path.is_ident("max_length") {
                        out.max_length = Some(meta.value()?.parse()?);
                    } else if path.is_ident("minimum") {
                        out.minimum = Some(meta.value()?.parse()?);
                    } else if path.is_ident("maximum") {
                        out.maximum = Some(meta.value()?.parse()?);
                    } else {
                        return Err(meta.error("unsupported schema field attribute"));
                    }
                    Ok(())
                })?;
            } else if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                        serde_rename = Some(string_value(&meta)?);
                    } else if meta.path.is_ident("skip") {
                        out.skip = true;
                    } else if meta.path.is_ident("flatten") {
                        out.flatten = true;
                    } else {
                        skip_value(&meta)?;
                    }
                    Ok(())
                })?;
            }
        }
        if out.rename.is_none() {
            out.rename = serde_rename;
        }
        if out.description.is_none() {
            out.description = doc_comment(attrs);
        }
        Ok(out)
    }
}

fn snake_to_camel(name: &str, upper_first: bool) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = upper_first;
    for ch in name.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn pascal_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(ch.to_lowercase());
    }
    out
}

/// Apply a serde `rename_all` rule. Fields are snake_case idents, variants PascalCase.
fn rename_rule(rule: &str, name: &str, is_variant: bool) -> String {
    let snake = if is_variant {
        pascal_to_snake(name)
    } else {
        name.to_string()
    };
    match rule {
        "lowercase" => name.to_lowercase(),
        "UPPERCASE" => name.to_uppercase(),
        "snake_case" => snake,
        "SCREAMING_SNAKE_CASE" => snake.to_uppercase(),
        "kebab-case" => snake.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => snake.replace('_', "-").to_uppercase(),
        "camelCase" => snake_to_camel(&snake, false),
        "PascalCase" => snake_to_camel(&snake, true),
        _ => name.to_string(),
    }
}

fn opt_str(value: &Option<String>) -> TokenStream2 {
    match value {
        Some(s) => quote! { ::core::option::Option::Some(#s) },
        None => quote! { ::core::option::Option::None },
    }
}

fn opt_cast(value: &Option<Expr>, ty: TokenStream2) -> TokenStream2 {
    match value {
        Some(expr) => quote! { ::core::option::Option::Some((#expr) as #ty) },
        None => quote! { ::core::option::Option::None },
    }
}

fn field_name(ident: &syn::Ident, attrs: &FieldAttrs, container: &ContainerAttrs) -> String {
    if let Some(name) = &attrs.rename {
        return name.clone();
    }
    let raw = ident.to_string();
    let raw = raw.trim_start_matches("r#");
    match &container.rename_all {
        Some(rule) => rename_rule(rule, raw, false),
        None => raw.to_string(),
    }
}

fn is_option(ty: &syn::Type) -> bool {
    match ty {
        syn::Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}

/// Merge the properties of a `#[serde(flatten)]` field into the parent object.
fn flatten_statement(ty: &syn::Type) -> TokenStream2 {
    // an optional flattened struct makes none of its fields required
    let is_required = if is_option(ty) {
        quote! { false }
    } else {
        quote! { required.contains(&key) }
    };
    quote! {
        {
            #[allow(unused_variables)]
            let ::ember::schema::Schema {
                properties,
                required,
                additional_properties,
                ..
            } = <#ty as ::ember::schema::ToSchema>::schema();
            for (key, property) in properties {
                let is_required = #is_required;
                schema.insert_property(&key, property, is_required);
            }
            if additional_properties.is_some() {
                schema.additional_properties = additional_properties;
            }
        }
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let container = ContainerAttrs::parse(&input.attrs)?;
    let schema_name = container
        .rename
        .clone()
        .unwrap_or_else(|| ident.to_string());

    let body = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => {
                let mut statements = Vec::with_capacity(fields.named.len());
                for field in &fields.named {
                    let attrs = FieldAttrs::parse(&field.attrs)?;
                    if attrs.skip {
                        continue;
                    }
                    let Some(field_ident) = field.ident.as_ref() else {
                        continue;
                    };
                    let ty = &field.ty;
                    if attrs.flatten {
                        statements.push(flatten_statement(ty));
                        continue;
                    }
                    let name = field_name(field_ident, &attrs, &container);
                    let required = attrs.required;
                    let format = opt_str(&attrs.format);
                    let example = opt_str(&attrs.example);
                    let description = opt_str(&attrs.description);
                    let pattern = opt_str(&attrs.pattern);
                    let min_length = opt_cast(&attrs.min_length, quote!(u64));
                    let max_length = opt_cast(&attrs.max_length, quote!(u64));
                    let minimum = opt_cast(&attrs.minimum, quote!(f64));
                    let maximum = opt_cast(&attrs.maximum, quote!(f64));
                    statements.push(quote! {
                        {
                            let mut property = <#ty as ::ember::schema::ToSchema>::schema();
                            property.apply_meta(&::ember::schema::FieldMeta {
                                format: #format,
                                example: #example,
                                description: #description,
                                pattern: #pattern,
                                min_length: #min_length,
                                max_length: #max_length,
                                minimum: #minimum,
                                maximum: #maximum,
                            });
                            schema.insert_property(#name, property, #required);
                        }
                    });
                }
                quote! {
                    let mut schema = ::ember::schema::Schema::object();
                    #(#statements)*
                    schema
                }
            }
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
                let ty = &fields.unnamed[0].ty;
                quote! { <#ty as ::ember::schema::ToSchema>::schema() }
            }
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "ToSchema supports named structs, newtypes and unit structs",
                ))
            }
            Fields::Unit => quote! { ::ember::schema::Schema::object() },
        },
        Data::Enum(data) => {
            let mut names = Vec::with_capacity(data.variants.len());
            for variant in &data.variants {
                if !matches!(variant.fields, Fields::Unit) {
                    return Err(syn::Error::new_spanned(
                        variant,
                        "ToSchema only supports enums with unit variants",
                    ));
                }
                let attrs = FieldAttrs::parse(&variant.attrs)?;
                if attrs.skip {
                    continue;
                }
                let name = match (&attrs.rename, &container.rename_all) {
                    (Some(name), _) => name.clone(),
                    (None, Some(rule)) => rename_rule(rule, &variant.ident.to_string(), true),
                    (None, None) => variant.ident.to_string(),
                };
                names.push(name);
            }
            quote! { ::ember::schema::Schema::string_enum(&[#(#names),*]) }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                ident,
                "ToSchema cannot be derived for unions",
            ))
        }
    };

    let description = container.description.as_ref().map(|d| {
        quote! { schema.description = ::core::option::Option::Some(#d.to_string()); }
    });

    let template = container.template.as_ref().map(|t| {
        quote! {
            fn template_name() -> ::core::option::Option<&'static str> {
                ::core::option::Option::Some(#t)
            }
        }
    });

    let mut generics = input.generics.clone();
    let type_params: Vec<syn::Ident> = generics
        .type_params()
        .map(|param| param.ident.clone())
        .collect();
    {
        let where_clause = generics.make_where_clause();
        for param in &type_params {
            where_clause
                .predicates
                .push(parse_quote!(#param: ::ember::schema::ToSchema));
        }
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let schema_name = if type_params.is_empty() {
        quote! { ::core::option::Option::Some(#schema_name) }
    } else {
        quote! {
            ::core::option::Option::Some(::ember::schema::generic_schema_name::<Self>(|| {
                let labels: ::std::vec::Vec<::std::string::String> =
                    ::std::vec![#(::ember::schema::type_label::<#type_params>()),*];
                ::std::format!("{}_{}", #schema_name, labels.join("_"))
            }))
        }
    };

    let transform = if container.transform {
        None
    } else {
        Some(quote! {
            impl #impl_generics ::ember::InTransform for #ident #ty_generics #where_clause {}
        })
    };

    Ok(quote! {
        impl #impl_generics ::ember::schema::ToSchema for #ident #ty_generics #where_clause {
            fn schema_name() -> ::core::option::Option<&'static str> {
                #schema_name
            }

            #template

            fn schema() -> ::ember::schema::Schema {
                #[allow(unused_mut)]
                let mut schema = { #body };
                #description
                schema
            }
        }

        #transform
    })
}
