//! Derive macros for dynaq.
//!
//! `#[derive(Shape)]` turns a struct into a table-backed shape: a `'static`
//! declaration for the schema compiler, one `Field` handle per persisted
//! field, and a `Document` mapper that reads and writes every attribute
//! under a literal name. `#[derive(Document)]` does the same for nested
//! records without keys or indexes.
//!
//! ```ignore
//! #[derive(Shape)]
//! #[dynaq(table = "orders", rename_all = "camelCase")]
//! struct Order {
//!     #[dynaq(partition_key)]
//!     order_id: String,
//!     #[dynaq(sort_key)]
//!     created_at: String,
//!     #[dynaq(nullable)]
//!     coupon: Option<String>,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use std::collections::BTreeMap;
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{
    parse_macro_input, Data, DeriveInput, Fields, GenericArgument, Ident, LitStr, PathArguments,
    Type,
};

#[proc_macro_derive(Shape, attributes(dynaq))]
pub fn derive_shape(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input, Kind::Shape)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[proc_macro_derive(Document, attributes(dynaq))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input, Kind::Document)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Clone, Copy, PartialEq)]
enum Kind {
    Shape,
    Document,
}

#[derive(Clone, Copy)]
enum RenameRule {
    None,
    Camel,
    Snake,
    Pascal,
}

impl RenameRule {
    fn parse(lit: &LitStr) -> syn::Result<Self> {
        match lit.value().as_str() {
            "camelCase" => Ok(RenameRule::Camel),
            "snake_case" => Ok(RenameRule::Snake),
            "PascalCase" => Ok(RenameRule::Pascal),
            other => Err(syn::Error::new(
                lit.span(),
                format!(
                    "unknown rename_all rule '{}', expected camelCase, snake_case or PascalCase",
                    other
                ),
            )),
        }
    }

    fn apply(self, field: &str) -> String {
        match self {
            RenameRule::None | RenameRule::Snake => field.to_string(),
            RenameRule::Camel => {
                let pascal = Self::Pascal.apply(field);
                let mut chars = pascal.chars();
                match chars.next() {
                    Some(first) => first.to_lowercase().chain(chars).collect(),
                    None => pascal,
                }
            }
            RenameRule::Pascal => field
                .split('_')
                .filter(|part| !part.is_empty())
                .map(|part| {
                    let mut chars = part.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect(),
        }
    }
}

struct ContainerAttrs {
    table: Option<LitStr>,
    rename_all: RenameRule,
}

fn parse_container(input: &DeriveInput) -> syn::Result<ContainerAttrs> {
    let mut attrs = ContainerAttrs {
        table: None,
        rename_all: RenameRule::None,
    };
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("dynaq")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let lit: LitStr = meta.value()?.parse()?;
                if lit.value().is_empty() {
                    return Err(meta.error("table name must not be empty"));
                }
                attrs.table = Some(lit);
                Ok(())
            } else if meta.path.is_ident("rename_all") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.rename_all = RenameRule::parse(&lit)?;
                Ok(())
            } else {
                Err(meta.error("unknown dynaq container attribute"))
            }
        })?;
    }
    Ok(attrs)
}

#[derive(Clone, Copy, PartialEq)]
enum Role {
    None,
    Partition,
    Sort,
}

struct FieldSpec {
    ident: Ident,
    ty: Type,
    name: String,
    role: Role,
    nullable: bool,
    skip: bool,
    gsi_partition: Option<LitStr>,
    gsi_sort: Option<LitStr>,
    lsi: Option<LitStr>,
    span: Span,
}

impl FieldSpec {
    fn has_index(&self) -> bool {
        self.gsi_partition.is_some() || self.gsi_sort.is_some() || self.lsi.is_some()
    }
}

fn parse_field(field: &syn::Field, rule: RenameRule) -> syn::Result<FieldSpec> {
    let ident = field
        .ident
        .clone()
        .ok_or_else(|| syn::Error::new(field.span(), "dynaq shapes need named fields"))?;
    let mut spec = FieldSpec {
        name: rule.apply(&ident.unraw().to_string()),
        ident,
        ty: field.ty.clone(),
        role: Role::None,
        nullable: false,
        skip: false,
        gsi_partition: None,
        gsi_sort: None,
        lsi: None,
        span: field.span(),
    };

    for attr in field.attrs.iter().filter(|a| a.path().is_ident("dynaq")) {
        attr.parse_nested_meta(|meta| {
            let set_role = |spec: &mut FieldSpec, role: Role| {
                if spec.role != Role::None {
                    return Err(meta.error("a field can hold only one key role"));
                }
                spec.role = role;
                Ok(())
            };
            if meta.path.is_ident("partition_key") {
                set_role(&mut spec, Role::Partition)
            } else if meta.path.is_ident("sort_key") {
                set_role(&mut spec, Role::Sort)
            } else if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                if lit.value().is_empty() {
                    return Err(meta.error("attribute name must not be empty"));
                }
                spec.name = lit.value();
                Ok(())
            } else if meta.path.is_ident("nullable") {
                spec.nullable = true;
                Ok(())
            } else if meta.path.is_ident("skip") {
                spec.skip = true;
                Ok(())
            } else if meta.path.is_ident("gsi_partition") {
                spec.gsi_partition = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("gsi_sort") {
                spec.gsi_sort = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("lsi") {
                spec.lsi = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unknown dynaq field attribute"))
            }
        })?;
    }

    if spec.skip && (spec.role != Role::None || spec.nullable || spec.has_index()) {
        return Err(syn::Error::new(
            spec.span,
            "a skipped field cannot carry other dynaq attributes",
        ));
    }
    if spec.role != Role::None {
        if spec.nullable {
            return Err(syn::Error::new(spec.span, "key attributes cannot be nullable"));
        }
        if option_inner(&spec.ty).is_some() {
            return Err(syn::Error::new(spec.ty.span(), "key attributes cannot be optional"));
        }
    }
    Ok(spec)
}

/// `T` for a field written as `Option<T>`
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    if path.qself.is_some() {
        return None;
    }
    let last = path.path.segments.last()?;
    if last.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    match args.args.first() {
        Some(GenericArgument::Type(inner)) if args.args.len() == 1 => Some(inner),
        _ => None,
    }
}

struct IndexSpec {
    global: bool,
    partition: Option<String>,
    sort: Option<String>,
    span: Span,
}

/// Group per-field index memberships by index name, enforcing one partition
/// and one sort attribute per index.
fn collect_indexes(fields: &[FieldSpec]) -> syn::Result<BTreeMap<String, IndexSpec>> {
    let mut indexes: BTreeMap<String, IndexSpec> = BTreeMap::new();
    let mut add = |lit: &LitStr, global: bool, partition: bool, attribute: &str| -> syn::Result<()> {
        let entry = indexes.entry(lit.value()).or_insert_with(|| IndexSpec {
            global,
            partition: None,
            sort: None,
            span: lit.span(),
        });
        if entry.global != global {
            return Err(syn::Error::new(
                lit.span(),
                format!("index '{}' is declared both local and global", lit.value()),
            ));
        }
        let slot = if partition { &mut entry.partition } else { &mut entry.sort };
        if slot.replace(attribute.to_string()).is_some() {
            let which = if partition { "partition" } else { "sort" };
            return Err(syn::Error::new(
                lit.span(),
                format!("index '{}' has more than one {} attribute", lit.value(), which),
            ));
        }
        Ok(())
    };

    for field in fields {
        if let Some(lit) = &field.gsi_partition {
            add(lit, true, true, &field.name)?;
        }
        if let Some(lit) = &field.gsi_sort {
            add(lit, true, false, &field.name)?;
        }
        if let Some(lit) = &field.lsi {
            add(lit, false, false, &field.name)?;
        }
    }

    for (name, index) in &indexes {
        if index.global && index.partition.is_none() {
            return Err(syn::Error::new(
                index.span,
                format!("global index '{}' has no gsi_partition attribute", name),
            ));
        }
    }
    Ok(indexes)
}

fn expand(input: &DeriveInput, kind: Kind) -> syn::Result<TokenStream2> {
    let derive = match kind {
        Kind::Shape => "Shape",
        Kind::Document => "Document",
    };
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            format!("#[derive({})] does not support generic types", derive),
        ));
    }
    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new(
                    input.ident.span(),
                    format!("#[derive({})] needs a struct with named fields", derive),
                ))
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.ident.span(),
                format!("#[derive({})] only supports structs", derive),
            ))
        }
    };

    let container = parse_container(input)?;
    let fields = named
        .iter()
        .map(|f| parse_field(f, container.rename_all))
        .collect::<syn::Result<Vec<_>>>()?;

    let mut seen: BTreeMap<&str, Span> = BTreeMap::new();
    for field in fields.iter().filter(|f| !f.skip) {
        if seen.insert(field.name.as_str(), field.span).is_some() {
            return Err(syn::Error::new(
                field.span,
                format!("duplicate attribute name '{}'", field.name),
            ));
        }
    }

    let mut tokens = expand_mapper(input, &fields);
    match kind {
        Kind::Shape => tokens.extend(expand_shape(input, &container, &fields)?),
        Kind::Document => {
            if let Some(table) = &container.table {
                return Err(syn::Error::new(
                    table.span(),
                    "nested documents have no table, use #[derive(Shape)]",
                ));
            }
            if let Some(field) = fields.iter().find(|f| f.role != Role::None || f.has_index()) {
                return Err(syn::Error::new(
                    field.span,
                    "keys and indexes are only allowed on #[derive(Shape)]",
                ));
            }
        }
    }
    Ok(tokens)
}

/// `Document` and `AttributeCodec` impls shared by both derives
fn expand_mapper(input: &DeriveInput, fields: &[FieldSpec]) -> TokenStream2 {
    let ident = &input.ident;
    let type_name = ident.unraw().to_string();
    let persisted: Vec<_> = fields.iter().filter(|f| !f.skip).collect();
    let capacity = persisted.len();

    let encodes = persisted.iter().map(|f| {
        let field = &f.ident;
        let name = &f.name;
        let nullable = f.nullable;
        quote! {
            ::dynaq_core::encode_attribute(&mut item, #name, &self.#field, #nullable);
        }
    });

    let decodes = fields.iter().map(|f| {
        let field = &f.ident;
        if f.skip {
            quote! { #field: ::std::default::Default::default() }
        } else {
            let name = &f.name;
            quote! { #field: ::dynaq_core::decode_attribute(item, #name)? }
        }
    });

    quote! {
        impl ::dynaq_core::Document for #ident {
            fn to_item(&self) -> ::dynaq_core::Item {
                let mut item = ::std::collections::HashMap::with_capacity(#capacity);
                #(#encodes)*
                item
            }

            fn from_item(item: &::dynaq_core::Item) -> ::dynaq_core::Result<Self> {
                ::std::result::Result::Ok(Self {
                    #(#decodes,)*
                })
            }
        }

        impl ::dynaq_core::AttributeCodec for #ident {
            fn kind() -> ::dynaq_core::AttributeKind {
                ::dynaq_core::AttributeKind::Document(::std::string::String::from(#type_name))
            }

            fn encode(&self) -> ::std::option::Option<::dynaq_core::AttributeValue> {
                ::std::option::Option::Some(::dynaq_core::AttributeValue::M(
                    ::dynaq_core::Document::to_item(self),
                ))
            }

            fn decode(value: &::dynaq_core::AttributeValue) -> ::dynaq_core::Result<Self> {
                match value {
                    ::dynaq_core::AttributeValue::M(map) => {
                        <Self as ::dynaq_core::Document>::from_item(map)
                    }
                    other => ::std::result::Result::Err(::dynaq_core::Error::type_mismatch(
                        "",
                        <Self as ::dynaq_core::AttributeCodec>::kind(),
                        other.wire_type(),
                    )),
                }
            }
        }
    }
}

fn expand_shape(
    input: &DeriveInput,
    container: &ContainerAttrs,
    fields: &[FieldSpec],
) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let vis = &input.vis;
    let shape_name = ident.unraw().to_string();
    let table = container.table.as_ref().ok_or_else(|| {
        syn::Error::new(
            ident.span(),
            "#[derive(Shape)] needs #[dynaq(table = \"...\")]",
        )
    })?;

    let persisted: Vec<&FieldSpec> = fields.iter().filter(|f| !f.skip).collect();
    let mut partition = None;
    let mut sort = None;
    for field in &persisted {
        let slot = match field.role {
            Role::Partition => &mut partition,
            Role::Sort => &mut sort,
            Role::None => continue,
        };
        if slot.replace(*field).is_some() {
            let which = if field.role == Role::Partition { "partition" } else { "sort" };
            return Err(syn::Error::new(
                field.span,
                format!("more than one {} key", which),
            ));
        }
    }
    let partition = partition.ok_or_else(|| {
        syn::Error::new(ident.span(), "missing #[dynaq(partition_key)] field")
    })?;

    let indexes = collect_indexes(fields)?;
    for (name, index) in &indexes {
        if !index.global && index.sort.is_none() {
            return Err(syn::Error::new(
                index.span,
                format!("local index '{}' needs a sort attribute", name),
            ));
        }
    }

    let handles = persisted.iter().map(|f| {
        let const_name = format_ident!("{}", f.ident.unraw().to_string().to_uppercase());
        let name = &f.name;
        let handle_ty = option_inner(&f.ty).unwrap_or(&f.ty);
        quote! {
            #vis const #const_name: ::dynaq_core::Field<#ident, #handle_ty> =
                ::dynaq_core::Field::new(#name);
        }
    });

    let attributes = persisted.iter().map(|f| {
        let name = &f.name;
        let ty = &f.ty;
        let nullable = f.nullable;
        let role = match f.role {
            Role::None => quote!(None),
            Role::Partition => quote!(Partition),
            Role::Sort => quote!(Sort),
        };
        quote! {
            ::dynaq_core::schema::AttributeDeclaration {
                name: #name,
                kind: <#ty as ::dynaq_core::AttributeCodec>::kind,
                optional: <#ty as ::dynaq_core::AttributeCodec>::OPTIONAL,
                nullable: #nullable,
                role: ::dynaq_core::schema::KeyRole::#role,
            }
        }
    });
    let attribute_count = persisted.len();

    let index_decls = indexes.iter().map(|(name, index)| {
        let kind = if index.global { quote!(Global) } else { quote!(Local) };
        let partition = option_tokens(index.partition.as_deref());
        let sort = option_tokens(index.sort.as_deref());
        quote! {
            ::dynaq_core::schema::IndexDeclaration {
                name: #name,
                kind: ::dynaq_core::schema::IndexKind::#kind,
                partition: #partition,
                sort: #sort,
            }
        }
    });
    let index_count = indexes.len();

    // Key types are checked by trait bound so a bad key type fails to compile.
    let key_types = std::iter::once(partition)
        .chain(sort)
        .chain(persisted.iter().copied().filter(|f| f.has_index() && f.role == Role::None))
        .map(|f| {
            let ty = option_inner(&f.ty).unwrap_or(&f.ty);
            quote!(assert_key::<#ty>();)
        });

    Ok(quote! {
        impl #ident {
            #(#handles)*
        }

        impl ::dynaq_core::Shape for #ident {
            fn declaration() -> &'static ::dynaq_core::schema::ShapeDeclaration {
                static ATTRIBUTES: [::dynaq_core::schema::AttributeDeclaration; #attribute_count] = [
                    #(#attributes,)*
                ];
                static INDEXES: [::dynaq_core::schema::IndexDeclaration; #index_count] = [
                    #(#index_decls,)*
                ];
                static DECLARATION: ::dynaq_core::schema::ShapeDeclaration =
                    ::dynaq_core::schema::ShapeDeclaration {
                        name: #shape_name,
                        table: #table,
                        attributes: &ATTRIBUTES,
                        indexes: &INDEXES,
                    };
                &DECLARATION
            }
        }

        const _: fn() = || {
            fn assert_key<T: ::dynaq_core::KeyAttribute>() {}
            #(#key_types)*
        };
    })
}

fn option_tokens(value: Option<&str>) -> TokenStream2 {
    match value {
        Some(v) => quote!(::std::option::Option::Some(#v)),
        None => quote!(::std::option::Option::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_rules() {
        assert_eq!(RenameRule::Camel.apply("order_id"), "orderId");
        assert_eq!(RenameRule::Camel.apply("total"), "total");
        assert_eq!(RenameRule::Pascal.apply("created_at"), "CreatedAt");
        assert_eq!(RenameRule::Snake.apply("created_at"), "created_at");
        assert_eq!(RenameRule::None.apply("createdAt"), "createdAt");
    }

    #[test]
    fn test_option_inner() {
        let ty: Type = syn::parse_quote!(Option<String>);
        assert!(option_inner(&ty).is_some());
        let ty: Type = syn::parse_quote!(std::option::Option<Vec<u8>>);
        assert!(option_inner(&ty).is_some());
        let ty: Type = syn::parse_quote!(Vec<String>);
        assert!(option_inner(&ty).is_none());
    }

    #[test]
    fn test_shape_expansion_rejects_bad_keys() {
        let input: DeriveInput = syn::parse_quote! {
            #[dynaq(table = "t")]
            struct NoKey {
                id: String,
            }
        };
        let err = expand(&input, Kind::Shape).unwrap_err();
        assert!(err.to_string().contains("missing #[dynaq(partition_key)]"));

        let input: DeriveInput = syn::parse_quote! {
            #[dynaq(table = "t")]
            struct TwoSorts {
                #[dynaq(partition_key)]
                id: String,
                #[dynaq(sort_key)]
                a: String,
                #[dynaq(sort_key)]
                b: String,
            }
        };
        let err = expand(&input, Kind::Shape).unwrap_err();
        assert!(err.to_string().contains("more than one sort key"));

        let input: DeriveInput = syn::parse_quote! {
            #[dynaq(table = "t")]
            struct OptionalKey {
                #[dynaq(partition_key)]
                id: Option<String>,
            }
        };
        assert!(expand(&input, Kind::Shape).is_err());
    }

    #[test]
    fn test_shape_expansion_checks_names_and_indexes() {
        let input: DeriveInput = syn::parse_quote! {
            #[dynaq(table = "t", rename_all = "camelCase")]
            struct Clash {
                #[dynaq(partition_key)]
                user_id: String,
                #[dynaq(rename = "userId")]
                other: String,
            }
        };
        let err = expand(&input, Kind::Shape).unwrap_err();
        assert!(err.to_string().contains("duplicate attribute name 'userId'"));

        let input: DeriveInput = syn::parse_quote! {
            #[dynaq(table = "t")]
            struct SortOnly {
                #[dynaq(partition_key)]
                id: String,
                #[dynaq(gsi_sort = "byDate")]
                date: String,
            }
        };
        let err = expand(&input, Kind::Shape).unwrap_err();
        assert!(err.to_string().contains("no gsi_partition"));

        let input: DeriveInput = syn::parse_quote! {
            #[dynaq(table = "t")]
            struct Indexed {
                #[dynaq(partition_key)]
                id: String,
                #[dynaq(gsi_partition = "byEmail")]
                email: String,
                #[dynaq(skip)]
                cache: Vec<u8>,
            }
        };
        let tokens = expand(&input, Kind::Shape).unwrap().to_string();
        assert!(tokens.contains("IndexKind :: Global"));
        assert!(tokens.contains("const EMAIL"));
        assert!(!tokens.contains("const CACHE"));
    }

    #[test]
    fn test_document_rejects_keys() {
        let input: DeriveInput = syn::parse_quote! {
            struct Nested {
                #[dynaq(partition_key)]
                id: String,
            }
        };
        assert!(expand(&input, Kind::Document).is_err());

        let input: DeriveInput = syn::parse_quote! {
            #[dynaq(rename_all = "PascalCase")]
            struct Address {
                street_name: String,
            }
        };
        let tokens = expand(&input, Kind::Document).unwrap().to_string();
        assert!(tokens.contains("\"StreetName\""));
    }
}
