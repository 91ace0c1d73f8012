//! Helper functions for implementing procedural macros.

use itertools::Itertools;
use proc_macro2::TokenStream;
use std::borrow::Borrow;
use syn::{parenthesized, parse::Parse, Attribute, Expr, Ident, Lit, Meta};

/// Parser for the helper attributes of one derive macro, such as `#[record(...)]`.
pub struct AttrParser(String);

impl AttrParser {
    /// Create a parser for attributes of the form `#[scope(name)]` (flags) or
    /// `#[scope(name(arg))]` (attributes with an argument).
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    /// Does any attribute in `attrs` set the flag `name`?
    ///
    /// # Panics
    ///
    /// Panics if an attribute in this scope is malformed.
    pub fn has_bool(&self, attrs: &[Attribute], name: &str) -> bool {
        attrs
            .iter()
            .filter_map(|a| self.parse_attr(a))
            .any(|(attr_name, arg)| attr_name == name && arg.is_none())
    }

    /// Find the attribute `name` in `attrs` and parse its argument.
    ///
    /// # Panics
    ///
    /// Panics if an attribute in this scope is malformed, or if the argument of `name` does not
    /// parse as a `T`.
    pub fn get_arg<T: Parse, I>(&self, attrs: I, name: &str) -> Option<T>
    where
        I: IntoIterator,
        I::Item: Borrow<Attribute>,
    {
        attrs.into_iter().find_map(|a| {
            let (attr_name, arg) = self.parse_attr(a.borrow())?;
            if attr_name != name {
                return None;
            }
            let arg = arg.unwrap_or_else(|| panic!("{} attribute {name} takes an argument", self.0));
            Some(syn::parse2(arg).unwrap_or_else(|_| {
                panic!(
                    "argument to {name} must be a {}",
                    std::any::type_name::<T>()
                )
            }))
        })
    }

    /// Parse an attribute in this scope into its name and optional parenthesized argument.
    ///
    /// `#[scope(foo(bar))]` parses to `Some(("foo", Some("bar")))` and `#[scope(baz)]` parses to
    /// `Some(("baz", None))`. Attributes outside this scope parse to [`None`].
    ///
    /// # Panics
    ///
    /// Panics if `a` is in scope but does not start with an identifier.
    fn parse_attr(&self, a: &Attribute) -> Option<(Ident, Option<TokenStream>)> {
        if !a.path().is_ident(&self.0) {
            return None;
        }
        let mut parsed = None;
        a.parse_nested_meta(|meta| {
            let name = meta
                .path
                .get_ident()
                .unwrap_or_else(|| panic!("{} attribute must start with an identifier", self.0))
                .clone();
            let arg = if meta.input.is_empty() {
                None
            } else {
                let content;
                parenthesized!(content in meta.input);
                Some(content.parse()?)
            };
            parsed = Some((name, arg));
            Ok(())
        })
        .unwrap_or_else(|err| panic!("malformed {} attribute: {err}", self.0));
        parsed
    }
}

/// Extract documentation from the attributes on an item.
///
/// All `#[doc = "..."]` attributes are trimmed and joined with newlines.
pub fn parse_docs(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|attr| {
            let Meta::NameValue(nv) = &attr.meta else {
                return None;
            };
            if !nv.path.is_ident("doc") {
                return None;
            }
            let Expr::Lit(lit) = &nv.value else {
                return None;
            };
            let Lit::Str(s) = &lit.lit else {
                return None;
            };
            Some(s.value().trim().to_string())
        })
        .join("\n")
}
