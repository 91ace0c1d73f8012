//! Derive macros for the `batched_graphql` crate.

use proc_macro::TokenStream;
use syn::parse_macro_input;

mod helpers;
mod record;

/// Derive an implementation of `Record`, and typed column markers, for a struct.
///
/// Loaders need to pull keys out of the records returned by a persistence query: the primary key
/// of each record for one-to-one loaders, and a foreign key for one-to-many loaders which group
/// records back under the key that requested them. This macro generates that plumbing.
///
/// Specifically, the following items are generated:
/// * An implementation of `Record` for the struct, naming the record in logs and errors.
/// * A unit struct for each field tagged with the [`column`](#field-attributes) attribute,
///   implementing `Column<Struct>`. The column's key type is the type of the field, which must
///   implement `FetchKey`. The unit structs are the field names converted to PascalCase, and are
///   placed in a module with the same visibility as the original struct. The name of that module
///   is, by default, the name of the struct converted to snake_case. This can be changed with the
///   [`module`](#struct-attributes) attribute.
///
/// If the original struct is private, the generated unit structs are `pub(super)`, so that they
/// are visible one level up from the generated module, in the scope where the original struct was
/// defined. Documentation on a tagged field is propagated to its unit struct.
///
/// # Examples
///
/// ```
/// # mod example {
/// use batched_graphql::{key::EntityId, record::{Column, Record}};
///
/// #[derive(Clone, Record)]
/// struct Comment {
///     #[record(column)]
///     id: EntityId,
///     /// The post this comment was left on.
///     #[record(column)]
///     post_id: EntityId,
///     body: String,
/// }
///
/// # pub fn example() {
/// let comment = Comment {
///     id: EntityId::random(),
///     post_id: EntityId::random(),
///     body: "First!".into(),
/// };
/// assert_eq!(comment::PostId::of(&comment), &comment.post_id);
/// assert_eq!(<comment::PostId as Column<Comment>>::NAME, "post_id");
/// assert_eq!(<Comment as Record>::NAME, "Comment");
/// # }
/// # }
/// # example::example();
/// ```
///
/// # Struct attributes
///
/// | Attribute     | Description                                             | Arg     | Required |
/// |---------------|---------------------------------------------------------|---------|----------|
/// | module        | Override the default module name for the column markers. The name defaults to the snake_case version of the struct name. | ident | no |
///
/// # Field attributes
///
/// | Attribute     | Description                                             | Arg    | Required |
/// |---------------|---------------------------------------------------------|---------|----------|
/// | column        | Generate a column marker for this field, so that loaders can fetch and group records by it. | n/a | no |
///
#[proc_macro_derive(Record, attributes(record))]
pub fn record(input: TokenStream) -> TokenStream {
    record::derive(parse_macro_input!(input)).into()
}
