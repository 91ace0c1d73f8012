//! Rejection of pathologically deep queries before execution.
//!
//! The object graph is cyclic (a user's posts have an author, who has posts, ...), so a client can
//! write a query which fans out arbitrarily far. [`DepthGuard`] measures how deeply the fields of
//! each operation nest, and rejects the document if any operation exceeds the configured limit.
//!
//! Depth is counted as follows:
//! * The root fields of an operation are at depth 0.
//! * The fields in a field's selection set are one level deeper than that field.
//! * Fragment spreads and inline fragments do not add a level: their fields are counted at the level
//!   where the fragment is used.
//! * Introspection fields (names starting with `__`) are ignored, along with everything they select.
//! * A fragment which spreads itself, directly or through other fragments, is unboundedly deep.

use async_graphql::{
    parser::{
        types::{ExecutableDocument, FragmentDefinition, Selection, SelectionSet},
        Pos, Positioned,
    },
    Name, ServerError,
};
use snafu::Snafu;
use std::collections::HashMap;

/// An operation which nests deeper than allowed.
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(display(
    "{} exceeds maximum operation depth of {max_depth}",
    match operation {
        Some(name) => format!("'{name}'"),
        None => "operation".to_string(),
    }
))]
pub struct Violation {
    /// The name of the operation, if it has one.
    pub operation: Option<String>,
    /// The depth of the operation.
    pub depth: usize,
    /// The configured limit.
    pub max_depth: usize,
    /// Where the operation starts in the query text.
    pub pos: Pos,
}

impl From<Violation> for ServerError {
    fn from(violation: Violation) -> Self {
        ServerError::new(violation.to_string(), Some(violation.pos))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthGuard {
    max_depth: usize,
}

impl DepthGuard {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Check every operation in `document`, reporting one violation per operation which is too
    /// deep.
    pub fn validate(&self, document: &ExecutableDocument) -> Vec<Violation> {
        operation_depths(document)
            .into_iter()
            .filter(|(_, depth, _)| *depth > self.max_depth)
            .map(|(operation, depth, pos)| Violation {
                operation,
                depth,
                max_depth: self.max_depth,
                pos,
            })
            .collect()
    }
}

/// The name, depth and position of every operation in `document`.
///
/// An operation which spreads a fragment that spreads itself, directly or through other fragments,
/// selects fields without end, and its depth is [`usize::MAX`].
pub fn operation_depths(document: &ExecutableDocument) -> Vec<(Option<String>, usize, Pos)> {
    let mut measure = Measure {
        fragments: &document.fragments,
        heights: HashMap::new(),
        expanding: vec![],
    };
    document
        .operations
        .iter()
        .map(|(name, op)| {
            let depth = measure.height(&op.node.selection_set.node).unwrap_or(0);
            (name.map(|name| name.to_string()), depth, op.pos)
        })
        .collect()
}

struct Measure<'a> {
    fragments: &'a HashMap<Name, Positioned<FragmentDefinition>>,
    // The height of each fragment which has been fully expanded.
    heights: HashMap<&'a Name, Option<usize>>,
    // Fragments being expanded on the current path.
    expanding: Vec<&'a Name>,
}

impl<'a> Measure<'a> {
    /// The depth of the deepest field in `set`, relative to the fields directly in `set`.
    ///
    /// [`None`] if `set` selects no countable fields at all.
    fn height(&mut self, set: &'a SelectionSet) -> Option<usize> {
        set.items
            .iter()
            .filter_map(|selection| match &selection.node {
                Selection::Field(field) => {
                    if field.node.name.node.starts_with("__") {
                        return None;
                    }
                    Some(match self.height(&field.node.selection_set.node) {
                        Some(height) => height.saturating_add(1),
                        None => 0,
                    })
                }
                Selection::InlineFragment(fragment) => {
                    self.height(&fragment.node.selection_set.node)
                }
                Selection::FragmentSpread(spread) => {
                    self.fragment_height(&spread.node.fragment_name.node)
                }
            })
            .max()
    }

    fn fragment_height(&mut self, name: &'a Name) -> Option<usize> {
        if let Some(height) = self.heights.get(name) {
            return *height;
        }
        if self.expanding.contains(&name) {
            // Every fragment on the path from here back to `name` is part of the cycle, so each
            // of them is unbounded wherever it is spread.
            return Some(usize::MAX);
        }
        // Unknown fragments are reported by validation; they contribute nothing here.
        let fragment = self.fragments.get(name)?;

        self.expanding.push(name);
        let height = self.height(&fragment.node.selection_set.node);
        self.expanding.pop();
        self.heights.insert(name, height);
        height
    }
}
