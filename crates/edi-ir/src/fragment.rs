//! Fragment arena for parsed documents
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

use crate::metadata::Span;
use crate::{Error, Result};
use edi_schema::SchemaNodeId;
use serde::{Deserialize, Serialize};

/// Index of a fragment inside its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentId(usize);

impl FragmentId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a fragment was matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "node", rename_all = "snake_case")]
pub enum Binding {
    /// A node of the document plug
    Known(SchemaNodeId),
    /// Input with no place in the schema, kept as noise
    Unrecognized,
    /// Raw value with no schema definition of its own
    Data,
}

impl Binding {
    pub fn schema_node(self) -> Option<SchemaNodeId> {
        match self {
            Self::Known(id) => Some(id),
            Self::Unrecognized | Self::Data => None,
        }
    }
}

/// One node of the parse tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub binding: Binding,
    /// Tag as it appears in the schema, or the raw input tag when unrecognized
    pub tag: String,
    pub value: Option<String>,
    pub span: Option<Span>,
    parent: Option<FragmentId>,
    children: Vec<FragmentId>,
}

impl Fragment {
    /// Detached fragment, ready to be appended
    pub fn new(binding: Binding, tag: impl Into<String>) -> Self {
        Self {
            binding,
            tag: tag.into(),
            value: None,
            span: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn known(node: SchemaNodeId, tag: impl Into<String>) -> Self {
        Self::new(Binding::Known(node), tag)
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_optional_value(mut self, value: Option<String>) -> Self {
        self.value = value;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn parent(&self) -> Option<FragmentId> {
        self.parent
    }

    pub fn children(&self) -> &[FragmentId] {
        &self.children
    }

    pub fn is_unrecognized(&self) -> bool {
        self.binding == Binding::Unrecognized
    }
}

/// Serializable nested view of a fragment subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentOutline {
    pub tag: String,
    pub binding: Binding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FragmentOutline>,
}

/// Append-only arena holding one document's fragments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentTree {
    fragments: Vec<Fragment>,
    root: FragmentId,
}

impl FragmentTree {
    /// Tree holding only the root fragment bound to the schema root
    pub fn new_root(schema_root: SchemaNodeId, tag: impl Into<String>) -> Self {
        Self {
            fragments: vec![Fragment::known(schema_root, tag)],
            root: FragmentId(0),
        }
    }

    pub fn root(&self) -> FragmentId {
        self.root
    }

    pub fn root_fragment(&self) -> &Fragment {
        &self.fragments[self.root.0]
    }

    pub fn get(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(id.0)
    }

    /// Fragment by id. Ids are only handed out by this tree.
    pub fn fragment(&self, id: FragmentId) -> &Fragment {
        &self.fragments[id.0]
    }

    pub fn children(&self, id: FragmentId) -> &[FragmentId] {
        self.get(id).map_or(&[][..], Fragment::children)
    }

    pub fn parent(&self, id: FragmentId) -> Option<FragmentId> {
        self.get(id).and_then(Fragment::parent)
    }

    /// Total number of fragments, the root included
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// A tree always holds its root
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Append `fragment` as the last child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFragment`] if `parent` is not in this tree.
    pub fn append_child(&mut self, parent: FragmentId, mut fragment: Fragment) -> Result<FragmentId> {
        if parent.0 >= self.fragments.len() {
            return Err(Error::UnknownFragment(parent.0));
        }

        let id = FragmentId(self.fragments.len());
        fragment.parent = Some(parent);
        fragment.children.clear();
        self.fragments.push(fragment);
        self.fragments[parent.0].children.push(id);
        Ok(id)
    }

    /// Replace the value of a fragment
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFragment`] if `id` is not in this tree.
    pub fn set_value(&mut self, id: FragmentId, value: impl Into<String>) -> Result<()> {
        let fragment = self
            .fragments
            .get_mut(id.0)
            .ok_or(Error::UnknownFragment(id.0))?;
        fragment.value = Some(value.into());
        Ok(())
    }

    /// Set or widen the span of a fragment
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFragment`] if `id` is not in this tree.
    pub fn set_span(&mut self, id: FragmentId, span: Span) -> Result<()> {
        let fragment = self
            .fragments
            .get_mut(id.0)
            .ok_or(Error::UnknownFragment(id.0))?;
        fragment.span = Some(span);
        Ok(())
    }

    /// Whether any direct child of `parent` is bound to `node`.
    ///
    /// Comparison is by schema node identity, never by tag text.
    pub fn contains_binding(&self, parent: FragmentId, node: SchemaNodeId) -> bool {
        self.children(parent)
            .iter()
            .any(|child| self.fragment(*child).binding == Binding::Known(node))
    }

    /// Iterate over every fragment in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (FragmentId, &Fragment)> {
        self.fragments
            .iter()
            .enumerate()
            .map(|(index, fragment)| (FragmentId(index), fragment))
    }

    /// Number of fragments bound as unrecognized input
    pub fn count_unrecognized(&self) -> usize {
        self.fragments.iter().filter(|f| f.is_unrecognized()).count()
    }

    /// Nested, serializable copy of the subtree rooted at `id`
    pub fn outline(&self, id: FragmentId) -> FragmentOutline {
        let fragment = self.fragment(id);
        FragmentOutline {
            tag: fragment.tag.clone(),
            binding: fragment.binding,
            value: fragment.value.clone(),
            span: fragment.span,
            children: fragment
                .children
                .iter()
                .map(|child| self.outline(*child))
                .collect(),
        }
    }
}
