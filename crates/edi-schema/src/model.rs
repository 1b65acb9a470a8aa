//! Schema model definitions
//!
//! Nodes are stored by value in an arena owned by the [`DocumentPlug`]; parent
//! and child links are [`SchemaNodeId`] indexes into that arena.

use crate::delimiters::Delimiters;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// `max_occurs` value meaning "no upper bound"
pub const UNBOUNDED: u32 = u32::MAX;

/// Index of a node inside its plug's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaNodeId(usize);

impl SchemaNodeId {
    /// Position of the node in the arena
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Structural role of a schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Segment-like node (segment, loop, or XML element with children)
    #[default]
    Container,
    /// Data node (flat-file element or XML text element)
    Leaf,
}

/// A node of the schema tree
#[derive(Debug, Clone)]
pub struct SchemaNode {
    /// Matching key (segment tag or element name)
    pub tag: String,
    /// Optional descriptive name
    pub name: Option<String>,
    pub kind: NodeKind,
    pub is_mandatory: bool,
    /// Violations involving this node are reported as warnings
    pub is_ignorable: bool,
    pub min_occurs: u32,
    /// 0 means known but disabled
    pub max_occurs: u32,
    pub parent: Option<SchemaNodeId>,
    pub children: Vec<SchemaNodeId>,
}

impl SchemaNode {
    /// Node is structurally present but may not occur
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.max_occurs == 0
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    /// Whether one more occurrence is allowed after `count` occurrences
    #[must_use]
    pub fn allows_another(&self, count: u32) -> bool {
        count < self.max_occurs
    }
}

/// Owned, nested node definition used to build a plug.
///
/// This is also the on-disk shape of a node in schema files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default, alias = "is_mandatory")]
    pub mandatory: bool,
    #[serde(default, alias = "is_ignorable", alias = "ignore")]
    pub ignorable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_occurs: Option<u32>,
    #[serde(default = "default_max_occurs", deserialize_with = "deserialize_max_occurs")]
    pub max_occurs: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDef>,
}

fn default_max_occurs() -> u32 {
    1
}

fn deserialize_max_occurs<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Occurs {
        Count(u32),
        Keyword(String),
    }

    match Occurs::deserialize(deserializer)? {
        Occurs::Count(count) => Ok(count),
        Occurs::Keyword(word) if word.eq_ignore_ascii_case("unbounded") || word == "*" => {
            Ok(UNBOUNDED)
        }
        Occurs::Keyword(word) => Err(serde::de::Error::custom(format!(
            "invalid max_occurs '{word}', expected a number or 'unbounded'"
        ))),
    }
}

impl NodeDef {
    fn with_kind(tag: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            tag: tag.into(),
            name: None,
            kind,
            mandatory: false,
            ignorable: false,
            min_occurs: None,
            max_occurs: 1,
            children: Vec::new(),
        }
    }

    /// Segment, loop or element-with-children definition
    pub fn container(tag: impl Into<String>) -> Self {
        Self::with_kind(tag, NodeKind::Container)
    }

    /// Alias for [`NodeDef::container`] reading better for flat-file segments
    pub fn segment(tag: impl Into<String>) -> Self {
        Self::container(tag)
    }

    /// Data element definition
    pub fn leaf(tag: impl Into<String>) -> Self {
        Self::with_kind(tag, NodeKind::Leaf)
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    #[must_use]
    pub fn ignorable(mut self) -> Self {
        self.ignorable = true;
        self
    }

    #[must_use]
    pub fn max_occurs(mut self, max: u32) -> Self {
        self.max_occurs = max;
        self
    }

    #[must_use]
    pub fn occurs(mut self, min: u32, max: u32) -> Self {
        self.min_occurs = Some(min);
        self.max_occurs = max;
        self
    }

    #[must_use]
    pub fn child(mut self, child: NodeDef) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = NodeDef>) -> Self {
        self.children.extend(children);
        self
    }
}

/// The schema for one document type: node tree plus separator codes
#[derive(Debug, Clone)]
pub struct DocumentPlug {
    name: String,
    element_separators: Vec<u8>,
    segment_separators: Vec<u8>,
    nodes: Vec<SchemaNode>,
    root: SchemaNodeId,
}

impl DocumentPlug {
    /// Build a plug from a nested root definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] when a node has an empty tag, a leaf
    /// declares children, or `min_occurs` exceeds a non-zero `max_occurs`.
    pub fn new(name: impl Into<String>, root: NodeDef) -> Result<Self> {
        let mut nodes = Vec::new();
        let root = insert_node(&mut nodes, root, None, "")?;

        Ok(Self {
            name: name.into(),
            element_separators: Vec::new(),
            segment_separators: Vec::new(),
            nodes,
            root,
        })
    }

    /// Set the raw separator code lists
    #[must_use]
    pub fn with_separators(mut self, element: Vec<u8>, segment: Vec<u8>) -> Self {
        self.element_separators = element;
        self.segment_separators = segment;
        self
    }

    /// Set separator codes from a delimiter model
    #[must_use]
    pub fn with_delimiters(self, delimiters: Delimiters) -> Self {
        let mut element = vec![delimiters.element_separator];
        if delimiters.component_separator != 0 {
            element.push(delimiters.component_separator);
        }
        let segment = delimiters.terminator();
        self.with_separators(element, segment)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element separator codes, index 0 is the primary separator
    #[must_use]
    pub fn element_separators(&self) -> &[u8] {
        &self.element_separators
    }

    /// Segment separator codes, index 0 is the primary terminator
    #[must_use]
    pub fn segment_separators(&self) -> &[u8] {
        &self.segment_separators
    }

    /// Delimiter model, if the plug declares flat-file separators
    #[must_use]
    pub fn delimiters(&self) -> Option<Delimiters> {
        Delimiters::from_codes(&self.element_separators, &self.segment_separators)
    }

    #[must_use]
    pub fn root(&self) -> SchemaNodeId {
        self.root
    }

    #[must_use]
    pub fn root_node(&self) -> &SchemaNode {
        self.node(self.root)
    }

    /// Node by id. Ids are only handed out by this plug, so lookups are infallible.
    #[must_use]
    pub fn node(&self, id: SchemaNodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn get(&self, id: SchemaNodeId) -> Option<&SchemaNode> {
        self.nodes.get(id.0)
    }

    /// Number of nodes in the tree
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ordered child ids
    #[must_use]
    pub fn children(&self, id: SchemaNodeId) -> &[SchemaNodeId] {
        &self.node(id).children
    }

    #[must_use]
    pub fn parent(&self, id: SchemaNodeId) -> Option<SchemaNodeId> {
        self.node(id).parent
    }

    /// A loop is a container holding at least one container child
    #[must_use]
    pub fn is_loop(&self, id: SchemaNodeId) -> bool {
        let node = self.node(id);
        !node.is_leaf() && node.children.iter().any(|c| !self.node(*c).is_leaf())
    }

    /// Leaf children in declaration order (flat-file element positions)
    #[must_use]
    pub fn leaf_children(&self, id: SchemaNodeId) -> Vec<SchemaNodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.node(*c).is_leaf())
            .collect()
    }

    /// Exact tag lookup among the direct children
    #[must_use]
    pub fn find_child(&self, parent: SchemaNodeId, tag: &str) -> Option<SchemaNodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.node(*c).tag == tag)
    }

    /// Case-insensitive tag lookup among the direct children
    #[must_use]
    pub fn find_child_ignore_case(&self, parent: SchemaNodeId, tag: &str) -> Option<SchemaNodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.node(*c).tag.eq_ignore_ascii_case(tag))
    }

    /// The node followed by the first-child chain that starts it.
    ///
    /// For a segment this is just the segment; for a loop it descends through
    /// first children until it reaches the loop's start segment.
    #[must_use]
    pub fn start_path(&self, id: SchemaNodeId) -> Vec<SchemaNodeId> {
        let mut path = vec![id];
        let mut current = id;
        while self.is_loop(current) {
            match self.children(current).first() {
                Some(first) if !self.node(*first).is_leaf() => {
                    path.push(*first);
                    current = *first;
                }
                _ => break,
            }
        }
        path
    }

    /// Tag of the segment that starts this node
    #[must_use]
    pub fn start_tag(&self, id: SchemaNodeId) -> &str {
        let path = self.start_path(id);
        let last = path.last().copied().unwrap_or(id);
        &self.node(last).tag
    }

    /// All descendants of a node, depth first
    #[must_use]
    pub fn descendants(&self, id: SchemaNodeId) -> Vec<SchemaNodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<SchemaNodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Slash-separated tag path from the root, e.g. `850/N1Loop/N1`
    #[must_use]
    pub fn path(&self, id: SchemaNodeId) -> String {
        let mut tags = vec![self.node(id).tag.as_str()];
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            tags.push(self.node(parent).tag.as_str());
            current = self.node(parent).parent;
        }
        tags.reverse();
        tags.join("/")
    }
}

fn insert_node(
    nodes: &mut Vec<SchemaNode>,
    def: NodeDef,
    parent: Option<SchemaNodeId>,
    parent_path: &str,
) -> Result<SchemaNodeId> {
    let path = if parent_path.is_empty() {
        def.tag.clone()
    } else {
        format!("{parent_path}/{}", def.tag)
    };

    if def.tag.trim().is_empty() {
        return Err(Error::invalid_node(path, "tag must not be empty"));
    }
    if def.kind == NodeKind::Leaf && !def.children.is_empty() {
        return Err(Error::invalid_node(path, "leaf nodes cannot have children"));
    }

    let min_occurs = def.min_occurs.unwrap_or(u32::from(def.mandatory));
    if def.max_occurs > 0 && min_occurs > def.max_occurs {
        return Err(Error::invalid_node(
            path,
            format!(
                "min_occurs {min_occurs} exceeds max_occurs {}",
                def.max_occurs
            ),
        ));
    }

    let id = SchemaNodeId(nodes.len());
    nodes.push(SchemaNode {
        tag: def.tag,
        name: def.name,
        kind: def.kind,
        is_mandatory: def.mandatory,
        is_ignorable: def.ignorable,
        min_occurs,
        max_occurs: def.max_occurs,
        parent,
        children: Vec::with_capacity(def.children.len()),
    });

    for child in def.children {
        let child_id = insert_node(nodes, child, Some(id), &path)?;
        nodes[id.0].children.push(child_id);
    }

    Ok(id)
}
