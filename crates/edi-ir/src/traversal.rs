//! Traversal and cursor APIs for navigating a fragment tree

use crate::fragment::{Fragment, FragmentId, FragmentTree};
use crate::Error;
use crate::Result;

/// A cursor for navigating the fragment tree by tag paths
pub struct Cursor<'a> {
    tree: &'a FragmentTree,

    /// Current fragment
    id: FragmentId,

    /// Path to current fragment (for error reporting)
    path: Vec<String>,
}

/// Trait for traversing a fragment tree
pub trait Traversal {
    /// Visit a fragment
    fn visit(&mut self, fragment: &Fragment, path: &[String]);

    /// Called when entering a fragment with children
    fn enter(&mut self, _fragment: &Fragment, _path: &[String]) {}

    /// Called when leaving a fragment with children
    fn leave(&mut self, _fragment: &Fragment, _path: &[String]) {}

    /// Returns true if traversal should continue
    fn should_continue(&self) -> bool {
        true
    }
}

impl<'a> Cursor<'a> {
    /// Create a new cursor at the tree's root
    pub fn new(tree: &'a FragmentTree) -> Self {
        Self::at(tree, tree.root())
    }

    /// Create a cursor at a given fragment
    pub fn at(tree: &'a FragmentTree, id: FragmentId) -> Self {
        Self {
            tree,
            id,
            path: vec![tree.fragment(id).tag.clone()],
        }
    }

    /// Current fragment id
    pub fn id(&self) -> FragmentId {
        self.id
    }

    /// Get the current fragment
    pub fn fragment(&self) -> &'a Fragment {
        self.tree.fragment(self.id)
    }

    /// Get the current path
    pub fn path(&self) -> &[String] {
        &self.path
    }

    fn descend(&self, id: FragmentId, step: String) -> Cursor<'a> {
        let mut path = self.path.clone();
        path.push(step);
        Cursor {
            tree: self.tree,
            id,
            path,
        }
    }

    /// Navigate to the first child with the given tag
    pub fn child(&self, tag: &str) -> Result<Cursor<'a>> {
        self.tree
            .children(self.id)
            .iter()
            .copied()
            .find(|c| self.tree.fragment(*c).tag == tag)
            .map(|c| self.descend(c, tag.to_string()))
            .ok_or_else(|| Error::node_not_found(format!("{}/{}", self.path.join("/"), tag)))
    }

    /// Navigate to a child by index
    pub fn child_at(&self, index: usize) -> Result<Cursor<'a>> {
        match self.tree.children(self.id).get(index) {
            Some(child) => Ok(self.descend(*child, format!("[{index}]"))),
            None => Err(Error::node_not_found(format!(
                "{}[{}]",
                self.path.join("/"),
                index
            ))),
        }
    }

    /// Get all children with a tag
    pub fn children(&self, tag: &str) -> Vec<Cursor<'a>> {
        self.tree
            .children(self.id)
            .iter()
            .copied()
            .filter(|c| self.tree.fragment(*c).tag == tag)
            .enumerate()
            .map(|(idx, child)| self.descend(child, format!("{tag}[{idx}]")))
            .collect()
    }

    /// Navigate using a path (e.g., "N1Loop[1]/N1/N101")
    pub fn navigate(&self, path: &str) -> Result<Cursor<'a>> {
        let mut current = Cursor {
            tree: self.tree,
            id: self.id,
            path: self.path.clone(),
        };

        for segment in path.split('/') {
            if segment.is_empty() {
                continue;
            }

            // Handle repetition indexing like "N1Loop[1]"
            if let Some(open_bracket) = segment.find('[') {
                let tag = &segment[..open_bracket];
                let close_bracket = segment
                    .find(']')
                    .ok_or_else(|| Error::invalid_path(segment, "unclosed bracket"))?;
                let index: usize = segment[open_bracket + 1..close_bracket]
                    .parse()
                    .map_err(|_| Error::invalid_path(segment, "invalid index"))?;

                let next = current.children(tag).into_iter().nth(index).ok_or_else(|| {
                    Error::node_not_found(format!("{}/{}", current.path.join("/"), segment))
                })?;
                current = next;
            } else {
                current = current.child(segment)?;
            }
        }

        Ok(current)
    }
}

/// Walk the subtree under the root using a visitor
pub fn walk<T: Traversal>(tree: &FragmentTree, visitor: &mut T) {
    walk_recursive(tree, tree.root(), visitor, &mut vec![]);
}

fn walk_recursive<T: Traversal>(
    tree: &FragmentTree,
    id: FragmentId,
    visitor: &mut T,
    path: &mut Vec<String>,
) {
    if !visitor.should_continue() {
        return;
    }

    let fragment = tree.fragment(id);
    visitor.visit(fragment, path);

    if !fragment.children().is_empty() {
        visitor.enter(fragment, path);
        path.push(fragment.tag.clone());

        for child in fragment.children() {
            walk_recursive(tree, *child, visitor, path);
        }

        path.pop();
        visitor.leave(fragment, path);
    }
}
