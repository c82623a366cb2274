//! Wildcard-aware hierarchical index keyed by dot-delimited label paths.
//!
//! Each node carries a list of values (insertion order preserved) and an
//! ordered set of child nodes keyed by concrete label segments. A reserved
//! wildcard segment (`*`) matches every concrete child during reads and
//! deletions but is never materialized as a key itself.
//!
//! The tree is not thread-safe on its own; the [`Registry`](crate::registry::Registry)
//! only ever touches it under its lock.

/// Segment that fans out over all children of a node.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone)]
struct Node<V> {
    key: String,
    values: Vec<V>,
    children: Vec<Node<V>>,
}

impl<V: Clone + PartialEq> Node<V> {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty() && self.children.iter().all(Node::is_empty)
    }

    fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    fn search(&self, path: &[&str]) -> Vec<&Node<V>> {
        let Some((key, rest)) = path.split_first() else {
            return vec![self];
        };

        self.children
            .iter()
            .filter(|c| *key == WILDCARD || c.key == *key)
            .flat_map(|c| c.search(rest))
            .collect()
    }

    fn search_mut(&mut self, path: &[&str]) -> Vec<&mut Node<V>> {
        let Some((key, rest)) = path.split_first() else {
            return vec![self];
        };

        self.children
            .iter_mut()
            .filter(|c| *key == WILDCARD || c.key == *key)
            .flat_map(|c| c.search_mut(rest))
            .collect()
    }

    /// Like `search_mut`, but creates missing concrete children. A wildcard
    /// segment still fans out over existing children only.
    fn expand(&mut self, path: &[&str]) -> Vec<&mut Node<V>> {
        let Some((key, rest)) = path.split_first() else {
            return vec![self];
        };

        if *key == WILDCARD {
            return self
                .children
                .iter_mut()
                .flat_map(|c| c.expand(rest))
                .collect();
        }

        let idx = match self.children.iter().position(|c| c.key == *key) {
            Some(idx) => idx,
            None => {
                self.children.push(Node::new(key));
                self.children.len() - 1
            }
        };

        self.children[idx].expand(rest)
    }

    fn delete(&mut self, path: &[&str]) -> Vec<Vec<V>> {
        let Some((key, rest)) = path.split_first() else {
            return Vec::new();
        };

        if rest.is_empty() {
            let mut pruned = Vec::new();
            self.children.retain_mut(|c| {
                if *key == WILDCARD || c.key == *key {
                    pruned.push(std::mem::take(&mut c.values));
                    false
                } else {
                    true
                }
            });
            return pruned;
        }

        self.children
            .iter_mut()
            .filter(|c| *key == WILDCARD || c.key == *key)
            .flat_map(|c| c.delete(rest))
            .collect()
    }

    fn visit<'a>(&'a self, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, &'a V)>) {
        for value in &self.values {
            out.push((path.clone(), value));
        }
        for child in &self.children {
            path.push(child.key.clone());
            child.visit(path, out);
            path.pop();
        }
    }
}

/// Multi-value store keyed by a sequence of labels.
#[derive(Debug, Clone)]
pub struct LabelTree<V> {
    root: Node<V>,
}

impl<V: Clone + PartialEq> Default for LabelTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + PartialEq> LabelTree<V> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            root: Node::new(""),
        }
    }

    /// True when no node in the tree holds a value.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Length of the longest root-to-leaf chain.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Walk `path` from the root and return the value list of every node
    /// reached, one entry per branch. Wildcard segments fan out over all
    /// children at that level. An empty path yields the root's own values.
    pub fn search(&self, path: &[&str]) -> Vec<Vec<V>> {
        self.root
            .search(path)
            .into_iter()
            .map(|n| n.values.clone())
            .collect()
    }

    /// Replace the value list of every node reached by `path`, creating
    /// missing concrete segments. Returns the previous value list per node.
    pub fn set(&mut self, values: Vec<V>, path: &[&str]) -> Vec<Vec<V>> {
        self.root
            .expand(path)
            .into_iter()
            .map(|n| std::mem::replace(&mut n.values, values.clone()))
            .collect()
    }

    /// Push `values` onto every node reached by `path`, creating missing
    /// concrete segments. Returns the resulting value list per node.
    pub fn append(&mut self, values: Vec<V>, path: &[&str]) -> Vec<Vec<V>> {
        self.root
            .expand(path)
            .into_iter()
            .map(|n| {
                n.values.extend(values.iter().cloned());
                n.values.clone()
            })
            .collect()
    }

    /// Delete one occurrence of each element of `values` from every node
    /// reached by `path` (no creation). Returns, per node, the elements that
    /// were actually removed; missing elements are silently skipped.
    pub fn remove(&mut self, values: &[V], path: &[&str]) -> Vec<Vec<V>> {
        self.root
            .search_mut(path)
            .into_iter()
            .map(|n| {
                values
                    .iter()
                    .filter_map(|v| {
                        n.values
                            .iter()
                            .position(|held| held == v)
                            .map(|idx| n.values.remove(idx))
                    })
                    .collect()
            })
            .collect()
    }

    /// Prune every child matched by the final segment of `path` and collect
    /// its value list. An empty path clears the whole tree and returns the
    /// root's own prior values. A path that matches nothing returns an empty
    /// list.
    pub fn delete(&mut self, path: &[&str]) -> Vec<Vec<V>> {
        if path.is_empty() {
            let values = std::mem::take(&mut self.root.values);
            self.root = Node::new("");
            if values.is_empty() {
                return Vec::new();
            }
            return vec![values];
        }

        self.root.delete(path)
    }

    /// Every `(path, value)` pair in the tree, in child-discovery order.
    pub fn entries(&self) -> Vec<(Vec<String>, V)> {
        let mut out = Vec::new();
        self.root.visit(&mut Vec::new(), &mut out);
        out.into_iter().map(|(p, v)| (p, v.clone())).collect()
    }
}
