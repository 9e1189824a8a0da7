//! # Splay Tree
//!
//! A self-adjusting ordered map stored in an arena. Nodes are addressed by
//! index and never freed (the edit log only ever grows or overwrites), so a
//! `NodeId` stays valid for the lifetime of the tree.
//!
//! Every successful access splays the touched node to the root. Consecutive
//! lookups in the same neighbourhood (range scans, a player editing one area)
//! therefore stay near the top of the tree and cost close to O(1).

/// Index of a node inside a [`SplayTree`]'s arena.
pub type NodeId = usize;

#[derive(Debug, Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    left: Option<NodeId>,
    right: Option<NodeId>,
    parent: Option<NodeId>,
}

/// An ordered map backed by a splay tree.
///
/// Keys are compared with their `Ord` implementation in ascending order.
#[derive(Debug, Clone)]
pub struct SplayTree<K, V> {
    nodes: Vec<Node<K, V>>,
    root: Option<NodeId>,
}

impl<K: Ord + Copy, V> Default for SplayTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Copy, V> SplayTree<K, V> {
    /// Creates an empty tree.
    pub fn new() -> Self {
        SplayTree {
            nodes: Vec::new(),
            root: None,
        }
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no keys.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Key stored at `node`.
    pub fn key(&self, node: NodeId) -> K {
        self.nodes[node].key
    }

    /// Value stored at `node`.
    pub fn value(&self, node: NodeId) -> &V {
        &self.nodes[node].value
    }

    /// Mutable value stored at `node`.
    pub fn value_mut(&mut self, node: NodeId) -> &mut V {
        &mut self.nodes[node].value
    }

    /// Inserts `value` at `key`, replacing any previous value.
    ///
    /// # Returns
    /// The node now holding `key`, which is also the new root.
    pub fn insert(&mut self, key: K, value: V) -> NodeId {
        match self.descend(key) {
            Descent::Found(node) => {
                self.nodes[node].value = value;
                self.splay(node);
                node
            }
            Descent::Vacant { parent, go_right } => self.attach(key, value, parent, go_right),
        }
    }

    /// Returns the value at `key`, inserting the result of `init` first if the
    /// key is absent.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, init: F) -> &mut V {
        let node = match self.descend(key) {
            Descent::Found(node) => {
                self.splay(node);
                node
            }
            Descent::Vacant { parent, go_right } => self.attach(key, init(), parent, go_right),
        };
        &mut self.nodes[node].value
    }

    /// Finds the node holding exactly `key`, splaying it to the root.
    pub fn find(&mut self, key: K) -> Option<NodeId> {
        match self.descend(key) {
            Descent::Found(node) => {
                self.splay(node);
                Some(node)
            }
            Descent::Vacant { parent, .. } => {
                // Splay the last node on the search path so repeated misses stay cheap.
                if let Some(parent) = parent {
                    self.splay(parent);
                }
                None
            }
        }
    }

    /// Shared-reference lookup of `key`.
    pub fn get(&mut self, key: K) -> Option<&V> {
        self.find(key).map(|node| &self.nodes[node].value)
    }

    /// Mutable lookup of `key`.
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.find(key).map(|node| &mut self.nodes[node].value)
    }

    /// Finds the node with the smallest key `>= key`.
    pub fn lower_bound(&mut self, key: K) -> Option<NodeId> {
        self.bound(|probe| probe >= key)
    }

    /// Finds the node with the smallest key `> key`.
    pub fn upper_bound(&mut self, key: K) -> Option<NodeId> {
        self.bound(|probe| probe > key)
    }

    /// Finds the node with the largest key `< key`.
    pub fn strict_predecessor(&mut self, key: K) -> Option<NodeId> {
        let mut cur = self.root;
        let mut best = None;
        let mut last = None;
        while let Some(node) = cur {
            last = Some(node);
            if self.nodes[node].key < key {
                best = Some(node);
                cur = self.nodes[node].right;
            } else {
                cur = self.nodes[node].left;
            }
        }
        if let Some(node) = best.or(last) {
            self.splay(node);
        }
        best
    }

    /// In-order successor of `node`.
    ///
    /// `node` is splayed to the root first, so the successor is simply the
    /// leftmost node of its right subtree.
    pub fn successor(&mut self, node: NodeId) -> Option<NodeId> {
        self.splay(node);
        let mut cur = self.nodes[node].right?;
        while let Some(left) = self.nodes[cur].left {
            cur = left;
        }
        Some(cur)
    }

    /// In-order predecessor of `node`.
    pub fn predecessor(&mut self, node: NodeId) -> Option<NodeId> {
        self.splay(node);
        let mut cur = self.nodes[node].left?;
        while let Some(right) = self.nodes[cur].right {
            cur = right;
        }
        Some(cur)
    }

    /// Node holding the smallest key.
    pub fn first(&self) -> Option<NodeId> {
        let mut cur = self.root?;
        while let Some(left) = self.nodes[cur].left {
            cur = left;
        }
        Some(cur)
    }

    /// Node holding the largest key.
    pub fn last(&self) -> Option<NodeId> {
        let mut cur = self.root?;
        while let Some(right) = self.nodes[cur].right {
            cur = right;
        }
        Some(cur)
    }

    /// In-order traversal that does not restructure the tree.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
        };
        iter.push_left_spine(self.root);
        iter
    }

    fn bound<P: Fn(K) -> bool>(&mut self, accepts: P) -> Option<NodeId> {
        let mut cur = self.root;
        let mut best = None;
        let mut last = None;
        while let Some(node) = cur {
            last = Some(node);
            if accepts(self.nodes[node].key) {
                best = Some(node);
                cur = self.nodes[node].left;
            } else {
                cur = self.nodes[node].right;
            }
        }
        if let Some(node) = best.or(last) {
            self.splay(node);
        }
        best
    }

    fn descend(&self, key: K) -> Descent {
        let mut cur = self.root;
        let mut parent = None;
        let mut go_right = false;
        while let Some(node) = cur {
            let probe = self.nodes[node].key;
            if probe == key {
                return Descent::Found(node);
            }
            parent = Some(node);
            go_right = probe < key;
            cur = if go_right {
                self.nodes[node].right
            } else {
                self.nodes[node].left
            };
        }
        Descent::Vacant { parent, go_right }
    }

    fn attach(&mut self, key: K, value: V, parent: Option<NodeId>, go_right: bool) -> NodeId {
        let node = self.nodes.len();
        self.nodes.push(Node {
            key,
            value,
            left: None,
            right: None,
            parent,
        });
        match parent {
            Some(parent) if go_right => self.nodes[parent].right = Some(node),
            Some(parent) => self.nodes[parent].left = Some(node),
            None => self.root = Some(node),
        }
        self.splay(node);
        node
    }

    fn is_right_child(&self, node: NodeId) -> bool {
        match self.nodes[node].parent {
            Some(parent) => self.nodes[parent].right == Some(node),
            None => false,
        }
    }

    fn rotate(&mut self, x: NodeId) {
        let Some(y) = self.nodes[x].parent else {
            return;
        };
        let z = self.nodes[y].parent;
        let y_was_right = self.is_right_child(y);

        if self.nodes[y].right == Some(x) {
            let inner = self.nodes[x].left;
            self.nodes[y].right = inner;
            if let Some(inner) = inner {
                self.nodes[inner].parent = Some(y);
            }
            self.nodes[x].left = Some(y);
        } else {
            let inner = self.nodes[x].right;
            self.nodes[y].left = inner;
            if let Some(inner) = inner {
                self.nodes[inner].parent = Some(y);
            }
            self.nodes[x].right = Some(y);
        }
        self.nodes[y].parent = Some(x);
        self.nodes[x].parent = z;

        match z {
            Some(z) if y_was_right => self.nodes[z].right = Some(x),
            Some(z) => self.nodes[z].left = Some(x),
            None => self.root = Some(x),
        }
    }

    fn splay(&mut self, x: NodeId) {
        while let Some(parent) = self.nodes[x].parent {
            if self.nodes[parent].parent.is_some() {
                // zig-zig rotates the parent first, zig-zag rotates x twice
                if self.is_right_child(parent) == self.is_right_child(x) {
                    self.rotate(parent);
                } else {
                    self.rotate(x);
                }
            }
            self.rotate(x);
        }
        self.root = Some(x);
    }
}

enum Descent {
    Found(NodeId),
    Vacant {
        parent: Option<NodeId>,
        go_right: bool,
    },
}

/// Borrowing in-order iterator over a [`SplayTree`].
pub struct Iter<'a, K, V> {
    tree: &'a SplayTree<K, V>,
    stack: Vec<NodeId>,
}

impl<K, V> Iter<'_, K, V> {
    fn push_left_spine(&mut self, mut cur: Option<NodeId>) {
        while let Some(node) = cur {
            self.stack.push(node);
            cur = self.tree.nodes[node].left;
        }
    }
}

impl<'a, K: Copy, V> Iterator for Iter<'a, K, V> {
    type Item = (K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let tree = self.tree;
        self.push_left_spine(tree.nodes[node].right);
        Some((tree.nodes[node].key, &tree.nodes[node].value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shuffled(n: i32, seed: u64) -> Vec<i32> {
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut keys: Vec<i32> = (0..n).map(|k| k * 3 - n).collect();
        rng.shuffle(&mut keys);
        keys
    }

    #[test]
    fn insert_overwrites_and_splays_to_root() {
        let mut tree = SplayTree::new();
        tree.insert(5, "a");
        tree.insert(2, "b");
        let node = tree.insert(5, "c");
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.root, Some(node));
        assert_eq!(tree.get(5), Some(&"c"));
        assert_eq!(tree.get(7), None);
    }

    #[test]
    fn iteration_is_sorted_for_any_insertion_order() {
        let mut tree = SplayTree::new();
        for key in shuffled(200, 7) {
            tree.insert(key, key * 10);
            tree.find(key / 2);
        }
        let keys: Vec<i32> = tree.iter().map(|(k, _)| k).collect();
        let mut expected = keys.clone();
        expected.sort();
        assert_eq!(keys, expected);
        assert_eq!(keys.len(), 200);
        assert_eq!(tree.key(tree.first().unwrap()), keys[0]);
        assert_eq!(tree.key(tree.last().unwrap()), keys[199]);
    }

    #[test]
    fn bounds_and_neighbours() {
        let mut tree = SplayTree::new();
        for key in [10, 20, 30, 40] {
            tree.insert(key, ());
        }
        let lb = tree.lower_bound(20).unwrap();
        assert_eq!(tree.key(lb), 20);
        let lb = tree.lower_bound(21).unwrap();
        assert_eq!(tree.key(lb), 30);
        assert!(tree.lower_bound(41).is_none());
        let ub = tree.upper_bound(20).unwrap();
        assert_eq!(tree.key(ub), 30);
        let pred = tree.strict_predecessor(20).unwrap();
        assert_eq!(tree.key(pred), 10);
        assert!(tree.strict_predecessor(10).is_none());

        let mut walk = Vec::new();
        let mut cur = tree.first();
        while let Some(node) = cur {
            walk.push(tree.key(node));
            cur = tree.successor(node);
        }
        assert_eq!(walk, vec![10, 20, 30, 40]);

        let last = tree.last().unwrap();
        let before = tree.predecessor(last).unwrap();
        assert_eq!(tree.key(before), 30);
    }

    #[test]
    fn get_or_insert_with_only_initializes_once() {
        let mut tree: SplayTree<i32, Vec<i32>> = SplayTree::new();
        tree.get_or_insert_with(1, Vec::new).push(1);
        tree.get_or_insert_with(1, || vec![99]).push(2);
        assert_eq!(tree.get(1), Some(&vec![1, 2]));
    }
}
