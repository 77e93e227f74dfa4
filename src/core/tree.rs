//! Height-balanced ordered index
//!
//! `AvlTree` maps unique, totally ordered keys to values. Every subtree is
//! exclusively owned by its parent (`Option<Box<Node>>`), so rotations are
//! plain moves and no node is ever reachable from two places.
//!
//! # Invariants
//!
//! For every node: `height = 1 + max(height(left), height(right))` and
//! `|height(left) - height(right)| <= 1`. Keys are strictly ascending in an
//! in-order traversal. Recursion depth is therefore bounded by the tree
//! height, O(log n).
//!
//! # Duplicate Handling
//!
//! Inserting a key that is already present is a no-op: the stored value is
//! kept, the new one is dropped. Removing an absent key is a no-op as well.

use std::borrow::Borrow;
use std::cmp::Ordering;

type Link<K, V> = Option<Box<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
    height: usize,
}

impl<K, V> Node<K, V> {
    fn leaf(key: K, value: V) -> Box<Self> {
        Box::new(Node {
            key,
            value,
            left: None,
            right: None,
            height: 1,
        })
    }

    fn update_height(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
    }

    fn balance_factor(&self) -> isize {
        height(&self.left) as isize - height(&self.right) as isize
    }
}

fn height<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |node| node.height)
}

fn rotate_right<K, V>(mut y: Box<Node<K, V>>) -> Box<Node<K, V>> {
    match y.left.take() {
        Some(mut x) => {
            y.left = x.right.take();
            y.update_height();
            x.right = Some(y);
            x.update_height();
            x
        }
        None => y,
    }
}

fn rotate_left<K, V>(mut x: Box<Node<K, V>>) -> Box<Node<K, V>> {
    match x.right.take() {
        Some(mut y) => {
            x.right = y.left.take();
            x.update_height();
            y.left = Some(x);
            y.update_height();
            y
        }
        None => x,
    }
}

/// Where an insertion went at a given node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Descent {
    /// The node itself was created
    Here,
    Left,
    Right,
}

enum Insertion {
    Duplicate,
    Added(Descent),
}

/// Insert below `link`, rebalancing with the LL/LR/RL/RR case split
///
/// The case is decided from the path the new key took through the heavy
/// child, which is the same as comparing the key against that child's key.
fn insert_node<K: Ord, V>(link: Link<K, V>, key: K, value: V) -> (Box<Node<K, V>>, Insertion) {
    let mut node = match link {
        None => return (Node::leaf(key, value), Insertion::Added(Descent::Here)),
        Some(node) => node,
    };

    let (side, child_descent) = match key.cmp(&node.key) {
        Ordering::Equal => return (node, Insertion::Duplicate),
        Ordering::Less => {
            let (child, outcome) = insert_node(node.left.take(), key, value);
            node.left = Some(child);
            match outcome {
                Insertion::Duplicate => return (node, Insertion::Duplicate),
                Insertion::Added(descent) => (Descent::Left, descent),
            }
        }
        Ordering::Greater => {
            let (child, outcome) = insert_node(node.right.take(), key, value);
            node.right = Some(child);
            match outcome {
                Insertion::Duplicate => return (node, Insertion::Duplicate),
                Insertion::Added(descent) => (Descent::Right, descent),
            }
        }
    };

    node.update_height();
    let balance = node.balance_factor();

    let node = if balance > 1 {
        match child_descent {
            Descent::Left => rotate_right(node),
            Descent::Right => {
                node.left = node.left.take().map(rotate_left);
                rotate_right(node)
            }
            Descent::Here => node,
        }
    } else if balance < -1 {
        match child_descent {
            Descent::Right => rotate_left(node),
            Descent::Left => {
                node.right = node.right.take().map(rotate_right);
                rotate_left(node)
            }
            Descent::Here => node,
        }
    } else {
        node
    };

    (node, Insertion::Added(side))
}

/// Restore the balance of `node` from its children's current balance factors
fn rebalance<K, V>(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
    node.update_height();
    let balance = node.balance_factor();

    if balance > 1 {
        if node.left.as_ref().map_or(0, |left| left.balance_factor()) < 0 {
            node.left = node.left.take().map(rotate_left);
        }
        rotate_right(node)
    } else if balance < -1 {
        if node.right.as_ref().map_or(0, |right| right.balance_factor()) > 0 {
            node.right = node.right.take().map(rotate_right);
        }
        rotate_left(node)
    } else {
        node
    }
}

/// Detach the minimum node of a subtree, rebalancing on the way back up
fn take_min<K, V>(mut node: Box<Node<K, V>>) -> (Link<K, V>, Box<Node<K, V>>) {
    match node.left.take() {
        None => {
            let right = node.right.take();
            (right, node)
        }
        Some(left) => {
            let (rest, min) = take_min(left);
            node.left = rest;
            (Some(rebalance(node)), min)
        }
    }
}

fn remove_node<K, V, Q>(link: Link<K, V>, key: &Q) -> (Link<K, V>, Option<V>)
where
    K: Borrow<Q>,
    Q: Ord + ?Sized,
{
    let mut node = match link {
        None => return (None, None),
        Some(node) => node,
    };

    let removed = match key.cmp(node.key.borrow()) {
        Ordering::Less => {
            let (child, removed) = remove_node(node.left.take(), key);
            node.left = child;
            removed
        }
        Ordering::Greater => {
            let (child, removed) = remove_node(node.right.take(), key);
            node.right = child;
            removed
        }
        Ordering::Equal => match (node.left.take(), node.right.take()) {
            (None, right) => return (right, Some(node.value)),
            (left, None) => return (left, Some(node.value)),
            (Some(left), Some(right)) => {
                // Two children: the in-order successor takes this node's place.
                let (right, successor) = take_min(right);
                let successor = *successor;
                node.left = Some(left);
                node.right = right;
                node.key = successor.key;
                Some(std::mem::replace(&mut node.value, successor.value))
            }
        },
    };

    if removed.is_none() {
        return (Some(node), None);
    }
    (Some(rebalance(node)), removed)
}

/// Height-balanced binary search tree
pub struct AvlTree<K, V> {
    root: Link<K, V>,
    len: usize,
}

impl<K: Ord, V> AvlTree<K, V> {
    /// Create an empty tree
    pub fn new() -> Self {
        AvlTree { root: None, len: 0 }
    }

    /// Insert `value` under `key`
    ///
    /// # Returns
    ///
    /// `true` if the key was new; `false` if it already existed, in which case
    /// the stored value is left untouched.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let (root, outcome) = insert_node(self.root.take(), key, value);
        self.root = Some(root);
        match outcome {
            Insertion::Added(_) => {
                self.len += 1;
                true
            }
            Insertion::Duplicate => false,
        }
    }

    /// Remove the entry for `key`
    ///
    /// # Returns
    ///
    /// * `Some(V)` - The value that was stored under `key`
    /// * `None` - If the key was absent (nothing changes)
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (root, removed) = remove_node(self.root.take(), key);
        self.root = root;
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Exact-match lookup
    pub fn find<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            current = match key.cmp(node.key.borrow()) {
                Ordering::Equal => return Some(&node.value),
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
            };
        }
        None
    }

    /// Whether `key` is present
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Ascending traversal over borrowed entries
    ///
    /// Recomputed on every call; nothing is cached between traversals.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left(self.root.as_deref());
        iter
    }

    /// Ascending traversal as owned `(key, value)` pairs
    pub fn in_order(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the tree (0 when empty)
    pub fn height(&self) -> usize {
        height(&self.root)
    }

    /// Check the height, balance and ordering invariants over every node
    pub fn is_height_balanced(&self) -> bool {
        fn check<K: Ord, V>(link: &Link<K, V>, lower: Option<&K>, upper: Option<&K>) -> Option<usize> {
            let node = match link {
                None => return Some(0),
                Some(node) => node,
            };
            if lower.is_some_and(|lower| node.key <= *lower)
                || upper.is_some_and(|upper| node.key >= *upper)
            {
                return None;
            }
            let left = check(&node.left, lower, Some(&node.key))?;
            let right = check(&node.right, Some(&node.key), upper)?;
            let expected = 1 + left.max(right);
            if left.abs_diff(right) > 1 || node.height != expected {
                return None;
            }
            Some(expected)
        }

        check(&self.root, None, None).is_some()
    }
}

impl<K: Ord, V> Default for AvlTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for AvlTree<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tree = AvlTree::new();
        for (key, value) in iter {
            tree.insert(key, value);
        }
        tree
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a AvlTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// In-order iterator driven by an explicit stack
pub struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left(&mut self, mut link: Option<&'a Node<K, V>>) {
        while let Some(node) = link {
            self.stack.push(node);
            link = node.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        Some((&node.key, &node.value))
    }
}
