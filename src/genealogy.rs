//! genealogy
//!
//! The strain registry and lineage graph engine.
//!
//! # Architecture
//!
//! The genealogy is a DAG where:
//! - Nodes are registered strains, owned by a keyed table
//! - Edges run from ancestor to descendant; a strain may have several
//!   direct ancestors (recombination) and several direct descendants
//! - The stem is the distinguished root, fixed at construction
//!
//! Nodes reference each other by identifier only; the table is the single
//! owner of every node and payload. Structural edits go through the private
//! `link`/`detach` pair so the two halves of an edge never disagree.
//!
//! # Invariants
//!
//! Hold after every public operation returns (all effects apply or none do):
//!
//! 1. The stem strain always exists
//! 2. Every non-stem strain has at least one parent; one that would reach
//!    zero parents is removed by the same cascade
//! 3. No duplicate edge exists between the same ordered pair of strains
//! 4. Every strain is reachable from the stem
//! 5. An identifier, once registered, never changes

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::children::{ChildCursor, Children};
use crate::error::GenealogyError;
use crate::node::Node;
use crate::strain::Strain;

/// Registry of strains and their derivation edges.
///
/// The host interacts with strains through identifiers; the genealogy owns
/// every payload and hands out references on lookup.
///
/// # Example
///
/// ```
/// use cladogram::{Genealogy, Strain};
///
/// #[derive(Debug)]
/// struct Virus(u32);
///
/// impl Strain for Virus {
///     type Id = u32;
///     fn from_id(id: u32) -> Self { Virus(id) }
///     fn id(&self) -> u32 { self.0 }
/// }
///
/// let mut genealogy: Genealogy<Virus> = Genealogy::new(0);
/// genealogy.create(1, &0)?;
/// genealogy.create(2, &1)?;
///
/// assert!(genealogy.contains_all(&[0, 1, 2]));
/// assert_eq!(genealogy.parents_of(&2)?, vec![1]);
///
/// // Removing 1 orphans 2, so the cascade removes it too.
/// genealogy.remove(&1)?;
/// assert_eq!(genealogy.strain_count(), 1);
/// # Ok::<(), cladogram::GenealogyError<u32>>(())
/// ```
pub struct Genealogy<V: Strain> {
    /// Identifier of the root strain. Immutable and never removable.
    stem: V::Id,
    /// Every registered node, keyed by identifier.
    nodes: HashMap<V::Id, Node<V>>,
}

impl<V: Strain> Genealogy<V> {
    /// Create a genealogy containing only the stem strain.
    ///
    /// The stem's payload is built via [`Strain::from_id`].
    pub fn new(stem_id: V::Id) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(stem_id.clone(), Node::new(stem_id.clone()));
        Self {
            stem: stem_id,
            nodes,
        }
    }

    /// The immutable root identifier.
    pub fn stem_id(&self) -> &V::Id {
        &self.stem
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &V::Id) -> bool {
        self.nodes.contains_key(id)
    }

    /// Whether every identifier in the sequence is registered.
    ///
    /// Vacuously true for an empty sequence.
    pub fn contains_all<'a, I>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = &'a V::Id>,
        V::Id: 'a,
    {
        ids.into_iter().all(|id| self.contains(id))
    }

    /// Number of registered strains, the stem included. Always at least 1.
    pub fn strain_count(&self) -> usize {
        self.nodes.len()
    }

    /// Shared reference to a strain's payload.
    ///
    /// # Errors
    ///
    /// [`GenealogyError::NotFound`] if `id` is unregistered.
    pub fn strain(&self, id: &V::Id) -> Result<&V, GenealogyError<V::Id>> {
        self.node(id).map(Node::strain)
    }

    /// Mutable reference to a strain's payload.
    ///
    /// Only the payload is host-mutable; topology changes go through
    /// [`create`](Self::create), [`connect`](Self::connect) and
    /// [`remove`](Self::remove).
    ///
    /// # Errors
    ///
    /// [`GenealogyError::NotFound`] if `id` is unregistered.
    pub fn strain_mut(&mut self, id: &V::Id) -> Result<&mut V, GenealogyError<V::Id>> {
        self.node_mut(id).map(Node::strain_mut)
    }

    /// Identifiers of a strain's direct parents, in no specified order.
    ///
    /// # Errors
    ///
    /// [`GenealogyError::NotFound`] if `id` is unregistered.
    pub fn parents_of(&self, id: &V::Id) -> Result<Vec<V::Id>, GenealogyError<V::Id>> {
        self.node(id).map(|node| node.parent_ids().to_vec())
    }

    /// Cursor at the first element of a strain's children sequence.
    ///
    /// The cursor borrows the genealogy, so any structural mutation first
    /// requires dropping it; there is no way to observe a stale sequence.
    ///
    /// # Errors
    ///
    /// [`GenealogyError::NotFound`] if `id` is unregistered.
    pub fn children_begin(&self, id: &V::Id) -> Result<ChildCursor<'_, V>, GenealogyError<V::Id>> {
        let node = self.node(id)?;
        Ok(ChildCursor::new(self, node.id(), node.child_ids(), 0))
    }

    /// Cursor at the one-past-last position of a strain's children sequence.
    ///
    /// # Errors
    ///
    /// [`GenealogyError::NotFound`] if `id` is unregistered.
    pub fn children_end(&self, id: &V::Id) -> Result<ChildCursor<'_, V>, GenealogyError<V::Id>> {
        let node = self.node(id)?;
        let len = node.child_ids().len();
        Ok(ChildCursor::new(self, node.id(), node.child_ids(), len))
    }

    /// Iterator over the payloads of a strain's direct children.
    ///
    /// Yields children in insertion order; supports reverse traversal via
    /// [`DoubleEndedIterator`].
    ///
    /// # Errors
    ///
    /// [`GenealogyError::NotFound`] if `id` is unregistered.
    ///
    /// # Example
    ///
    /// ```
    /// use cladogram::{Genealogy, Strain};
    ///
    /// #[derive(Debug)]
    /// struct Virus(u32);
    ///
    /// impl Strain for Virus {
    ///     type Id = u32;
    ///     fn from_id(id: u32) -> Self { Virus(id) }
    ///     fn id(&self) -> u32 { self.0 }
    /// }
    ///
    /// let mut genealogy: Genealogy<Virus> = Genealogy::new(0);
    /// genealogy.create(1, &0)?;
    /// genealogy.create(2, &0)?;
    ///
    /// let ids: Vec<u32> = genealogy.children_of(&0)?.map(|v| v.id()).collect();
    /// assert_eq!(ids, vec![1, 2]);
    /// # Ok::<(), cladogram::GenealogyError<u32>>(())
    /// ```
    pub fn children_of(&self, id: &V::Id) -> Result<Children<'_, V>, GenealogyError<V::Id>> {
        let node = self.node(id)?;
        Ok(Children::new(self, node.child_ids()))
    }

    /// Register a new strain derived from a single ancestor.
    ///
    /// # Errors
    ///
    /// - [`GenealogyError::AlreadyRegistered`] if `id` is already present
    /// - [`GenealogyError::NotFound`] if `parent_id` is unregistered
    ///
    /// Either the strain and its edge are created, or nothing is.
    pub fn create(&mut self, id: V::Id, parent_id: &V::Id) -> Result<(), GenealogyError<V::Id>> {
        self.register(id, std::slice::from_ref(parent_id))
    }

    /// Register a new strain derived from several ancestors at once.
    ///
    /// Repeated identifiers in `parent_ids` collapse to a single edge.
    ///
    /// An **empty** ancestor list is accepted and ignored: the call returns
    /// `Ok(())` without registering `id`. A strain always descends from at
    /// least one ancestor, so a zero-ancestor registration has nothing to
    /// attach and is treated as a no-op rather than an error.
    ///
    /// # Errors
    ///
    /// - [`GenealogyError::AlreadyRegistered`] if `id` is already present
    /// - [`GenealogyError::NotFound`] if any ancestor is unregistered
    ///
    /// Either the strain and all requested edges are created, or nothing is.
    ///
    /// # Example
    ///
    /// ```
    /// use cladogram::{Genealogy, Strain};
    ///
    /// #[derive(Debug)]
    /// struct Virus(u32);
    ///
    /// impl Strain for Virus {
    ///     type Id = u32;
    ///     fn from_id(id: u32) -> Self { Virus(id) }
    ///     fn id(&self) -> u32 { self.0 }
    /// }
    ///
    /// let mut genealogy: Genealogy<Virus> = Genealogy::new(0);
    /// genealogy.create(1, &0)?;
    /// genealogy.create(2, &0)?;
    ///
    /// // A recombinant descends from both lineages.
    /// genealogy.create_recombinant(3, &[1, 2])?;
    /// let mut parents = genealogy.parents_of(&3)?;
    /// parents.sort_unstable();
    /// assert_eq!(parents, vec![1, 2]);
    ///
    /// // No ancestors: accepted, but nothing is registered.
    /// genealogy.create_recombinant(4, &[])?;
    /// assert!(!genealogy.contains(&4));
    /// # Ok::<(), cladogram::GenealogyError<u32>>(())
    /// ```
    pub fn create_recombinant(
        &mut self,
        id: V::Id,
        parent_ids: &[V::Id],
    ) -> Result<(), GenealogyError<V::Id>> {
        if parent_ids.is_empty() {
            if self.contains(&id) {
                return Err(GenealogyError::AlreadyRegistered(id));
            }
            debug!(id = ?id, "ignoring registration with no ancestors");
            return Ok(());
        }
        self.register(id, parent_ids)
    }

    /// Add a derivation edge between two existing strains.
    ///
    /// Idempotent: if `parent_id` is already a parent of `child_id`, the
    /// call has no effect.
    ///
    /// # Errors
    ///
    /// [`GenealogyError::NotFound`] if either endpoint is unregistered.
    pub fn connect(
        &mut self,
        child_id: &V::Id,
        parent_id: &V::Id,
    ) -> Result<(), GenealogyError<V::Id>> {
        if !self.contains(child_id) {
            return Err(GenealogyError::NotFound(child_id.clone()));
        }
        if !self.contains(parent_id) {
            return Err(GenealogyError::NotFound(parent_id.clone()));
        }
        if self.node(child_id)?.has_parent(parent_id) {
            return Ok(());
        }
        self.link(child_id, parent_id);
        debug!(child = ?child_id, parent = ?parent_id, "connected strains");
        Ok(())
    }

    /// Remove a strain, cascading to descendants left without ancestors.
    ///
    /// The strain is detached from every neighbor; each child that thereby
    /// loses its last parent is an orphan and is removed by the same
    /// process. The cascade runs off an explicit worklist, so arbitrarily
    /// deep lineages remove without recursion.
    ///
    /// # Errors
    ///
    /// - [`GenealogyError::StemRemoval`] if `id` is the stem
    /// - [`GenealogyError::NotFound`] if `id` is unregistered
    ///
    /// # Example
    ///
    /// ```
    /// use cladogram::{Genealogy, Strain};
    ///
    /// #[derive(Debug)]
    /// struct Virus(u32);
    ///
    /// impl Strain for Virus {
    ///     type Id = u32;
    ///     fn from_id(id: u32) -> Self { Virus(id) }
    ///     fn id(&self) -> u32 { self.0 }
    /// }
    ///
    /// let mut genealogy: Genealogy<Virus> = Genealogy::new(0);
    /// genealogy.create(1, &0)?;
    /// genealogy.create(2, &0)?;
    /// genealogy.create_recombinant(3, &[1, 2])?;
    ///
    /// // 3 survives losing ancestor 1 because 2 still holds it.
    /// genealogy.remove(&1)?;
    /// assert_eq!(genealogy.parents_of(&3)?, vec![2]);
    ///
    /// // Losing 2 as well orphans 3, so the cascade takes it too.
    /// genealogy.remove(&2)?;
    /// assert!(!genealogy.contains(&3));
    /// # Ok::<(), cladogram::GenealogyError<u32>>(())
    /// ```
    pub fn remove(&mut self, id: &V::Id) -> Result<(), GenealogyError<V::Id>> {
        if *id == self.stem {
            return Err(GenealogyError::StemRemoval(id.clone()));
        }
        if !self.contains(id) {
            return Err(GenealogyError::NotFound(id.clone()));
        }

        let mut pending = VecDeque::new();
        pending.push_back(id.clone());

        // Each strain's parent list empties at most once, so every orphan is
        // enqueued exactly once and the loop terminates on any finite graph.
        while let Some(current) = pending.pop_front() {
            let orphaned = self.detach(&current);
            pending.extend(orphaned);
            self.nodes.remove(&current);
            debug!(id = ?current, "removed strain");
        }
        Ok(())
    }

    pub(crate) fn node_map(&self) -> &HashMap<V::Id, Node<V>> {
        &self.nodes
    }

    pub(crate) fn strain_by_id(&self, id: &V::Id) -> Option<&V> {
        self.nodes.get(id).map(Node::strain)
    }

    fn node(&self, id: &V::Id) -> Result<&Node<V>, GenealogyError<V::Id>> {
        self.nodes
            .get(id)
            .ok_or_else(|| GenealogyError::NotFound(id.clone()))
    }

    fn node_mut(&mut self, id: &V::Id) -> Result<&mut Node<V>, GenealogyError<V::Id>> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| GenealogyError::NotFound(id.clone()))
    }

    /// Validate, then insert the node and all its ancestor edges.
    ///
    /// All checks precede the first mutation, so a failure needs no
    /// compensating cleanup.
    fn register(&mut self, id: V::Id, parent_ids: &[V::Id]) -> Result<(), GenealogyError<V::Id>> {
        if self.contains(&id) {
            return Err(GenealogyError::AlreadyRegistered(id));
        }
        for parent_id in parent_ids {
            if !self.contains(parent_id) {
                return Err(GenealogyError::NotFound(parent_id.clone()));
            }
        }

        self.nodes.insert(id.clone(), Node::new(id.clone()));

        let mut linked: Vec<&V::Id> = Vec::with_capacity(parent_ids.len());
        for parent_id in parent_ids {
            if linked.contains(&parent_id) {
                continue;
            }
            linked.push(parent_id);
            self.link(&id, parent_id);
        }

        debug!(id = ?id, parents = linked.len(), "registered strain");
        Ok(())
    }

    /// Install both halves of a child->parent edge in one step.
    ///
    /// Callers have validated that both endpoints exist and the edge is
    /// absent.
    fn link(&mut self, child_id: &V::Id, parent_id: &V::Id) {
        if let Some(child) = self.nodes.get_mut(child_id) {
            child.push_parent(parent_id.clone());
        }
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.push_child(child_id.clone());
        }
    }

    /// Unlink `id` from every neighbor's opposite list.
    ///
    /// Returns the children left with no parents. Never recurses and never
    /// touches the registry entry itself; [`remove`](Self::remove)
    /// orchestrates the cascade. The stem is never reported as an orphan:
    /// an orphan is by definition a non-stem strain.
    fn detach(&mut self, id: &V::Id) -> Vec<V::Id> {
        let (child_ids, parent_ids) = match self.nodes.get(id) {
            Some(node) => (node.child_ids().to_vec(), node.parent_ids().to_vec()),
            None => return Vec::new(),
        };

        let mut orphaned = Vec::new();
        for child_id in &child_ids {
            if let Some(child) = self.nodes.get_mut(child_id) {
                child.remove_parent(id);
                if child.is_orphan() && *child_id != self.stem {
                    orphaned.push(child_id.clone());
                }
            }
        }
        for parent_id in &parent_ids {
            if let Some(parent) = self.nodes.get_mut(parent_id) {
                parent.remove_child(id);
            }
        }
        orphaned
    }
}
