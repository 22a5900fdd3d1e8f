//! Knowledge base: indexed store of concepts, entities, clauses, and
//! global bindings.
//!
//! Concepts and entities are indexed by name with insertion order preserved,
//! so enumeration is deterministic. Clauses keep program order, which
//! determines rule-selection order during resolution.

use std::collections::HashMap;

use crate::ast::{Clause, Concept, Entity, PredicateKey, Term};

/// Name-indexed store preserving insertion order.
///
/// Keys are unique; re-declaring a name replaces the previous value in place.
#[derive(Debug)]
struct NamedStore<T> {
    index: HashMap<String, usize>,
    items: Vec<T>,
}

impl<T> Default for NamedStore<T> {
    fn default() -> Self {
        NamedStore {
            index: HashMap::new(),
            items: Vec::new(),
        }
    }
}

impl<T> NamedStore<T> {
    fn insert(&mut self, name: &str, item: T) -> bool {
        if let Some(&idx) = self.index.get(name) {
            self.items[idx] = item;
            false
        } else {
            self.index.insert(name.to_string(), self.items.len());
            self.items.push(item);
            true
        }
    }

    fn get(&self, name: &str) -> Option<&T> {
        self.index.get(name).map(|&idx| &self.items[idx])
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn clear(&mut self) {
        self.index.clear();
        self.items.clear();
    }
}

/// The knowledge base populated during the declaration pass and read
/// during resolution.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    concepts: NamedStore<Concept>,
    entities: NamedStore<Entity>,
    /// All clauses in program order.
    clauses: Vec<Clause>,
    /// Map from predicate key to clause indices, in program order.
    predicates: HashMap<PredicateKey, Vec<usize>>,
    globals: HashMap<String, Term>,
    global_order: Vec<String>,
}

impl KnowledgeBase {
    /// Create a new empty knowledge base.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a concept declaration. A repeated name replaces the earlier one.
    pub fn add_concept(&mut self, concept: Concept) {
        let name = concept.name.clone();
        if !self.concepts.insert(&name, concept) {
            log::warn!("concept '{}' redeclared, replacing", name);
        }
    }

    /// Add an entity declaration. A repeated name replaces the earlier one.
    pub fn add_entity(&mut self, entity: Entity) {
        let name = entity.name.clone();
        if !self.entities.insert(&name, entity) {
            log::warn!("entity '{}' redeclared, replacing", name);
        }
    }

    /// Add a clause, keeping program order within its predicate.
    pub fn add_clause(&mut self, clause: Clause) {
        let key = clause.key();
        let idx = self.clauses.len();
        self.clauses.push(clause);
        self.predicates.entry(key).or_default().push(idx);
    }

    /// Record a global assignment. Reassignment replaces the binding.
    pub fn assign_global(&mut self, name: impl Into<String>, value: Term) {
        let name = name.into();
        if self.globals.insert(name.clone(), value).is_some() {
            log::warn!("global '{}' reassigned, replacing", name);
        } else {
            self.global_order.push(name);
        }
    }

    /// Look up a concept by name.
    pub fn concept(&self, name: &str) -> Option<&Concept> {
        self.concepts.get(name)
    }

    /// Look up an entity by name.
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Look up a global binding.
    pub fn global(&self, name: &str) -> Option<&Term> {
        self.globals.get(name)
    }

    /// Clauses matching a predicate key, in program order.
    pub fn clauses_for(&self, key: &PredicateKey) -> impl Iterator<Item = &Clause> {
        self.predicates
            .get(key)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|&idx| &self.clauses[idx])
    }

    /// All concepts in declaration order.
    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.iter()
    }

    /// All entities in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// All clauses in program order.
    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    /// All global bindings in assignment order.
    pub fn globals(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.global_order
            .iter()
            .map(|name| (name.as_str(), &self.globals[name]))
    }

    /// Counts for status display: (concepts, entities, clauses, globals).
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.concepts.len(),
            self.entities.len(),
            self.clauses.len(),
            self.globals.len(),
        )
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.concepts.clear();
        self.entities.clear();
        self.clauses.clear();
        self.predicates.clear();
        self.globals.clear();
        self.global_order.clear();
    }
}
