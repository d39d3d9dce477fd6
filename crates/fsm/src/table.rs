use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::Hash;

use crate::error::{ActionError, TableError};

/// Side effect bound to a transition. Receives the entity fields and the
/// triggering event; an error aborts the transition.
pub type Action<C, E> = fn(&mut C, &E) -> Result<(), ActionError>;

/// Target of one `(state, event kind)` arc.
pub struct Transition<S, C, E> {
    pub to: S,
    pub action: Option<Action<C, E>>,
}

impl<S: Copy, C, E> Clone for Transition<S, C, E> {
    fn clone(&self) -> Self {
        Self {
            to: self.to,
            action: self.action,
        }
    }
}

/// Frozen `(state, event kind) -> transition` map shared by every entity of
/// one kind. Built once via [`TableBuilder`].
pub struct TransitionTable<S, K, C, E> {
    name: &'static str,
    initial: S,
    transitions: HashMap<(S, K), Transition<S, C, E>>,
}

impl<S: Copy, K, C, E> TransitionTable<S, K, C, E> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn initial_state(&self) -> S {
        self.initial
    }
}

impl<S, K, C, E> TransitionTable<S, K, C, E>
where
    S: Copy + Eq + Hash + fmt::Debug,
    K: Copy + Eq + Hash + fmt::Debug,
{
    pub fn builder(name: &'static str, initial: S) -> TableBuilder<S, K, C, E> {
        TableBuilder {
            name,
            initial,
            arcs: Vec::new(),
        }
    }

    pub fn lookup(&self, state: S, kind: K) -> Option<&Transition<S, C, E>> {
        self.transitions.get(&(state, kind))
    }

    pub fn is_legal(&self, state: S, kind: K) -> bool {
        self.transitions.contains_key(&(state, kind))
    }

    /// Target state for `(state, kind)`, if the arc exists.
    pub fn target(&self, state: S, kind: K) -> Option<S> {
        self.lookup(state, kind).map(|t| t.to)
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Every arc as `(from, kind, to)`. Order is unspecified.
    pub fn transitions(&self) -> impl Iterator<Item = (S, K, S)> + '_ {
        self.transitions
            .iter()
            .map(|(&(from, kind), t)| (from, kind, t.to))
    }
}

impl<S: fmt::Debug, K, C, E> fmt::Debug for TransitionTable<S, K, C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionTable")
            .field("name", &self.name)
            .field("initial", &self.initial)
            .field("transitions", &self.transitions.len())
            .finish()
    }
}

/// Accumulates arcs until [`TableBuilder::install`] freezes them.
pub struct TableBuilder<S, K, C, E> {
    name: &'static str,
    initial: S,
    arcs: Vec<(S, K, Transition<S, C, E>)>,
}

impl<S, K, C, E> TableBuilder<S, K, C, E>
where
    S: Copy + Eq + Hash + fmt::Debug,
    K: Copy + Eq + Hash + fmt::Debug,
{
    /// Arc with no side effect.
    #[must_use]
    pub fn add_transition(self, from: S, to: S, kind: K) -> Self {
        self.push(from, to, kind, None)
    }

    #[must_use]
    pub fn add_transition_with(self, from: S, to: S, kind: K, action: Action<C, E>) -> Self {
        self.push(from, to, kind, Some(action))
    }

    /// Same arc from several source states.
    #[must_use]
    pub fn add_transitions(
        mut self,
        from: &[S],
        to: S,
        kind: K,
        action: Option<Action<C, E>>,
    ) -> Self {
        for &state in from {
            self = self.push(state, to, kind, action);
        }
        self
    }

    fn push(mut self, from: S, to: S, kind: K, action: Option<Action<C, E>>) -> Self {
        self.arcs.push((from, kind, Transition { to, action }));
        self
    }

    /// Freeze the table.
    ///
    /// # Errors
    /// Returns [`TableError::DuplicateTransition`] if two arcs share a
    /// `(from, kind)` key.
    pub fn install(self) -> Result<TransitionTable<S, K, C, E>, TableError> {
        let mut transitions = HashMap::with_capacity(self.arcs.len());
        for (from, kind, transition) in self.arcs {
            match transitions.entry((from, kind)) {
                Entry::Occupied(_) => {
                    return Err(TableError::DuplicateTransition {
                        table: self.name,
                        state: format!("{from:?}"),
                        event: format!("{kind:?}"),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(transition);
                }
            }
        }
        Ok(TransitionTable {
            name: self.name,
            initial: self.initial,
            transitions,
        })
    }
}
