use std::fmt;
use std::hash::Hash;

use crate::error::TransitionError;
use crate::table::TransitionTable;

/// Per-entity cursor over a shared [`TransitionTable`].
///
/// The machine only owns the current state. Entity fields live with the
/// caller and are handed to [`StateMachine::do_transition`] as the action
/// context.
pub struct StateMachine<S: 'static, K: 'static, C: 'static, E: 'static> {
    table: &'static TransitionTable<S, K, C, E>,
    current: S,
}

impl<S, K, C, E> StateMachine<S, K, C, E>
where
    S: Copy + Eq + Hash + fmt::Debug,
    K: Copy + Eq + Hash + fmt::Debug,
{
    /// Start at the table's initial state.
    pub fn new(table: &'static TransitionTable<S, K, C, E>) -> Self {
        Self {
            table,
            current: table.initial_state(),
        }
    }

    /// Resume at a previously recorded state.
    pub fn with_state(table: &'static TransitionTable<S, K, C, E>, state: S) -> Self {
        Self {
            table,
            current: state,
        }
    }

    pub fn current_state(&self) -> S {
        self.current
    }

    /// Overwrite the current state without consulting the table.
    pub fn set_current_state(&mut self, state: S) {
        self.current = state;
    }

    pub fn table(&self) -> &'static TransitionTable<S, K, C, E> {
        self.table
    }

    /// Apply `event` of type `kind` and return the new state.
    ///
    /// The bound action runs against a copy of `ctx`; the copy and the new
    /// state are committed only after the action succeeds. On any error
    /// neither `ctx` nor the current state is touched.
    ///
    /// # Errors
    /// [`TransitionError::InvalidStateTransition`] if the table has no arc for
    /// `(current, kind)`, [`TransitionError::ActionFailed`] if the action
    /// rejects the event.
    pub fn do_transition(
        &mut self,
        kind: K,
        ctx: &mut C,
        event: &E,
    ) -> Result<S, TransitionError<S, K>>
    where
        C: Clone,
    {
        let Some(transition) = self.table.lookup(self.current, kind) else {
            return Err(TransitionError::InvalidStateTransition {
                state: self.current,
                event: kind,
            });
        };

        if let Some(action) = transition.action {
            let mut draft = ctx.clone();
            action(&mut draft, event).map_err(|source| TransitionError::ActionFailed {
                state: self.current,
                event: kind,
                source,
            })?;
            *ctx = draft;
        }

        self.current = transition.to;
        Ok(self.current)
    }
}

impl<S: Copy + fmt::Debug, K, C, E> fmt::Debug for StateMachine<S, K, C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("table", &self.table.name())
            .field("current", &self.current)
            .finish()
    }
}
