// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{
    errors::{NavigationError, NavigationResult},
    records::{Record, RecordId, Verifiable},
};
use std::cell::{Cell, RefCell};

/// The payload delivered to observers after every successful transition.
///
/// `next`/`previous` are the direct siblings of the current record, while
/// `has_next`/`has_previous` answer whether the corresponding navigation call
/// would actually move (they use the same ancestor-walking search).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateUpdate {
    pub verifiable: String,
    pub current: RecordId,
    pub top_level: Vec<RecordId>,
    pub next: Option<RecordId>,
    pub previous: Option<RecordId>,
    pub has_next: bool,
    pub has_previous: bool,
    pub has_parent: bool,
    pub has_child: bool,
}

type StateObserver = Box<dyn FnMut(&StateUpdate)>;

/// Stateful navigation over the execution traces of a verification run.
///
/// The cursor is always exactly one record of the active verifiable. All
/// operations are synchronous and single-threaded; observers run in
/// registration order within the call that triggered the change. An observer
/// must not navigate (rejected with [`NavigationError::ReentrantNavigation`])
/// and must not register or remove listeners.
pub struct DebuggerSession {
    verifiables: Vec<Verifiable>,
    current_verifiable: Cell<usize>,
    current_record: Cell<RecordId>,
    observers: RefCell<Vec<StateObserver>>,
    notifying: Cell<bool>,
}

impl DebuggerSession {
    /// Creates a session over a loaded trace, placing the cursor on the
    /// first top-level record of the first verifiable.
    pub fn new(verifiables: Vec<Verifiable>) -> NavigationResult<DebuggerSession> {
        let first = verifiables.first().ok_or(NavigationError::NoVerifiables)?;
        let current = first
            .top_level()
            .first()
            .copied()
            .ok_or_else(|| NavigationError::EmptyVerifiable(first.name().to_string()))?;
        Ok(DebuggerSession {
            verifiables,
            current_verifiable: Cell::new(0),
            current_record: Cell::new(current),
            observers: RefCell::new(Vec::new()),
            notifying: Cell::new(false),
        })
    }

    pub fn verifiables(&self) -> &[Verifiable] {
        &self.verifiables
    }

    pub fn current_verifiable(&self) -> &Verifiable {
        &self.verifiables[self.current_verifiable.get()]
    }

    pub fn current_record(&self) -> &Record {
        &self.current_verifiable().records()[self.current_record.get()]
    }

    pub fn top_level_states(&self) -> &[RecordId] {
        self.current_verifiable().top_level()
    }

    pub fn on_state_change(&self, observer: StateObserver) {
        self.observers.borrow_mut().push(observer);
    }

    pub fn remove_listeners(&self) {
        self.observers.borrow_mut().clear();
    }

    /// Delivers the current state to all observers, in registration order.
    pub fn notify_state_change(&self) {
        let update = self.make_update();
        self.notifying.set(true);
        for observer in self.observers.borrow_mut().iter_mut() {
            observer(&update);
        }
        self.notifying.set(false);
    }

    pub fn go_to_next_state(&self) -> NavigationResult<()> {
        self.guard()?;
        if let Some(next) = self.find_next() {
            self.current_record.set(next);
            self.notify_state_change();
        }
        Ok(())
    }

    pub fn go_to_prev_state(&self) -> NavigationResult<()> {
        self.guard()?;
        if let Some(previous) = self.find_prev() {
            self.current_record.set(previous);
            self.notify_state_change();
        }
        Ok(())
    }

    pub fn go_to_child_state(&self) -> NavigationResult<()> {
        self.guard()?;
        if let Some(child) = self.current_record().children.first().copied() {
            self.current_record.set(child);
            self.notify_state_change();
        }
        Ok(())
    }

    pub fn go_to_parent_state(&self) -> NavigationResult<()> {
        self.guard()?;
        if let Some(parent) = self.current_record().parent {
            self.current_record.set(parent);
            self.notify_state_change();
        }
        Ok(())
    }

    /// Moves to the record with the given index, searching the active
    /// verifiable's tree depth-first. On a miss the cursor stays put.
    pub fn go_to_state_by_index(&self, index: usize) -> NavigationResult<()> {
        self.guard()?;
        match self.current_verifiable().find_index(index) {
            Some(id) => {
                self.current_record.set(id);
                self.notify_state_change();
                Ok(())
            }
            None => Err(NavigationError::RecordIndexNotFound(index)),
        }
    }

    /// Switches the active verifiable, resetting the cursor to its first
    /// top-level record.
    pub fn select_verifiable(&self, name: &str) -> NavigationResult<()> {
        self.guard()?;
        let position = self
            .verifiables
            .iter()
            .position(|verifiable| verifiable.name() == name)
            .ok_or_else(|| NavigationError::UnknownVerifiable(name.to_string()))?;
        let first = self.verifiables[position]
            .top_level()
            .first()
            .copied()
            .ok_or_else(|| NavigationError::EmptyVerifiable(name.to_string()))?;
        self.current_verifiable.set(position);
        self.current_record.set(first);
        self.notify_state_change();
        Ok(())
    }

    pub fn has_next(&self) -> bool {
        self.find_next().is_some()
    }

    pub fn has_previous(&self) -> bool {
        self.find_prev().is_some()
    }

    fn guard(&self) -> NavigationResult<()> {
        if self.notifying.get() {
            return Err(NavigationError::ReentrantNavigation);
        }
        Ok(())
    }

    fn make_update(&self) -> StateUpdate {
        let verifiable = self.current_verifiable();
        let record = self.current_record();
        StateUpdate {
            verifiable: verifiable.name().to_string(),
            current: self.current_record.get(),
            top_level: verifiable.top_level().to_vec(),
            next: record.next,
            previous: record.previous,
            has_next: self.find_next().is_some(),
            has_previous: self.find_prev().is_some(),
            has_parent: record.parent.is_some(),
            has_child: !record.children.is_empty(),
        }
    }

    /// The record a "next" move lands on: the direct sibling, or the next
    /// sibling of the closest ancestor that has one.
    fn find_next(&self) -> Option<RecordId> {
        let records = self.current_verifiable().records();
        let current = &records[self.current_record.get()];
        if current.next.is_some() {
            return current.next;
        }
        let mut parent = current.parent;
        while let Some(parent_id) = parent {
            if records[parent_id].next.is_some() {
                return records[parent_id].next;
            }
            parent = records[parent_id].parent;
        }
        None
    }

    fn find_prev(&self) -> Option<RecordId> {
        let records = self.current_verifiable().records();
        let current = &records[self.current_record.get()];
        if current.previous.is_some() {
            return current.previous;
        }
        let mut parent = current.parent;
        while let Some(parent_id) = parent {
            if records[parent_id].previous.is_some() {
                return records[parent_id].previous;
            }
            parent = records[parent_id].parent;
        }
        None
    }
}
