// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Every console the loop knows about, plus which one is *main* and which one is
//! *current*.
//!
//! - The first console added becomes main. Async signal handlers always run with main
//!   as the current console.
//! - Current is the console whose input is being processed. It is swapped with
//!   [`EventLoop::with_current_ui()`], which restores the previous value on every exit
//!   path, errors included.

use super::{Ui, UiId};
use crate::{EventLoop, EventLoopError, EventLoopResult};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct UiRegistry {
    uis: BTreeMap<UiId, Ui>,
    main: Option<UiId>,
    current: Option<UiId>,
    next_id: u64,
}

impl UiRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, ui: Ui) -> UiId {
        self.next_id += 1;
        let id = UiId(self.next_id);
        self.uis.insert(id, ui);
        if self.main.is_none() {
            self.main = Some(id);
        }
        if self.current.is_none() {
            self.current = Some(id);
        }
        id
    }

    /// Removing the current console makes main current again. Removing main leaves
    /// the registry without one.
    pub fn remove(&mut self, id: UiId) -> Option<Ui> {
        let ui = self.uis.remove(&id)?;
        if self.main == Some(id) {
            self.main = None;
        }
        if self.current == Some(id) {
            self.current = self.main;
        }
        Some(ui)
    }

    #[must_use]
    pub fn get(&self, id: UiId) -> Option<&Ui> { self.uis.get(&id) }

    pub fn get_mut(&mut self, id: UiId) -> Option<&mut Ui> { self.uis.get_mut(&id) }

    #[must_use]
    pub fn ids(&self) -> Vec<UiId> { self.uis.keys().copied().collect() }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Ui> { self.uis.values_mut() }

    #[must_use]
    pub fn len(&self) -> usize { self.uis.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.uis.is_empty() }

    #[must_use]
    pub fn main(&self) -> Option<UiId> { self.main }

    #[must_use]
    pub fn current(&self) -> Option<UiId> { self.current }

    /// Ignores ids that aren't registered.
    pub fn set_current(&mut self, id: Option<UiId>) {
        if id.is_none_or(|it| self.uis.contains_key(&it)) {
            self.current = id;
        }
    }
}

impl EventLoop {
    #[must_use]
    pub fn ui(&self, id: UiId) -> Option<&Ui> { self.uis.get(id) }

    /// # Errors
    ///
    /// [`EventLoopError::UnknownConsole`] if `id` was removed (or never added).
    pub fn ui_mut(&mut self, id: UiId) -> EventLoopResult<&mut Ui> {
        self.uis
            .get_mut(id)
            .ok_or_else(|| EventLoopError::UnknownConsole(id).into())
    }

    #[must_use]
    pub fn uis(&self) -> &UiRegistry { &self.uis }

    #[must_use]
    pub fn main_ui(&self) -> Option<UiId> { self.uis.main() }

    #[must_use]
    pub fn current_ui(&self) -> Option<UiId> { self.uis.current() }

    /// Runs `f` with `ui` as the current console, then restores the previous current
    /// console whether `f` succeeded or not (unless that console was removed by `f`, in
    /// which case main becomes current).
    ///
    /// # Errors
    ///
    /// Whatever `f` returns.
    pub fn with_current_ui<T>(
        &mut self,
        ui: Option<UiId>,
        f: impl FnOnce(&mut EventLoop) -> EventLoopResult<T>,
    ) -> EventLoopResult<T> {
        let saved = self.uis.current();
        self.uis.set_current(ui);
        let result = f(self);
        match saved {
            Some(it) if self.uis.get(it).is_some() => self.uis.set_current(Some(it)),
            _ => self.uis.set_current(self.uis.main()),
        }
        result
    }

    /// Runs `f` once per console, with that console current. Consoles removed by an
    /// earlier call are skipped. Stops at the first error.
    ///
    /// # Errors
    ///
    /// The first error `f` returns.
    pub fn switch_thru_all_uis(
        &mut self,
        mut f: impl FnMut(&mut EventLoop, UiId) -> EventLoopResult<()>,
    ) -> EventLoopResult<()> {
        for id in self.uis.ids() {
            if self.uis.get(id).is_none() {
                continue;
            }
            self.with_current_ui(Some(id), |event_loop| f(event_loop, id))?;
        }
        Ok(())
    }
}
