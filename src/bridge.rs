//! Observation bridge: the engine's registrations with the host.
//!
//! Nothing in here calls into the host. Methods that drop registrations hand the `Unsubscribe`
//! closures back to the caller, which runs them once the engine state is no longer borrowed.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::options::{ObserveOffsetFn, ObserveRectFn, RequestFrameFn, Unsubscribe};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    /// Not mounted yet; `initial_rect` stands in for the viewport.
    Detached,
    Mounted,
    /// Torn down. Everything but queries is a no-op from here on, until the next mount.
    Unmounted,
}

struct TrackedElement<E> {
    element: E,
    release: Option<Unsubscribe>,
}

pub(crate) struct Bridge<S, E, K> {
    lifecycle: Lifecycle,
    scroll_element: Option<S>,
    observers: Option<(ObserveRectFn<S, E, K>, ObserveOffsetFn<S, E, K>)>,
    subscriptions: Vec<Unsubscribe>,
    elements: BTreeMap<usize, TrackedElement<E>>,
    // The only path to the host's frame scheduler. Cleared on detach; scheduled callbacks read it
    // through the owner and stop when it is gone.
    frame: Option<RequestFrameFn>,
}

impl<S, E, K> Bridge<S, E, K> {
    pub(crate) fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Detached,
            scroll_element: None,
            observers: None,
            subscriptions: Vec::new(),
            elements: BTreeMap::new(),
            frame: None,
        }
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub(crate) fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        self.lifecycle = lifecycle;
    }

    /// Mounted with a scroll element: notifications and scroll requests are honoured.
    pub(crate) fn is_live(&self) -> bool {
        self.lifecycle == Lifecycle::Mounted && self.scroll_element.is_some()
    }

    pub(crate) fn has_viewport(&self) -> bool {
        match self.lifecycle {
            Lifecycle::Detached => true,
            Lifecycle::Mounted => self.scroll_element.is_some(),
            Lifecycle::Unmounted => false,
        }
    }

    pub(crate) fn needs_rewire(
        &self,
        element: Option<&S>,
        observe_rect: &ObserveRectFn<S, E, K>,
        observe_offset: &ObserveOffsetFn<S, E, K>,
    ) -> bool
    where
        S: PartialEq,
    {
        if self.scroll_element.as_ref() != element {
            return true;
        }
        match &self.observers {
            Some((rect, offset)) => {
                !Rc::ptr_eq(rect, observe_rect) || !Rc::ptr_eq(offset, observe_offset)
            }
            None => element.is_some(),
        }
    }

    pub(crate) fn attach(
        &mut self,
        element: S,
        observers: (ObserveRectFn<S, E, K>, ObserveOffsetFn<S, E, K>),
        frame: Option<RequestFrameFn>,
    ) {
        self.scroll_element = Some(element);
        self.observers = Some(observers);
        self.frame = frame;
    }

    pub(crate) fn add_subscription(&mut self, unsubscribe: Unsubscribe) {
        self.subscriptions.push(unsubscribe);
    }

    /// Drops the scroll element, the frame scheduler and the observer subscriptions. Tracked
    /// item elements stay, so measurements taken before a (re)wire keep dynamic mode alive.
    pub(crate) fn detach_observers(&mut self) -> Vec<Unsubscribe> {
        self.scroll_element = None;
        self.observers = None;
        self.frame = None;
        core::mem::take(&mut self.subscriptions)
    }

    /// Like [`Bridge::detach_observers`], and releases every tracked item element as well.
    pub(crate) fn detach(&mut self) -> Vec<Unsubscribe> {
        let mut released = self.detach_observers();
        released.extend(
            core::mem::take(&mut self.elements)
                .into_values()
                .filter_map(|tracked| tracked.release),
        );
        released
    }

    pub(crate) fn frame(&self) -> Option<RequestFrameFn> {
        self.frame.clone()
    }

    pub(crate) fn has_frame(&self) -> bool {
        self.frame.is_some()
    }

    /// Stores `element` for `index`. Returns `false` when the same element was already tracked,
    /// plus the registration of a replaced element.
    pub(crate) fn track(&mut self, index: usize, element: E) -> (bool, Option<Unsubscribe>)
    where
        E: PartialEq,
    {
        if let Some(tracked) = self.elements.get(&index) {
            if tracked.element == element {
                return (false, None);
            }
        }
        let replaced = self.elements.insert(
            index,
            TrackedElement {
                element,
                release: None,
            },
        );
        (true, replaced.and_then(|tracked| tracked.release))
    }

    /// Attaches the per-item registration to a tracked element. If the element is no longer
    /// tracked (released or torn down meanwhile) the registration is handed back.
    pub(crate) fn attach_release(
        &mut self,
        index: usize,
        element: &E,
        release: Unsubscribe,
    ) -> Option<Unsubscribe>
    where
        E: PartialEq,
    {
        match self.elements.get_mut(&index) {
            Some(tracked) if tracked.element == *element && tracked.release.is_none() => {
                tracked.release = Some(release);
                None
            }
            _ => Some(release),
        }
    }

    pub(crate) fn untrack(&mut self, index: usize) -> Option<Unsubscribe> {
        self.elements
            .remove(&index)
            .and_then(|tracked| tracked.release)
    }

    /// Releases elements tracked at or beyond `count`.
    pub(crate) fn untrack_from(&mut self, count: usize) -> Vec<Unsubscribe> {
        self.elements
            .split_off(&count)
            .into_values()
            .filter_map(|tracked| tracked.release)
            .collect()
    }

    pub(crate) fn element(&self, index: usize) -> Option<E>
    where
        E: Clone,
    {
        self.elements.get(&index).map(|tracked| tracked.element.clone())
    }

    pub(crate) fn element_count(&self) -> usize {
        self.elements.len()
    }
}

impl<S, E, K> Drop for Bridge<S, E, K> {
    fn drop(&mut self) {
        // Last handle gone without an explicit unmount: still release every registration once.
        for unsubscribe in self.detach() {
            unsubscribe();
        }
    }
}
