/// Deferred registration queues
///
/// Registration and deregistration requests are queued and applied together
/// at the next commit point, never mid-cycle. Each queue is FIFO and holds a
/// key at most once.

use std::collections::VecDeque;
use super::observable_object::ObjectKey;
use super::viewpoint::ViewpointKey;

/// Pending additions and removals for one entity kind
#[derive(Debug, Clone)]
pub struct RegistrationQueue<K> {
    additions: VecDeque<K>,
    removals: VecDeque<K>,
}

impl<K: Copy + PartialEq> RegistrationQueue<K> {
    pub fn new() -> Self {
        Self {
            additions: VecDeque::new(),
            removals: VecDeque::new(),
        }
    }

    /// Queue `key` for registration. A pending removal of the same key is
    /// cancelled so that the latest request wins.
    ///
    /// Returns false if the key was already queued for registration.
    pub fn request_add(&mut self, key: K) -> bool {
        self.removals.retain(|queued| *queued != key);
        if self.additions.contains(&key) {
            return false;
        }
        self.additions.push_back(key);
        true
    }

    /// Queue `key` for deregistration, cancelling a pending registration.
    ///
    /// Returns false if the key was already queued for deregistration.
    pub fn request_remove(&mut self, key: K) -> bool {
        self.additions.retain(|queued| *queued != key);
        if self.removals.contains(&key) {
            return false;
        }
        self.removals.push_back(key);
        true
    }

    /// Keys waiting for registration, in request order
    pub fn pending_additions(&self) -> impl Iterator<Item = &K> {
        self.additions.iter()
    }

    /// Keys waiting for deregistration, in request order
    pub fn pending_removals(&self) -> impl Iterator<Item = &K> {
        self.removals.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    pub(crate) fn pop_addition(&mut self) -> Option<K> {
        self.additions.pop_front()
    }

    pub(crate) fn pop_removal(&mut self) -> Option<K> {
        self.removals.pop_front()
    }

    /// Drop every pending addition, returning how many were dropped
    pub(crate) fn discard_additions(&mut self) -> usize {
        let count = self.additions.len();
        self.additions.clear();
        count
    }
}

impl<K: Copy + PartialEq> Default for RegistrationQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// The four registration queues plus the commit-pending flag
#[derive(Debug, Clone, Default)]
pub struct PendingRegistrations {
    pub(crate) objects: RegistrationQueue<ObjectKey>,
    pub(crate) viewpoints: RegistrationQueue<ViewpointKey>,
    dirty: bool,
}

impl PendingRegistrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_object(&mut self, key: ObjectKey) -> bool {
        let queued = self.objects.request_add(key);
        self.dirty |= queued;
        queued
    }

    pub fn deregister_object(&mut self, key: ObjectKey) -> bool {
        let queued = self.objects.request_remove(key);
        self.dirty |= queued;
        queued
    }

    pub fn register_viewpoint(&mut self, key: ViewpointKey) -> bool {
        let queued = self.viewpoints.request_add(key);
        self.dirty |= queued;
        queued
    }

    pub fn deregister_viewpoint(&mut self, key: ViewpointKey) -> bool {
        let queued = self.viewpoints.request_remove(key);
        self.dirty |= queued;
        queued
    }

    /// Object queues
    pub fn objects(&self) -> &RegistrationQueue<ObjectKey> {
        &self.objects
    }

    /// Viewpoint queues
    pub fn viewpoints(&self) -> &RegistrationQueue<ViewpointKey> {
        &self.viewpoints
    }

    /// A commit is pending. Also set by changes that only need indices
    /// republished, such as toggling child inclusion.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
#[path = "registration_tests.rs"]
mod tests;
