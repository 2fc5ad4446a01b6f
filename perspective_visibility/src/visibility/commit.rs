/// Registration commit and dense index assignment
///
/// A commit applies the pending queues in a fixed order: object removals,
/// viewpoint removals, object additions, viewpoint additions. It then
/// reassigns dense indices to both live sets and publishes object indices to
/// the device.

use crate::config::RegistrationPolicy;
use crate::device::{VisibilityDevice, SHADER_OBJECT_INDEX};
use crate::error::Error;
use crate::{engine_debug, engine_error, engine_trace, engine_warn};
use super::buffer_allocator::threshold_test;
use super::registration::PendingRegistrations;
use super::registry::VisibilityRegistry;

const SOURCE: &str = "perspective::Commit";

/// What a commit changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub objects_removed: u32,
    pub viewpoints_removed: u32,
    pub objects_added: u32,
    pub viewpoints_added: u32,
    /// Registrations refused for exceeding the capacity
    pub rejected: Vec<Error>,
    /// Registrations dropped unexamined under `RegistrationPolicy::AbortRemaining`
    pub discarded: u32,
}

impl VisibilityRegistry {
    /// Apply every pending registration change and clear the pending flag
    pub fn commit(
        &mut self,
        pending: &mut PendingRegistrations,
        capacity: u32,
        policy: RegistrationPolicy,
        device: &mut dyn VisibilityDevice,
    ) -> CommitReport {
        let mut report = CommitReport::default();

        // Keys destroyed since the last commit
        let objects = &self.objects;
        self.live_objects.retain(|key| objects.contains_key(*key));
        let viewpoints = &self.viewpoints;
        self.live_viewpoints.retain(|key| viewpoints.contains_key(*key));
        self.viewpoints_by_handle.retain(|_, key| viewpoints.contains_key(*key));

        self.remove_objects(pending, device, &mut report);
        self.remove_viewpoints(pending, &mut report);
        self.restore_handle_mappings();
        self.add_objects(pending, capacity, policy, &mut report);
        self.add_viewpoints(pending, capacity, policy, &mut report);
        self.assign_indices(device);

        pending.clear_dirty();
        engine_debug!(
            SOURCE,
            "Committed: {} objects, {} viewpoints live (+{}/-{} objects, +{}/-{} viewpoints)",
            self.live_objects.len(),
            self.live_viewpoints.len(),
            report.objects_added,
            report.objects_removed,
            report.viewpoints_added,
            report.viewpoints_removed
        );
        report
    }

    fn remove_objects(
        &mut self,
        pending: &mut PendingRegistrations,
        device: &mut dyn VisibilityDevice,
        report: &mut CommitReport,
    ) {
        while let Some(key) = pending.objects.pop_removal() {
            let Some(position) = self.live_objects.iter().position(|live| *live == key) else {
                continue;
            };
            self.live_objects.remove(position);
            if let Some(object) = self.objects.get_mut(key) {
                // Stale indices would make the shader write into another object's cell
                for target in object.all_targets() {
                    device.clear_instance_params(target);
                }
                object.set_index(None);
                object.set_visible(false);
            }
            report.objects_removed += 1;
        }
    }

    fn remove_viewpoints(&mut self, pending: &mut PendingRegistrations, report: &mut CommitReport) {
        while let Some(key) = pending.viewpoints.pop_removal() {
            let Some(position) = self.live_viewpoints.iter().position(|live| *live == key) else {
                continue;
            };
            self.live_viewpoints.remove(position);
            self.viewpoints_by_handle.retain(|_, live| *live != key);
            if let Some(viewpoint) = self.viewpoints.get_mut(key) {
                viewpoint.set_index(None);
                viewpoint.replace_visibility(Vec::new());
            }
            report.viewpoints_removed += 1;
        }
    }

    /// Hand cameras whose viewpoint went away back to the latest live
    /// viewpoint registered for the same handle
    fn restore_handle_mappings(&mut self) {
        for key in self.live_viewpoints.iter().rev() {
            let Some(viewpoint) = self.viewpoints.get(*key) else {
                continue;
            };
            let handle = viewpoint.render_handle();
            if !self.viewpoints_by_handle.contains_key(&handle) {
                engine_debug!(SOURCE, "Camera {:?} falls back to viewpoint \"{}\"", handle, viewpoint.name());
                self.viewpoints_by_handle.insert(handle, *key);
            }
        }
    }

    fn add_objects(
        &mut self,
        pending: &mut PendingRegistrations,
        capacity: u32,
        policy: RegistrationPolicy,
        report: &mut CommitReport,
    ) {
        while let Some(key) = pending.objects.pop_addition() {
            let Some(object) = self.objects.get(key) else {
                engine_trace!(SOURCE, "Skipping registration of a destroyed object");
                continue;
            };
            if self.live_objects.contains(&key) {
                continue;
            }

            self.live_objects.push(key);
            if threshold_test(self.live_viewpoints.len(), self.live_objects.len(), capacity) {
                report.objects_added += 1;
                continue;
            }

            // Undo only this addition
            self.live_objects.pop();
            let error = Error::CapacityExceeded {
                viewpoints: self.live_viewpoints.len() as u32,
                objects: self.live_objects.len() as u32 + 1,
                capacity,
                entity: object.name().to_string(),
            };
            engine_error!(SOURCE, "{}", error);
            report.rejected.push(error);

            if policy == RegistrationPolicy::AbortRemaining {
                let discarded = pending.objects.discard_additions();
                if discarded > 0 {
                    engine_warn!(SOURCE, "Discarded {} queued object registrations", discarded);
                }
                report.discarded += discarded as u32;
                break;
            }
        }
    }

    fn add_viewpoints(
        &mut self,
        pending: &mut PendingRegistrations,
        capacity: u32,
        policy: RegistrationPolicy,
        report: &mut CommitReport,
    ) {
        while let Some(key) = pending.viewpoints.pop_addition() {
            let Some(viewpoint) = self.viewpoints.get(key) else {
                engine_trace!(SOURCE, "Skipping registration of a destroyed viewpoint");
                continue;
            };
            if self.live_viewpoints.contains(&key) {
                continue;
            }

            self.live_viewpoints.push(key);
            if threshold_test(self.live_viewpoints.len(), self.live_objects.len(), capacity) {
                let handle = viewpoint.render_handle();
                if self.viewpoints_by_handle.insert(handle, key).is_some() {
                    engine_warn!(
                        SOURCE,
                        "Viewpoint \"{}\" takes over camera {:?} from another viewpoint",
                        viewpoint.name(),
                        handle
                    );
                }
                report.viewpoints_added += 1;
                continue;
            }

            self.live_viewpoints.pop();
            let error = Error::CapacityExceeded {
                viewpoints: self.live_viewpoints.len() as u32 + 1,
                objects: self.live_objects.len() as u32,
                capacity,
                entity: viewpoint.name().to_string(),
            };
            engine_error!(SOURCE, "{}", error);
            report.rejected.push(error);

            if policy == RegistrationPolicy::AbortRemaining {
                let discarded = pending.viewpoints.discard_additions();
                if discarded > 0 {
                    engine_warn!(SOURCE, "Discarded {} queued viewpoint registrations", discarded);
                }
                report.discarded += discarded as u32;
                break;
            }
        }
    }

    /// Assign dense indices in live order, carry every viewpoint's stored
    /// visibility over to the new object order and publish object indices.
    fn assign_indices(&mut self, device: &mut dyn VisibilityDevice) {
        let previous: Vec<Option<u32>> = self
            .live_objects
            .iter()
            .map(|key| self.objects.get(*key).and_then(|o| o.index()))
            .collect();

        for (row, key) in self.live_viewpoints.iter().enumerate() {
            let Some(viewpoint) = self.viewpoints.get_mut(*key) else {
                continue;
            };
            let carried = previous
                .iter()
                .map(|index| index.is_some_and(|i| viewpoint.sees(i)))
                .collect();
            viewpoint.replace_visibility(carried);
            viewpoint.set_index(Some(row as u32));
        }

        for (index, key) in self.live_objects.iter().enumerate() {
            let Some(object) = self.objects.get_mut(*key) else {
                continue;
            };
            object.set_index(Some(index as u32));
            for target in object.indexed_targets() {
                device.set_instance_int(target, SHADER_OBJECT_INDEX, index as i32);
            }
        }
    }
}

#[cfg(test)]
#[path = "commit_tests.rs"]
mod tests;
