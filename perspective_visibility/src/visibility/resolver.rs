/// Visibility resolution
///
/// Turns the cells of a completed readback into per-object visibility.
/// The cell for object `o` and viewpoint `v` is `o.index + v.index * object_count`.

use super::registry::VisibilityRegistry;

/// Update every live object's visibility and every non-frozen viewpoint's
/// visibility map from `cells`.
///
/// Frozen viewpoints are not read from the buffer: an object they saw when
/// they were frozen keeps counting as visible. Cells beyond the end of
/// `cells` read as not visible.
pub fn resolve(cells: &[i32], registry: &mut VisibilityRegistry) {
    let VisibilityRegistry { objects, viewpoints, live_objects, live_viewpoints, .. } = registry;
    let object_count = live_objects.len();

    for object_key in live_objects.iter() {
        let Some(object) = objects.get_mut(*object_key) else {
            continue;
        };
        let Some(object_index) = object.index() else {
            continue;
        };

        let mut visible = false;
        for viewpoint_key in live_viewpoints.iter() {
            let Some(viewpoint) = viewpoints.get_mut(*viewpoint_key) else {
                continue;
            };
            if viewpoint.frozen() {
                visible |= viewpoint.sees(object_index);
                continue;
            }
            let Some(row) = viewpoint.index() else {
                continue;
            };

            let cell = object_index as usize + row as usize * object_count;
            let seen = cells.get(cell).is_some_and(|value| *value > 0);
            viewpoint.set_sees(object_index, seen);
            visible |= seen;
        }
        object.set_visible(visible);
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
