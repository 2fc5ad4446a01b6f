//! Headless visibility demo
//!
//! A corridor of crates watched by three cameras. The occlusion shader is
//! emulated by MockVisibilityDevice: each camera "draws" the crates inside
//! its field of view, and the engine resolves who sees what.

use std::sync::{Arc, Mutex};
use perspective_visibility::perspective::{
    Error, MockVisibilityDevice, ObjectKey, ObservableObjectDesc, ReadbackMode, RenderHandle,
    RenderTargetHandle, UpdateOutcome, ViewpointDesc, ViewpointKey, VisibilityConfig,
    VisibilityEngine,
};

struct Camera {
    key: ViewpointKey,
    handle: RenderHandle,
    /// Corridor positions inside the field of view
    view: std::ops::RangeInclusive<u64>,
}

struct Crate {
    key: ObjectKey,
    position: u64,
}

fn main() -> Result<(), Error> {
    let mut mock = MockVisibilityDevice::new();
    mock.set_readback_latency(1);
    let device = Arc::new(Mutex::new(mock));

    let config = VisibilityConfig {
        capacity: 16,
        readback: ReadbackMode::Auto,
        eager_retrieve: true,
        ..Default::default()
    };
    let mut engine = VisibilityEngine::new(device.clone(), config);
    engine.enable()?;

    let mut crates: Vec<Crate> = (0..5)
        .map(|position| Crate {
            key: engine.create_object(ObservableObjectDesc::new(
                format!("crate_{}", position),
                RenderTargetHandle(position),
            )),
            position,
        })
        .collect();

    let cameras: Vec<Camera> = [("west", 0..=1), ("middle", 1..=3), ("east", 3..=4)]
        .into_iter()
        .enumerate()
        .map(|(id, (name, view))| {
            let handle = RenderHandle(100 + id as u64);
            Camera {
                key: engine.create_viewpoint(ViewpointDesc::new(name, handle)),
                handle,
                view,
            }
        })
        .collect();

    for frame in 0..10 {
        match frame {
            4 => {
                println!("frame {}: freezing \"middle\"", frame);
                engine.set_frozen(cameras[1].key, true);
            }
            6 => {
                println!("frame {}: crate_2 destroyed", frame);
                let removed = crates.remove(2);
                engine.destroy_object(removed.key);
            }
            7 => {
                println!("frame {}: capacity raised to 32 cells", frame);
                engine.set_capacity(32);
            }
            _ => {}
        }

        for camera in &cameras {
            engine.on_pre_render(camera.handle);
            let mut device = device.lock().map_err(|_| Error::BackendError("device lock poisoned".to_string()))?;
            for item in crates.iter().filter(|c| camera.view.contains(&c.position)) {
                device.draw_visible(RenderTargetHandle(item.position))?;
            }
        }

        let outcome = engine.update();
        print!("frame {}: {:?}", frame, outcome);
        if outcome == UpdateOutcome::Processed {
            for camera in &cameras {
                let seen: Vec<String> = engine
                    .visible_objects(camera.key)
                    .into_iter()
                    .filter_map(|key| engine.object(key).map(|o| o.name().to_string()))
                    .collect();
                let name = engine.viewpoint(camera.key).map(|v| v.name()).unwrap_or("?");
                print!(" | {} sees [{}]", name, seen.join(", "));
            }
        }
        println!();
    }

    let stats = engine.stats();
    println!(
        "{} frames processed, {} skipped, {} commits, {} registrations rejected",
        stats.processed_frames, stats.skipped_frames, stats.commits, stats.rejected_registrations
    );
    engine.destroy();
    Ok(())
}
