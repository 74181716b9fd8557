use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{watch, RwLock},
    time::MissedTickBehavior,
};
use tokio_stream::{wrappers::IntervalStream, StreamExt};
use tracing::{debug, trace};

use crate::graph::{Drawable, Scene};

/// World up axis; models arrive z-up.
pub const WORLD_UP: [f64; 3] = [0.0, 0.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: [f64; 3],
    pub target: [f64; 3],
    pub up: [f64; 3],
    pub fov_deg: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
}

impl Camera {
    pub fn perspective(width: u32, height: u32) -> Self {
        let aspect = if height == 0 {
            1.0
        } else {
            f64::from(width) / f64::from(height)
        };
        Self {
            position: [0.0, 0.0, -30.0],
            target: [0.0, 0.0, 0.0],
            up: WORLD_UP,
            fov_deg: 75.0,
            aspect,
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn distance(&self) -> f64 {
        let d = sub(self.position, self.target);
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
    }

    /// Orbits around the target by `yaw` about world up and `pitch` toward it, in degrees.
    pub fn orbit(&mut self, yaw_deg: f64, pitch_deg: f64) {
        let offset = sub(self.position, self.target);
        let radius = self.distance();
        if radius <= f64::EPSILON {
            return;
        }

        let mut azimuth = offset[1].atan2(offset[0]);
        let mut polar = (offset[2] / radius).clamp(-1.0, 1.0).acos();
        azimuth += yaw_deg.to_radians();
        // Stay off the poles so the up vector remains meaningful.
        polar = (polar - pitch_deg.to_radians()).clamp(1e-3, std::f64::consts::PI - 1e-3);

        self.position = [
            self.target[0] + radius * polar.sin() * azimuth.cos(),
            self.target[1] + radius * polar.sin() * azimuth.sin(),
            self.target[2] + radius * polar.cos(),
        ];
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub lights: usize,
    pub objects: usize,
    pub triangles: usize,
    pub line_segments: usize,
}

pub trait Renderer: Send {
    fn render(&mut self, scene: &Scene, camera: &Camera) -> FrameStats;
}

/// Renderer that only tallies what a frame would draw.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    frames: u64,
    last: FrameStats,
}

impl HeadlessRenderer {
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last
    }
}

impl Renderer for HeadlessRenderer {
    fn render(&mut self, scene: &Scene, _camera: &Camera) -> FrameStats {
        self.frames += 1;
        let mut stats = FrameStats {
            frame: self.frames,
            lights: scene.light_count(),
            ..FrameStats::default()
        };
        for drawable in scene.drawables() {
            stats.objects += 1;
            match drawable {
                Drawable::Mesh { mesh, overlay } => {
                    stats.triangles += mesh.triangle_count();
                    stats.line_segments += overlay.as_ref().map_or(0, |w| w.segments.len());
                }
                Drawable::Polyline { points, closed } => {
                    let open = points.len().saturating_sub(1);
                    stats.line_segments += if *closed { open + 1 } else { open };
                }
                Drawable::Point { .. } | Drawable::Opaque => {}
            }
        }
        trace!(
            frame = stats.frame,
            objects = stats.objects,
            triangles = stats.triangles,
            "rendered frame"
        );
        self.last = stats;
        stats
    }
}

pub struct Viewport {
    scene: Arc<RwLock<Scene>>,
    camera: Arc<RwLock<Camera>>,
    frame_interval: Duration,
}

impl Viewport {
    pub fn new(scene: Arc<RwLock<Scene>>, camera: Arc<RwLock<Camera>>, frame_rate: u32) -> Self {
        let frame_interval = Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1)));
        Self {
            scene,
            camera,
            frame_interval,
        }
    }

    /// Renders one frame from the current scene and camera.
    pub async fn render_once<R: Renderer>(&self, renderer: &mut R) -> FrameStats {
        let camera = *self.camera.read().await;
        let scene = self.scene.read().await;
        renderer.render(&scene, &camera)
    }

    /// Renders on every tick until `shutdown` flips to true; returns frames drawn.
    pub async fn run<R: Renderer>(&self, renderer: &mut R, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut interval = tokio::time::interval(self.frame_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(interval);
        let mut frames = 0u64;

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                tick = ticks.next() => {
                    if tick.is_none() {
                        break;
                    }
                    self.render_once(renderer).await;
                    frames += 1;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!(frames, "render loop stopped");
        frames
    }
}
