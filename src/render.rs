//! Renderers.
//!
//! Rasterization belongs to an external engine. `HeadlessRenderer` stands in
//! for it: it projects mesh corners through the camera and records what would
//! be on screen, which is enough to drive and observe the render loop.

use anyhow::{bail, Result};

use crate::frame::FrameSize;
use crate::math::{self, Transform};
use crate::scene::{NodeId, PerspectiveCamera, Scene};

/// Pixel-space bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl ScreenBounds {
    fn include(bounds: Option<Self>, x: f64, y: f64) -> Self {
        match bounds {
            None => Self {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            },
            Some(b) => Self {
                min_x: b.min_x.min(x),
                min_y: b.min_y.min(y),
                max_x: b.max_x.max(x),
                max_y: b.max_y.max(y),
            },
        }
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }
}

/// What the last `render` call drew.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderStats {
    pub frame: u64,
    pub meshes: usize,
    pub corners_in_view: usize,
    pub screen_bounds: Option<ScreenBounds>,
}

pub trait Renderer {
    fn name(&self) -> &'static str;

    fn set_size(&mut self, size: FrameSize);

    fn size(&self) -> FrameSize;

    /// Draw `scene` as seen from `camera_node` through `camera`.
    fn render(
        &mut self,
        scene: &Scene,
        camera_node: NodeId,
        camera: &PerspectiveCamera,
    ) -> Result<RenderStats>;
}

pub struct HeadlessRenderer {
    size: FrameSize,
    frames: u64,
    last: Option<RenderStats>,
}

impl HeadlessRenderer {
    pub fn new(size: FrameSize) -> Self {
        Self {
            size,
            frames: 0,
            last: None,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_stats(&self) -> Option<&RenderStats> {
        self.last.as_ref()
    }
}

impl Renderer for HeadlessRenderer {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn set_size(&mut self, size: FrameSize) {
        self.size = size;
    }

    fn size(&self) -> FrameSize {
        self.size
    }

    fn render(
        &mut self,
        scene: &Scene,
        camera_node: NodeId,
        camera: &PerspectiveCamera,
    ) -> Result<RenderStats> {
        if self.size.is_empty() {
            bail!("render target has zero size");
        }
        let view: Transform = scene
            .world_transform(camera_node)
            .try_inverse()
            .unwrap_or_else(math::identity);
        let clip_from_world = camera.projection() * view;
        let (w, h) = (self.size.width as f64, self.size.height as f64);

        let mut stats = RenderStats {
            frame: self.frames + 1,
            ..RenderStats::default()
        };
        for (id, mesh, world) in scene.meshes() {
            if !scene.is_effectively_visible(id) {
                continue;
            }
            stats.meshes += 1;
            let clip_from_local = clip_from_world * world;
            for corner in mesh.corners() {
                let Some(ndc) = math::project_ndc(&clip_from_local, &corner) else {
                    continue;
                };
                if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || ndc.z.abs() > 1.0 {
                    continue;
                }
                stats.corners_in_view += 1;
                let px = (ndc.x + 1.0) * 0.5 * w;
                let py = (1.0 - ndc.y) * 0.5 * h;
                stats.screen_bounds = Some(ScreenBounds::include(stats.screen_bounds, px, py));
            }
        }

        self.frames = stats.frame;
        self.last = Some(stats.clone());
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CameraSettings, CubeSettings};

    fn marker_scene() -> (Scene, crate::scene::MarkerScene) {
        let mut scene = Scene::new();
        let handles = scene.compose_marker_scene(&CubeSettings::default());
        (scene, handles)
    }

    #[test]
    fn cube_in_front_of_camera_is_centered() {
        let (mut scene, handles) = marker_scene();
        scene.set_local(handles.marker_group, math::translation(0.0, -0.05, -1.0));
        let camera = PerspectiveCamera::new(&CameraSettings::default(), 800.0 / 600.0);
        let mut renderer = HeadlessRenderer::new(FrameSize::new(800, 600));

        let stats = renderer.render(&scene, handles.camera, &camera).unwrap();
        assert_eq!(stats.frame, 1);
        assert_eq!(stats.meshes, 1);
        assert_eq!(stats.corners_in_view, 8);
        let (cx, cy) = stats.screen_bounds.unwrap().center();
        assert!((cx - 400.0).abs() < 1.0);
        assert!((cy - 300.0).abs() < 1.0);
    }

    #[test]
    fn cube_behind_camera_is_not_drawn() {
        let (mut scene, handles) = marker_scene();
        scene.set_local(handles.marker_group, math::translation(0.0, 0.0, 5.0));
        let camera = PerspectiveCamera::new(&CameraSettings::default(), 1.0);
        let mut renderer = HeadlessRenderer::new(FrameSize::new(100, 100));

        let stats = renderer.render(&scene, handles.camera, &camera).unwrap();
        assert_eq!(stats.corners_in_view, 0);
        assert!(stats.screen_bounds.is_none());
    }

    #[test]
    fn zero_sized_target_is_an_error() {
        let (scene, handles) = marker_scene();
        let camera = PerspectiveCamera::new(&CameraSettings::default(), 1.0);
        let mut renderer = HeadlessRenderer::new(FrameSize::new(0, 0));
        assert!(renderer.render(&scene, handles.camera, &camera).is_err());
        assert_eq!(renderer.frames(), 0);
    }
}
