//! Scene graph.
//!
//! Nodes live in an arena and refer to their parent by `NodeId`. The marker
//! scene is composed as:
//!
//! ```text
//! root
//! ├── camera
//! └── marker group   (transform overwritten by the tracker)
//!     └── cube mesh  (raised by half its edge so it sits on the marker)
//! ```

use crate::config::{CameraSettings, CubeSettings};
use crate::math::{self, Pt3, Transform};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxMesh {
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub color: u32,
}

impl BoxMesh {
    pub fn cube(size: f64, color: u32) -> Self {
        Self {
            width: size,
            height: size,
            depth: size,
            color,
        }
    }

    /// The eight corners in mesh-local coordinates.
    pub fn corners(&self) -> [Pt3; 8] {
        let (hx, hy, hz) = (self.width / 2.0, self.height / 2.0, self.depth / 2.0);
        let mut out = [Pt3::origin(); 8];
        for (i, corner) in out.iter_mut().enumerate() {
            let sx = if i & 1 == 0 { -hx } else { hx };
            let sy = if i & 2 == 0 { -hy } else { hy };
            let sz = if i & 4 == 0 { -hz } else { hz };
            *corner = Pt3::new(sx, sy, sz);
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Root,
    Camera,
    Group,
    Mesh(BoxMesh),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub local: Transform,
    pub visible: bool,
}

#[derive(Clone, Debug)]
pub struct Scene {
    nodes: Vec<Node>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                local: math::identity(),
                visible: true,
            }],
        }
    }

    pub fn add(&mut self, parent: NodeId, kind: NodeKind, local: Transform) -> NodeId {
        debug_assert!(parent.0 < self.nodes.len(), "parent must exist");
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            local,
            visible: true,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn set_local(&mut self, id: NodeId, local: Transform) {
        self.nodes[id.0].local = local;
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        self.nodes[id.0].visible = visible;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.parent == Some(id))
            .map(|(i, _)| NodeId(i))
    }

    /// Compose local transforms from the root down to `id`.
    pub fn world_transform(&self, id: NodeId) -> Transform {
        let mut world = self.nodes[id.0].local;
        let mut cursor = self.nodes[id.0].parent;
        while let Some(parent) = cursor {
            world = self.nodes[parent.0].local * world;
            cursor = self.nodes[parent.0].parent;
        }
        world
    }

    /// A node is drawn only if it and all its ancestors are visible.
    pub fn is_effectively_visible(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if !self.nodes[node.0].visible {
                return false;
            }
            cursor = self.nodes[node.0].parent;
        }
        true
    }

    /// Meshes with their world transforms, in insertion order.
    pub fn meshes(&self) -> impl Iterator<Item = (NodeId, &BoxMesh, Transform)> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, node)| match &node.kind {
            NodeKind::Mesh(mesh) => {
                let id = NodeId(i);
                Some((id, mesh, self.world_transform(id)))
            }
            _ => None,
        })
    }
}

/// Perspective camera whose projection may be supplied by the tracker.
#[derive(Clone, Debug)]
pub struct PerspectiveCamera {
    pub fov_deg: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
    projection: Transform,
    tracker_projection: Option<Transform>,
}

impl PerspectiveCamera {
    pub fn new(settings: &CameraSettings, aspect: f64) -> Self {
        let mut camera = Self {
            fov_deg: settings.fov_deg,
            aspect,
            near: settings.near,
            far: settings.far,
            projection: math::identity(),
            tracker_projection: None,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn projection(&self) -> &Transform {
        &self.projection
    }

    pub fn has_tracker_projection(&self) -> bool {
        self.tracker_projection.is_some()
    }

    /// Adopt the tracker's intrinsics-derived projection.
    pub fn set_tracker_projection(&mut self, projection: Transform) {
        self.tracker_projection = Some(projection);
        self.update_projection_matrix();
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect;
        self.update_projection_matrix();
    }

    /// Rebuild the projection for the current aspect. A tracker projection
    /// keeps its vertical focal term; the horizontal term follows the aspect.
    pub fn update_projection_matrix(&mut self) {
        self.projection = match self.tracker_projection {
            Some(mut p) => {
                p[(0, 0)] = p[(1, 1)] / self.aspect;
                p
            }
            None => math::perspective(self.fov_deg, self.aspect, self.near, self.far),
        };
    }
}

/// Handles to the nodes the controller manipulates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerScene {
    pub camera: NodeId,
    pub marker_group: NodeId,
    pub cube: NodeId,
}

impl Scene {
    pub fn compose_marker_scene(&mut self, cube: &CubeSettings) -> MarkerScene {
        let camera = self.add(NodeId::ROOT, NodeKind::Camera, math::identity());
        let marker_group = self.add(NodeId::ROOT, NodeKind::Group, math::identity());
        let cube = self.add(
            marker_group,
            NodeKind::Mesh(BoxMesh::cube(cube.size, cube.color)),
            math::translation(0.0, cube.size / 2.0, 0.0),
        );
        MarkerScene {
            camera,
            marker_group,
            cube,
        }
    }
}
