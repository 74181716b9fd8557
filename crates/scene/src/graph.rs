use document::{Geometry, MeshData};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional { direction: [f64; 3] },
    Ambient,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
}

/// Line overlay drawn on top of a mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Wireframe {
    pub segments: Vec<[[f64; 3]; 2]>,
    pub color: Color,
}

impl Wireframe {
    pub fn for_mesh(mesh: &MeshData) -> Self {
        let segments = mesh
            .edges()
            .into_iter()
            .map(|[a, b]| [mesh.vertices[a as usize], mesh.vertices[b as usize]])
            .collect();
        Self {
            segments,
            color: Color::BLACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Drawable {
    Mesh {
        mesh: MeshData,
        overlay: Option<Wireframe>,
    },
    Polyline {
        points: Vec<[f64; 3]>,
        closed: bool,
    },
    Point {
        location: [f64; 3],
    },
    /// Object with no visual form; kept so the scene mirrors the document.
    Opaque,
}

impl Drawable {
    pub fn from_geometry(geometry: Geometry) -> Self {
        match geometry {
            Geometry::Mesh(mesh) => Drawable::Mesh { mesh, overlay: None },
            Geometry::Polyline { points, closed } => Drawable::Polyline { points, closed },
            Geometry::Point { location } => Drawable::Point { location },
            Geometry::Encoded { .. } => Drawable::Opaque,
        }
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self, Drawable::Mesh { .. })
    }

    pub fn attach_wireframe(&mut self) {
        if let Drawable::Mesh { mesh, overlay } = self {
            *overlay = Some(Wireframe::for_mesh(mesh));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum SceneObject {
    Light(Light),
    Drawable(Drawable),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub id: NodeId,
    pub object: SceneObject,
}

/// Scene mutation surface the updater relies on.
pub trait SceneSink: Send + Sync {
    /// Removes every non-light node and returns how many were removed.
    fn clear_geometry(&mut self) -> usize;
    fn add_drawable(&mut self, drawable: Drawable) -> NodeId;
}

#[derive(Debug, Clone)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    next_id: u64,
    pub background: Color,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            next_id: 0,
            background: Color::WHITE,
        }
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene with the directional and ambient lights every view starts with.
    pub fn with_default_lights() -> Self {
        let mut scene = Self::new();
        scene.add_light(Light {
            kind: LightKind::Directional {
                direction: [0.0, -1.0, 0.0],
            },
            color: Color::WHITE,
            intensity: 2.0,
        });
        scene.add_light(Light {
            kind: LightKind::Ambient,
            color: Color::WHITE,
            intensity: 1.0,
        });
        scene
    }

    pub fn add_light(&mut self, light: Light) -> NodeId {
        self.push(SceneObject::Light(light))
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn lights(&self) -> impl Iterator<Item = &Light> {
        self.nodes.iter().filter_map(|node| match &node.object {
            SceneObject::Light(light) => Some(light),
            SceneObject::Drawable(_) => None,
        })
    }

    pub fn drawables(&self) -> impl Iterator<Item = &Drawable> {
        self.nodes.iter().filter_map(|node| match &node.object {
            SceneObject::Drawable(drawable) => Some(drawable),
            SceneObject::Light(_) => None,
        })
    }

    pub fn light_count(&self) -> usize {
        self.lights().count()
    }

    pub fn geometry_count(&self) -> usize {
        self.drawables().count()
    }

    fn push(&mut self, object: SceneObject) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.push(SceneNode { id, object });
        id
    }
}

impl SceneSink for Scene {
    fn clear_geometry(&mut self) -> usize {
        let before = self.nodes.len();
        self.nodes
            .retain(|node| matches!(node.object, SceneObject::Light(_)));
        before - self.nodes.len()
    }

    fn add_drawable(&mut self, drawable: Drawable) -> NodeId {
        self.push(SceneObject::Drawable(drawable))
    }
}
