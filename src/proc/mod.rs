//! Doom 3 `.proc` scenes: area geometry, inter-area portals and the area BSP tree.
//!
//! Every position, normal and plane is converted into the Y-up target space while parsing, so
//! nothing downstream of [`ProcScene::parse`] deals with id coordinates.

mod parser;

pub use parser::PROC_VERSION;

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::{bounds::Aabb, config::ProcOptions, error::ParseResult};

/// Floats per vertex in exported streams: `x y z u v`.
pub const VERTEX_STRIDE: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcVertex {
    pub position: Vec3,
    /// V is already flipped
    pub uv: Vec2,
    pub normal: Vec3,
}

/// Triangles of one area sharing a material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub material: String,
    pub vertices: Vec<ProcVertex>,
    /// Counter-clockwise triangle list, local to this surface
    pub indices: Vec<u32>,
    pub bounds: Aabb,
}

impl Surface {
    /// Appends the `[x y z u v]` stream of this surface.
    pub fn append_vertices(&self, out: &mut Vec<f32>) {
        out.reserve(self.vertices.len() * VERTEX_STRIDE);
        for v in &self.vertices {
            out.extend_from_slice(&[v.position.x, v.position.y, v.position.z, v.uv.x, v.uv.y]);
        }
    }

    /// Appends the indices of this surface shifted by `base_vertex`.
    pub fn append_indices(&self, base_vertex: u32, out: &mut Vec<u32>) {
        out.extend(self.indices.iter().map(|&index| index + base_vertex));
    }
}

/// A room of the scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub name: String,
    pub surfaces: Vec<Surface>,
    /// Indices into [`ProcScene::portals`] of every portal touching this area
    pub portals: Vec<usize>,
    pub bounds: Aabb,
}

/// Boundary polygon shared by two areas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portal {
    pub points: Vec<Vec3>,
    /// Plane through the first three points, zero when they are degenerate
    pub plane: Vec4,
    /// Area on the positive side, then the area on the negative side
    pub areas: [usize; 2],
}

/// A reference from a BSP node to one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BspChild {
    Node(usize),
    Area(usize),
    /// Inside solid geometry, no area
    Solid,
}

impl BspChild {
    /// Decodes the stored child number: positive values are nodes, `0` is solid and negative
    /// values are areas `-1 - n`.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => BspChild::Solid,
            n if n > 0 => BspChild::Node(n as usize),
            n => BspChild::Area((-1 - n) as usize),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BspNode {
    /// `n.p + d`, positive in front
    pub plane: Vec4,
    pub front: BspChild,
    pub back: BspChild,
}

/// Half-open range of a [`StaticMeshData`] index list drawn with one material.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRange {
    pub material: String,
    pub first_index: usize,
    pub index_count: usize,
}

/// Merged vertex and index streams ready for upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticMeshData {
    /// Interleaved `[x y z u v]`
    pub vertices: Vec<f32>,
    /// Indices into the merged vertex list
    pub indices: Vec<u32>,
    pub draws: Vec<DrawRange>,
}

impl StaticMeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    fn push_surface(&mut self, surface: &Surface) {
        let base_vertex = self.vertex_count() as u32;
        let first_index = self.indices.len();
        surface.append_vertices(&mut self.vertices);
        surface.append_indices(base_vertex, &mut self.indices);
        self.draws.push(DrawRange {
            material: surface.material.clone(),
            first_index,
            index_count: surface.indices.len(),
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcScene {
    pub version: u32,
    pub areas: Vec<Area>,
    pub portals: Vec<Portal>,
    pub nodes: Vec<BspNode>,
    pub bounds: Aabb,
}

impl ProcScene {
    pub fn parse(source: &str) -> ParseResult<Self> {
        Self::parse_with(source, &ProcOptions::default())
    }

    pub fn parse_with(source: &str, options: &ProcOptions) -> ParseResult<Self> {
        parser::parse(source, options)
    }

    /// Rechecks surface, portal and node references, for scenes that were not parsed from text.
    pub fn validate(&self) -> ParseResult<()> {
        parser::validate(self)
    }

    pub fn surface(&self, area: usize, surface: usize) -> Option<&Surface> {
        self.areas.get(area)?.surfaces.get(surface)
    }

    pub fn surface_vertices(&self, area: usize, surface: usize) -> Option<Vec<f32>> {
        let mut out = Vec::new();
        self.surface(area, surface)?.append_vertices(&mut out);
        Some(out)
    }

    pub fn surface_indices(&self, area: usize, surface: usize) -> Option<Vec<u32>> {
        Some(self.surface(area, surface)?.indices.clone())
    }

    /// All surfaces of one area merged into a single vertex and index list.
    pub fn area_mesh_data(&self, area: usize) -> Option<StaticMeshData> {
        let mut data = StaticMeshData::default();
        for surface in &self.areas.get(area)?.surfaces {
            data.push_surface(surface);
        }
        Some(data)
    }

    /// Every surface of every area merged into a single vertex and index list.
    pub fn scene_mesh_data(&self) -> StaticMeshData {
        profile_function!();
        let mut data = StaticMeshData::default();
        for surface in self.areas.iter().flat_map(|area| &area.surfaces) {
            data.push_surface(surface);
        }
        data
    }

    pub fn all_positions(&self) -> Vec<Vec3> {
        self.areas
            .iter()
            .flat_map(|area| &area.surfaces)
            .flat_map(|surface| surface.vertices.iter().map(|v| v.position))
            .collect()
    }

    /// Distinct material names in first use order.
    pub fn materials(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.areas
            .iter()
            .flat_map(|area| &area.surfaces)
            .map(|surface| surface.material.as_str())
            .filter(|material| seen.insert(*material))
            .collect()
    }

    /// Walks the BSP tree down to the area containing `point`.
    ///
    /// Returns `None` for points inside solid space or when the scene has no tree.
    pub fn point_in_area(&self, point: Vec3) -> Option<usize> {
        let mut index = 0;
        // children always have larger indices than their parent, so the walk ends
        loop {
            let node = self.nodes.get(index)?;
            let child = if node.plane.truncate().dot(point) + node.plane.w > 0.0 {
                node.front
            } else {
                node.back
            };
            match child {
                BspChild::Node(next) => index = next,
                BspChild::Area(area) => return Some(area),
                BspChild::Solid => return None,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn quad(material: &str, offset: f32) -> Surface {
        let mut surface = Surface {
            material: material.to_owned(),
            indices: vec![2, 1, 0, 3, 2, 0],
            ..Surface::default()
        };
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            let position = Vec3::new(x + offset, y, 0.0);
            surface.bounds.add_point(position);
            surface.vertices.push(ProcVertex {
                position,
                uv: Vec2::new(x, y),
                normal: Vec3::Z,
            });
        }
        surface
    }

    #[test]
    fn test_bsp_child_decoding() {
        assert_eq!(BspChild::from_raw(0), BspChild::Solid);
        assert_eq!(BspChild::from_raw(4), BspChild::Node(4));
        assert_eq!(BspChild::from_raw(-1), BspChild::Area(0));
        assert_eq!(BspChild::from_raw(-3), BspChild::Area(2));
    }

    #[test]
    fn test_point_in_area() {
        let scene = ProcScene {
            nodes: vec![
                BspNode {
                    plane: Vec4::new(1.0, 0.0, 0.0, 0.0),
                    front: BspChild::Area(1),
                    back: BspChild::Node(1),
                },
                BspNode {
                    plane: Vec4::new(0.0, 1.0, 0.0, -5.0),
                    front: BspChild::Solid,
                    back: BspChild::Area(0),
                },
            ],
            ..ProcScene::default()
        };
        assert_eq!(scene.point_in_area(Vec3::new(2.0, 0.0, 0.0)), Some(1));
        assert_eq!(scene.point_in_area(Vec3::new(-2.0, 0.0, 0.0)), Some(0));
        assert_eq!(scene.point_in_area(Vec3::new(-2.0, 6.0, 0.0)), None);
        assert_eq!(ProcScene::default().point_in_area(Vec3::ZERO), None);
    }

    #[test]
    fn test_mesh_data_offsets_indices() {
        let scene = ProcScene {
            areas: vec![Area {
                name: "_area0".to_owned(),
                surfaces: vec![quad("floor", 0.0), quad("wall", 5.0)],
                ..Area::default()
            }],
            ..ProcScene::default()
        };

        let data = scene.scene_mesh_data();
        assert_eq!(data.vertex_count(), 8);
        assert_eq!(data.vertices.len(), 8 * VERTEX_STRIDE);
        assert_eq!(&data.indices[..6], &[2, 1, 0, 3, 2, 0]);
        assert_eq!(&data.indices[6..], &[6, 5, 4, 7, 6, 4]);
        assert_eq!(
            data.draws[1],
            DrawRange {
                material: "wall".to_owned(),
                first_index: 6,
                index_count: 6,
            }
        );
        assert_eq!(scene.area_mesh_data(0), Some(data));
        assert_eq!(scene.area_mesh_data(1), None);

        assert_eq!(scene.surface_vertices(0, 1).map(|v| v[0]), Some(5.0));
        assert_eq!(scene.surface_indices(0, 1), Some(vec![2, 1, 0, 3, 2, 0]));
        assert_eq!(scene.all_positions().len(), 8);
        assert_eq!(scene.materials(), vec!["floor", "wall"]);
    }
}
