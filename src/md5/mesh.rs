use glam::{Mat4, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::{
    config::{Md5Options, WeightPolicy},
    coord,
    error::{Location, ParseError, ParseResult},
    tokenizer::Tokenizer,
};

use super::{quat_from_xyz, read_header, read_numbered, read_parent, skin};

/// A joint of the bind pose skeleton, expressed in model space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub name: String,
    /// `None` for root joints
    pub parent: Option<usize>,
    pub origin: Vec3,
    pub orientation: Quat,
    pub bind_pose: Mat4,
    /// Maps model space positions into this joint's space
    pub inverse_bind_pose: Mat4,
}

impl Joint {
    pub fn new(name: impl Into<String>, parent: Option<usize>, origin: Vec3, orientation: Quat) -> Self {
        let bind_pose = Mat4::from_rotation_translation(orientation, origin);
        Self {
            name: name.into(),
            parent,
            origin,
            orientation,
            bind_pose,
            inverse_bind_pose: bind_pose.inverse(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// V is already flipped
    pub uv: Vec2,
    pub first_weight: usize,
    pub weight_count: usize,
    /// Computed once after parsing
    pub bind_position: Vec3,
    /// Recomputed for every played frame
    pub animated_position: Vec3,
}

impl Vertex {
    pub fn weight_range(&self) -> std::ops::Range<usize> {
        self.first_weight..self.first_weight + self.weight_count
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub joint: usize,
    pub bias: f32,
    /// Position in the joint's bind pose space
    pub offset: Vec3,
}

/// One material group of an MD5 model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinnedMesh {
    pub material: String,
    pub vertices: Vec<Vertex>,
    pub weights: Vec<Weight>,
    /// Counter-clockwise triangle list
    pub indices: Vec<u32>,
}

impl SkinnedMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// De-indexed `[x y z u v]` stream of the bind pose, one entry per triangle corner.
    pub fn bind_pose_stream(&self) -> Vec<f32> {
        self.stream(|v| v.bind_position)
    }

    /// De-indexed `[x y z u v]` stream of the last played frame.
    pub fn animated_stream(&self) -> Vec<f32> {
        self.stream(|v| v.animated_position)
    }

    fn stream(&self, position: impl Fn(&Vertex) -> Vec3) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.indices.len() * 5);
        for &index in &self.indices {
            let vertex = &self.vertices[index as usize];
            let p = position(vertex);
            out.extend_from_slice(&[p.x, p.y, p.z, vertex.uv.x, vertex.uv.y]);
        }
        out
    }
}

/// Upper bound for preallocation so a corrupt count cannot request gigabytes up front.
const MAX_PREALLOC: usize = 1 << 16;

pub(crate) fn parse(source: &str, options: &Md5Options) -> ParseResult<(Vec<Joint>, Vec<SkinnedMesh>)> {
    profile_function!();

    let mut tokenizer = Tokenizer::new(source);
    read_header(&mut tokenizer)?;

    tokenizer.expect_keyword("numJoints")?;
    let joint_count = tokenizer.expect_count("joint count")?;
    tokenizer.expect_keyword("numMeshes")?;
    let mesh_count = tokenizer.expect_count("mesh count")?;
    log::debug!("numJoints = {}, numMeshes = {}", joint_count, mesh_count);

    let joints = read_joints(&mut tokenizer, joint_count)?;

    let mut meshes = Vec::with_capacity(mesh_count.min(MAX_PREALLOC));
    for _ in 0..mesh_count {
        let at = tokenizer.location();
        let mut mesh = read_mesh(&mut tokenizer)?;
        finalize_mesh(&mut mesh, &joints, options, at)?;
        meshes.push(mesh);
    }

    if let Some(extra) = tokenizer.next_token()? {
        log::warn!("Ignoring trailing content after {} meshes at {}", mesh_count, extra.at);
    }

    Ok((joints, meshes))
}

fn read_joints(tokenizer: &mut Tokenizer<'_>, count: usize) -> ParseResult<Vec<Joint>> {
    tokenizer.expect_keyword("joints")?;
    tokenizer.expect_keyword("{")?;

    let mut joints = Vec::with_capacity(count.min(MAX_PREALLOC));
    for index in 0..count {
        let name = tokenizer.expect_string("joint name")?;
        let parent = read_parent(tokenizer, index)?;
        let origin = tokenizer.expect_paren_vec3("joint origin")?;
        let orientation = quat_from_xyz(tokenizer.expect_paren_vec3("joint orientation")?);
        joints.push(Joint::new(name, parent, origin, orientation));
    }

    tokenizer.expect_keyword("}")?;
    Ok(joints)
}

fn read_mesh(tokenizer: &mut Tokenizer<'_>) -> ParseResult<SkinnedMesh> {
    tokenizer.expect_keyword("mesh")?;
    tokenizer.expect_keyword("{")?;

    tokenizer.expect_keyword("shader")?;
    let material = tokenizer.expect_string("shader name")?.to_owned();

    tokenizer.expect_keyword("numverts")?;
    let vertex_count = tokenizer.expect_count("vertex count")?;
    let mut vertices = Vec::with_capacity(vertex_count.min(MAX_PREALLOC));
    for index in 0..vertex_count {
        read_numbered(tokenizer, "vert", index)?;
        tokenizer.expect_keyword("(")?;
        let uv = coord::flip_uv(tokenizer.expect_vec2("texture coordinate")?);
        tokenizer.expect_keyword(")")?;
        let first_weight = tokenizer.expect_count("first weight")?;
        let weight_count = tokenizer.expect_count("weight count")?;
        vertices.push(Vertex {
            uv,
            first_weight,
            weight_count,
            ..Vertex::default()
        });
    }

    tokenizer.expect_keyword("numtris")?;
    let triangle_count = tokenizer.expect_count("triangle count")?;
    let mut indices = Vec::with_capacity(triangle_count.min(MAX_PREALLOC) * 3);
    for index in 0..triangle_count {
        read_numbered(tokenizer, "tri", index)?;
        let mut corners = [0u32; 3];
        for corner in corners.iter_mut() {
            let token = tokenizer.expect_token("triangle index")?;
            let value = token.as_int()?;
            if value < 0 || value as usize >= vertex_count {
                return Err(ParseError::mismatch(
                    format!("triangle index {} outside of {} vertices", value, vertex_count),
                    token.at,
                ));
            }
            *corner = value as u32;
        }
        // clockwise to counter-clockwise
        indices.extend_from_slice(&[corners[2], corners[1], corners[0]]);
    }

    tokenizer.expect_keyword("numweights")?;
    let weight_count = tokenizer.expect_count("weight count")?;
    let mut weights = Vec::with_capacity(weight_count.min(MAX_PREALLOC));
    for index in 0..weight_count {
        read_numbered(tokenizer, "weight", index)?;
        let joint = tokenizer.expect_count("weight joint")?;
        let bias = tokenizer.expect_float("weight bias")?;
        let offset = tokenizer.expect_paren_vec3("weight position")?;
        weights.push(Weight { joint, bias, offset });
    }

    tokenizer.expect_keyword("}")?;

    Ok(SkinnedMesh {
        material,
        vertices,
        weights,
        indices,
    })
}

/// Checks that weights name existing joints and vertices and triangles stay inside their arrays.
pub(crate) fn check_references(mesh: &SkinnedMesh, joint_count: usize, at: Location) -> ParseResult<()> {
    for (index, weight) in mesh.weights.iter().enumerate() {
        if weight.joint >= joint_count {
            return Err(ParseError::mismatch(
                format!(
                    "mesh `{}` weight {} references joint {} of {}",
                    mesh.material, index, weight.joint, joint_count
                ),
                at,
            ));
        }
    }

    for (index, vertex) in mesh.vertices.iter().enumerate() {
        let end = vertex.first_weight.checked_add(vertex.weight_count);
        if end.map_or(true, |end| end > mesh.weights.len()) {
            return Err(ParseError::mismatch(
                format!(
                    "mesh `{}` vertex {} uses {} weights from {} of {}",
                    mesh.material,
                    index,
                    vertex.weight_count,
                    vertex.first_weight,
                    mesh.weights.len()
                ),
                at,
            ));
        }
    }

    if let Some(index) = mesh.indices.iter().find(|&&index| index as usize >= mesh.vertices.len()) {
        return Err(ParseError::mismatch(
            format!(
                "mesh `{}` triangle index {} outside of {} vertices",
                mesh.material,
                index,
                mesh.vertices.len()
            ),
            at,
        ));
    }
    Ok(())
}

/// Validates cross references, applies the weight policy and computes bind positions.
fn finalize_mesh(mesh: &mut SkinnedMesh, joints: &[Joint], options: &Md5Options, at: Location) -> ParseResult<()> {
    check_references(mesh, joints.len(), at)?;

    if options.weights == WeightPolicy::Normalize {
        // a weight rescaled for one vertex must not be rescaled again for another
        let mut owners: Vec<Option<usize>> = vec![None; mesh.weights.len()];
        for (index, vertex) in mesh.vertices.iter().enumerate() {
            for weight in vertex.weight_range() {
                if let Some(owner) = owners[weight].replace(index) {
                    return Err(ParseError::mismatch(
                        format!(
                            "mesh `{}` weight {} is shared by vertices {} and {}, it cannot be normalized",
                            mesh.material, weight, owner, index
                        ),
                        at,
                    ));
                }
            }
        }
    }

    for (index, vertex) in mesh.vertices.iter().enumerate() {
        let range = vertex.weight_range();
        let sum: f32 = mesh.weights[range.clone()].iter().map(|w| w.bias).sum();
        if (sum - 1.0).abs() <= options.weight_epsilon {
            continue;
        }
        match options.weights {
            WeightPolicy::Trust => log::warn!(
                "mesh `{}` vertex {} weights sum to {} instead of 1",
                mesh.material,
                index,
                sum
            ),
            WeightPolicy::Normalize if sum > f32::EPSILON => {
                for weight in &mut mesh.weights[range] {
                    weight.bias /= sum;
                }
            }
            WeightPolicy::Normalize => log::warn!(
                "mesh `{}` vertex {} has no usable weights, left unnormalized",
                mesh.material,
                index
            ),
        }
    }

    for vertex in mesh.vertices.iter_mut() {
        vertex.bind_position = skin::bind_position(vertex, &mesh.weights, joints);
        vertex.animated_position = vertex.bind_position;
    }

    log::debug!(
        "mesh `{}`: {} vertices, {} triangles, {} weights",
        mesh.material,
        mesh.vertices.len(),
        mesh.triangle_count(),
        mesh.weights.len()
    );

    Ok(())
}
