//! Per-vertex weighted blending.
//!
//! Both functions index `weights` with the vertex's weight range and assume the references were
//! validated by the parser; hand-built data with out-of-range indices panics.

use glam::{Mat4, Vec3};

use super::mesh::{Joint, SkinnedMesh, Vertex, Weight};

/// Bind pose position: sum of `bias * (joint.bind_pose * offset)` over the vertex's weights.
pub fn bind_position(vertex: &Vertex, weights: &[Weight], joints: &[Joint]) -> Vec3 {
    let mut position = Vec3::ZERO;
    for weight in &weights[vertex.weight_range()] {
        let joint = &joints[weight.joint];
        position += joint.bind_pose.transform_point3(weight.offset) * weight.bias;
    }
    position
}

/// Animated position: sum of `bias * (skin[joint] * bind_position)` over the vertex's weights.
pub fn animated_position(vertex: &Vertex, weights: &[Weight], skin_matrices: &[Mat4]) -> Vec3 {
    let mut position = Vec3::ZERO;
    for weight in &weights[vertex.weight_range()] {
        position += skin_matrices[weight.joint].transform_point3(vertex.bind_position) * weight.bias;
    }
    position
}

/// Recomputes `animated_position` of every vertex of `mesh`.
pub fn skin_mesh(mesh: &mut SkinnedMesh, skin_matrices: &[Mat4]) {
    profile_scope!("skin_mesh");
    for vertex in mesh.vertices.iter_mut() {
        vertex.animated_position = animated_position(vertex, &mesh.weights, skin_matrices);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use glam::Quat;

    fn weight(joint: usize, bias: f32) -> Weight {
        Weight {
            joint,
            bias,
            offset: Vec3::ONE,
        }
    }

    #[test]
    fn test_only_weight_range_contributes() {
        // joint i translates by 10^i on x so every weight leaves its own digit
        let joints: Vec<Joint> = (0..5)
            .map(|i| Joint::new(format!("j{}", i), None, Vec3::new(10f32.powi(i), 0.0, 0.0), Quat::IDENTITY))
            .collect();
        let weights: Vec<Weight> = (0..5).map(|i| weight(i, 1.0)).collect();
        let vertex = Vertex {
            first_weight: 2,
            weight_count: 3,
            ..Vertex::default()
        };

        let position = bind_position(&vertex, &weights, &joints);
        // joints 2, 3 and 4 each add offset (1, 1, 1) plus their translation
        assert_eq!(position, Vec3::new(100.0 + 1000.0 + 10000.0 + 3.0, 3.0, 3.0));

        let skins: Vec<Mat4> = (0..5)
            .map(|i| Mat4::from_translation(Vec3::new(0.0, 10f32.powi(i as i32), 0.0)))
            .collect();
        let animated = animated_position(&Vertex { bind_position: Vec3::ZERO, ..vertex }, &weights, &skins);
        assert_eq!(animated, Vec3::new(0.0, 11100.0, 0.0));
    }

    #[test]
    fn test_identity_skin_keeps_bind_pose() {
        let joints = vec![
            Joint::new("a", None, Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_y(0.7)),
            Joint::new("b", Some(0), Vec3::new(-1.0, 0.5, 0.0), Quat::from_rotation_x(-0.3)),
        ];
        let mut mesh = SkinnedMesh {
            material: "m".into(),
            vertices: vec![Vertex {
                first_weight: 0,
                weight_count: 2,
                ..Vertex::default()
            }],
            weights: vec![
                Weight {
                    joint: 0,
                    bias: 0.25,
                    offset: Vec3::new(0.0, 1.0, 0.0),
                },
                Weight {
                    joint: 1,
                    bias: 0.75,
                    offset: Vec3::new(2.0, 0.0, -1.0),
                },
            ],
            indices: vec![],
        };
        mesh.vertices[0].bind_position = bind_position(&mesh.vertices[0], &mesh.weights, &joints);

        skin_mesh(&mut mesh, &[Mat4::IDENTITY, Mat4::IDENTITY]);
        assert!(mesh.vertices[0]
            .animated_position
            .abs_diff_eq(mesh.vertices[0].bind_position, 1e-5));
    }
}
