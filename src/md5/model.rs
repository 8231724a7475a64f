use futures::future::try_join_all;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    assets::AssetSource,
    config::Md5Options,
    error::{AnimationError, LoadError, LoadResult, Location, ParseError, ParseResult},
};

use super::{anim::Animation, check_parents, mesh, mesh::Joint, mesh::SkinnedMesh, skin};

/// A skinned MD5 model: bind pose skeleton, material groups and the clips that drive them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinnedModel {
    pub joints: Vec<Joint>,
    pub meshes: Vec<SkinnedMesh>,
    pub animations: Vec<Animation>,
}

impl SkinnedModel {
    pub fn parse(source: &str) -> ParseResult<Self> {
        Self::parse_with(source, &Md5Options::default())
    }

    pub fn parse_with(source: &str, options: &Md5Options) -> ParseResult<Self> {
        let (joints, meshes) = mesh::parse(source, options)?;
        Ok(Self {
            joints,
            meshes,
            animations: Vec::new(),
        })
    }

    /// Rechecks joint, weight and vertex references, for models that were not parsed from text.
    pub fn validate(&self) -> ParseResult<()> {
        let at = Location::default();
        check_parents(self.joints.iter().map(|joint| joint.parent), at)?;
        for mesh in &self.meshes {
            mesh::check_references(mesh, self.joints.len(), at)?;
        }
        for (index, animation) in self.animations.iter().enumerate() {
            if animation.joints.len() != self.joints.len() {
                return Err(ParseError::mismatch(
                    format!(
                        "animation {} has {} joints but the mesh has {}",
                        index,
                        animation.joints.len(),
                        self.joints.len()
                    ),
                    at,
                ));
            }
            animation.validate()?;
        }
        Ok(())
    }

    /// Fetches and parses a mesh and its clips. Any failing fetch or parse fails the whole load.
    pub async fn load<S: AssetSource + ?Sized>(
        source: &S,
        mesh_path: &str,
        anim_paths: &[&str],
        options: &Md5Options,
    ) -> LoadResult<Self> {
        let (mesh_text, anim_texts) = futures::try_join!(
            source.fetch_text(mesh_path),
            try_join_all(anim_paths.iter().map(|path| source.fetch_text(path)))
        )?;

        let mut model = Self::parse_with(&mesh_text, options).map_err(|source| LoadError::Parse {
            path: mesh_path.to_owned(),
            source,
        })?;

        for (path, text) in anim_paths.iter().zip(anim_texts) {
            let animation = Animation::parse(&text).map_err(|source| LoadError::Parse {
                path: (*path).to_owned(),
                source,
            })?;
            model.add_animation(animation)?;
        }

        log::info!(
            "Loaded {} with {} joints, {} meshes and {} animations",
            mesh_path,
            model.joints.len(),
            model.meshes.len(),
            model.animations.len()
        );
        Ok(model)
    }

    /// Attaches a clip and returns its index. The clip must animate exactly the mesh's joints.
    pub fn add_animation(&mut self, animation: Animation) -> Result<usize, AnimationError> {
        if animation.joints.len() != self.joints.len() {
            return Err(AnimationError::JointCountMismatch {
                anim: animation.joints.len(),
                mesh: self.joints.len(),
            });
        }

        for (index, (anim_joint, joint)) in animation.joints.iter().zip(&self.joints).enumerate() {
            if anim_joint.name != joint.name {
                log::warn!(
                    "animation joint {} is `{}` but the mesh joint is `{}`",
                    index,
                    anim_joint.name,
                    joint.name
                );
            }
        }

        self.animations.push(animation);
        Ok(self.animations.len() - 1)
    }

    /// Poses the model with one frame of one clip and reskins every mesh.
    pub fn play_anim(&mut self, anim: usize, frame: usize) -> Result<(), AnimationError> {
        profile_function!();

        let animation = self
            .animations
            .get_mut(anim)
            .ok_or(AnimationError::NoSuchAnimation(anim))?;
        animation.decode_frame(frame)?;
        animation.compose_model_space();
        animation.compute_skin_matrices(&self.joints)?;

        for mesh in self.meshes.iter_mut() {
            skin::skin_mesh(mesh, &animation.skeleton.skin_matrices);
        }
        Ok(())
    }

    /// Model space segments from every joint to its parent in the bind pose.
    pub fn bind_pose_lines(&self) -> Vec<(Vec3, Vec3)> {
        self.joints
            .iter()
            .filter_map(|joint| Some((self.joints.get(joint.parent?)?.origin, joint.origin)))
            .collect()
    }

    /// Material names in mesh order, duplicates included.
    pub fn materials(&self) -> impl Iterator<Item = &str> {
        self.meshes.iter().map(|mesh| mesh.material.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MESH: &str = r#"
MD5Version 10
commandline ""
numJoints 2
numMeshes 1
joints {
    "origin" -1 ( 0 0 0 ) ( 0 0 0 )
    "child"   0 ( 0 1 0 ) ( 0 0 0 )
}
mesh {
    shader "body"
    numverts 1
    vert 0 ( 0 0 ) 0 1
    numtris 0
    numweights 1
    weight 0 1 1 ( 0 0 0 )
}
"#;

    const PUSH: &str = r#"
MD5Version 10
commandline ""
numFrames 1
numJoints 2
frameRate 24
numAnimatedComponents 3
hierarchy {
    "origin" -1 0 0
    "child"   0 7 0
}
bounds {
    ( 0 0 0 ) ( 0 1 1 )
}
baseframe {
    ( 0 0 0 ) ( 0 0 0 )
    ( 0 1 0 ) ( 0 0 0 )
}
frame 0 {
    0 1 1
}
"#;

    fn model_with(anim: &str) -> Result<SkinnedModel, Box<dyn std::error::Error>> {
        let mut model = SkinnedModel::parse(MESH)?;
        model.add_animation(Animation::parse(anim)?)?;
        Ok(model)
    }

    #[test]
    fn test_play_moves_weighted_vertex() -> Result<(), Box<dyn std::error::Error>> {
        let mut model = model_with(PUSH)?;
        let bind = model.meshes[0].vertices[0].bind_position;
        assert_eq!(bind, Vec3::new(0.0, 1.0, 0.0));

        model.play_anim(0, 0)?;
        let animated = model.meshes[0].vertices[0].animated_position;
        assert!(animated.abs_diff_eq(bind + Vec3::new(0.0, 0.0, 1.0), 1e-6));
        Ok(())
    }

    #[test]
    fn test_bind_pose_frame_is_identity() -> Result<(), Box<dyn std::error::Error>> {
        let mut model = model_with(&PUSH.replace("0 1 1\n}", "0 1 0\n}"))?;
        model.play_anim(0, 0)?;
        for vertex in &model.meshes[0].vertices {
            assert!(vertex.animated_position.abs_diff_eq(vertex.bind_position, 1e-5));
        }
        Ok(())
    }

    #[test]
    fn test_play_errors() -> Result<(), Box<dyn std::error::Error>> {
        let mut model = model_with(PUSH)?;
        assert_eq!(model.play_anim(1, 0), Err(AnimationError::NoSuchAnimation(1)));
        assert_eq!(
            model.play_anim(0, 1),
            Err(AnimationError::FrameOutOfRange { frame: 1, count: 1 })
        );
        Ok(())
    }

    #[test]
    fn test_attach_checks_joint_count() -> ParseResult<()> {
        let mut model = SkinnedModel::parse(MESH)?;
        let single = Animation::parse(
            &PUSH
                .replace("numJoints 2", "numJoints 1")
                .replace("    \"child\"   0 7 0\n", "")
                .replace("    ( 0 1 0 ) ( 0 0 0 )\n", "")
                .replace("numAnimatedComponents 3", "numAnimatedComponents 0")
                .replace("0 1 1\n", ""),
        )?;
        assert_eq!(
            model.add_animation(single),
            Err(AnimationError::JointCountMismatch { anim: 1, mesh: 2 })
        );
        assert!(model.animations.is_empty());
        Ok(())
    }

    #[test]
    fn test_bind_pose_lines() -> ParseResult<()> {
        let model = SkinnedModel::parse(MESH)?;
        assert_eq!(model.bind_pose_lines(), vec![(Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0))]);
        assert_eq!(model.materials().collect::<Vec<_>>(), vec!["body"]);
        Ok(())
    }
}
