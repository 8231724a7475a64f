//! Baked binary files written by the `id_asset` converter.

use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

use crate::{
    error::{FormatResult, ParseResult},
    md5::{Animation, SkinnedModel},
    proc::ProcScene,
};

/// Extension of a baked [`SkinnedModel`].
pub const MODEL_EXTENSION: &str = "md5model";
/// Extension of a baked [`Animation`].
pub const ANIM_EXTENSION: &str = "md5clip";
/// Extension of a baked [`ProcScene`].
pub const SCENE_EXTENSION: &str = "procscene";

/// Parsed data that can be stored with bincode and loaded without reparsing the text.
///
/// Loaded data goes through [`Bake::validate`], so a damaged file fails instead of panicking later.
pub trait Bake: Serialize + DeserializeOwned {
    /// The reference checks the text parser performs.
    fn validate(&self) -> ParseResult<()>;

    fn to_bytes(&self) -> FormatResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> FormatResult<Self> {
        let data = bincode::deserialize::<Self>(bytes)?;
        data.validate()?;
        Ok(data)
    }

    fn from_file(path: &Path) -> FormatResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    fn to_file(&self, path: &Path) -> FormatResult<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

impl Bake for SkinnedModel {
    fn validate(&self) -> ParseResult<()> {
        SkinnedModel::validate(self)
    }

    fn from_bytes(bytes: &[u8]) -> FormatResult<Self> {
        let mut model = bincode::deserialize::<Self>(bytes)?;
        model.validate()?;
        // pose buffers are not stored
        for animation in &mut model.animations {
            animation.skeleton.resize(animation.joints.len());
        }
        Ok(model)
    }
}

impl Bake for ProcScene {
    fn validate(&self) -> ParseResult<()> {
        ProcScene::validate(self)
    }
}

impl Bake for Animation {
    fn validate(&self) -> ParseResult<()> {
        Animation::validate(self)
    }

    fn from_bytes(bytes: &[u8]) -> FormatResult<Self> {
        let mut animation = bincode::deserialize::<Self>(bytes)?;
        animation.validate()?;
        // pose buffers are not stored
        animation.skeleton.resize(animation.joints.len());
        Ok(animation)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::FormatError,
        proc::{BspChild, BspNode},
    };
    use glam::Vec4;

    const MESH: &str = r#"
MD5Version 10
commandline ""
numJoints 1
numMeshes 1
joints {
    "origin" -1 ( 1 2 3 ) ( 0 0 0.5 )
}
mesh {
    shader "skin"
    numverts 3
    vert 0 ( 0 0 ) 0 1
    vert 1 ( 1 0 ) 0 1
    vert 2 ( 0 1 ) 0 1
    numtris 1
    tri 0 0 1 2
    numweights 1
    weight 0 0 1 ( 0 1 0 )
}
"#;

    const CLIP: &str = r#"
MD5Version 10
commandline ""
numFrames 1
numJoints 1
frameRate 30
numAnimatedComponents 1
hierarchy {
    "origin" -1 1 0
}
bounds {
    ( 0 0 0 ) ( 1 1 1 )
}
baseframe {
    ( 0 0 0 ) ( 0 0 0 )
}
frame 0 {
    2.5
}
"#;

    #[test]
    fn test_bake_model() -> Result<(), Box<dyn std::error::Error>> {
        let model = SkinnedModel::parse(MESH)?;
        let baked = SkinnedModel::from_bytes(&model.to_bytes()?)?;
        assert_eq!(baked, model);
        Ok(())
    }

    #[test]
    fn test_baked_animation_gets_pose_buffers() -> Result<(), Box<dyn std::error::Error>> {
        let clip = Animation::parse(CLIP)?;
        let mut baked = Animation::from_bytes(&clip.to_bytes()?)?;
        assert_eq!(baked.skeleton.poses.len(), 1);
        assert_eq!(baked.frames, clip.frames);

        baked.decode_frame(0)?;
        assert_eq!(baked.skeleton.poses[0].origin.x, 2.5);
        Ok(())
    }

    #[test]
    fn test_damaged_model_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let mut model = SkinnedModel::parse(MESH)?;
        model.meshes[0].weights[0].joint = 5;
        assert!(matches!(
            SkinnedModel::from_bytes(&model.to_bytes()?),
            Err(FormatError::InvalidData(_))
        ));

        let mut model = SkinnedModel::parse(MESH)?;
        model.meshes[0].vertices[1].weight_count = usize::MAX;
        assert!(matches!(
            SkinnedModel::from_bytes(&model.to_bytes()?),
            Err(FormatError::InvalidData(_))
        ));
        Ok(())
    }

    #[test]
    fn test_damaged_animation_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let mut clip = Animation::parse(CLIP)?;
        clip.joints[0].component_offset = 1;
        assert!(matches!(
            Animation::from_bytes(&clip.to_bytes()?),
            Err(FormatError::InvalidData(_))
        ));

        let mut clip = Animation::parse(CLIP)?;
        clip.frames[0].components.clear();
        assert!(matches!(
            Animation::from_bytes(&clip.to_bytes()?),
            Err(FormatError::InvalidData(_))
        ));
        Ok(())
    }

    #[test]
    fn test_cyclic_bsp_is_rejected() -> FormatResult<()> {
        let scene = ProcScene {
            nodes: vec![BspNode {
                plane: Vec4::new(0.0, 0.0, 1.0, 0.0),
                front: BspChild::Node(0),
                back: BspChild::Solid,
            }],
            ..ProcScene::default()
        };
        assert!(matches!(
            ProcScene::from_bytes(&scene.to_bytes()?),
            Err(FormatError::InvalidData(_))
        ));
        Ok(())
    }

    #[test]
    fn test_truncated_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = SkinnedModel::parse(MESH)?.to_bytes()?;
        assert!(matches!(
            SkinnedModel::from_bytes(&bytes[..bytes.len() / 2]),
            Err(FormatError::SerializationError(_))
        ));
        Ok(())
    }
}
