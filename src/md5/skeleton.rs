use glam::{Mat4, Quat, Vec3};

use crate::error::AnimationError;

use super::mesh::Joint;

/// Pose of one joint for the frame that was decoded last.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointPose {
    pub parent: Option<usize>,
    /// Parent relative origin
    pub origin: Vec3,
    /// Parent relative orientation
    pub orientation: Quat,
    /// Joint space to parent space
    pub local: Mat4,
    /// Joint space to model space, valid after [`Skeleton::compose_model_space`]
    pub model: Mat4,
}

impl Default for JointPose {
    fn default() -> Self {
        Self {
            parent: None,
            origin: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            local: Mat4::IDENTITY,
            model: Mat4::IDENTITY,
        }
    }
}

/// Reusable pose buffers of one animation clip.
///
/// Updating runs in three phases, each writing its own buffer: decoding fills
/// [`JointPose::local`], [`Skeleton::compose_model_space`] fills [`JointPose::model`] and
/// [`Skeleton::compute_skin_matrices`] fills `skin_matrices`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    pub poses: Vec<JointPose>,
    /// Maps bind pose model space to the current frame's model space, one per joint
    pub skin_matrices: Vec<Mat4>,
}

impl Skeleton {
    pub fn with_joints(count: usize) -> Self {
        Self {
            poses: vec![JointPose::default(); count],
            skin_matrices: vec![Mat4::IDENTITY; count],
        }
    }

    pub fn resize(&mut self, count: usize) {
        self.poses.resize(count, JointPose::default());
        self.skin_matrices.resize(count, Mat4::IDENTITY);
    }

    /// Composes parent chains. Parents always precede their children, so one pass in
    /// declaration order sees every parent already in model space.
    pub fn compose_model_space(&mut self) {
        for index in 0..self.poses.len() {
            let pose = self.poses[index];
            self.poses[index].model = match pose.parent {
                Some(parent) => self.poses[parent].model * pose.local,
                None => pose.local,
            };
        }
    }

    /// Multiplies every model space pose with the matching joint's inverse bind pose.
    pub fn compute_skin_matrices(&mut self, joints: &[Joint]) -> Result<(), AnimationError> {
        if joints.len() != self.poses.len() {
            return Err(AnimationError::JointCountMismatch {
                anim: self.poses.len(),
                mesh: joints.len(),
            });
        }
        self.skin_matrices.resize(self.poses.len(), Mat4::IDENTITY);
        for ((skin, pose), joint) in self.skin_matrices.iter_mut().zip(&self.poses).zip(joints) {
            *skin = pose.model * joint.inverse_bind_pose;
        }
        Ok(())
    }

    /// Model space segments from every joint to its parent.
    pub fn joint_lines(&self) -> Vec<(Vec3, Vec3)> {
        self.poses
            .iter()
            .filter_map(|pose| {
                let parent = self.poses.get(pose.parent?)?;
                Some((
                    parent.model.transform_point3(Vec3::ZERO),
                    pose.model.transform_point3(Vec3::ZERO),
                ))
            })
            .collect()
    }
}
