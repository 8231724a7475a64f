use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::{
    bounds::Aabb,
    error::{AnimationError, Location, ParseError, ParseResult},
    tokenizer::Tokenizer,
};

use super::{check_parents, mesh::Joint, quat_from_xyz, read_header, read_numbered, read_parent, skeleton::Skeleton};

/// One animatable scalar of a joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Tx,
    Ty,
    Tz,
    Qx,
    Qy,
    Qz,
}

impl Component {
    /// Order in which set components consume a frame's floats.
    pub const ORDER: [Component; 6] = [
        Component::Tx,
        Component::Ty,
        Component::Tz,
        Component::Qx,
        Component::Qy,
        Component::Qz,
    ];

    pub const fn bit(self) -> u8 {
        match self {
            Component::Tx => 1 << 0,
            Component::Ty => 1 << 1,
            Component::Tz => 1 << 2,
            Component::Qx => 1 << 3,
            Component::Qy => 1 << 4,
            Component::Qz => 1 << 5,
        }
    }
}

/// Which of the six components a clip animates for one joint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMask(pub u8);

impl ComponentMask {
    pub const ALL: u8 = 0b11_1111;

    pub fn contains(self, component: Component) -> bool {
        self.0 & component.bit() != 0
    }

    pub fn count(self) -> usize {
        Component::ORDER.iter().filter(|&&c| self.contains(c)).count()
    }
}

/// Channel binding of one joint inside a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimJoint {
    pub name: String,
    pub parent: Option<usize>,
    pub components: ComponentMask,
    /// First float of this joint inside every frame
    pub component_offset: usize,
    /// Parent relative rest origin, used for components the clip does not animate
    pub base_origin: Vec3,
    pub base_orientation: Quat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Informational only
    pub bounds: Aabb,
    pub components: Vec<f32>,
}

/// A parsed `.md5anim` clip together with the pose buffers it writes while playing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub joints: Vec<AnimJoint>,
    pub frames: Vec<Frame>,
    pub frame_rate: u32,
    pub animated_components: usize,
    #[serde(skip)]
    pub skeleton: Skeleton,
}

impl Animation {
    pub fn parse(source: &str) -> ParseResult<Self> {
        profile_function!();

        let mut tokenizer = Tokenizer::new(source);
        read_header(&mut tokenizer)?;

        tokenizer.expect_keyword("numFrames")?;
        let frame_count = tokenizer.expect_count("frame count")?;
        tokenizer.expect_keyword("numJoints")?;
        let joint_count = tokenizer.expect_count("joint count")?;
        tokenizer.expect_keyword("frameRate")?;
        let token = tokenizer.expect_token("frame rate")?;
        let frame_rate = token.as_int()?;
        let frame_rate = u32::try_from(frame_rate)
            .map_err(|_| ParseError::mismatch(format!("frame rate {} is out of range", frame_rate), token.at))?;
        tokenizer.expect_keyword("numAnimatedComponents")?;
        let animated_components = tokenizer.expect_count("animated component count")?;
        log::debug!(
            "numFrames = {}, numJoints = {}, frameRate = {}, numAnimatedComponents = {}",
            frame_count,
            joint_count,
            frame_rate,
            animated_components
        );

        let mut joints = read_hierarchy(&mut tokenizer, joint_count, animated_components)?;
        let mut frames = read_bounds(&mut tokenizer, frame_count)?;
        read_base_frame(&mut tokenizer, &mut joints)?;
        for (index, frame) in frames.iter_mut().enumerate() {
            frame.components = read_frame(&mut tokenizer, index, animated_components)?;
        }

        if let Some(extra) = tokenizer.next_token()? {
            log::warn!("Ignoring trailing content after {} frames at {}", frame_count, extra.at);
        }

        Ok(Self {
            skeleton: Skeleton::with_joints(joints.len()),
            joints,
            frames,
            frame_rate,
            animated_components,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Length in seconds.
    pub fn duration(&self) -> f32 {
        if self.frame_rate == 0 {
            0.0
        } else {
            self.frames.len() as f32 / self.frame_rate as f32
        }
    }

    /// Frame shown at `time` seconds, wrapping around when `looping` and clamping otherwise.
    pub fn frame_at(&self, time: f32, looping: bool) -> usize {
        let count = self.frames.len();
        if count == 0 {
            return 0;
        }
        let frame = (time.max(0.0) * self.frame_rate as f32).floor() as usize;
        if looping {
            frame % count
        } else {
            frame.min(count - 1)
        }
    }

    /// Fills every joint pose with the frame's parent relative transform.
    pub fn decode_frame(&mut self, frame_index: usize) -> Result<(), AnimationError> {
        let frame = self.frames.get(frame_index).ok_or(AnimationError::FrameOutOfRange {
            frame: frame_index,
            count: self.frames.len(),
        })?;
        self.skeleton.resize(self.joints.len());

        for (joint, pose) in self.joints.iter().zip(self.skeleton.poses.iter_mut()) {
            let mut origin = joint.base_origin;
            let mut rotation = joint.base_orientation.xyz();

            let mut values = frame.components.get(joint.component_offset..).unwrap_or_default().iter();
            for component in Component::ORDER {
                if !joint.components.contains(component) {
                    continue;
                }
                // offsets and counts are checked against the frame size while parsing
                let value = values.next().copied().unwrap_or_default();
                match component {
                    Component::Tx => origin.x = value,
                    Component::Ty => origin.y = value,
                    Component::Tz => origin.z = value,
                    Component::Qx => rotation.x = value,
                    Component::Qy => rotation.y = value,
                    Component::Qz => rotation.z = value,
                }
            }

            let orientation = quat_from_xyz(rotation).normalize();
            pose.parent = joint.parent;
            pose.origin = origin;
            pose.orientation = orientation;
            pose.local = Mat4::from_rotation_translation(orientation, origin);
        }

        Ok(())
    }

    /// Rechecks the references the parser guarantees, for clips that were not parsed from text.
    pub fn validate(&self) -> ParseResult<()> {
        let at = Location::default();
        check_parents(self.joints.iter().map(|joint| joint.parent), at)?;

        for joint in &self.joints {
            if !fits(joint.components, joint.component_offset, self.animated_components) {
                return Err(ParseError::mismatch(
                    format!(
                        "joint `{}` reads {} components from offset {}, only {} exist",
                        joint.name,
                        joint.components.count(),
                        joint.component_offset,
                        self.animated_components
                    ),
                    at,
                ));
            }
        }

        if let Some((index, frame)) = self
            .frames
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.components.len() != self.animated_components)
        {
            return Err(ParseError::mismatch(
                format!(
                    "frame {} has {} components, expected {}",
                    index,
                    frame.components.len(),
                    self.animated_components
                ),
                at,
            ));
        }
        Ok(())
    }

    pub fn compose_model_space(&mut self) {
        self.skeleton.compose_model_space();
    }

    pub fn compute_skin_matrices(&mut self, joints: &[Joint]) -> Result<(), AnimationError> {
        self.skeleton.compute_skin_matrices(joints)
    }
}

/// Whether a joint's components starting at `offset` lie inside a frame of `animated_components`.
fn fits(components: ComponentMask, offset: usize, animated_components: usize) -> bool {
    offset
        .checked_add(components.count())
        .map_or(false, |end| end <= animated_components)
}

fn read_hierarchy(tokenizer: &mut Tokenizer<'_>, count: usize, animated_components: usize) -> ParseResult<Vec<AnimJoint>> {
    tokenizer.expect_keyword("hierarchy")?;
    tokenizer.expect_keyword("{")?;

    let mut joints = Vec::with_capacity(count.min(1 << 12));
    let mut total = 0usize;
    for index in 0..count {
        let name = tokenizer.expect_string("joint name")?.to_owned();
        let parent = read_parent(tokenizer, index)?;

        let token = tokenizer.expect_token("component bits")?;
        let bits = token.as_int()?;
        if !(0..=ComponentMask::ALL as i64).contains(&bits) {
            return Err(ParseError::mismatch(
                format!("joint `{}` has component bits {}, only 6 components exist", name, bits),
                token.at,
            ));
        }
        let components = ComponentMask(bits as u8);

        let token = tokenizer.expect_token("component offset")?;
        let offset = token.as_int()?;
        let component_offset = match usize::try_from(offset) {
            Ok(start) if fits(components, start, animated_components) => start,
            _ => {
                return Err(ParseError::mismatch(
                    format!(
                        "joint `{}` reads {} components from offset {}, only {} exist",
                        name,
                        components.count(),
                        offset,
                        animated_components
                    ),
                    token.at,
                ))
            }
        };

        total += components.count();
        joints.push(AnimJoint {
            name,
            parent,
            components,
            component_offset,
            base_origin: Vec3::ZERO,
            base_orientation: Quat::IDENTITY,
        });
    }

    let at = tokenizer.location();
    tokenizer.expect_keyword("}")?;

    if total != animated_components {
        return Err(ParseError::mismatch(
            format!(
                "joints animate {} components but numAnimatedComponents is {}",
                total, animated_components
            ),
            at,
        ));
    }

    Ok(joints)
}

fn read_bounds(tokenizer: &mut Tokenizer<'_>, count: usize) -> ParseResult<Vec<Frame>> {
    tokenizer.expect_keyword("bounds")?;
    tokenizer.expect_keyword("{")?;

    let mut frames = Vec::with_capacity(count.min(1 << 12));
    for _ in 0..count {
        let mins = tokenizer.expect_paren_vec3("bounds min")?;
        let maxs = tokenizer.expect_paren_vec3("bounds max")?;
        frames.push(Frame {
            bounds: Aabb::new(mins, maxs),
            components: Vec::new(),
        });
    }

    tokenizer.expect_keyword("}")?;
    Ok(frames)
}

fn read_base_frame(tokenizer: &mut Tokenizer<'_>, joints: &mut [AnimJoint]) -> ParseResult<()> {
    tokenizer.expect_keyword("baseframe")?;
    tokenizer.expect_keyword("{")?;

    for joint in joints.iter_mut() {
        joint.base_origin = tokenizer.expect_paren_vec3("base origin")?;
        joint.base_orientation = quat_from_xyz(tokenizer.expect_paren_vec3("base orientation")?);
    }

    tokenizer.expect_keyword("}")?;
    Ok(())
}

fn read_frame(tokenizer: &mut Tokenizer<'_>, index: usize, animated_components: usize) -> ParseResult<Vec<f32>> {
    read_numbered(tokenizer, "frame", index)?;
    tokenizer.expect_keyword("{")?;

    let at = tokenizer.location();
    let mut components = Vec::with_capacity(animated_components.min(1 << 16));
    loop {
        let token = tokenizer.expect_token("frame component or `}`")?;
        if token.is_string("}") {
            break;
        }
        components.push(token.as_float()?);
    }

    if components.len() != animated_components {
        return Err(ParseError::mismatch(
            format!(
                "frame {} has {} components, expected {}",
                index,
                components.len(),
                animated_components
            ),
            at,
        ));
    }

    Ok(components)
}

#[cfg(test)]
mod test {
    use super::*;

    const WAVE: &str = r#"
MD5Version 10
commandline "anim wave"

numFrames 2
numJoints 2
frameRate 24
numAnimatedComponents 4

hierarchy {
    "origin" -1 0 0     //
    "child"   0 13 0    // Tx Tz Qx
}

bounds {
    ( -1 -1 -1 ) ( 1 1 1 )
    ( -2 -2 -2 ) ( 2 2 2 )
}

baseframe {
    ( 0 0 0 ) ( 0 0 0 )
    ( 0 1 0 ) ( 0 0 0 )
}

frame 0 {
    0 0 0 7
}

frame 1 {
    0.5 1.5 0.6 7
}
"#;

    #[test]
    fn test_parse_anim() -> ParseResult<()> {
        let anim = Animation::parse(&WAVE.replace("numAnimatedComponents 4", "numAnimatedComponents 3").replace(" 7\n", "\n"))?;
        assert_eq!(anim.frame_count(), 2);
        assert_eq!(anim.frame_rate, 24);
        assert_eq!(anim.joints[1].components, ComponentMask(13));
        assert_eq!(anim.joints[1].components.count(), 3);
        assert_eq!(anim.joints[1].base_origin, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(anim.frames[1].bounds.maxs, Vec3::splat(2.0));
        assert_eq!(anim.frames[1].components, vec![0.5, 1.5, 0.6]);
        assert_eq!(anim.skeleton.poses.len(), 2);
        Ok(())
    }

    #[test]
    fn test_component_sum_must_match() {
        // joints animate 3 components, header claims 4
        let err = Animation::parse(WAVE).unwrap_err();
        assert!(matches!(err, ParseError::StructuralMismatch { .. }), "{}", err);
    }

    #[test]
    fn test_component_offset_out_of_range() {
        // both joints animate Tx, the sum matches but the second reads past the frame
        let source = WAVE
            .replace("numAnimatedComponents 4", "numAnimatedComponents 1")
            .replace("\"origin\" -1 0 0", "\"origin\" -1 1 0")
            .replace("\"child\"   0 13 0", "\"child\"   0 1 1");
        let err = Animation::parse(&source).unwrap_err();
        assert!(matches!(err, ParseError::StructuralMismatch { .. }), "{}", err);
    }

    #[test]
    fn test_huge_component_offset() {
        let source = WAVE.replace("\"origin\" -1 0 0", "\"origin\" -1 1 9223372036854775807");
        let err = Animation::parse(&source).unwrap_err();
        assert!(matches!(err, ParseError::StructuralMismatch { .. }), "{}", err);
    }

    #[test]
    fn test_frame_rate_out_of_range() {
        let err = Animation::parse(&WAVE.replace("frameRate 24", "frameRate 4294967296")).unwrap_err();
        assert!(matches!(err, ParseError::StructuralMismatch { .. }), "{}", err);
    }

    #[test]
    fn test_frame_component_count_must_match() {
        let source = WAVE
            .replace("numAnimatedComponents 4", "numAnimatedComponents 3")
            .replace("0 0 0 7", "0 0 0");
        assert!(matches!(
            Animation::parse(&source),
            Err(ParseError::StructuralMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_frame_in_canonical_order() -> Result<(), Box<dyn std::error::Error>> {
        let source = WAVE
            .replace("numAnimatedComponents 4", "numAnimatedComponents 3")
            .replace(" 7\n", "\n");
        let mut anim = Animation::parse(&source)?;
        anim.decode_frame(1)?;

        let pose = anim.skeleton.poses[1];
        // bits Tx | Tz | Qx consume 0.5, 1.5, 0.6 in that order, Ty keeps the base value
        assert_eq!(pose.origin, Vec3::new(0.5, 1.0, 1.5));
        assert!((pose.orientation.x - 0.6).abs() < 1e-6);
        assert!((pose.orientation.w - 0.8).abs() < 1e-6);
        assert!((pose.orientation.length() - 1.0).abs() < 1e-6);
        assert_eq!(pose.parent, Some(0));

        assert_eq!(
            anim.decode_frame(2),
            Err(AnimationError::FrameOutOfRange { frame: 2, count: 2 })
        );
        Ok(())
    }

    #[test]
    fn test_frame_timing() -> ParseResult<()> {
        let source = WAVE
            .replace("numAnimatedComponents 4", "numAnimatedComponents 3")
            .replace(" 7\n", "\n");
        let anim = Animation::parse(&source)?;
        assert!((anim.duration() - 2.0 / 24.0).abs() < 1e-6);
        assert_eq!(anim.frame_at(0.0, false), 0);
        assert_eq!(anim.frame_at(1.0 / 24.0 + 0.001, false), 1);
        assert_eq!(anim.frame_at(10.0, false), 1);
        assert_eq!(anim.frame_at(2.0 / 24.0 + 0.001, true), 0);
        Ok(())
    }

    #[test]
    fn test_component_mask() {
        let mask = ComponentMask(0b100101);
        let set: Vec<Component> = Component::ORDER.into_iter().filter(|&c| mask.contains(c)).collect();
        assert_eq!(set, vec![Component::Tx, Component::Tz, Component::Qz]);
        assert_eq!(mask.count(), 3);
    }
}
