//! id Software MD5 skeletal meshes (`.md5mesh`) and animation clips (`.md5anim`).

pub mod anim;
pub mod mesh;
pub mod model;
pub mod skeleton;
pub mod skin;

pub use anim::{AnimJoint, Animation, Component, ComponentMask, Frame};
pub use mesh::{Joint, SkinnedMesh, Vertex, Weight};
pub use model::SkinnedModel;
pub use skeleton::{JointPose, Skeleton};

use glam::{Quat, Vec3};

use crate::{
    error::{Location, ParseError, ParseResult},
    tokenizer::Tokenizer,
};

/// The only MD5 revision in circulation.
pub const MD5_VERSION: i64 = 10;

/// Rebuilds a unit quaternion from its stored `x y z` part.
///
/// The radicand is clamped so slightly denormalized input yields `w = 0` instead of NaN.
pub fn quat_from_xyz(xyz: Vec3) -> Quat {
    let w = (1.0 - xyz.length_squared()).max(0.0).sqrt();
    Quat::from_xyzw(xyz.x, xyz.y, xyz.z, w)
}

/// Reads `MD5Version 10` and `commandline "<str>"`, returning the command line.
pub(crate) fn read_header<'a>(tokenizer: &mut Tokenizer<'a>) -> ParseResult<&'a str> {
    let first = tokenizer.expect_token("`MD5Version`")?;
    if !first.is_string("MD5Version") {
        return Err(ParseError::UnsupportedFormat(format!(
            "expected `MD5Version` at {}, found `{}`",
            first.at, first.text
        )));
    }

    let version = tokenizer.expect_int("MD5 version")?;
    if version != MD5_VERSION {
        return Err(ParseError::UnsupportedFormat(format!(
            "MD5 version {} (only {} is supported)",
            version, MD5_VERSION
        )));
    }
    log::debug!("MD5Version = {}", version);

    tokenizer.expect_keyword("commandline")?;
    let commandline = tokenizer.expect_string("command line")?;
    log::debug!("commandline = {:?}", commandline);

    Ok(commandline)
}

/// Reads a parent index: `-1` for roots, otherwise an index strictly below `index`.
pub(crate) fn read_parent(tokenizer: &mut Tokenizer<'_>, index: usize) -> ParseResult<Option<usize>> {
    let token = tokenizer.expect_token("parent index")?;
    match token.as_int()? {
        -1 => Ok(None),
        parent if parent >= 0 && (parent as usize) < index => Ok(Some(parent as usize)),
        parent => Err(ParseError::mismatch(
            format!(
                "joint {} has parent {}, parents must be -1 or declared before their children",
                index, parent
            ),
            token.at,
        )),
    }
}

/// Checks that every parent is declared before its child.
pub(crate) fn check_parents(parents: impl IntoIterator<Item = Option<usize>>, at: Location) -> ParseResult<()> {
    for (index, parent) in parents.into_iter().enumerate() {
        if let Some(parent) = parent.filter(|&parent| parent >= index) {
            return Err(ParseError::mismatch(
                format!("joint {} has parent {}, parents must come first", index, parent),
                at,
            ));
        }
    }
    Ok(())
}

/// Reads `<keyword> <n>` and checks that `n` is the expected running index.
pub(crate) fn read_numbered(tokenizer: &mut Tokenizer<'_>, keyword: &str, expected: usize) -> ParseResult<()> {
    tokenizer.expect_keyword(keyword)?;
    let token = tokenizer.expect_token("element number")?;
    let found = token.as_int()?;
    if found != expected as i64 {
        return Err(ParseError::mismatch(
            format!("expected {} {}, found {} {}", keyword, expected, keyword, found),
            token.at,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reconstruct_w() {
        let q = quat_from_xyz(Vec3::new(0.5, 0.5, 0.5));
        assert!((q.w - 0.5).abs() < 1e-6);

        let q = quat_from_xyz(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(q.w, 0.0);

        // radicand slightly negative
        let q = quat_from_xyz(Vec3::new(0.7072, 0.7072, 0.0));
        assert!(!q.w.is_nan());
        assert_eq!(q.w, 0.0);
    }

    #[test]
    fn test_header() -> ParseResult<()> {
        let mut tokenizer = Tokenizer::new("MD5Version 10 commandline \"keepmesh\"");
        assert_eq!(read_header(&mut tokenizer)?, "keepmesh");

        assert!(matches!(
            read_header(&mut Tokenizer::new("MD5Version 11 commandline \"\"")),
            Err(ParseError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            read_header(&mut Tokenizer::new("mapProcFile003")),
            Err(ParseError::UnsupportedFormat(_))
        ));
        Ok(())
    }

    #[test]
    fn test_parent_order() -> ParseResult<()> {
        assert_eq!(read_parent(&mut Tokenizer::new("-1"), 0)?, None);
        assert_eq!(read_parent(&mut Tokenizer::new("0"), 1)?, Some(0));
        assert!(read_parent(&mut Tokenizer::new("1"), 1).is_err());
        assert!(read_parent(&mut Tokenizer::new("-2"), 3).is_err());
        Ok(())
    }
}
