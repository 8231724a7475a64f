use glam::{Vec3, Vec4};

use crate::{
    bounds::Aabb,
    config::{ProcOptions, UnknownBlockPolicy},
    coord,
    error::{Location, ParseError, ParseResult},
    tokenizer::Tokenizer,
};

use super::{Area, BspChild, BspNode, Portal, ProcScene, ProcVertex, Surface};

const MAGIC: &str = "mapProcFile";

/// The `.proc` revision written by the Doom 3 map compiler.
pub const PROC_VERSION: u32 = 3;

const MAX_PREALLOC: usize = 1 << 16;

pub(super) fn parse(source: &str, options: &ProcOptions) -> ParseResult<ProcScene> {
    profile_function!();

    let mut tokenizer = Tokenizer::new(source);
    let mut scene = ProcScene {
        version: read_version(&mut tokenizer)?,
        ..ProcScene::default()
    };

    while let Some(token) = tokenizer.next_token()? {
        match token.text {
            "model" if !token.is_number() => {
                let area = read_area(&mut tokenizer, options)?;
                scene.bounds.merge(&area.bounds);
                scene.areas.push(area);
            }
            "interAreaPortals" if !token.is_number() => {
                scene.portals.extend(read_portals(&mut tokenizer, options)?);
            }
            "nodes" if !token.is_number() => {
                scene.nodes.extend(read_nodes(&mut tokenizer, options)?);
            }
            "shadowModel" if !token.is_number() => {
                log::debug!("Skipping shadowModel at {}", token.at);
                tokenizer.skip_block()?;
            }
            _ => match options.unknown_blocks {
                UnknownBlockPolicy::Reject => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "`model`, `interAreaPortals`, `nodes` or `shadowModel`".to_owned(),
                        found: token.text.to_owned(),
                        at: token.at,
                    })
                }
                UnknownBlockPolicy::Skip => {
                    log::warn!("Skipping unknown keyword `{}` at {}", token.text, token.at);
                    if tokenizer.peek()?.map_or(false, |next| next.is_string("{")) {
                        tokenizer.skip_block()?;
                    }
                }
            },
        }
    }

    let end = tokenizer.location();
    link_portals(&mut scene, end)?;
    validate_nodes(&scene, end)?;

    log::debug!(
        "mapProcFile{:03}: {} areas, {} portals, {} nodes, bounds {:?}",
        scene.version,
        scene.areas.len(),
        scene.portals.len(),
        scene.nodes.len(),
        scene.bounds
    );
    Ok(scene)
}

/// Reads `mapProcFile<version>`, the version being glued to the magic.
fn read_version(tokenizer: &mut Tokenizer<'_>) -> ParseResult<u32> {
    let token = tokenizer.expect_token("`mapProcFile`")?;
    let version = token
        .text
        .strip_prefix(MAGIC)
        .ok_or_else(|| ParseError::UnsupportedFormat(format!("expected `{}` at {}, found `{}`", MAGIC, token.at, token.text)))?;
    let version: u32 = version
        .parse()
        .map_err(|_| ParseError::UnsupportedFormat(format!("invalid proc version `{}`", version)))?;
    if version != PROC_VERSION {
        return Err(ParseError::UnsupportedFormat(format!(
            "proc version {} (only {} is supported)",
            version, PROC_VERSION
        )));
    }
    Ok(version)
}

/// `model { "name" numSurfaces { surface } ... }`
fn read_area(tokenizer: &mut Tokenizer<'_>, options: &ProcOptions) -> ParseResult<Area> {
    tokenizer.expect_keyword("{")?;
    let name = tokenizer.expect_string("model name")?.to_owned();
    let surface_count = tokenizer.expect_count("surface count")?;

    let mut area = Area {
        name,
        surfaces: Vec::with_capacity(surface_count.min(MAX_PREALLOC)),
        ..Area::default()
    };
    for _ in 0..surface_count {
        let surface = read_surface(tokenizer, options)?;
        area.bounds.merge(&surface.bounds);
        area.surfaces.push(surface);
    }
    tokenizer.expect_keyword("}")?;

    log::debug!("area `{}` bounds {:?}", area.name, area.bounds);
    Ok(area)
}

/// `{ "material" numVerts numIndexes ( x y z s t nx ny nz ) ... indices }`
fn read_surface(tokenizer: &mut Tokenizer<'_>, options: &ProcOptions) -> ParseResult<Surface> {
    tokenizer.expect_keyword("{")?;
    let material = tokenizer.expect_string("material name")?.to_owned();
    let vertex_count = tokenizer.expect_count("vertex count")?;
    let count_token = tokenizer.expect_token("index count")?;
    let index_count = count_token.as_int()?;
    if index_count < 0 || index_count % 3 != 0 {
        return Err(ParseError::mismatch(
            format!("surface `{}` has {} indices, expected a multiple of 3", material, index_count),
            count_token.at,
        ));
    }
    let index_count = index_count as usize;

    let mut bounds = Aabb::empty();
    let mut vertices = Vec::with_capacity(vertex_count.min(MAX_PREALLOC));
    for _ in 0..vertex_count {
        tokenizer.expect_keyword("(")?;
        let position = coord::id_to_gl_scaled(tokenizer.expect_vec3("vertex position")?, options.scale);
        let uv = coord::flip_uv(tokenizer.expect_vec2("texture coordinate")?);
        let normal = coord::id_to_gl(tokenizer.expect_vec3("vertex normal")?);
        tokenizer.expect_keyword(")")?;
        bounds.add_point(position);
        vertices.push(ProcVertex { position, uv, normal });
    }

    let mut indices = Vec::with_capacity(index_count.min(MAX_PREALLOC));
    for _ in 0..index_count / 3 {
        let mut corners = [0u32; 3];
        for corner in corners.iter_mut() {
            let token = tokenizer.expect_token("surface index")?;
            let value = token.as_int()?;
            if value < 0 || value as usize >= vertex_count {
                return Err(ParseError::mismatch(
                    format!("surface index {} outside of {} vertices", value, vertex_count),
                    token.at,
                ));
            }
            *corner = value as u32;
        }
        // clockwise to counter-clockwise
        indices.extend_from_slice(&[corners[2], corners[1], corners[0]]);
    }
    tokenizer.expect_keyword("}")?;

    log::debug!("surface `{}` bounds {:?}", material, bounds);
    Ok(Surface {
        material,
        vertices,
        indices,
        bounds,
    })
}

/// `interAreaPortals { numAreas numPortals numPoints area0 area1 ( x y z ) ... }`
fn read_portals(tokenizer: &mut Tokenizer<'_>, options: &ProcOptions) -> ParseResult<Vec<Portal>> {
    tokenizer.expect_keyword("{")?;
    let area_count = tokenizer.expect_count("area count")?;
    let portal_count = tokenizer.expect_count("portal count")?;
    log::debug!("interAreaPortals: {} areas, {} portals", area_count, portal_count);

    let mut portals = Vec::with_capacity(portal_count.min(MAX_PREALLOC));
    for _ in 0..portal_count {
        let point_count = tokenizer.expect_count("portal point count")?;
        let areas = [
            tokenizer.expect_count("positive side area")?,
            tokenizer.expect_count("negative side area")?,
        ];
        let mut points = Vec::with_capacity(point_count.min(MAX_PREALLOC));
        for _ in 0..point_count {
            points.push(coord::id_to_gl_scaled(
                tokenizer.expect_paren_vec3("portal point")?,
                options.scale,
            ));
        }

        let plane = match points.as_slice() {
            [a, b, c, ..] => {
                let normal = (*b - *a).cross(*c - *a).normalize_or_zero();
                if normal == Vec3::ZERO {
                    Vec4::ZERO
                } else {
                    normal.extend(-normal.dot(*a))
                }
            }
            _ => Vec4::ZERO,
        };
        portals.push(Portal { points, plane, areas });
    }
    tokenizer.expect_keyword("}")?;

    Ok(portals)
}

/// `nodes { numNodes ( a b c d ) front back ... }`
fn read_nodes(tokenizer: &mut Tokenizer<'_>, options: &ProcOptions) -> ParseResult<Vec<BspNode>> {
    tokenizer.expect_keyword("{")?;
    let node_count = tokenizer.expect_count("node count")?;

    let mut nodes = Vec::with_capacity(node_count.min(MAX_PREALLOC));
    for _ in 0..node_count {
        let plane = coord::id_plane_to_gl(tokenizer.expect_paren_vec4("node plane")?, options.scale);
        let front = BspChild::from_raw(tokenizer.expect_int("front child")?);
        let back = BspChild::from_raw(tokenizer.expect_int("back child")?);
        nodes.push(BspNode { plane, front, back });
    }
    tokenizer.expect_keyword("}")?;

    Ok(nodes)
}

/// Checks portal area references and records every portal on both of its areas.
fn link_portals(scene: &mut ProcScene, at: Location) -> ParseResult<()> {
    let area_count = scene.areas.len();
    for (index, portal) in scene.portals.iter().enumerate() {
        for &area in &portal.areas {
            let area = scene.areas.get_mut(area).ok_or_else(|| {
                ParseError::mismatch(
                    format!("portal {} references area {} of {}", index, area, area_count),
                    at,
                )
            })?;
            if !area.portals.contains(&index) {
                area.portals.push(index);
            }
        }
    }
    Ok(())
}

pub(super) fn validate(scene: &ProcScene) -> ParseResult<()> {
    let at = Location::default();
    for area in &scene.areas {
        for surface in &area.surfaces {
            if let Some(index) = surface.indices.iter().find(|&&index| index as usize >= surface.vertices.len()) {
                return Err(ParseError::mismatch(
                    format!(
                        "area `{}` surface `{}` index {} outside of {} vertices",
                        area.name,
                        surface.material,
                        index,
                        surface.vertices.len()
                    ),
                    at,
                ));
            }
        }
        if let Some(portal) = area.portals.iter().find(|&&portal| portal >= scene.portals.len()) {
            return Err(ParseError::mismatch(
                format!("area `{}` references portal {} of {}", area.name, portal, scene.portals.len()),
                at,
            ));
        }
    }

    for (index, portal) in scene.portals.iter().enumerate() {
        if let Some(area) = portal.areas.iter().find(|&&area| area >= scene.areas.len()) {
            return Err(ParseError::mismatch(
                format!("portal {} references area {} of {}", index, area, scene.areas.len()),
                at,
            ));
        }
    }

    validate_nodes(scene, at)
}

fn validate_nodes(scene: &ProcScene, at: Location) -> ParseResult<()> {
    for (index, node) in scene.nodes.iter().enumerate() {
        for child in [node.front, node.back] {
            let valid = match child {
                BspChild::Node(next) => next > index && next < scene.nodes.len(),
                BspChild::Area(area) => area < scene.areas.len(),
                BspChild::Solid => true,
            };
            if !valid {
                return Err(ParseError::mismatch(
                    format!("node {} has invalid child {:?}", index, child),
                    at,
                ));
            }
        }
    }
    Ok(())
}
