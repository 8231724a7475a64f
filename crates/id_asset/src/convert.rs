use anyhow::{Context, Result};
use id_engine::{
    config::ImportMeta,
    format::{self, Bake},
    md5::{Animation, SkinnedModel},
    proc::ProcScene,
};
use log::{debug, info, warn};
use std::{fs, path::Path};
use walkdir::WalkDir;

use crate::utils;

/// The kinds of source files the converter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssetKind {
    Md5Mesh,
    Md5Anim,
    Proc,
}

impl AssetKind {
    pub(crate) fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_ref() {
            "md5mesh" => Some(AssetKind::Md5Mesh),
            "md5anim" => Some(AssetKind::Md5Anim),
            "proc" => Some(AssetKind::Proc),
            _ => None,
        }
    }

    /// Name of the folder scoped meta file.
    fn folder_meta(self) -> &'static str {
        match self {
            AssetKind::Md5Mesh | AssetKind::Md5Anim => "md5",
            AssetKind::Proc => "proc",
        }
    }

    fn baked_extension(self) -> &'static str {
        match self {
            AssetKind::Md5Mesh => format::MODEL_EXTENSION,
            AssetKind::Md5Anim => format::ANIM_EXTENSION,
            AssetKind::Proc => format::SCENE_EXTENSION,
        }
    }
}

/// Parse meta from a file called `<file>.toml` or alternatively from the folder scoped
/// `md5.toml` / `proc.toml`, or else use the default meta.
pub(crate) fn parse_meta(path: &Path, kind: AssetKind) -> Result<ImportMeta> {
    let dir = path
        .parent()
        .with_context(|| format!("Path terminates in root or prefix: {}", path.display()))?;

    let candidates = [
        utils::combine_path(dir, utils::file_name(path)?, "toml"),
        utils::combine_path(dir, kind.folder_meta(), "toml"),
    ];
    match candidates.iter().find(|p| p.is_file()) {
        Some(meta) => {
            log::debug!("Using meta file `{}`", meta.display());
            ImportMeta::parse(meta).with_context(|| format!("Invalid meta file: {}", meta.display()))
        }
        None => Ok(ImportMeta::default()),
    }
}

fn bake(path: &Path, kind: AssetKind, meta: &ImportMeta) -> Result<Vec<u8>> {
    let text = utils::read_text(path)?;
    let context = || format!("Could not parse `{}`", path.display());

    let bytes = match kind {
        AssetKind::Md5Mesh => {
            let model = SkinnedModel::parse_with(&text, &meta.md5).with_context(context)?;
            info!(
                "{} joints, {} meshes, materials: {:?}",
                model.joints.len(),
                model.meshes.len(),
                model.materials().collect::<Vec<_>>()
            );
            model.to_bytes()
        }
        AssetKind::Md5Anim => {
            let animation = Animation::parse(&text).with_context(context)?;
            info!(
                "{} joints, {} frames at {} fps",
                animation.joints.len(),
                animation.frame_count(),
                animation.frame_rate
            );
            animation.to_bytes()
        }
        AssetKind::Proc => {
            let scene = ProcScene::parse_with(&text, &meta.proc).with_context(context)?;
            info!(
                "{} areas, {} portals, {} nodes",
                scene.areas.len(),
                scene.portals.len(),
                scene.nodes.len()
            );
            scene.to_bytes()
        }
    };

    bytes.with_context(|| format!("Could not serialize `{}`", path.display()))
}

fn save(path: &Path, output_dir: &Path, kind: AssetKind, data: &[u8]) -> Result<()> {
    let target = utils::combine_path(output_dir, utils::file_name(path)?, kind.baked_extension());
    utils::write_file(&target, data)
}

pub(crate) fn process(path: &Path, output_dir: &Path, kind: AssetKind) -> Result<()> {
    info!("Processing {:?} file: `{}`", kind, path.display());
    let meta = parse_meta(path, kind)?;
    save(path, output_dir, kind, &bake(path, kind, &meta)?)
}

/// What a run over an input folder did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Report {
    pub converted: usize,
    pub skipped: usize,
}

/// Bakes every recognized asset below `input` into the mirrored location below `output`.
///
/// Meta files are read by the assets they belong to, anything else is skipped with a warning.
/// The first asset that fails to convert stops the run.
pub(crate) fn convert_tree(input: &Path, output: &Path) -> Result<Report> {
    let mut report = Report::default();
    let files = WalkDir::new(input)
        .into_iter()
        .filter_map(|entry| entry.map_err(|err| warn!("Skipping unreadable entry: {}", err)).ok())
        .filter(|entry| entry.file_type().is_file());

    for entry in files {
        let path = entry.path();
        let extension = path.extension().and_then(|x| x.to_str()).unwrap_or_default();
        let kind = match AssetKind::from_extension(extension) {
            Some(kind) => kind,
            None if extension.eq_ignore_ascii_case("toml") => {
                debug!("Meta file {}", path.display());
                continue;
            }
            None => {
                warn!("Skipping unsupported file {}", path.display());
                report.skipped += 1;
                continue;
            }
        };

        let relative = path
            .strip_prefix(input)
            .with_context(|| format!("{} is outside of {}", path.display(), input.display()))?;
        let target_dir = output.join(relative.parent().unwrap_or_else(|| Path::new("")));
        fs::create_dir_all(&target_dir)
            .with_context(|| format!("Could not create output folder: {}", target_dir.display()))?;

        process(path, &target_dir, kind)?;
        report.converted += 1;
    }

    Ok(report)
}
