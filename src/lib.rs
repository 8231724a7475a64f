#[macro_use]
mod profiler_macros;

pub mod assets;
pub mod bounds;
pub mod config;
pub mod coord;
pub mod error;
pub mod format;
pub mod md5;
pub mod proc;
pub mod tokenizer;

pub mod prelude {
    pub use crate::assets::{self, AssetSource, FsAssetSource, Session, TextureCache};
    pub use crate::bounds::Aabb;
    pub use crate::config::{ImportMeta, Md5Options, ProcOptions, UnknownBlockPolicy, WeightPolicy};
    pub use crate::error::{AnimationError, FormatError, LoadError, ParseError};
    pub use crate::md5::{Animation, Joint, Skeleton, SkinnedMesh, SkinnedModel};
    pub use crate::proc::ProcScene;
    pub use glam::*;
}
