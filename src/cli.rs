use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use vista_assets::TexturePolicy;

use crate::settings::ViewerSettings;

#[derive(Parser, Debug)]
#[command(name = "vista")]
#[command(version)]
#[command(about = "Import a glTF scene through the Vista pipeline and report what a renderer would receive")]
pub struct CliArgs {
    /// Scene file, relative to --root-dir when given
    pub model: PathBuf,

    /// Directory the scene file and its textures live in
    #[arg(long)]
    pub root_dir: Option<PathBuf>,

    /// Uniform scale applied at the scene root
    #[arg(long)]
    pub scale: Option<f32>,

    /// Decode and upload material textures
    #[arg(long)]
    pub textures: bool,

    /// Which materials get their textures loaded
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Texture decode worker count (0 = one per core)
    #[arg(long)]
    pub decode_threads: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    /// Write the effective settings back to the config file
    #[arg(long)]
    pub save_settings: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    MetallicGate,
    AnyPbr,
    Always,
}

impl From<PolicyArg> for TexturePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::MetallicGate => TexturePolicy::MetallicFactorGate,
            PolicyArg::AnyPbr => TexturePolicy::AnyPbr,
            PolicyArg::Always => TexturePolicy::Always,
        }
    }
}

impl CliArgs {
    /// Override settings with whatever was given on the command line
    pub fn apply(&self, settings: &mut ViewerSettings) {
        if let Some(scale) = self.scale {
            settings.import.scale = scale;
        }
        if self.textures {
            settings.import.load_textures = true;
        }
        if let Some(policy) = self.policy {
            settings.import.texture_policy = policy.into();
        }
        if let Some(threads) = self.decode_threads {
            settings.textures.decode_threads = threads;
        }
        if self.verbose {
            settings.logging.level = "debug".to_string();
        }
    }

    /// Split the model argument into the directory and file name `Model::load`
    /// expects
    pub fn scene_location(&self) -> (PathBuf, PathBuf) {
        match &self.root_dir {
            Some(root) => (root.clone(), self.model.clone()),
            None => {
                let root = self
                    .model
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_default();
                let file = self
                    .model
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| self.model.clone());
                (root, file)
            }
        }
    }
}
