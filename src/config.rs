use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, IoResultExt, Result};
use crate::ordered::OrderedMap;
use crate::patch_format::PackageMeta;
use crate::tools::{ExternalTool, ProcessTools};

const GAME_DIR: &str = "HawkenGame";
const LOCALIZATION_EXTENSION: &str = ".int";
const DEFAULT_CONFIG_PREFIX: &str = "Default";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    pub game: Option<GameConfig>,
    pub package: Option<PackageMeta>,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default = "default_patches_dir")]
    pub patches_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_record_template")]
    pub record_template: PathBuf,
    #[serde(default = "default_archive_target")]
    pub archive_target: String,
    #[serde(default)]
    pub clean_slate: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    #[serde(default)]
    pub install_dir: PathBuf,
    #[serde(default)]
    pub ini_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    pub decompressor: PathBuf,
    pub archive_patcher: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            decompressor: PathBuf::from("../utils/decompress.exe"),
            archive_patcher: PathBuf::from("../utils/PatchUPK.exe"),
        }
    }
}

fn default_patches_dir() -> PathBuf {
    PathBuf::from("patches")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_record_template() -> PathBuf {
    PathBuf::from("../utils/defaultMechsetupEntry.json")
}

fn default_archive_target() -> String {
    "Robots.u".to_string()
}

impl BuildConfig {
    /// Load and validate a config file. Relative paths inside it are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| BuildError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config: BuildConfig = serde_json::from_str(&text)
            .map_err(|e| BuildError::Config(format!("{} is not valid: {e}", path.display())))?;

        // Tools run from their own directory, so every path has to be absolute.
        let base = absolute(path.parent().unwrap_or(Path::new("")))?;
        config.resolve_relative_to(&base);
        config.validated()?;
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() && !p.as_os_str().is_empty() {
                *p = base.join(&*p);
            }
        };
        if let Some(game) = self.game.as_mut() {
            resolve(&mut game.install_dir);
            resolve(&mut game.ini_dir);
        }
        resolve(&mut self.tools.decompressor);
        resolve(&mut self.tools.archive_patcher);
        resolve(&mut self.patches_dir);
        resolve(&mut self.output_dir);
        resolve(&mut self.record_template);
    }

    /// The required sections, once every check has passed.
    pub fn validated(&self) -> Result<(&GameConfig, &PackageMeta)> {
        let game = self
            .game
            .as_ref()
            .ok_or_else(|| BuildError::Config("build config has no 'game' section!".into()))?;
        let package = self
            .package
            .as_ref()
            .ok_or_else(|| BuildError::Config("build config has no 'package' section!".into()))?;
        if game.install_dir.as_os_str().is_empty() {
            return Err(BuildError::Config("build config is missing game install path!".into()));
        }
        if game.ini_dir.as_os_str().is_empty() {
            return Err(BuildError::Config("build config is missing game ini path!".into()));
        }
        if !game.install_dir.is_dir() {
            return Err(BuildError::Config(format!(
                "Invalid game install directory: {}",
                game.install_dir.display()
            )));
        }
        if !game.ini_dir.is_dir() {
            return Err(BuildError::Config(format!(
                "Invalid game ini directory: {}",
                game.ini_dir.display()
            )));
        }
        Ok((game, package))
    }
}

/// Everything a build needs, derived once from the config and passed by
/// reference to every pass.
pub struct BuildContext {
    pub meta: PackageMeta,
    /// `<install>/HawkenGame/CookedPC`
    pub packed_dir: PathBuf,
    /// Scratch dir for the decompressor.
    pub unpacked_dir: PathBuf,
    /// `<ini>/HawkenGame/Config`
    pub config_dir: PathBuf,
    /// `<install>/HawkenGame/Config`, holds the `Default*` files.
    pub default_config_dir: PathBuf,
    /// `<install>/HawkenGame/Localization/INT`
    pub localization_dir: PathBuf,
    pub mechsetup_file: PathBuf,
    pub record_template: PathBuf,
    pub patches_dir: PathBuf,
    pub output_dir: PathBuf,
    pub archive_target: String,
    pub clean_slate: bool,
    pub tools: Box<dyn ExternalTool>,
}

impl BuildContext {
    pub fn from_config(config: &BuildConfig) -> Result<Self> {
        let (game, meta) = config.validated()?;
        let tools = ProcessTools::new(
            absolute(&config.tools.decompressor)?,
            absolute(&config.tools.archive_patcher)?,
        );

        let mut ctx =
            Self::with_layout(&game.install_dir, &game.ini_dir, meta.clone(), Box::new(tools));
        ctx.patches_dir = config.patches_dir.clone();
        ctx.output_dir = config.output_dir.clone();
        ctx.record_template = config.record_template.clone();
        ctx.archive_target = config.archive_target.clone();
        ctx.clean_slate = config.clean_slate;
        Ok(ctx)
    }

    /// Standard game directory layout under the two roots, with defaults for
    /// everything else.
    pub fn with_layout(
        install_dir: &Path,
        ini_dir: &Path,
        meta: PackageMeta,
        tools: Box<dyn ExternalTool>,
    ) -> Self {
        let game = install_dir.join(GAME_DIR);
        Self {
            meta,
            packed_dir: game.join("CookedPC"),
            unpacked_dir: game.join("unpacked"),
            config_dir: ini_dir.join(GAME_DIR).join("Config"),
            default_config_dir: game.join("Config"),
            localization_dir: game.join("Localization").join("INT"),
            mechsetup_file: game.join("MechSetup_default.txt"),
            record_template: default_record_template(),
            patches_dir: default_patches_dir(),
            output_dir: default_output_dir(),
            archive_target: default_archive_target(),
            clean_slate: false,
            tools,
        }
    }

    /// Where a config document named `name` lives in the install.
    pub fn resolve_document(&self, name: &str) -> PathBuf {
        let mut path = self.config_dir.join(name);
        if name.starts_with(DEFAULT_CONFIG_PREFIX) {
            path = self.default_config_dir.join(name);
        }
        if name.ends_with(LOCALIZATION_EXTENSION) {
            path = self.localization_dir.join(name);
        }
        path
    }

    /// Flat key/value map every newly created mech record starts from.
    /// A missing template file means an empty template.
    pub fn load_record_template(&self) -> Result<OrderedMap<String>> {
        if !self.record_template.exists() {
            log::warn!(
                "Record template {} not found, new records start empty",
                self.record_template.display()
            );
            return Ok(OrderedMap::new());
        }
        let text = fs::read_to_string(&self.record_template).at(&self.record_template)?;
        let template: OrderedMap<crate::ordered::Scalar> = serde_json::from_str(&text)
            .map_err(|e| BuildError::format(&self.record_template, e))?;
        Ok(template.into_iter().map(|(k, v)| (k, v.to_string())).collect())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir().at(path).map(|cwd| cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("buildConfig.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("game")).unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "game": {"installDir": "game", "iniDir": "docs"},
                "package": {"version": "0.3.1", "name": "Balance Update"},
                "cleanSlate": true
            }"#,
        );

        let config = BuildConfig::load(&path).unwrap();
        let game = config.game.as_ref().unwrap();
        assert_eq!(game.install_dir, dir.path().join("game"));
        assert_eq!(config.patches_dir, dir.path().join("patches"));
        assert_eq!(config.tools.decompressor, dir.path().join("../utils/decompress.exe"));
        assert_eq!(config.archive_target, "Robots.u");
        assert!(config.clean_slate);
    }

    #[test]
    fn test_missing_sections_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), r#"{"package": {"version": "1", "name": "n"}}"#);
        let err = BuildConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("no 'game' section"), "{err}");

        let path = write_config(dir.path(), r#"{"game": {"installDir": ".", "iniDir": "."}}"#);
        let err = BuildConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("no 'package' section"), "{err}");
    }

    #[test]
    fn test_invalid_directories_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "game": {"installDir": "missing", "iniDir": "."},
                "package": {"version": "1", "name": "n"}
            }"#,
        );
        let err = BuildConfig::load(&path).unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
        assert!(err.to_string().starts_with("[CFG_ERROR]"));

        let path = write_config(
            dir.path(),
            r#"{"game": {"installDir": "."}, "package": {"version": "1", "name": "n"}}"#,
        );
        let err = BuildConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing game ini path"), "{err}");
    }

    #[test]
    fn test_document_resolution_table() {
        let ctx = BuildContext::with_layout(
            Path::new("/install"),
            Path::new("/docs"),
            PackageMeta {
                version: "1".into(),
                name: "n".into(),
            },
            Box::new(ProcessTools::new(PathBuf::new(), PathBuf::new())),
        );
        assert_eq!(
            ctx.resolve_document("DefaultGame.ini"),
            Path::new("/install/HawkenGame/Config/DefaultGame.ini")
        );
        assert_eq!(
            ctx.resolve_document("HawkenGame.int"),
            Path::new("/install/HawkenGame/Localization/INT/HawkenGame.int")
        );
        assert_eq!(
            ctx.resolve_document("DefaultWeapons.int"),
            Path::new("/install/HawkenGame/Localization/INT/DefaultWeapons.int")
        );
        assert_eq!(
            ctx.resolve_document("HawkenSystemSettings.ini"),
            Path::new("/docs/HawkenGame/Config/HawkenSystemSettings.ini")
        );
    }

    #[test]
    fn test_record_template_stringifies_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = BuildContext::with_layout(
            dir.path(),
            dir.path(),
            PackageMeta {
                version: "1".into(),
                name: "n".into(),
            },
            Box::new(ProcessTools::new(PathBuf::new(), PathBuf::new())),
        );
        ctx.record_template = dir.path().join("template.json");
        assert!(ctx.load_record_template().unwrap().is_empty());

        fs::write(&ctx.record_template, r#"{"Paint": 0, "Weapon": "SMC"}"#).unwrap();
        let template = ctx.load_record_template().unwrap();
        assert_eq!(template.keys().collect::<Vec<_>>(), vec!["Paint", "Weapon"]);
        assert_eq!(template.get("Paint").map(String::as_str), Some("0"));
    }
}
