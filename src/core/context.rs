//! Project context for crank commands.
//!
//! A [`ProjectContext`] is created once per process (or once per interactive
//! session) and handed to every command by reference. It answers where the
//! project lives, where it builds, with which configuration and compiler, and
//! which programs are registered.
//!
//! Settings resolve with the precedence
//! command-line override > project config > global config > built-in default.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::core::registry::ProgramRegistry;
use crate::util::config::{
    global_config_path, project_config_path, Config, DefaultsConfig,
};
use crate::util::platform::executable_name;

/// Environment variable naming the project root.
pub const HOME_ENV: &str = "KNELL_HOME";

/// Build directory used when nothing else is configured.
pub const DEFAULT_BUILD_DIR: &str = "build";

/// Compiler value meaning "let CMake pick".
pub const DEFAULT_COMPILER: &str = "default";

/// Name of the demo driver executable produced by the build.
pub const DRIVER_NAME: &str = "calendon-driver";

/// Alias that overrides the location of the driver.
pub const DRIVER_ALIAS: &str = "driver";

/// CMake build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum BuildConfig {
    #[default]
    Debug,
    Release,
}

impl fmt::Display for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildConfig::Debug => write!(f, "Debug"),
            BuildConfig::Release => write!(f, "Release"),
        }
    }
}

impl FromStr for BuildConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Debug" | "debug" => Ok(BuildConfig::Debug),
            "Release" | "release" => Ok(BuildConfig::Release),
            _ => Err(format!(
                "invalid build config '{}'; expected 'Debug' or 'Release'",
                s
            )),
        }
    }
}

/// Settings that can be changed with `crank default NAME VALUE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultKey {
    Compiler,
    BuildConfig,
    BuildDir,
    Demo,
}

impl DefaultKey {
    pub const NAMES: [&'static str; 4] = ["compiler", "build-config", "build-dir", "demo"];
}

impl FromStr for DefaultKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compiler" => Ok(DefaultKey::Compiler),
            "build-config" => Ok(DefaultKey::BuildConfig),
            "build-dir" => Ok(DefaultKey::BuildDir),
            "demo" => Ok(DefaultKey::Demo),
            _ => Err(format!(
                "invalid name '{}'; expected one of: {}",
                s,
                DefaultKey::NAMES.join(", ")
            )),
        }
    }
}

/// Per-command overrides taken from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOverrides {
    pub build_dir: Option<String>,
    pub build_config: Option<BuildConfig>,
    pub compiler: Option<String>,
}

/// Project state shared by all commands.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    home: PathBuf,
    config_path: PathBuf,
    global_defaults: DefaultsConfig,
    defaults: DefaultsConfig,
    programs: ProgramRegistry,
    overrides: BuildOverrides,
}

impl ProjectContext {
    /// Create a context rooted at `home`, reading the user-wide config and
    /// `config_path` (or `<home>/crank.toml`).
    pub fn new(home: impl Into<PathBuf>, config_path: Option<PathBuf>) -> Result<Self> {
        let global = global_config_path();
        Self::with_global(home, config_path, global.as_deref())
    }

    /// Like [`new`](Self::new) with an explicit (or no) global config file.
    pub fn with_global(
        home: impl Into<PathBuf>,
        config_path: Option<PathBuf>,
        global_path: Option<&Path>,
    ) -> Result<Self> {
        let home = home.into();
        if !home.is_dir() {
            bail!("knell home {} is not a directory", home.display());
        }
        let home = home
            .canonicalize()
            .with_context(|| format!("failed to resolve knell home: {}", home.display()))?;

        let config_path = config_path.unwrap_or_else(|| project_config_path(&home));

        let global = match global_path {
            Some(path) => Config::load_or_default(path),
            None => Config::default(),
        };
        let project = Config::load_or_default(&config_path);

        tracing::debug!(
            "knell home {} with config {}",
            home.display(),
            config_path.display()
        );

        Ok(ProjectContext {
            home,
            config_path,
            global_defaults: global.defaults,
            defaults: project.defaults,
            programs: ProgramRegistry::new(global.programs, project.programs),
            overrides: BuildOverrides::default(),
        })
    }

    /// Copy of this context with command-line overrides applied.
    pub fn with_overrides(&self, overrides: &BuildOverrides) -> Self {
        let mut ctx = self.clone();
        if overrides.build_dir.is_some() {
            ctx.overrides.build_dir = overrides.build_dir.clone();
        }
        if overrides.build_config.is_some() {
            ctx.overrides.build_config = overrides.build_config;
        }
        if overrides.compiler.is_some() {
            ctx.overrides.compiler = overrides.compiler.clone();
        }
        ctx
    }

    /// Root directory of the project.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Configuration file that `save` writes to.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn setting<'a>(
        &'a self,
        pick: impl Fn(&'a DefaultsConfig) -> &'a Option<String>,
    ) -> Option<&'a str> {
        pick(&self.defaults)
            .as_deref()
            .or_else(|| pick(&self.global_defaults).as_deref())
    }

    /// Directory CMake generates into.
    pub fn build_dir(&self) -> PathBuf {
        let dir = self
            .overrides
            .build_dir
            .as_deref()
            .or_else(|| self.setting(|d| &d.build_dir))
            .unwrap_or(DEFAULT_BUILD_DIR);
        self.home.join(dir)
    }

    /// Configuration passed to `cmake --build --config`.
    pub fn build_config(&self) -> BuildConfig {
        if let Some(config) = self.overrides.build_config {
            return config;
        }
        match self.setting(|d| &d.build_config) {
            Some(value) => value.parse().unwrap_or_else(|e| {
                tracing::warn!("{}, using Debug", e);
                BuildConfig::Debug
            }),
            None => BuildConfig::Debug,
        }
    }

    /// Registered alias to use as the C compiler, if any.
    ///
    /// `default` means no explicit compiler.
    pub fn compiler(&self) -> Option<&str> {
        self.overrides
            .compiler
            .as_deref()
            .or_else(|| self.setting(|d| &d.compiler))
            .filter(|c| *c != DEFAULT_COMPILER)
    }

    /// Demo launched by `run` when none is named.
    pub fn demo(&self) -> Option<&str> {
        self.setting(|d| &d.demo)
    }

    /// Python virtual environment for helper tools.
    pub fn venv_dir(&self) -> PathBuf {
        self.home.join("venv")
    }

    /// Python sources checked by `pycheck`.
    pub fn py_dir(&self) -> PathBuf {
        self.home.join("py")
    }

    /// Where the build places demo shared libraries.
    pub fn demo_dir(&self) -> PathBuf {
        self.build_dir().join("demos")
    }

    /// Path of the demo driver.
    pub fn driver_path(&self) -> PathBuf {
        match self.programs.get(DRIVER_ALIAS) {
            Some(path) => path.to_path_buf(),
            None => self.build_dir().join(executable_name(DRIVER_NAME)),
        }
    }

    pub fn programs(&self) -> &ProgramRegistry {
        &self.programs
    }

    pub fn programs_mut(&mut self) -> &mut ProgramRegistry {
        &mut self.programs
    }

    /// Set a project default.
    pub fn set_default(&mut self, key: DefaultKey, value: &str) -> Result<()> {
        match key {
            DefaultKey::Compiler => self.defaults.compiler = Some(value.to_string()),
            DefaultKey::BuildConfig => {
                let config: BuildConfig =
                    value.parse().map_err(|e: String| anyhow::anyhow!(e))?;
                self.defaults.build_config = Some(config.to_string());
            }
            DefaultKey::BuildDir => self.defaults.build_dir = Some(value.to_string()),
            DefaultKey::Demo => self.defaults.demo = Some(value.to_string()),
        }
        Ok(())
    }

    /// The project layer of the configuration.
    pub fn to_config(&self) -> Config {
        Config {
            defaults: self.defaults.clone(),
            programs: self.programs.local().clone(),
        }
    }

    /// Write the project configuration to [`config_path`](Self::config_path).
    pub fn save(&self) -> Result<()> {
        self.to_config().save(&self.config_path)
    }

    /// Write the project configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.to_config().save(path)
    }

    /// Replace the project configuration with the contents of `path`.
    ///
    /// Later saves go to `path`.
    pub fn load_from(&mut self, path: &Path) -> Result<()> {
        let config = Config::load(path)?;
        self.defaults = config.defaults;
        self.programs.set_local(config.programs);
        self.config_path = path.to_path_buf();
        Ok(())
    }

    /// Machine-readable snapshot of the effective configuration.
    pub fn dump(&self) -> serde_json::Value {
        let programs: serde_json::Map<String, serde_json::Value> = self
            .programs
            .entries()
            .into_iter()
            .map(|(alias, path)| (alias.to_string(), path.display().to_string().into()))
            .collect();

        serde_json::json!({
            "knell_home": self.home.display().to_string(),
            "config_file": self.config_path.display().to_string(),
            "build_dir": self.build_dir().display().to_string(),
            "build_config": self.build_config(),
            "compiler": self.compiler().unwrap_or(DEFAULT_COMPILER),
            "demo": self.demo(),
            "venv_dir": self.venv_dir().display().to_string(),
            "driver": self.driver_path().display().to_string(),
            "programs": programs,
        })
    }
}

/// Project root from the environment, or the current directory.
pub fn default_home() -> Result<PathBuf> {
    match std::env::var_os(HOME_ENV) {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => std::env::current_dir().context("failed to get current directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(tmp: &TempDir) -> ProjectContext {
        ProjectContext::with_global(tmp.path(), None, None).unwrap()
    }

    #[test]
    fn test_defaults() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let home = tmp.path().canonicalize().unwrap();

        assert_eq!(ctx.home(), home);
        assert_eq!(ctx.build_dir(), home.join("build"));
        assert_eq!(ctx.build_config(), BuildConfig::Debug);
        assert_eq!(ctx.compiler(), None);
        assert_eq!(ctx.demo(), None);
        assert_eq!(ctx.config_path(), home.join("crank.toml"));
        assert_eq!(ctx.demo_dir(), home.join("build").join("demos"));
    }

    #[test]
    fn test_home_must_be_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(ProjectContext::with_global(tmp.path().join("missing"), None, None).is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);
        ctx.set_default(DefaultKey::BuildDir, "build-gcc").unwrap();
        ctx.set_default(DefaultKey::Compiler, "gcc").unwrap();

        let ovr = ctx.with_overrides(&BuildOverrides {
            build_dir: Some("build-clang".to_string()),
            build_config: Some(BuildConfig::Release),
            compiler: Some("clang".to_string()),
        });

        assert!(ovr.build_dir().ends_with("build-clang"));
        assert_eq!(ovr.build_config(), BuildConfig::Release);
        assert_eq!(ovr.compiler(), Some("clang"));

        // Original untouched
        assert!(ctx.build_dir().ends_with("build-gcc"));
        assert_eq!(ctx.compiler(), Some("gcc"));
    }

    #[test]
    fn test_default_compiler_means_none() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);
        ctx.set_default(DefaultKey::Compiler, "default").unwrap();
        assert_eq!(ctx.compiler(), None);
    }

    #[test]
    fn test_set_default_rejects_bad_build_config() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);
        assert!(ctx.set_default(DefaultKey::BuildConfig, "Fast").is_err());
        ctx.set_default(DefaultKey::BuildConfig, "release").unwrap();
        assert_eq!(ctx.build_config(), BuildConfig::Release);
    }

    #[test]
    fn test_global_layer() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("global.toml");
        std::fs::write(
            &global_path,
            "[defaults]\nbuild_config = \"Release\"\n\n[programs]\ncmake = \"/usr/bin/cmake\"\n",
        )
        .unwrap();

        let ctx = ProjectContext::with_global(tmp.path(), None, Some(&global_path)).unwrap();
        assert_eq!(ctx.build_config(), BuildConfig::Release);
        assert_eq!(
            ctx.programs().get("cmake"),
            Some(Path::new("/usr/bin/cmake"))
        );
        // Global entries are not copied into the project file
        assert!(ctx.to_config().programs.is_empty());
    }

    #[test]
    fn test_project_layer_shadows_global() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("global.toml");
        std::fs::write(
            &global_path,
            "[defaults]\nbuild_config = \"Release\"\ncompiler = \"gcc\"\n\n[programs]\ngcc = \"/usr/bin/gcc\"\n",
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("crank.toml"),
            "[defaults]\ncompiler = \"clang\"\n\n[programs]\nclang = \"/usr/bin/clang\"\n",
        )
        .unwrap();

        let ctx = ProjectContext::with_global(tmp.path(), None, Some(&global_path)).unwrap();
        assert_eq!(ctx.compiler(), Some("clang"));
        assert_eq!(ctx.build_config(), BuildConfig::Release);
        assert_eq!(ctx.programs().entries().len(), 2);
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);
        ctx.set_default(DefaultKey::Demo, "graphics-sample").unwrap();
        ctx.programs_mut()
            .register("cmake", "/usr/bin/cmake", false)
            .unwrap();
        ctx.save().unwrap();

        let reloaded = context(&tmp);
        assert_eq!(reloaded.demo(), Some("graphics-sample"));
        assert_eq!(
            reloaded.programs().get("cmake"),
            Some(Path::new("/usr/bin/cmake"))
        );
    }

    #[test]
    fn test_load_from_switches_config_file() {
        let tmp = TempDir::new().unwrap();
        let other = tmp.path().join("other.toml");
        std::fs::write(&other, "[defaults]\nbuild_dir = \"out\"\n").unwrap();

        let mut ctx = context(&tmp);
        ctx.load_from(&other).unwrap();

        assert!(ctx.build_dir().ends_with("out"));
        assert_eq!(ctx.config_path(), other);
    }

    #[test]
    fn test_driver_path() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);
        assert_eq!(
            ctx.driver_path(),
            ctx.build_dir().join(executable_name(DRIVER_NAME))
        );

        ctx.programs_mut()
            .register(DRIVER_ALIAS, "/opt/calendon/driver", false)
            .unwrap();
        assert_eq!(ctx.driver_path(), PathBuf::from("/opt/calendon/driver"));
    }

    #[test]
    fn test_dump() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);
        ctx.programs_mut()
            .register("cmake", "/usr/bin/cmake", false)
            .unwrap();

        let dump = ctx.dump();
        assert_eq!(dump["build_config"], "Debug");
        assert_eq!(dump["compiler"], "default");
        assert_eq!(dump["programs"]["cmake"], "/usr/bin/cmake");
        assert!(dump["demo"].is_null());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("build-dir".parse::<DefaultKey>(), Ok(DefaultKey::BuildDir));
        assert!("colour".parse::<DefaultKey>().is_err());
        assert_eq!("Release".parse::<BuildConfig>(), Ok(BuildConfig::Release));
    }
}
