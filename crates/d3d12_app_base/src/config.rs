use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use eyre::bail;
use eyre::eyre;
use eyre::WrapErr;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;

pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;

/// Largest 2D texture edge Direct3D 12 allows, which bounds the swap chain and depth buffer.
pub const MAX_DIMENSION: u32 = 16384;

/// How long the CPU may block on a frame fence before the device is treated as lost.
pub const DEFAULT_GPU_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Settings shared by every sample.
///
/// Resolved from defaults, then an optional TOML file named by `--config`,
/// then the remaining command line flags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SampleConfig {
    pub width: u32,
    pub height: u32,
    pub use_warp_device: bool,
    pub vsync: bool,
    pub gpu_wait_timeout_ms: u64,
    pub log_level: LogLevel,
    /// Image used by samples that sample a texture.
    pub texture: Option<PathBuf>,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            use_warp_device: false,
            vsync: true,
            gpu_wait_timeout_ms: DEFAULT_GPU_WAIT_TIMEOUT_MS,
            log_level: LogLevel::Info,
            texture: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(eyre!("unknown log level {other:?}")),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

impl fmt::Display for SampleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} warp={} vsync={} gpu_wait_timeout={}ms",
            self.width, self.height, self.use_warp_device, self.vsync, self.gpu_wait_timeout_ms
        )
    }
}

impl SampleConfig {
    /// Builds the configuration from the process arguments.
    pub fn from_env() -> eyre::Result<Self> {
        Self::from_args(std::env::args().skip(1))
    }

    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&contents).wrap_err_with(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> eyre::Result<Self> {
        let config: SampleConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses flags, not including the program name.
    ///
    /// `-warp` and `/warp` are accepted the way the DirectX samples accept them.
    pub fn from_args<I, S>(args: I) -> eyre::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let flags = Flags::parse(&args)?;

        // The file is the base layer, the other flags apply on top of it.
        let mut config = match &flags.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        flags.apply(&mut config);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("window size must be non-zero, got {}x{}", self.width, self.height);
        }
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            bail!(
                "window size {}x{} exceeds {MAX_DIMENSION} in one dimension",
                self.width,
                self.height
            );
        }
        if self.gpu_wait_timeout_ms == 0 {
            bail!("gpu_wait_timeout_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn gpu_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.gpu_wait_timeout_ms)
    }

    /// Window title for a sample, marking the software adapter.
    pub fn window_title(&self, sample_title: &str) -> String {
        if self.use_warp_device {
            format!("{sample_title} (WARP)")
        } else {
            sample_title.to_owned()
        }
    }
}

/// Command line flags, collected in one pass before any of them apply.
#[derive(Debug, Default)]
struct Flags {
    config: Option<PathBuf>,
    use_warp_device: bool,
    width: Option<u32>,
    height: Option<u32>,
    no_vsync: bool,
    gpu_wait_timeout_ms: Option<u64>,
    log_level: Option<LogLevel>,
    texture: Option<PathBuf>,
}

impl Flags {
    fn parse(args: &[String]) -> eyre::Result<Self> {
        let mut flags = Flags::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = |name: &str| {
                iter.next()
                    .ok_or_else(|| eyre!("{name} requires a value"))
                    .cloned()
            };
            match arg.as_str() {
                a if a.eq_ignore_ascii_case("-warp") || a.eq_ignore_ascii_case("/warp") => {
                    flags.use_warp_device = true;
                }
                "--config" => {
                    let path = PathBuf::from(value("--config")?);
                    if flags.config.is_some() {
                        bail!("--config given more than once");
                    }
                    flags.config = Some(path);
                }
                "--width" => flags.width = Some(parse_number("--width", &value("--width")?)?),
                "--height" => flags.height = Some(parse_number("--height", &value("--height")?)?),
                "--no-vsync" => flags.no_vsync = true,
                "--timeout-ms" => {
                    flags.gpu_wait_timeout_ms =
                        Some(parse_number("--timeout-ms", &value("--timeout-ms")?)?)
                }
                "--log-level" => flags.log_level = Some(value("--log-level")?.parse()?),
                "--texture" => flags.texture = Some(PathBuf::from(value("--texture")?)),
                other => bail!("unrecognized argument {other:?}"),
            }
        }
        Ok(flags)
    }

    fn apply(self, config: &mut SampleConfig) {
        if self.use_warp_device {
            config.use_warp_device = true;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if self.no_vsync {
            config.vsync = false;
        }
        if let Some(timeout) = self.gpu_wait_timeout_ms {
            config.gpu_wait_timeout_ms = timeout;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if self.texture.is_some() {
            config.texture = self.texture;
        }
    }
}

fn parse_number<T>(flag: &str, raw: &str) -> eyre::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse()
        .wrap_err_with(|| format!("{flag} expects a number, got {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_gives_defaults() {
        let config = SampleConfig::from_args(Vec::<String>::new()).unwrap();
        assert_eq!(config, SampleConfig::default());
        assert_eq!(config.gpu_wait_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn warp_flag_is_case_insensitive_in_both_spellings() {
        assert!(SampleConfig::from_args(["-WARP"]).unwrap().use_warp_device);
        assert!(SampleConfig::from_args(["/warp"]).unwrap().use_warp_device);
    }

    #[test]
    fn flags_override_defaults() {
        let config = SampleConfig::from_args([
            "--width",
            "640",
            "--height",
            "480",
            "--no-vsync",
            "--timeout-ms",
            "250",
            "--log-level",
            "DEBUG",
        ])
        .unwrap();
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert!(!config.vsync);
        assert_eq!(config.gpu_wait_timeout(), Duration::from_millis(250));
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(SampleConfig::from_args(["--width", "wide"]).is_err());
        assert!(SampleConfig::from_args(["--width", "0"]).is_err());
        assert!(SampleConfig::from_args(["--timeout-ms", "0"]).is_err());
        assert!(SampleConfig::from_args(["--height"]).is_err());
        assert!(SampleConfig::from_args(["--log-level", "loud"]).is_err());
        assert!(SampleConfig::from_args(["--fullscreen"]).is_err());
    }

    #[test]
    fn sizes_beyond_the_texture_limit_are_rejected() {
        assert!(SampleConfig::from_args(["--width", "16384"]).is_ok());
        assert!(SampleConfig::from_args(["--width", "16385"]).is_err());
        assert!(SampleConfig::from_args(["--height", "4294967295"]).is_err());
        assert!(SampleConfig::from_toml("width = 3000000000").is_err());
    }

    #[test]
    fn config_flag_may_appear_once() {
        let error = SampleConfig::from_args(["--config", "a.toml", "--config", "b.toml"])
            .unwrap_err();
        assert!(error.to_string().contains("more than once"));
    }

    #[test]
    fn flag_values_are_never_read_as_flags() {
        let config = SampleConfig::from_args(["--texture", "--config"]).unwrap();
        assert_eq!(config.texture, Some(PathBuf::from("--config")));
        assert_eq!(config.width, DEFAULT_WIDTH);
    }

    #[test]
    fn toml_fills_missing_fields_with_defaults() {
        let config = SampleConfig::from_toml(
            r#"
            width = 800
            log_level = "warn"
            texture = "assets/crate.png"
            "#,
        )
        .unwrap();
        assert_eq!(config.width, 800);
        assert_eq!(config.height, DEFAULT_HEIGHT);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.texture, Some(PathBuf::from("assets/crate.png")));
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        assert!(SampleConfig::from_toml("frame_count = 4").is_err());
    }

    #[test]
    fn command_line_wins_over_config_file() {
        let path = std::env::temp_dir().join(format!(
            "d3d12_app_base_config_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "width = 800\nheight = 600\nvsync = false\n").unwrap();

        let config = SampleConfig::from_args([
            "--config".to_owned(),
            path.display().to_string(),
            "--width".to_owned(),
            "1024".to_owned(),
        ])
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.width, 1024);
        assert_eq!(config.height, 600);
        assert!(!config.vsync);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let result = SampleConfig::from_args(["--config", "definitely/not/here.toml"]);
        assert!(result.is_err());
    }

    #[test]
    fn window_title_marks_warp() {
        let mut config = SampleConfig::default();
        assert_eq!(config.window_title("Cube"), "Cube");
        config.use_warp_device = true;
        assert_eq!(config.window_title("Cube"), "Cube (WARP)");
    }
}
