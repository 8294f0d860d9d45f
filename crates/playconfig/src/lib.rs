use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Session settings for the playground window.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionConfig {
    pub version: u32,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub capture: CaptureSection,
    #[serde(default)]
    pub live_edit: LiveEditSection,
    #[serde(default)]
    pub life: LifeSection,
    #[serde(default)]
    pub smooth_life: SmoothLifeSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WindowSection {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RenderSection {
    /// Program shown first.
    pub program: Option<String>,
    /// Overrides the monitor refresh rate.
    pub fps: Option<f32>,
    /// Start with frame pacing unlocked.
    #[serde(default)]
    pub unlocked: bool,
    /// Seed for the randomised programs.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaptureSection {
    #[serde(default = "default_capture_directory")]
    pub directory: PathBuf,
    #[serde(
        default = "default_gif_max_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub gif_max_duration: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LiveEditSection {
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LifeSection {
    #[serde(default = "default_rule")]
    pub rule: String,
    #[serde(default = "default_cyclic_stages")]
    pub cyclic_stages: u32,
    #[serde(default = "default_cursor_size")]
    pub cursor_size: f64,
}

/// Overrides for the SmoothLife rule; unset fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SmoothLifeSection {
    pub outer_radius: Option<f32>,
    pub inner_radius: Option<f32>,
    pub b1: Option<f32>,
    pub b2: Option<f32>,
    pub s1: Option<f32>,
    pub s2: Option<f32>,
    pub dt: Option<f32>,
    pub alpha_m: Option<f32>,
    pub alpha_n: Option<f32>,
}

fn default_capture_directory() -> PathBuf {
    PathBuf::from("screencaptures")
}

fn default_gif_max_duration() -> Duration {
    Duration::from_secs(10)
}

fn default_rule() -> String {
    "B3/S23".to_string()
}

fn default_cyclic_stages() -> u32 {
    16
}

fn default_cursor_size() -> f64 {
    0.025
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version: 1,
            window: WindowSection::default(),
            render: RenderSection::default(),
            capture: CaptureSection::default(),
            live_edit: LiveEditSection::default(),
            life: LifeSection::default(),
            smooth_life: SmoothLifeSection::default(),
        }
    }
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            directory: default_capture_directory(),
            gif_max_duration: default_gif_max_duration(),
        }
    }
}

impl Default for LifeSection {
    fn default() -> Self {
        Self {
            rule: default_rule(),
            cyclic_stages: default_cyclic_stages(),
            cursor_size: default_cursor_size(),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl SessionConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SessionConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Window size when both dimensions are configured.
    pub fn window_size(&self) -> Option<(u32, u32)> {
        Some((self.window.width?, self.window.height?))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        for (name, value) in [("width", self.window.width), ("height", self.window.height)] {
            if value == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "window.{name} must be greater than zero"
                )));
            }
        }

        if let Some(program) = &self.render.program {
            if program.trim().is_empty() {
                return Err(ConfigError::Invalid("render.program may not be empty".into()));
            }
        }

        if let Some(fps) = self.render.fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(ConfigError::Invalid("render.fps must be > 0".into()));
            }
        }

        if self.capture.gif_max_duration.is_zero() {
            return Err(ConfigError::Invalid(
                "capture.gif_max_duration must be greater than zero".into(),
            ));
        }

        validate_rule(&self.life.rule)?;

        if !(2..=255).contains(&self.life.cyclic_stages) {
            return Err(ConfigError::Invalid(format!(
                "life.cyclic_stages must be between 2 and 255, got {}",
                self.life.cyclic_stages
            )));
        }

        if !(0.0..=1.0).contains(&self.life.cursor_size) {
            return Err(ConfigError::Invalid(format!(
                "life.cursor_size must be within [0, 1], got {}",
                self.life.cursor_size
            )));
        }

        self.smooth_life.validate()
    }
}

/// Shape check for B/S notation; the digits themselves are checked when
/// the rule is parsed for the simulation.
fn validate_rule(rule: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = rule.trim().split('/').collect();
    let shaped = parts.len() == 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some('b' | 'B' | 's' | 'S'))
                && chars.all(|ch| ch.is_ascii_digit())
        });
    if shaped {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "life.rule '{rule}' must look like B3/S23"
        )))
    }
}

impl SmoothLifeSection {
    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("outer_radius", self.outer_radius),
            ("inner_radius", self.inner_radius),
            ("b1", self.b1),
            ("b2", self.b2),
            ("s1", self.s1),
            ("s2", self.s2),
            ("dt", self.dt),
            ("alpha_m", self.alpha_m),
            ("alpha_n", self.alpha_n),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "smooth_life.{name} must be > 0"
                    )));
                }
            }
        }

        if let (Some(outer), Some(inner)) = (self.outer_radius, self.inner_radius) {
            if inner >= outer {
                return Err(ConfigError::Invalid(
                    "smooth_life.inner_radius must be smaller than outer_radius".into(),
                ));
            }
        }

        if let Some(dt) = self.dt {
            if dt > 1.0 {
                return Err(ConfigError::Invalid("smooth_life.dt must be <= 1".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[window]
width = 1920
height = 1080
title = "playground"

[render]
program = "smooth-life"
fps = 30
unlocked = true

[capture]
directory = "/tmp/captures"
gif_max_duration = "1m 30s"

[live_edit]
vertex = "shaders/live.vert"
fragment = "shaders/live.frag"

[life]
rule = "B36/S23"
cyclic_stages = 8

[smooth_life]
outer_radius = 12.0
inner_radius = 4.0
"#;

    #[test]
    fn parses_sample_config() {
        let config = SessionConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.window_size(), Some((1920, 1080)));
        assert_eq!(config.render.program.as_deref(), Some("smooth-life"));
        assert_eq!(config.render.fps, Some(30.0));
        assert!(config.render.unlocked);
        assert_eq!(config.capture.directory, PathBuf::from("/tmp/captures"));
        assert_eq!(config.capture.gif_max_duration, Duration::from_secs(90));
        assert_eq!(
            config.live_edit.fragment.as_deref(),
            Some(Path::new("shaders/live.frag"))
        );
        assert_eq!(config.life.rule, "B36/S23");
        assert_eq!(config.life.cyclic_stages, 8);
        assert_eq!(config.life.cursor_size, 0.025);
        assert_eq!(config.smooth_life.outer_radius, Some(12.0));
        assert_eq!(config.smooth_life.dt, None);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = SessionConfig::from_toml_str("version = 1").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.capture.directory, PathBuf::from("screencaptures"));
        assert_eq!(config.capture.gif_max_duration, Duration::from_secs(10));
        assert_eq!(config.life.rule, "B3/S23");
        assert_eq!(config.life.cyclic_stages, 16);
        assert_eq!(config.window_size(), None);
    }

    #[test]
    fn numeric_durations_are_seconds() {
        let config = SessionConfig::from_toml_str(
            r#"
version = 1
[capture]
gif_max_duration = 4
"#,
        )
        .unwrap();
        assert_eq!(config.capture.gif_max_duration, Duration::from_secs(4));
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = SessionConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_rule() {
        let err = SessionConfig::from_toml_str(
            r#"
version = 1
[life]
rule = "conway"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("life.rule")));
    }

    #[test]
    fn rejects_out_of_range_values() {
        for body in [
            "[life]\ncyclic_stages = 1",
            "[life]\ncursor_size = 1.5",
            "[render]\nfps = 0",
            "[window]\nwidth = 0",
            "[capture]\ngif_max_duration = \"0s\"",
            "[smooth_life]\nouter_radius = 4.0\ninner_radius = 6.0",
            "[smooth_life]\ndt = 2.0",
        ] {
            let input = format!("version = 1\n{body}\n");
            let err = SessionConfig::from_toml_str(&input).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{body}");
        }
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = SessionConfig::from_toml_str("version = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = SessionConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { path: ref p, .. } if p == &path));

        std::fs::write(&path, "version = 1\n[render]\nprogram = \"pong\"\n").unwrap();
        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.render.program.as_deref(), Some("pong"));
    }
}
