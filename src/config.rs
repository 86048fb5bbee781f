// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Layered configuration.
//!
//! Values are resolved from, lowest priority first: built-in defaults, the YAML
//! config file, `KEYPIANO_` environment variables and command line flags.
//! Nested keys use a double underscore in the environment, e.g.
//! `KEYPIANO_AUDIO__DEVICE=mock`.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, Map};
use tracing::debug;

mod audio;
mod error;
mod piano;

pub use audio::Audio;
pub use error::ConfigError;
pub use piano::{Piano, DEFAULT_KEYBOARD_LAYOUT, MAX_OCTAVES, MIN_OCTAVES};

/// Config file read when none is given explicitly. It may be absent.
pub const DEFAULT_CONFIG_FILE: &str = "keypiano.yaml";

const ENV_PREFIX: &str = "KEYPIANO";

/// Values given on the command line. They take precedence over everything else.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub keyboard_layout: Option<String>,
    pub input_sound: Option<PathBuf>,
    pub output_folder: Option<PathBuf>,
    pub octaves: Option<u32>,
    pub device: Option<String>,
}

/// Loads and validates the configuration. An explicitly given file must exist.
pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Piano, ConfigError> {
    load_with_env(path, overrides, None)
}

/// Loads the configuration, reading the environment from `env` instead of the
/// process environment when given.
fn load_with_env(
    path: Option<&Path>,
    overrides: &Overrides,
    env: Option<Map<String, String>>,
) -> Result<Piano, ConfigError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
    };
    let environment = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .source(env);

    let piano: Piano = Config::builder()
        .add_source(file)
        .add_source(environment)
        .set_override_option("keyboard_layout", overrides.keyboard_layout.clone())?
        .set_override_option(
            "input_sound",
            overrides
                .input_sound
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        )?
        .set_override_option(
            "output_folder",
            overrides
                .output_folder
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        )?
        .set_override_option("octaves", overrides.octaves.map(i64::from))?
        .set_override_option("audio.device", overrides.device.clone())?
        .build()?
        .try_deserialize()?;

    piano.validate()?;
    debug!(config = ?piano, "Configuration loaded");
    Ok(piano)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> Option<Map<String, String>> {
        let mut map = Map::new();
        for (key, value) in vars {
            map.insert(key.to_string(), value.to_string());
        }
        Some(map)
    }

    fn write_config(dir: &Path, yaml: &str) -> PathBuf {
        let path = dir.join("keypiano.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nothing-here.yaml");
        let result = load_with_env(Some(&missing), &Overrides::default(), env(&[]));
        assert!(matches!(result, Err(ConfigError::Load(_))));

        let piano = load_with_env(None, &Overrides::default(), env(&[])).unwrap();
        assert_eq!(piano.octaves(), 4);
        assert_eq!(piano.keyboard_layout(), DEFAULT_KEYBOARD_LAYOUT);
    }

    #[test]
    fn test_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "octaves: 2\nfade_out_ms: 100\naudio:\n  device: mock\n",
        );
        let piano = load_with_env(Some(&path), &Overrides::default(), env(&[])).unwrap();
        assert_eq!(piano.octaves(), 2);
        assert_eq!(piano.fade_out(), Duration::from_millis(100));
        assert_eq!(piano.audio().device(), "mock");
    }

    #[test]
    fn test_environment_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "octaves: 2\naudio:\n  device: mock\n");
        let piano = load_with_env(
            Some(&path),
            &Overrides::default(),
            env(&[
                ("KEYPIANO_OCTAVES", "3"),
                ("KEYPIANO_FADE_IN_MS", "20"),
                ("KEYPIANO_AUDIO__BUFFER_SIZE", "128"),
            ]),
        )
        .unwrap();
        assert_eq!(piano.octaves(), 3);
        assert_eq!(piano.fade_in(), Duration::from_millis(20));
        assert_eq!(piano.audio().buffer_size(), 128);
        assert_eq!(piano.audio().device(), "mock");
    }

    #[test]
    fn test_overrides_beat_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "octaves: 2\noutput_folder: from-file\n");
        let overrides = Overrides {
            keyboard_layout: Some("qwe".to_string()),
            input_sound: Some(PathBuf::from("cli.wav")),
            output_folder: Some(PathBuf::from("from-cli")),
            octaves: Some(5),
            device: Some("mock-cli".to_string()),
        };
        let piano = load_with_env(
            Some(&path),
            &overrides,
            env(&[("KEYPIANO_OCTAVES", "3")]),
        )
        .unwrap();
        assert_eq!(piano.octaves(), 5);
        assert_eq!(piano.keyboard_layout(), "qwe");
        assert_eq!(piano.input_sound(), Path::new("cli.wav"));
        assert_eq!(piano.output_folder(), Path::new("from-cli"));
        assert_eq!(piano.audio().device(), "mock-cli");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let overrides = Overrides {
            octaves: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            load_with_env(None, &overrides, env(&[])),
            Err(ConfigError::OctavesOutOfRange { .. })
        ));
    }
}
