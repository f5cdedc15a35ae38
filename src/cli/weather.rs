//! CLI commands for the bundled weather presets.
use crate::settings::Settings;
use crate::weather::{WeatherPreset, WeatherReference};
use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;
use strum::IntoEnumIterator;

/// The available subcommands for weather presets.
#[derive(Subcommand)]
pub enum WeatherSubcommands {
    /// List the weather presets and the files they refer to.
    List,
    /// Show the weather file a preset name or path refers to.
    Resolve {
        /// A preset name (case-insensitive) or a path to a weather file.
        name: String,
    },
}

impl WeatherSubcommands {
    /// Execute the supplied weather subcommand
    pub fn execute(self) -> Result<()> {
        let settings = Settings::load().context("Failed to load settings.")?;
        match self {
            Self::List => {
                for line in preset_lines(&settings.weather_dir) {
                    println!("{line}");
                }
            }
            Self::Resolve { name } => println!("{}", resolve_line(&name, &settings.weather_dir)),
        }

        Ok(())
    }
}

/// One line per preset: its name and the path of its weather file
fn preset_lines(weather_dir: &Path) -> Vec<String> {
    WeatherPreset::iter()
        .map(|preset| {
            format!(
                "{:<12}{}",
                preset.name(),
                weather_dir.join(preset.file_name()).display()
            )
        })
        .collect()
}

/// The resolved path, flagged if the file is missing
fn resolve_line(name: &str, weather_dir: &Path) -> String {
    let path = WeatherReference::new(name).path(weather_dir);
    if path.is_file() {
        path.display().to_string()
    } else {
        format!("{} (not found)", path.display())
    }
}
