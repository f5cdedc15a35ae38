//! Resolution of weather references to weather files.
use crate::error::{VarroaPopError, VarroaPopResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use strum::{EnumIter, IntoEnumIterator};
use unicase::UniCase;

/// A location for which a weather file is bundled with the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Default)]
pub enum WeatherPreset {
    /// Columbus, Ohio
    #[default]
    Columbus,
    /// Sacramento, California
    Sacramento,
    /// Phoenix, Arizona
    Phoenix,
    /// Yakima, Washington
    Yakima,
    /// Eau Claire, Wisconsin
    EauClaire,
    /// Jackson, Mississippi
    Jackson,
    /// Durham, North Carolina
    Durham,
}

impl WeatherPreset {
    /// The name by which the preset is selected
    pub const fn name(self) -> &'static str {
        match self {
            Self::Columbus => "columbus",
            Self::Sacramento => "sacramento",
            Self::Phoenix => "phoenix",
            Self::Yakima => "yakima",
            Self::EauClaire => "eau claire",
            Self::Jackson => "jackson",
            Self::Durham => "durham",
        }
    }

    /// The name of the bundled weather file
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Columbus => "18815_grid_39.875_lat.wea",
            Self::Sacramento => "17482_grid_38.375_lat.wea",
            Self::Phoenix => "12564_grid_33.375_lat.wea",
            Self::Yakima => "25038_grid_46.375_lat.wea",
            Self::EauClaire => "23503_grid_44.875_lat.wea",
            Self::Jackson => "11708_grid_32.375_lat.wea",
            Self::Durham => "15057_grid_35.875_lat.wea",
        }
    }

    /// Look up a preset by name, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        let name = UniCase::new(name);
        Self::iter().find(|preset| UniCase::new(preset.name()) == name)
    }
}

impl fmt::Display for WeatherPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Either a named preset or an explicit path to a weather file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WeatherReference {
    /// A bundled weather file
    Preset(WeatherPreset),
    /// A user-supplied weather file
    Path(PathBuf),
}

impl Default for WeatherReference {
    fn default() -> Self {
        Self::Preset(WeatherPreset::default())
    }
}

impl WeatherReference {
    /// Interpret `name_or_path` as a preset if it names one, otherwise as a literal path
    pub fn new(name_or_path: &str) -> Self {
        WeatherPreset::from_name(name_or_path)
            .map_or_else(|| Self::Path(name_or_path.into()), Self::Preset)
    }

    /// The path of the weather file this reference points at.
    ///
    /// Presets are looked up in `weather_dir`. No I/O is performed.
    pub fn path(&self, weather_dir: &Path) -> PathBuf {
        match self {
            Self::Preset(preset) => weather_dir.join(preset.file_name()),
            Self::Path(path) => path.clone(),
        }
    }
}

impl From<String> for WeatherReference {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for WeatherReference {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<WeatherReference> for String {
    fn from(value: WeatherReference) -> Self {
        match value {
            WeatherReference::Preset(preset) => preset.name().to_string(),
            WeatherReference::Path(path) => path.to_string_lossy().into_owned(),
        }
    }
}

/// Resolve a preset name or a path to the path of a weather file.
///
/// Unrecognised names are returned unchanged and treated as paths.
pub fn resolve(name_or_path: &str, weather_dir: &Path) -> PathBuf {
    WeatherReference::new(name_or_path).path(weather_dir)
}

/// Check that a weather file exists
pub fn check_weather_file(path: &Path) -> VarroaPopResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(VarroaPopError::NotFound {
            what: "Weather file",
            path: path.to_path_buf(),
        })
    }
}

/// Read the lines of a weather file, for pushing to the in-process engine.
///
/// The contents are not interpreted.
pub fn read_weather_lines(path: &Path) -> VarroaPopResult<Vec<String>> {
    let contents = fs::read_to_string(path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            VarroaPopError::NotFound {
                what: "Weather file",
                path: path.to_path_buf(),
            }
        } else {
            VarroaPopError::io(path, err)
        }
    })?;

    Ok(contents.lines().map(str::to_string).collect())
}
