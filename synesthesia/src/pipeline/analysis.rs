// The analysis collaborator: something that looks at the artwork and
// suggests musical parameters plus some words about it.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::grid::Grid;
use super::params::{AnalysisResult, ArtMetadata, AudioParams, Scale};
use crate::audio::Instrument;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("analysis file not found: {0}")]
    Missing(PathBuf),
    #[error("analysis rejected: {0}")]
    Invalid(String),
}

pub trait Analyzer: Send + Sync {
    fn analyze(&self, grid: &Grid) -> Result<AnalysisResult, AnalysisError>;
}

// Reject what cannot be played and pull the 0-1 knobs back into range.
fn validated(mut result: AnalysisResult) -> Result<AnalysisResult, AnalysisError> {
    let p = &mut result.audio_params;
    if p.tempo == 0 {
        return Err(AnalysisError::Invalid("tempo must be positive".into()));
    }
    for (name, v) in [("roughness", &mut p.roughness), ("density", &mut p.density), ("reverb", &mut p.reverb)] {
        if !v.is_finite() {
            return Err(AnalysisError::Invalid(format!("{name} is not a number")));
        }
        *v = v.clamp(0.0, 1.0);
    }
    Ok(result)
}

/// Reads a ready-made analysis document stored next to the image.
pub struct SidecarAnalyzer {
    path: PathBuf,
}

impl SidecarAnalyzer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    // `art.png` -> `art.json`
    pub fn beside(image: &Path) -> Self {
        Self::new(image.with_extension("json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Analyzer for SidecarAnalyzer {
    fn analyze(&self, _grid: &Grid) -> Result<AnalysisResult, AnalysisError> {
        let data = std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AnalysisError::Missing(self.path.clone()),
            _ => AnalysisError::Io(e),
        })?;
        validated(serde_json::from_str(&data)?)
    }
}

/// Offline stand-in for the remote analysis: reads brightness, colour
/// and activity straight off the grid.
pub struct HeuristicAnalyzer {
    title: String,
}

impl HeuristicAnalyzer {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }
}

#[derive(Debug, Default)]
struct GridStats {
    brightness: f32, // mean
    saturation: f32, // mean (max - min) / 255
    warmth: f32,     // mean r - b
    activity: f32,   // share of cells over the activity threshold
}

const PALETTE_BANDS: usize = 5;
const ACTIVE_CELL: f32 = 0.2;

fn stats(grid: &Grid) -> Option<(GridStats, Vec<String>)> {
    let height = grid.height();
    if grid.width() == 0 || height == 0 {
        return None;
    }

    let mut s = GridStats::default();
    let mut bands = [[0.0f64; 4]; PALETTE_BANDS]; // r, g, b, count
    let mut n = 0usize;
    for column in grid.columns() {
        for cell in column {
            let (max, min) = (cell.r.max(cell.g).max(cell.b), cell.r.min(cell.g).min(cell.b));
            s.brightness += cell.brightness;
            s.saturation += (max - min) as f32 / 255.0;
            s.warmth += cell.r as f32 - cell.b as f32;
            if cell.brightness > ACTIVE_CELL {
                s.activity += 1.0;
            }

            // band 0 is the top of the picture
            let band = (height - 1 - cell.row.min(height - 1)) * PALETTE_BANDS / height;
            let acc = &mut bands[band];
            acc[0] += cell.r as f64;
            acc[1] += cell.g as f64;
            acc[2] += cell.b as f64;
            acc[3] += 1.0;
            n += 1;
        }
    }
    if n == 0 {
        return None;
    }
    let n = n as f32;
    s.brightness /= n;
    s.saturation /= n;
    s.warmth /= n;
    s.activity /= n;

    let palette = bands
        .iter()
        .filter(|b| b[3] > 0.0)
        .map(|b| {
            let avg = |i: usize| (b[i] / b[3]).round().clamp(0.0, 255.0) as u8;
            format!("#{:02x}{:02x}{:02x}", avg(0), avg(1), avg(2))
        })
        .collect();
    Some((s, palette))
}

impl Analyzer for HeuristicAnalyzer {
    fn analyze(&self, grid: &Grid) -> Result<AnalysisResult, AnalysisError> {
        let (s, palette) = stats(grid).ok_or_else(|| AnalysisError::Invalid("empty grid".into()))?;

        let dark = s.brightness < 0.3;
        let warm = s.warmth > 30.0;
        let roughness = (s.saturation * 1.5).clamp(0.0, 1.0);

        let scale = if dark {
            Scale::Minor
        } else if roughness > 0.75 {
            Scale::Chromatic
        } else if roughness > 0.6 {
            Scale::Wholetone
        } else if warm {
            Scale::Major
        } else {
            Scale::Pentatonic
        };
        let instrument = if dark {
            Instrument::Drone
        } else if warm {
            Instrument::Pluck
        } else if roughness < 0.2 {
            Instrument::Pad
        } else {
            Instrument::Synth
        };
        let mood = match (dark, warm) {
            (true, _) => "brooding",
            (false, true) => "warm",
            (false, false) => "serene",
        };

        let audio_params = AudioParams {
            tempo: (60.0 + s.brightness * 80.0).round() as u32,
            scale,
            roughness,
            density: s.activity.clamp(0.0, 1.0),
            reverb: (1.0 - s.brightness).clamp(0.1, 0.9),
            instrument,
        };
        let metadata = ArtMetadata {
            title: self.title.clone(),
            artist_style: "unknown".into(),
            mood: mood.into(),
            description: format!(
                "{}x{} scan, mean brightness {:.2}, {:.0}% of cells active",
                grid.width(),
                grid.height(),
                s.brightness,
                s.activity * 100.0
            ),
            color_palette: palette,
        };
        validated(AnalysisResult { metadata, audio_params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::GridCell;

    fn flat_grid(r: u8, g: u8, b: u8) -> Grid {
        let column: Vec<GridCell> = (0..32).map(|row| GridCell::new(r, g, b, row)).collect();
        Grid::from_columns(vec![column; 512], 32)
    }

    #[test]
    fn dark_images_brood() {
        let result = HeuristicAnalyzer::new("night").analyze(&flat_grid(20, 20, 40)).unwrap();
        assert_eq!(result.audio_params.scale, Scale::Minor);
        assert_eq!(result.audio_params.instrument, Instrument::Drone);
        assert_eq!(result.metadata.mood, "brooding");
        assert_eq!(result.metadata.title, "night");
        assert!(result.audio_params.reverb >= 0.7);
    }

    #[test]
    fn warm_bright_images_pluck() {
        let result = HeuristicAnalyzer::new("sun").analyze(&flat_grid(250, 200, 120)).unwrap();
        assert_eq!(result.audio_params.instrument, Instrument::Pluck);
        assert_eq!(result.metadata.mood, "warm");
        assert!((60..=140).contains(&result.audio_params.tempo));
        assert_eq!(result.audio_params.density, 1.0);
        assert_eq!(result.metadata.color_palette, vec!["#fac878"; 5]);
    }

    #[test]
    fn empty_grid_is_rejected() {
        let err = HeuristicAnalyzer::new("x").analyze(&Grid::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::Invalid(_)));
    }

    #[test]
    fn sidecar_reads_and_clamps() {
        let path = std::env::temp_dir().join("synesthesia-sidecar-test.json");
        std::fs::write(
            &path,
            r#"{"metadata":{"title":"t","artistStyle":"s","mood":"m","description":"d","colorPalette":[]},
                "audioParams":{"tempo":100,"scale":"minor","roughness":1.4,"density":0.3,"reverb":-1,"instrument":"violin"}}"#,
        )
        .unwrap();
        let result = SidecarAnalyzer::new(&path).analyze(&Grid::default()).unwrap();
        assert_eq!(result.audio_params.instrument, Instrument::Violin);
        assert_eq!(result.audio_params.roughness, 1.0);
        assert_eq!(result.audio_params.reverb, 0.0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn sidecar_failures_are_distinct() {
        let missing = std::env::temp_dir().join("synesthesia-no-sidecar.json");
        let err = SidecarAnalyzer::new(&missing).analyze(&Grid::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::Missing(_)));

        let garbled = std::env::temp_dir().join("synesthesia-garbled-sidecar.json");
        std::fs::write(&garbled, "{ not json").unwrap();
        let err = SidecarAnalyzer::new(&garbled).analyze(&Grid::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::Json(_)));
        let _ = std::fs::remove_file(&garbled);
    }

    #[test]
    fn sidecar_sits_beside_the_image() {
        let a = SidecarAnalyzer::beside(Path::new("/art/harbour.png"));
        assert_eq!(a.path(), Path::new("/art/harbour.json"));
    }
}
