mod analysis;
mod clock;
mod config;
mod extractor;
mod grid;
mod params;
mod score;

pub use analysis::{AnalysisError, Analyzer, HeuristicAnalyzer, SidecarAnalyzer};
pub use clock::ScanClock;
pub use config::ScanConfig;
pub use extractor::{ColumnExtractor, EngineState, PartSetup, Voicer};
pub use grid::{load as load_grid, Grid};
#[cfg(test)]
pub use grid::GridCell;
pub use params::{AnalysisResult, AudioParams, Scale};
pub use score::NoteEvent;
