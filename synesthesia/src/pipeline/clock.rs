// Playhead for the scan line. Position is normalised (0..1) over one pass of
// the grid; a pass lasts `width / columns_per_beat` beats at the given tempo.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanTick {
    pub pos: f64,
    pub column: usize,
    pub column_changed: bool,
    pub wrapped: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ScanClock {
    pos: f64,
    column: Option<usize>, // None until the first column is entered
}

impl ScanClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> f64 {
        self.pos
    }

    pub fn current_column(&self) -> Option<usize> {
        self.column
    }

    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.column = None;
    }

    pub fn loop_seconds(tempo_bpm: f64, width: usize, columns_per_beat: u32) -> f64 {
        let seconds_per_beat = 60.0 / tempo_bpm;
        seconds_per_beat * width as f64 / columns_per_beat as f64
    }

    pub fn advance(
        &mut self,
        delta_seconds: f64,
        tempo_bpm: f64,
        width: usize,
        columns_per_beat: u32,
    ) -> ScanTick {
        if width == 0 || columns_per_beat == 0 || tempo_bpm.is_nan() || tempo_bpm <= 0.0 {
            return ScanTick {
                pos: self.pos,
                column: self.column.unwrap_or(0),
                column_changed: false,
                wrapped: false,
            };
        }

        let total = Self::loop_seconds(tempo_bpm, width, columns_per_beat);
        self.pos += delta_seconds.max(0.0) / total;

        // hard restart at column 0, the remainder is dropped
        let wrapped = self.pos >= 1.0;
        if wrapped {
            self.pos = 0.0;
        }

        let column = (self.pos * width as f64).floor() as usize % width;
        let column_changed = self.column != Some(column);
        self.column = Some(column);

        ScanTick { pos: self.pos, column, column_changed, wrapped }
    }
}
