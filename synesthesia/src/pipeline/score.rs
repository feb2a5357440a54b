use std::collections::VecDeque;

use serde::Serialize;

use crate::shared::Part;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub start_column: usize,
    pub duration_in_columns: usize,
    pub pitch: u8, // midi
    pub part: Part,
}

/// The most recent notes of one part. Pushing past capacity drops the oldest.
#[derive(Clone, Debug)]
pub struct NoteHistory {
    notes: VecDeque<NoteEvent>,
    capacity: usize,
}

impl NoteHistory {
    pub fn new(capacity: usize) -> Self {
        Self { notes: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, note: NoteEvent) {
        if self.capacity == 0 {
            return;
        }
        while self.notes.len() >= self.capacity {
            self.notes.pop_front();
        }
        self.notes.push_back(note);
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteEvent> {
        self.notes.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// One bounded history per part.
#[derive(Clone, Debug)]
pub struct Score {
    histories: [NoteHistory; 4],
}

impl Default for Score {
    fn default() -> Self {
        Self {
            histories: Part::ALL.map(|p| NoteHistory::new(p.history_capacity())),
        }
    }
}

impl Score {
    pub fn history(&self, part: Part) -> &NoteHistory {
        &self.histories[part.index()]
    }

    pub fn record(&mut self, note: NoteEvent) {
        self.histories[note.part.index()].push(note);
    }

    pub fn notes_for<'a>(&'a self, parts: &'a [Part]) -> impl Iterator<Item = NoteEvent> + 'a {
        parts.iter().flat_map(move |p| self.history(*p).iter().copied())
    }
}
