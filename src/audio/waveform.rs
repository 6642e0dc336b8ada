/// Fixed-capacity circular trace of raw samples.
///
/// The ring starts zero filled, so a read always yields `capacity` samples.
#[derive(Clone, Debug)]
pub struct WaveformHistory {
    slots: Vec<f32>,
    cursor: usize,
}

impl WaveformHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "WaveformHistory capacity must be greater than zero");
        Self {
            slots: vec![0.0; capacity],
            cursor: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index the next sample will be written to; also the oldest sample.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn push(&mut self, sample: f32) {
        self.slots[self.cursor] = sample;
        self.cursor += 1;
        if self.cursor == self.slots.len() {
            self.cursor = 0;
        }
    }

    /// Writes every other sample of `frame`, starting with the first.
    pub fn push_decimated(&mut self, frame: &[f32]) {
        for &sample in frame.iter().step_by(2) {
            self.push(sample);
        }
    }

    /// Samples oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        let (newer, older) = self.slots.split_at(self.cursor);
        older.iter().chain(newer).copied()
    }

    /// Copies the ring in chronological order into `out`, reusing its storage.
    pub fn copy_ordered(&self, out: &mut Vec<f32>) {
        out.clear();
        out.extend(self.iter());
    }
}
