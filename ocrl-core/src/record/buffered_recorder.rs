use super::{Record, Recorder};

/// Recorder keeping every record in memory.
///
/// Written records and stored records are kept in separate buffers so that
/// per-learning-step diagnostics can be inspected apart from evaluation
/// summaries.
#[derive(Default)]
pub struct BufferedRecorder {
    written: Vec<Record>,
    stored: Vec<Record>,
    n_flushes: usize,
}

impl BufferedRecorder {
    /// Constructs the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an iterator over the written records.
    pub fn iter(&self) -> std::slice::Iter<Record> {
        self.written.iter()
    }

    /// Returns an iterator over the stored records.
    pub fn iter_stored(&self) -> std::slice::Iter<Record> {
        self.stored.iter()
    }

    /// Number of calls of [`Recorder::flush`].
    pub fn n_flushes(&self) -> usize {
        self.n_flushes
    }
}

impl Recorder for BufferedRecorder {
    fn write(&mut self, record: Record) {
        self.written.push(record);
    }

    fn store(&mut self, record: Record) {
        self.stored.push(record);
    }

    fn flush(&mut self, _step: i64) {
        self.n_flushes += 1;
    }
}
