use super::Record;

/// Destination of [`Record`]s.
///
/// [`Recorder::write`] outputs a record immediately. [`Recorder::store`]
/// keeps a record until the next [`Recorder::flush`], where implementations
/// may aggregate the stored records before writing them.
pub trait Recorder {
    /// Writes a record.
    fn write(&mut self, record: Record);

    /// Stores a record for later aggregation.
    fn store(&mut self, record: Record);

    /// Writes values aggregated from the stored records.
    ///
    /// `step` is the counter the aggregate is associated with, for example
    /// the number of training episodes.
    fn flush(&mut self, step: i64);
}
