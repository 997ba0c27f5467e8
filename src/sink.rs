//! Event output: NDJSON sinks and the pipeline that serializes, optionally
//! corrupts, and writes each record.
//!
//! Writes go through a `BufWriter`; flushes happen only at day rollover and
//! shutdown so a hot loop never syncs per line.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rand::Rng;
use tracing::debug;

use crate::config::OutputMode;
use crate::corruption::{CorruptionRecord, Corruptor};
use crate::error::EngineError;
use crate::events::EventRecord;

/// Destination for serialized event lines and corruption ground truth.
pub trait EventSink {
    fn write_line(&mut self, date: NaiveDate, line: &str) -> Result<(), EngineError>;
    fn write_corruption(&mut self, record: &CorruptionRecord) -> Result<(), EngineError>;
    fn flush(&mut self) -> Result<(), EngineError>;
}

/// In-memory sink for tests and ad-hoc inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub lines: Vec<String>,
    pub corruption_lines: Vec<String>,
}

impl EventSink for MemorySink {
    fn write_line(&mut self, _date: NaiveDate, line: &str) -> Result<(), EngineError> {
        self.lines.push(line.to_string());
        Ok(())
    }

    fn write_corruption(&mut self, record: &CorruptionRecord) -> Result<(), EngineError> {
        self.corruption_lines.push(serde_json::to_string(record)?);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// File sink: either one growing `events.jsonl` or one file per simulated
/// day, named `YYYY-MM-DD.jsonl`. Corruption ground truth always goes to a
/// single `corruption_log.jsonl` beside the event files.
pub struct JsonlSink {
    dir: PathBuf,
    mode: OutputMode,
    current_date: Option<NaiveDate>,
    writer: Option<BufWriter<File>>,
    corruption_writer: Option<BufWriter<File>>,
}

impl JsonlSink {
    pub fn create(dir: impl Into<PathBuf>, mode: OutputMode) -> Result<Self, EngineError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| EngineError::persistence(format!("creating {}", dir.display()), e))?;
        Ok(JsonlSink { dir, mode, current_date: None, writer: None, corruption_writer: None })
    }

    fn open_append(path: &Path) -> Result<BufWriter<File>, EngineError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| EngineError::persistence(format!("opening {}", path.display()), e))?;
        Ok(BufWriter::new(file))
    }

    fn event_path(&self, date: NaiveDate) -> PathBuf {
        match self.mode {
            OutputMode::SingleFile => self.dir.join("events.jsonl"),
            OutputMode::DatePartitioned => self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d"))),
        }
    }

    /// Make sure the writer targets the right file for this date, flushing
    /// and rolling over at day boundaries in date-partitioned mode.
    fn writer_for(&mut self, date: NaiveDate) -> Result<&mut BufWriter<File>, EngineError> {
        let needs_roll = match (self.mode, self.current_date) {
            (OutputMode::SingleFile, _) => self.writer.is_none(),
            (OutputMode::DatePartitioned, current) => current != Some(date),
        };
        if needs_roll {
            if let Some(mut old) = self.writer.take() {
                old.flush().map_err(|e| EngineError::persistence("day rollover flush", e))?;
            }
            let path = self.event_path(date);
            debug!(path = %path.display(), "opening event file");
            self.writer = Some(Self::open_append(&path)?);
            self.current_date = Some(date);
        }
        Ok(self.writer.as_mut().expect("writer was just ensured"))
    }
}

impl EventSink for JsonlSink {
    fn write_line(&mut self, date: NaiveDate, line: &str) -> Result<(), EngineError> {
        let writer = self.writer_for(date)?;
        writeln!(writer, "{line}")
            .map_err(|e| EngineError::persistence("writing event line", e))?;
        Ok(())
    }

    fn write_corruption(&mut self, record: &CorruptionRecord) -> Result<(), EngineError> {
        if self.corruption_writer.is_none() {
            let path = self.dir.join("corruption_log.jsonl");
            self.corruption_writer = Some(Self::open_append(&path)?);
        }
        let writer = self.corruption_writer.as_mut().expect("just ensured");
        let line = serde_json::to_string(record)?;
        writeln!(writer, "{line}")
            .map_err(|e| EngineError::persistence("writing corruption line", e))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().map_err(|e| EngineError::persistence("flushing events", e))?;
        }
        if let Some(writer) = self.corruption_writer.as_mut() {
            writer.flush().map_err(|e| EngineError::persistence("flushing corruption log", e))?;
        }
        Ok(())
    }
}

/// Serialize, roll the corruption dice, write. The corrupted line replaces
/// the clean one in the primary stream; the ground-truth record follows
/// immediately in the side channel.
pub struct EventPipeline<S: EventSink> {
    pub sink: S,
    corruptor: Corruptor,
}

impl<S: EventSink> EventPipeline<S> {
    pub fn new(sink: S, corruptor: Corruptor) -> Self {
        EventPipeline { sink, corruptor }
    }

    pub fn emit(
        &mut self,
        record: &EventRecord,
        rng: &mut impl Rng,
    ) -> Result<(), EngineError> {
        let line = serde_json::to_string(record)?;
        let date = record.timestamp.date_naive();
        match self.corruptor.maybe_corrupt(&line, record, rng) {
            Some((mangled, truth)) => {
                self.sink.write_line(date, &mangled)?;
                self.sink.write_corruption(&truth)?;
            }
            None => self.sink.write_line(date, &line)?,
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), EngineError> {
        self.sink.flush()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::events::Event;
    use crate::types::{CustomerId, ProductId, SalesOrderId};

    fn record(ts: chrono::DateTime<Utc>) -> EventRecord {
        EventRecord::new(ts, Event::SalesOrderCreated {
            order_id: SalesOrderId(1),
            customer_id: CustomerId(1),
            product_id: ProductId(1),
            qty: 2,
        })
    }

    #[test]
    fn date_partitioned_sink_writes_one_file_per_day() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = EventPipeline::new(
            JsonlSink::create(dir.path(), OutputMode::DatePartitioned).unwrap(),
            Corruptor::disabled(),
        );
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        let day_one = Utc.with_ymd_and_hms(2023, 3, 1, 23, 0, 0).unwrap();
        pipeline.emit(&record(day_one), &mut rng).unwrap();
        pipeline.emit(&record(day_one + Duration::hours(2)), &mut rng).unwrap();
        pipeline.flush().unwrap();

        let first = std::fs::read_to_string(dir.path().join("2023-03-01.jsonl")).unwrap();
        let second = std::fs::read_to_string(dir.path().join("2023-03-02.jsonl")).unwrap();
        assert_eq!(first.lines().count(), 1);
        assert_eq!(second.lines().count(), 1);
    }

    #[test]
    fn rollover_flushes_previous_day_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = EventPipeline::new(
            JsonlSink::create(dir.path(), OutputMode::DatePartitioned).unwrap(),
            Corruptor::disabled(),
        );
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        let day_one = Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap();
        pipeline.emit(&record(day_one), &mut rng).unwrap();
        pipeline.emit(&record(day_one + Duration::days(1)), &mut rng).unwrap();

        // Day one is durable without an explicit flush call.
        let first = std::fs::read_to_string(dir.path().join("2023-03-01.jsonl")).unwrap();
        assert_eq!(first.lines().count(), 1);
    }

    #[test]
    fn single_file_mode_accumulates_across_days() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = EventPipeline::new(
            JsonlSink::create(dir.path(), OutputMode::SingleFile).unwrap(),
            Corruptor::disabled(),
        );
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        let start = Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap();
        for day in 0..3 {
            pipeline.emit(&record(start + Duration::days(day)), &mut rng).unwrap();
        }
        pipeline.flush().unwrap();

        let all = std::fs::read_to_string(dir.path().join("events.jsonl")).unwrap();
        assert_eq!(all.lines().count(), 3);
    }

    #[test]
    fn corrupted_line_lands_in_primary_with_side_channel_truth() {
        let dir = tempfile::tempdir().unwrap();
        let config = {
            let mut c = crate::config::SimulationConfig::canonical();
            c.data_corruption_probability = 1.0;
            c
        };
        let mut pipeline = EventPipeline::new(
            JsonlSink::create(dir.path(), OutputMode::SingleFile).unwrap(),
            Corruptor::from_config(&config),
        );
        let mut rng = ChaCha20Rng::seed_from_u64(3);

        let ts = Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap();
        pipeline.emit(&record(ts), &mut rng).unwrap();
        pipeline.flush().unwrap();

        let clean = serde_json::to_string(&record(ts)).unwrap();
        let primary = std::fs::read_to_string(dir.path().join("events.jsonl")).unwrap();
        assert_ne!(primary.trim_end(), clean);

        let truth = std::fs::read_to_string(dir.path().join("corruption_log.jsonl")).unwrap();
        let v: serde_json::Value = serde_json::from_str(truth.lines().next().unwrap()).unwrap();
        assert_eq!(v["corrupted_event_type"], "SalesOrderCreated");
        assert!(v["corruption_type"].is_string());
    }

    #[test]
    fn memory_sink_collects_lines_in_order() {
        let mut pipeline = EventPipeline::new(MemorySink::default(), Corruptor::disabled());
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let ts = Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap();
        pipeline.emit(&record(ts), &mut rng).unwrap();
        pipeline.emit(&record(ts + Duration::hours(1)), &mut rng).unwrap();
        assert_eq!(pipeline.sink.lines.len(), 2);
        assert!(pipeline.sink.corruption_lines.is_empty());
    }
}
