//! CSV output for exported tractograms.

use std::fs::File;
use std::path::Path;

use csv::Writer;

use tt_core::Affine;
use tt_env::{ExportedStreamline, Space, TractogramSink};

/// Writes one CSV row per point: `streamline,seed,flags,x,y,z`.
pub struct CsvSink {
    out:      Writer<File>,
    rows:     usize,
    finished: bool,
}

impl CsvSink {
    /// Create (or truncate) the file at `path`.  The header row is written
    /// when the tractogram begins.
    pub fn new(path: &Path) -> csv::Result<Self> {
        Ok(Self { out: Writer::from_path(path)?, rows: 0, finished: false })
    }

    /// Point rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }
}

impl TractogramSink for CsvSink {
    type Error = csv::Error;

    fn begin(&mut self, _space: Space, _affine: &Affine, _count: usize) -> csv::Result<()> {
        self.out.write_record(["streamline", "seed", "flags", "x", "y", "z"])
    }

    fn write(&mut self, s: &ExportedStreamline) -> csv::Result<()> {
        for p in &s.points {
            self.out.write_record(&[
                s.id.0.to_string(),
                s.seed_id.0.to_string(),
                s.flags.bits().to_string(),
                p.x.to_string(),
                p.y.to_string(),
                p.z.to_string(),
            ])?;
            self.rows += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> csv::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.out.flush()?;
        Ok(())
    }
}
