use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

/// Name of the summary log written in the model directory.
pub const SUMMARY_FILE: &str = "summary.jsonl";

/// The scalars recorded at every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub step: usize,
    pub d_loss: f32,
    pub g_loss: f32,
    pub d_overpowered: bool,
}

/// Appends one JSON line per record.
#[derive(Debug)]
pub struct SummaryWriter<W: Write> {
    out: W,
}

impl SummaryWriter<BufWriter<File>> {
    /// Opens `path` in append mode, creating it and its parent directories if needed.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> SummaryWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Writes `record` as one line and flushes the output.
    pub fn append(&mut self, record: &SummaryRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
