//! Per-channel sample sinks and read-back helpers.
//!
//! Samples are persisted as little-endian `u16`, one file per channel,
//! waveforms back to back with no header.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Append-only destination for one channel's samples.
pub trait SampleSink {
    /// Append samples in order. Only called with samples from a reply that
    /// passed validation.
    fn write_samples(&mut self, samples: &[u16]) -> io::Result<()>;

    /// Flush everything appended so far. Called once when reassembly ends.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SampleSink for Vec<u16> {
    fn write_samples(&mut self, samples: &[u16]) -> io::Result<()> {
        self.extend_from_slice(samples);
        Ok(())
    }
}

/// Opens one sink per channel.
pub trait SinkFactory {
    type Sink: SampleSink;

    fn open(&mut self, channel: u32) -> io::Result<Self::Sink>;
}

impl<F, S> SinkFactory for F
where
    F: FnMut(u32) -> io::Result<S>,
    S: SampleSink,
{
    type Sink = S;

    fn open(&mut self, channel: u32) -> io::Result<S> {
        self(channel)
    }
}

/// Default file extension for channel files.
pub const DEFAULT_EXTENSION: &str = "dat";

/// Files named `<folder>/channel_<id>.<extension>`.
///
/// A file is created (or truncated) on the first write, not when the sink
/// is opened, so an acquisition that fails before any valid data arrives
/// leaves the previous run's files intact.
#[derive(Debug, Clone)]
pub struct FileSinks {
    folder: PathBuf,
    extension: String,
    append: bool,
}

impl FileSinks {
    /// Truncating `.dat` files under `folder`.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            append: false,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Append to existing files instead of truncating them.
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Path of the file for `channel`.
    pub fn path_for(&self, channel: u32) -> PathBuf {
        self.folder
            .join(format!("channel_{channel}.{}", self.extension))
    }
}

impl SinkFactory for FileSinks {
    type Sink = FileSink;

    fn open(&mut self, channel: u32) -> io::Result<FileSink> {
        Ok(FileSink {
            path: self.path_for(channel),
            append: self.append,
            writer: None,
            samples: 0,
        })
    }
}

/// One channel file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    append: bool,
    writer: Option<BufWriter<File>>,
    samples: u64,
}

impl FileSink {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples appended through this sink.
    pub fn samples_written(&self) -> u64 {
        self.samples
    }

    fn create(&self) -> io::Result<BufWriter<File>> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = if self.append {
            OpenOptions::new().create(true).append(true).open(&self.path)?
        } else {
            File::create(&self.path)?
        };
        Ok(BufWriter::new(file))
    }
}

impl SampleSink for FileSink {
    fn write_samples(&mut self, samples: &[u16]) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.create()?,
        };
        self.writer.insert(writer).write_all(&bytes)?;
        self.samples += samples.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        writer.flush()?;
        writer.get_ref().sync_data()
    }
}

/// Load a channel file as waveforms of `samples_per_waveform` samples.
///
/// Fails with `InvalidData` unless the file holds a whole number of
/// waveforms.
pub fn read_waveforms(path: impl AsRef<Path>, samples_per_waveform: usize) -> io::Result<Vec<Vec<u16>>> {
    if samples_per_waveform == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "samples per waveform must be at least 1",
        ));
    }

    let mut bytes = Vec::new();
    File::open(path.as_ref())?.read_to_end(&mut bytes)?;

    let waveform_bytes = samples_per_waveform * 2;
    if bytes.len() % waveform_bytes != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "{}: {} bytes is not a whole number of {samples_per_waveform}-sample waveforms",
                path.as_ref().display(),
                bytes.len()
            ),
        ));
    }

    Ok(bytes
        .chunks_exact(waveform_bytes)
        .map(|waveform| {
            waveform
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect()
        })
        .collect())
}

/// Sample-wise mean of equally long waveforms. Empty input gives an empty
/// result.
pub fn mean_waveform(waveforms: &[Vec<u16>]) -> Vec<f64> {
    let Some(first) = waveforms.first() else {
        return Vec::new();
    };
    let mut sums = vec![0u64; first.len()];
    for waveform in waveforms {
        for (sum, &sample) in sums.iter_mut().zip(waveform) {
            *sum += u64::from(sample);
        }
    }
    let count = waveforms.len() as f64;
    sums.into_iter().map(|sum| sum as f64 / count).collect()
}
