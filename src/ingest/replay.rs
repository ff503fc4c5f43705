//! Captured stream replay source.
//!
//! Reads a previously captured frame stream from a local file (or stdin when
//! the path is `-`) and feeds it through the same demultiplexer as the HTTP
//! source. Used for offline runs and fixtures.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::demux::FrameStream;

/// Local replay source.
#[derive(Clone, Debug)]
pub struct ReplaySource {
    path: PathBuf,
}

impl ReplaySource {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if is_url_like(path) {
            return Err(anyhow!(
                "replay input must be a local path or '-', got {}",
                path.display()
            ));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn is_stdin(&self) -> bool {
        self.path.as_os_str() == "-"
    }

    pub fn open(&self) -> Result<FrameStream<Box<dyn BufRead + Send>>> {
        let reader: Box<dyn BufRead + Send> = if self.is_stdin() {
            Box::new(BufReader::new(io::stdin()))
        } else {
            let file = File::open(&self.path)
                .with_context(|| format!("open replay input {}", self.path.display()))?;
            Box::new(BufReader::new(file))
        };
        log::info!("replaying frame stream from {}", self.describe());
        Ok(FrameStream::new(reader))
    }

    pub fn describe(&self) -> String {
        if self.is_stdin() {
            "stdin".to_string()
        } else {
            self.path.display().to_string()
        }
    }
}

fn is_url_like(path: &Path) -> bool {
    path.to_str().is_some_and(|s| s.contains("://"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rejects_urls() {
        assert!(ReplaySource::new("http://host/stream").is_err());
        assert!(ReplaySource::new("-").unwrap().is_stdin());
    }

    #[test]
    fn replays_frames_from_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"Content-Type: image/jpeg\r\n\r\npayload\r\n--frame\r\n")?;
        let source = ReplaySource::new(file.path())?;
        let frames: Vec<_> = source.open()?.collect::<Result<_, _>>()?;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, b"payload\n");
        Ok(())
    }
}
