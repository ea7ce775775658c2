use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use super::{Captured, FrameSource, SourceStats};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Configuration for an image-directory source.
#[derive(Clone, Debug)]
pub struct DirectoryConfig {
    pub path: PathBuf,
    /// Start over after the last file instead of ending the stream.
    pub repeat: bool,
}

/// Replays still images from a local directory in file-name order.
///
/// Files are handed out encoded; decoding happens in the pipeline so a
/// corrupt file only costs its own frame.
pub struct DirectorySource {
    config: DirectoryConfig,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_count: u64,
    connected: bool,
}

impl DirectorySource {
    pub fn new(config: DirectoryConfig) -> Self {
        Self {
            config,
            files: Vec::new(),
            cursor: 0,
            frame_count: 0,
            connected: false,
        }
    }
}

impl FrameSource for DirectorySource {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn connect(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.config.path)
            .with_context(|| format!("failed to list {}", self.config.path.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image && path.is_file() {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", self.config.path.display()));
        }
        files.sort();
        log::info!(
            "DirectorySource: {} image(s) in {}",
            files.len(),
            self.config.path.display()
        );
        self.files = files;
        self.cursor = 0;
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Captured>> {
        if !self.connected {
            return Err(anyhow!("directory source is not connected"));
        }
        if self.cursor >= self.files.len() {
            if !self.config.repeat {
                return Ok(None);
            }
            self.cursor = 0;
        }
        let path = &self.files[self.cursor];
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        self.cursor += 1;
        self.frame_count += 1;
        Ok(Some(Captured::Encoded(bytes)))
    }

    fn release(&mut self) {
        self.connected = false;
        self.files.clear();
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            location: self.config.path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"second").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"first").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();

        let mut source = DirectorySource::new(DirectoryConfig {
            path: dir.path().to_path_buf(),
            repeat: false,
        });
        source.connect().unwrap();

        let mut seen = Vec::new();
        while let Some(captured) = source.next_frame().unwrap() {
            match captured {
                Captured::Encoded(bytes) => seen.push(bytes),
                Captured::Decoded(_) => panic!("directory frames stay encoded"),
            }
        }
        assert_eq!(seen, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn empty_directory_fails_to_connect() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = DirectorySource::new(DirectoryConfig {
            path: dir.path().to_path_buf(),
            repeat: true,
        });
        assert!(source.connect().is_err());
    }
}
