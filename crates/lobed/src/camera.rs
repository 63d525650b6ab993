//! Camera frame sources for the shape-tracing session.

use crate::error::CameraError;
use base64::Engine as _;
use std::path::{Path, PathBuf};

/// A device that yields encoded frames as `data:` URLs.
pub trait FrameSource: Send + Sync {
    fn capture(&mut self) -> Result<String, CameraError>;

    /// Give the device back. Further captures fail.
    fn release(&mut self);
}

/// Replays still images from a directory in name order, looping forever.
///
/// A missing or empty directory is treated like a denied camera.
#[derive(Debug)]
pub struct DirectoryCamera {
    frames: Vec<PathBuf>,
    next: usize,
    released: bool,
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

impl DirectoryCamera {
    pub fn open(dir: &Path) -> Result<Self, CameraError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::AccessDenied(format!("{}: {e}", dir.display())))?;

        let mut frames: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && mime_for(p).is_some())
            .collect();
        if frames.is_empty() {
            return Err(CameraError::AccessDenied(format!(
                "no frames in {}",
                dir.display()
            )));
        }
        frames.sort();

        Ok(Self {
            frames,
            next: 0,
            released: false,
        })
    }
}

impl FrameSource for DirectoryCamera {
    fn capture(&mut self) -> Result<String, CameraError> {
        if self.released {
            return Err(CameraError::Released);
        }
        let path = &self.frames[self.next % self.frames.len()];
        self.next = self.next.wrapping_add(1);

        let bytes = std::fs::read(path)?;
        let mime = mime_for(path).unwrap_or("image/jpeg");
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(format!("data:{mime};base64,{encoded}"))
    }

    fn release(&mut self) {
        self.released = true;
    }
}
