use camserve_common::config::CameraConfig;

/// One uncompressed frame as delivered by the camera: tightly packed RGB8.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera device error: {0}")]
    Device(String),
    #[error("camera produced an empty frame")]
    Empty,
}

/// Blocking frame source. One `capture_next` call returns one frame; the
/// capture loop owns the source and calls it from a dedicated thread, so
/// implementations are free to block on the device.
pub trait FrameSource: Send {
    fn capture_next(&mut self) -> Result<RawFrame, CaptureError>;

    /// Release the device. Called once when the capture loop stops.
    fn close(&mut self);

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Synthetic frame source: a gradient that drifts one step per capture.
/// Lets the service run end-to-end on machines without camera hardware.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    tick: u64,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
        }
    }
}

impl FrameSource for TestPatternSource {
    fn capture_next(&mut self) -> Result<RawFrame, CaptureError> {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = (self.tick % 256) as u8;
        let mut pixels = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                pixels.push((x % 256) as u8 ^ shift);
                pixels.push((y % 256) as u8);
                pixels.push(shift);
            }
        }
        self.tick += 1;
        Ok(RawFrame {
            width: self.width,
            height: self.height,
            pixels,
        })
    }

    fn close(&mut self) {}

    fn name(&self) -> &str {
        "pattern"
    }
}

/// Build the configured frame source. Unknown names are a startup error; the
/// caller treats that as fatal.
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
    match config.source.as_str() {
        "pattern" => Ok(Box::new(TestPatternSource::new(config.width, config.height))),
        other => Err(CaptureError::Device(format!(
            "unknown camera source '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_source_fills_frame() {
        let mut source = TestPatternSource::new(4, 3);
        let frame = source.capture_next().unwrap();
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 3);
        assert_eq!(frame.pixels.len(), 4 * 3 * 3);
    }

    #[test]
    fn pattern_source_advances() {
        let mut source = TestPatternSource::new(8, 8);
        let first = source.capture_next().unwrap();
        let second = source.capture_next().unwrap();
        assert_ne!(first.pixels, second.pixels);
    }

    #[test]
    fn unknown_source_rejected() {
        let config = CameraConfig {
            source: "telescope".into(),
            width: 640,
            height: 480,
        };
        assert!(open_source(&config).is_err());
    }
}
