//! ESP32-CAM frame source.
//!
//! The camera serves either a multipart MJPEG stream or a single JPEG
//! snapshot per request; `connect` sniffs the Content-Type and picks the
//! mode. Frames are decoded to RGB in memory and handed to the pipeline;
//! nothing is buffered beyond the current frame.

use std::io::Read;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use url::Url;

use super::FrameSource;
use crate::frame::Frame;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;
const HEALTH_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct Esp32Config {
    /// Stream URL; http(s) only. MJPEG vs snapshot is negotiated at connect.
    pub url: String,
}

impl Default for Esp32Config {
    fn default() -> Self {
        Self {
            url: "http://192.168.1.100/stream".to_string(),
        }
    }
}

enum StreamMode {
    Mjpeg(MjpegStream),
    Snapshot,
}

pub struct Esp32Source {
    config: Esp32Config,
    mode: Option<StreamMode>,
    frames_captured: u64,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
}

impl Esp32Source {
    pub fn new(config: Esp32Config) -> Result<Self> {
        let url = Url::parse(&config.url).context("parse esp32-cam url")?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported esp32-cam scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        Ok(Self {
            config,
            mode: None,
            frames_captured: 0,
            last_frame_at: None,
            connected_at: None,
        })
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

impl FrameSource for Esp32Source {
    fn connect(&mut self) -> Result<()> {
        let response = ureq::get(&self.config.url)
            .call()
            .context("connect to esp32-cam stream")?;
        let content_type = response.header("Content-Type").unwrap_or("");
        self.mode = if content_type.to_lowercase().contains("multipart") {
            Some(StreamMode::Mjpeg(MjpegStream::new(response.into_reader())))
        } else {
            Some(StreamMode::Snapshot)
        };
        self.connected_at = Some(Instant::now());
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        let mode = self
            .mode
            .as_mut()
            .ok_or_else(|| anyhow!("esp32-cam source not connected; call connect() first"))?;

        let jpeg_bytes = match mode {
            StreamMode::Mjpeg(stream) => stream.read_next_jpeg()?,
            StreamMode::Snapshot => fetch_snapshot(&self.config.url)?,
        };

        let frame = decode_jpeg(&jpeg_bytes)?;
        self.frames_captured += 1;
        self.last_frame_at = Some(Instant::now());
        Ok(frame)
    }

    fn is_healthy(&self) -> bool {
        match (self.connected_at, self.last_frame_at) {
            (None, _) => false,
            (Some(connected), None) => connected.elapsed() <= HEALTH_GRACE,
            (_, Some(last_frame)) => last_frame.elapsed() <= HEALTH_GRACE,
        }
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    /// Pull bytes until the buffer holds a complete SOI..EOI JPEG, then
    /// split it off.
    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let jpeg = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(jpeg);
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES {
                self.buffer.clear();
                return Err(anyhow!("mjpeg frame exceeded {} bytes", MAX_JPEG_BYTES));
            }
        }
    }
}

fn fetch_snapshot(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64)
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    Ok(bytes)
}

fn decode_jpeg(bytes: &[u8]) -> Result<Frame> {
    let image = image::load_from_memory(bytes).context("decode jpeg")?;
    Ok(Frame::new(image.to_rgb8()))
}

fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?
        + start
        + 4;
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_bounds_skip_multipart_garbage() {
        let mut data = b"--boundary\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        data.extend_from_slice(&[0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0xD9]);
        data.extend_from_slice(b"\r\n--boundary");

        let (start, end) = find_jpeg_bounds(&data).unwrap();
        assert_eq!(&data[start..start + 2], &[0xFF, 0xD8]);
        assert_eq!(&data[end - 2..end], &[0xFF, 0xD9]);
    }

    #[test]
    fn incomplete_jpeg_yields_none() {
        let data = [0xFF, 0xD8, 0x01, 0x02];
        assert!(find_jpeg_bounds(&data).is_none());
        assert!(find_jpeg_bounds(&[]).is_none());
    }

    #[test]
    fn rejects_non_http_scheme() {
        let source = Esp32Source::new(Esp32Config {
            url: "rtsp://camera".into(),
        });
        assert!(source.is_err());
    }
}
