use crate::camera::FrameSource;
use crate::common::{Config, PipelineError, Result};
use crate::common::config::CameraConfig;
use crate::core::Frame;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};
use std::fs;

/// Capability summary for one `/dev/video*` node.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    pub index: u32,
    pub name: String,
    pub features: Vec<String>,
}

pub struct Camera {
    // Declared before `device` so the stream is dropped first.
    stream: Option<Stream<'static>>,
    device: Device,
    index: u32,
    fourcc: FourCC,
    width: u32,
    height: u32,
}

impl Camera {
    pub fn new(config: &Config) -> Result<Self> {
        Self::new_with_device(config.camera.device_index, &config.camera)
    }

    /// List all available cameras with their capabilities
    pub fn list_all_cameras() -> Result<Vec<CameraInfo>> {
        let mut cameras = Vec::new();

        for entry in fs::read_dir("/dev")? {
            let entry = entry?;
            let path = entry.path();
            let filename = path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("");

            let Some(index) = filename.strip_prefix("video").and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            let Ok(device) = Device::new(index as usize) else {
                continue;
            };
            let Ok(caps) = device.query_caps() else {
                continue;
            };

            let mut features = Vec::new();
            if caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                features.push("VIDEO_CAPTURE".to_string());
            }

            for fmt in device.enum_formats().unwrap_or_default() {
                match fmt.fourcc.str().unwrap_or("UNKNOWN") {
                    "GREY" => features.push("Grayscale (GREY)".to_string()),
                    f @ ("MJPG" | "YUYV") => features.push(format!("Color ({})", f)),
                    _ => {}
                }
            }

            cameras.push(CameraInfo { index, name: caps.card.clone(), features });
        }

        cameras.sort_by_key(|c| c.index);
        Ok(cameras)
    }

    pub fn new_with_device(index: u32, config: &CameraConfig) -> Result<Self> {
        tracing::info!("Opening camera device {}...", index);

        let device = Device::new(index as usize)
            .map_err(|e| PipelineError::Camera(format!("Failed to open camera {}: {}", index, e)))?;

        let caps = device.query_caps()
            .map_err(|e| PipelineError::Camera(format!("Failed to query capabilities: {}", e)))?;

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            tracing::warn!("Device {} may not support standard video capture ({:?})", index, caps.capabilities);
        }

        let mut fmt = device.format()
            .map_err(|e| PipelineError::Camera(format!("Failed to get format: {}", e)))?;

        fmt.width = config.width;
        fmt.height = config.height;

        // Keep GREY for IR-style devices, otherwise ask for MJPG
        if fmt.fourcc != FourCC::new(b"GREY") {
            fmt.fourcc = FourCC::new(b"MJPG");
        }

        if let Err(e) = device.set_format(&fmt) {
            tracing::warn!("Could not set exact format: {}. Using device defaults.", e);
        }

        let final_fmt = device.format()
            .map_err(|e| PipelineError::Camera(format!("Failed to get final format: {}", e)))?;

        tracing::info!(
            "Camera {} ({}) format: {}x{} {}",
            index,
            caps.card,
            final_fmt.width,
            final_fmt.height,
            final_fmt.fourcc.str().unwrap_or("????")
        );

        if final_fmt.width != config.width || final_fmt.height != config.height {
            tracing::warn!(
                "Camera resolution {}x{} differs from requested {}x{}",
                final_fmt.width, final_fmt.height, config.width, config.height
            );
        }

        Ok(Self {
            stream: None,
            device,
            index,
            fourcc: final_fmt.fourcc,
            width: final_fmt.width,
            height: final_fmt.height,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn capture_frame(&mut self) -> Result<DynamicImage> {
        if self.stream.is_none() {
            let stream = Stream::with_buffers(&self.device, Type::VideoCapture, 4)
                .map_err(|e| PipelineError::Camera(format!("Failed to create stream: {}", e)))?;
            self.stream = Some(stream);
        }

        let (fourcc, width, height) = (self.fourcc, self.width, self.height);
        let stream = self.stream.as_mut()
            .ok_or_else(|| PipelineError::Camera("Stream not started".into()))?;

        let (buf, meta) = stream.next()
            .map_err(|e| PipelineError::Camera(format!("Failed to capture: {}", e)))?;
        let used = (meta.bytesused as usize).min(buf.len());
        let data = if used > 0 { &buf[..used] } else { buf };

        decode_buffer(data, fourcc, width, height)
    }
}

impl FrameSource for Camera {
    fn acquire_frame(&mut self) -> Result<Frame> {
        self.capture_frame().map(Frame::new)
    }
}

fn decode_buffer(data: &[u8], fourcc: FourCC, width: u32, height: u32) -> Result<DynamicImage> {
    match fourcc.str().unwrap_or("") {
        "GREY" => grey_to_image(data, width, height),
        "MJPG" => Ok(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?),
        "YUYV" => yuyv_to_image(data, width, height),
        other => Err(PipelineError::Camera(format!("Unsupported pixel format {:?}", other))),
    }
}

fn grey_to_image(data: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    let len = (width * height) as usize;
    if data.len() < len {
        return Err(PipelineError::Camera("Short grayscale frame".into()));
    }
    let img_buffer = ImageBuffer::<Luma<u8>, _>::from_raw(width, height, data[..len].to_vec())
        .ok_or_else(|| PipelineError::Camera("Failed to create grayscale image buffer".into()))?;

    Ok(DynamicImage::ImageLuma8(img_buffer))
}

fn yuyv_to_image(data: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    let pixels = (width * height) as usize;
    if data.len() < pixels * 2 {
        return Err(PipelineError::Camera("Short YUYV frame".into()));
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for chunk in data[..pixels * 2].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0] as f32, chunk[1] as f32 - 128.0, chunk[2] as f32, chunk[3] as f32 - 128.0);
        for y in [y0, y1] {
            rgb.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
        }
    }

    let img_buffer = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, rgb)
        .ok_or_else(|| PipelineError::Camera("Failed to create RGB image buffer".into()))?;
    Ok(DynamicImage::ImageRgb8(img_buffer))
}
