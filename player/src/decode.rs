use anyhow::Context;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::FfmpegEvent;

/// One decoded frame of tightly packed RGB24 pixels.
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Streams RGB24 frames out of an ffmpeg process.
///
/// The pipe cannot rewind, so restarting playback means opening a fresh
/// decoder for the same path.
pub struct VideoDecoder {
    width: u32,
    height: u32,
    native_fps: Option<f64>,
    pending: Option<VideoFrame>,
    events: Box<dyn Iterator<Item = FfmpegEvent>>,
}

impl VideoDecoder {
    pub fn open(input_path: &str) -> anyhow::Result<Self> {
        let mut child = FfmpegCommand::new()
            .input(input_path)
            .rawvideo()
            .spawn()
            .context("failed to spawn ffmpeg (is it installed?)")?;

        let mut events = child.iter().context("failed to iterate ffmpeg events")?;

        // Scan up to the first decoded frame. Dimensions come from the
        // frame itself; the native rate from stream metadata on the way.
        let mut native_fps = None;
        let mut pending = None;
        for event in &mut events {
            match event {
                FfmpegEvent::ParsedInputStream(ref stream) => {
                    if let Some(video) = stream.video_data() {
                        if video.fps > 0.0 {
                            native_fps = Some(f64::from(video.fps));
                        }
                    }
                }
                FfmpegEvent::OutputFrame(frame) => {
                    pending = Some(VideoFrame {
                        data: frame.data,
                        width: frame.width,
                        height: frame.height,
                    });
                    break;
                }
                _ => {}
            }
        }

        let first = pending
            .as_ref()
            .with_context(|| format!("no video frames in {input_path}"))?;
        if first.width == 0 || first.height == 0 {
            anyhow::bail!("could not determine video dimensions for {input_path}");
        }

        Ok(Self {
            width: first.width,
            height: first.height,
            native_fps,
            pending,
            events: Box::new(events),
        })
    }

    pub fn source_width(&self) -> u32 {
        self.width
    }

    pub fn source_height(&self) -> u32 {
        self.height
    }

    /// Frame rate reported by the source, if ffmpeg could parse one.
    pub fn native_fps(&self) -> Option<f64> {
        self.native_fps
    }
}

impl Iterator for VideoDecoder {
    type Item = VideoFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(frame) = self.pending.take() {
            return Some(frame);
        }
        for event in &mut self.events {
            if let FfmpegEvent::OutputFrame(frame) = event {
                return Some(VideoFrame {
                    data: frame.data,
                    width: frame.width,
                    height: frame.height,
                });
            }
        }
        None
    }
}
