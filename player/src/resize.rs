use anyhow::Context;
use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};

/// Scales decoded RGB24 frames down to the terminal grid.
///
/// The target is `cols` pixels wide and `rows * 2` pixels tall, one
/// pixel row per half of a cell.
pub struct FrameResizer {
    target_width: u32,
    target_height: u32,
    resizer: Resizer,
    options: ResizeOptions,
}

impl FrameResizer {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            target_width: u32::from(cols),
            target_height: u32::from(rows) * 2,
            resizer: Resizer::new(),
            options: ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3)),
        }
    }

    /// Retarget after the terminal changes size. The internal resizer
    /// carries no per-size state, so this is just bookkeeping.
    pub fn set_target(&mut self, cols: u16, rows: u16) {
        self.target_width = u32::from(cols);
        self.target_height = u32::from(rows) * 2;
    }

    /// Resize one RGB24 frame to the target dimensions.
    pub fn resize(&mut self, src: &[u8], src_width: u32, src_height: u32) -> anyhow::Result<Vec<u8>> {
        if src_width == self.target_width && src_height == self.target_height {
            return Ok(src.to_vec());
        }

        let src_image = Image::from_vec_u8(src_width, src_height, src.to_vec(), PixelType::U8x3)
            .context("failed to wrap decoded frame for resizing")?;

        let mut dst_image = Image::new(self.target_width, self.target_height, PixelType::U8x3);

        self.resizer
            .resize(&src_image, &mut dst_image, &self.options)
            .context("frame resize failed")?;

        Ok(dst_image.into_vec())
    }
}
