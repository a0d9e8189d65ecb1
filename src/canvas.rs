//! Transparent BGRA drawing surface laid over the video frame.

use crate::geometry::DrawInstruction;
use crate::overlay::OverlayImage;
use opencv::core::{self, Mat, Scalar, Size};
use opencv::imgproc;
use opencv::prelude::*;

pub struct Canvas {
    surface: Mat,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            surface: Mat::default(),
        }
    }

    pub fn surface(&self) -> &Mat {
        &self.surface
    }

    pub fn size(&self) -> opencv::Result<Size> {
        self.surface.size()
    }

    /// Reallocate when the frame size changed. Returns true on reallocation.
    pub fn ensure_size(&mut self, size: Size) -> opencv::Result<bool> {
        if !self.surface.empty() && self.surface.size()? == size {
            return Ok(false);
        }
        self.surface = Mat::new_rows_cols_with_default(
            size.height,
            size.width,
            core::CV_8UC4,
            Scalar::all(0.0),
        )?;
        Ok(true)
    }

    pub fn clear(&mut self) -> opencv::Result<()> {
        if !self.surface.empty() {
            self.surface.data_bytes_mut()?.fill(0);
        }
        Ok(())
    }

    pub fn is_blank(&self) -> opencv::Result<bool> {
        if self.surface.empty() {
            return Ok(true);
        }
        Ok(self
            .surface
            .data_bytes()?
            .chunks_exact(4)
            .all(|pixel| pixel[3] == 0))
    }

    /// Draw `image` scaled to the instruction size and rotated around the
    /// instruction center.
    pub fn draw(
        &mut self,
        image: &OverlayImage,
        instruction: &DrawInstruction,
    ) -> opencv::Result<()> {
        let width = instruction.width.round() as i32;
        let height = instruction.height.round() as i32;
        if self.surface.empty() || width < 1 || height < 1 {
            return Ok(());
        }

        let scaled = resample_premultiplied(image, Size::new(width, height))?;

        // maps scaled image pixels onto the canvas: rotate about the image
        // center, then move that center onto the instruction center
        let (sin, cos) = (instruction.angle as f64).sin_cos();
        let (center_x, center_y) = instruction.center();
        let half_width = width as f64 / 2.0;
        let half_height = height as f64 / 2.0;
        let transform = Mat::from_slice_2d(&[
            [
                cos,
                -sin,
                center_x as f64 - (cos * half_width - sin * half_height),
            ],
            [
                sin,
                cos,
                center_y as f64 - (sin * half_width + cos * half_height),
            ],
        ])?;

        let mut warped = Mat::default();
        imgproc::warp_affine(
            &scaled,
            &mut warped,
            &transform,
            self.surface.size()?,
            imgproc::INTER_LINEAR,
            core::BORDER_CONSTANT,
            Scalar::all(0.0),
        )?;
        unpremultiply(warped.data_bytes_mut()?);

        let layer = warped.data_bytes()?;
        for (dst, src) in self
            .surface
            .data_bytes_mut()?
            .chunks_exact_mut(4)
            .zip(layer.chunks_exact(4))
        {
            blend_over(dst, src);
        }
        Ok(())
    }

    /// The frame with the canvas painted over it.
    pub fn composite_onto(&self, frame: &Mat) -> opencv::Result<Mat> {
        let mut output = to_bgr(frame)?;
        if self.surface.empty() || self.surface.size()? != output.size()? {
            return Ok(output);
        }
        let cols = output.cols();
        blend_onto_bgr(
            output.data_bytes_mut()?,
            cols,
            self.surface.data_bytes()?,
            cols,
            (0, 0),
            1.0,
        );
        Ok(output)
    }
}

/// Logo stamped in the bottom right corner of every displayed frame.
pub struct Watermark {
    logo: OverlayImage,
    width: i32,
    margin: i32,
    opacity: f32,
}

impl Watermark {
    pub fn new(logo: OverlayImage) -> Self {
        Self {
            logo,
            width: 164,
            margin: 12,
            opacity: 0.92,
        }
    }

    pub fn apply(&self, frame: &mut Mat) -> opencv::Result<()> {
        if frame.typ() != core::CV_8UC3 || !frame.is_continuous() {
            return Ok(());
        }
        let width = self.width.min(frame.cols() - 2 * self.margin);
        let aspect = self.logo.height() as f32 / self.logo.width() as f32;
        let height = (width as f32 * aspect).round() as i32;
        if width < 1 || height < 1 || height + 2 * self.margin > frame.rows() {
            return Ok(());
        }

        let mut scaled = resample_premultiplied(&self.logo, Size::new(width, height))?;
        unpremultiply(scaled.data_bytes_mut()?);

        let origin = (
            frame.cols() - width - self.margin,
            frame.rows() - height - self.margin,
        );
        let cols = frame.cols();
        blend_onto_bgr(
            frame.data_bytes_mut()?,
            cols,
            scaled.data_bytes()?,
            width,
            origin,
            self.opacity,
        );
        Ok(())
    }
}

/// Resize with color weighted by alpha. The result stays premultiplied.
fn resample_premultiplied(image: &OverlayImage, size: Size) -> opencv::Result<Mat> {
    let mut premultiplied = image.to_mat()?;
    for pixel in premultiplied.data_bytes_mut()?.chunks_exact_mut(4) {
        let alpha = pixel[3] as u32;
        for channel in &mut pixel[..3] {
            *channel = ((*channel as u32 * alpha + 127) / 255) as u8;
        }
    }
    let mut resized = Mat::default();
    imgproc::resize(
        &premultiplied,
        &mut resized,
        size,
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )?;
    Ok(resized)
}

fn unpremultiply(bgra: &mut [u8]) {
    for pixel in bgra.chunks_exact_mut(4) {
        let alpha = pixel[3] as u32;
        if alpha == 0 || alpha == 255 {
            continue;
        }
        for channel in &mut pixel[..3] {
            *channel = ((*channel as u32 * 255 + alpha / 2) / alpha).min(255) as u8;
        }
    }
}

fn to_bgr(frame: &Mat) -> opencv::Result<Mat> {
    let conversion = match frame.channels() {
        1 => imgproc::COLOR_GRAY2BGR,
        4 => imgproc::COLOR_BGRA2BGR,
        _ => return frame.try_clone(),
    };
    let mut bgr = Mat::default();
    imgproc::cvt_color(frame, &mut bgr, conversion, 0)?;
    Ok(bgr)
}

/// Porter-Duff "over" for one straight alpha BGRA pixel.
fn blend_over(dst: &mut [u8], src: &[u8]) {
    let src_alpha = src[3] as u32;
    if src_alpha == 0 {
        return;
    }
    if src_alpha == 255 {
        dst.copy_from_slice(src);
        return;
    }

    let dst_weight = dst[3] as u32 * (255 - src_alpha);
    let src_weight = src_alpha * 255;
    let total = src_weight + dst_weight;
    for channel in 0..3 {
        let mixed = src[channel] as u32 * src_weight + dst[channel] as u32 * dst_weight;
        dst[channel] = ((mixed + total / 2) / total) as u8;
    }
    dst[3] = ((total + 127) / 255) as u8;
}

/// Blend a BGRA layer of `layer_cols` width onto a BGR image at `origin`.
/// Parts of the layer outside the image are ignored.
fn blend_onto_bgr(
    image: &mut [u8],
    image_cols: i32,
    layer: &[u8],
    layer_cols: i32,
    origin: (i32, i32),
    opacity: f32,
) {
    if image_cols <= 0 || layer_cols <= 0 {
        return;
    }
    let image_cols = image_cols as usize;
    let image_rows = image.len() / (image_cols * 3);
    let layer_cols_usize = layer_cols as usize;

    for (layer_row, row) in layer.chunks_exact(layer_cols_usize * 4).enumerate() {
        let y = origin.1 + layer_row as i32;
        if y < 0 || y as usize >= image_rows {
            continue;
        }
        for (layer_col, pixel) in row.chunks_exact(4).enumerate() {
            let x = origin.0 + layer_col as i32;
            if x < 0 || x as usize >= image_cols {
                continue;
            }
            let alpha = pixel[3] as f32 / 255.0 * opacity;
            if alpha <= 0.0 {
                continue;
            }
            let offset = (y as usize * image_cols + x as usize) * 3;
            for channel in 0..3 {
                let under = image[offset + channel] as f32;
                let over = pixel[channel] as f32;
                image[offset + channel] = (over * alpha + under * (1.0 - alpha)).round() as u8;
            }
        }
    }
}
