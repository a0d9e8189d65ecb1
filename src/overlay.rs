//! Overlay images: embedded SVG graphics and user supplied pictures decoded
//! into BGRA rasters ready for drawing.

use crate::assets;
use crate::error::ImageError;
use crate::geometry::{ImageSize, OverlayKind};
use log::{info, warn};
use opencv::core::{self, Mat, Scalar, Vector};
use opencv::prelude::*;
use opencv::{imgcodecs, imgproc};
use resvg::{tiny_skia, usvg};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Decoded 8 bit BGRA image with straight (not premultiplied) alpha.
#[derive(Clone, PartialEq)]
pub struct OverlayImage {
    width: i32,
    height: i32,
    bgra: Vec<u8>,
}

impl std::fmt::Debug for OverlayImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl OverlayImage {
    pub fn from_bgra(width: i32, height: i32, bgra: Vec<u8>) -> Result<Self, ImageError> {
        if width <= 0 || height <= 0 || bgra.len() != width as usize * height as usize * 4 {
            return Err(ImageError::Undecodable);
        }
        Ok(Self {
            width,
            height,
            bgra,
        })
    }

    pub fn from_mat(mat: &Mat) -> Result<Self, ImageError> {
        if mat.typ() != core::CV_8UC4 {
            return Err(ImageError::UnsupportedLayout {
                channels: mat.channels(),
            });
        }
        let bgra = if mat.is_continuous() {
            mat.data_bytes()?.to_vec()
        } else {
            mat.try_clone()?.data_bytes()?.to_vec()
        };
        Self::from_bgra(mat.cols(), mat.rows(), bgra)
    }

    pub fn to_mat(&self) -> Result<Mat, opencv::Error> {
        let mut mat = Mat::new_rows_cols_with_default(
            self.height,
            self.width,
            core::CV_8UC4,
            Scalar::all(0.0),
        )?;
        mat.data_bytes_mut()?.copy_from_slice(&self.bgra);
        Ok(mat)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width as f32, self.height as f32)
    }
}

pub enum OverlaySource {
    Svg(&'static str),
    Encoded(Vec<u8>),
    File(PathBuf),
}

impl OverlaySource {
    pub fn load(&self) -> Result<OverlayImage, ImageError> {
        match self {
            OverlaySource::Svg(svg) => rasterize_svg(svg),
            OverlaySource::Encoded(bytes) => decode_image(bytes),
            OverlaySource::File(path) => {
                let bytes = fs::read(path).map_err(|source| ImageError::Read {
                    path: path.clone(),
                    source,
                })?;
                if is_svg(path) {
                    let text = String::from_utf8_lossy(&bytes);
                    rasterize_svg(&text)
                } else {
                    decode_image(&bytes)
                }
            }
        }
    }
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("svg"))
        .unwrap_or(false)
}

/// Render an SVG document at its natural size.
pub fn rasterize_svg(svg: &str) -> Result<OverlayImage, ImageError> {
    let tree = usvg::Tree::from_str(svg, &usvg::Options::default())
        .map_err(|e| ImageError::Svg(e.to_string()))?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        tiny_skia::Pixmap::new(size.width(), size.height()).ok_or(ImageError::EmptySvg)?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    let mut bgra = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        bgra.extend_from_slice(&[color.blue(), color.green(), color.red(), color.alpha()]);
    }
    OverlayImage::from_bgra(size.width() as i32, size.height() as i32, bgra)
}

/// Decode PNG, WebP or JPEG bytes.
pub fn decode_image(bytes: &[u8]) -> Result<OverlayImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Undecodable);
    }
    let buffer = Vector::<u8>::from_slice(bytes);
    let decoded = imgcodecs::imdecode(&buffer, imgcodecs::IMREAD_UNCHANGED)?;
    if decoded.empty() {
        return Err(ImageError::Undecodable);
    }

    // 16 bit pngs
    let mut eight_bit = Mat::default();
    let decoded = if decoded.depth() == core::CV_8U {
        decoded
    } else {
        decoded.convert_to(&mut eight_bit, core::CV_8U, 1.0 / 257.0, 0.0)?;
        eight_bit
    };

    let conversion = match decoded.channels() {
        1 => imgproc::COLOR_GRAY2BGRA,
        3 => imgproc::COLOR_BGR2BGRA,
        4 => return OverlayImage::from_mat(&decoded),
        channels => return Err(ImageError::UnsupportedLayout { channels }),
    };
    let mut bgra = Mat::default();
    imgproc::cvt_color(&decoded, &mut bgra, conversion, 0)?;
    OverlayImage::from_mat(&bgra)
}

/// The decoded image for every overlay kind that has one.
#[derive(Debug, Default, Clone)]
pub struct OverlayLibrary {
    images: HashMap<OverlayKind, Arc<OverlayImage>>,
}

impl OverlayLibrary {
    /// Decode the built in graphics. `logo` replaces the built in logo.
    pub fn load_defaults(logo: Option<&Path>) -> Self {
        let logo = match logo {
            Some(path) => OverlaySource::File(path.to_path_buf()),
            None => OverlaySource::Svg(assets::LOGO_SVG),
        };
        let mut library = Self::default();
        library.set(OverlayKind::Hat, &OverlaySource::Svg(assets::HAT_SVG));
        library.set(OverlayKind::Glasses, &OverlaySource::Svg(assets::GLASSES_SVG));
        library.set(OverlayKind::Mustache, &OverlaySource::Svg(assets::MUSTACHE_SVG));
        library.set(OverlayKind::Mask, &OverlaySource::Svg(assets::MASK_SVG));
        library.set(OverlayKind::Logo, &logo);
        library
    }

    pub fn image(&self, kind: OverlayKind) -> Option<Arc<OverlayImage>> {
        self.images.get(&kind).cloned()
    }

    /// Replace the custom image. On failure the custom kind has no image.
    pub fn set_custom(&mut self, source: &OverlaySource) -> bool {
        self.set(OverlayKind::Custom, source)
    }

    fn set(&mut self, kind: OverlayKind, source: &OverlaySource) -> bool {
        if kind == OverlayKind::None {
            return false;
        }
        match source.load() {
            Ok(image) => {
                info!("Loaded {} overlay ({}x{})", kind, image.width(), image.height());
                self.images.insert(kind, Arc::new(image));
                true
            }
            Err(e) => {
                warn!("Failed to load {} overlay: {}", kind, e);
                self.images.remove(&kind);
                false
            }
        }
    }
}
