//! Cover images as PDF image XObjects.
//!
//! JPEG data is embedded unchanged (`DCTDecode`). PNG and GIF covers are
//! decoded to 8-bit RGB samples; transparency goes into a separate
//! DeviceGray soft mask.

use ::image::{DynamicImage, GenericImageView};

use crate::book::{Cover, ImageKind};
use crate::error::{Error, Result};

use super::writer::{ObjectId, PdfWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Samples {
    /// JPEG file passed through `DCTDecode`.
    Dct,
    /// Uncompressed 8-bit samples.
    Raw,
}

/// An image ready to be written as an XObject stream.
#[derive(Debug, Clone)]
pub struct PdfImage {
    pub width: u32,
    pub height: u32,
    color_space: &'static str,
    samples: Samples,
    data: Vec<u8>,
    /// One alpha byte per pixel, absent when the image is opaque.
    alpha: Option<Vec<u8>>,
}

impl PdfImage {
    pub fn from_cover(cover: &Cover) -> Result<Self> {
        match cover.kind {
            ImageKind::Jpeg => Self::from_jpeg(&cover.data),
            ImageKind::Png | ImageKind::Gif => Self::decode(&cover.data),
        }
    }

    pub fn from_jpeg(data: &[u8]) -> Result<Self> {
        let (width, height, components) =
            jpeg_dimensions(data).ok_or_else(|| unsupported("JPEG frame header not found"))?;
        let color_space = match components {
            1 => "/DeviceGray",
            3 => "/DeviceRGB",
            4 => "/DeviceCMYK",
            n => return Err(unsupported(&format!("JPEG with {n} components"))),
        };
        Ok(Self {
            width,
            height,
            color_space,
            samples: Samples::Dct,
            data: data.to_vec(),
            alpha: None,
        })
    }

    /// Decode a PNG or GIF of any bit depth, interlacing or color type.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let decoded =
            ::image::load_from_memory(data).map_err(|e| unsupported(&e.to_string()))?;
        Ok(Self::from_pixels(decoded))
    }

    fn from_pixels(decoded: DynamicImage) -> Self {
        let (width, height) = decoded.dimensions();

        if !decoded.color().has_alpha() {
            return Self {
                width,
                height,
                color_space: "/DeviceRGB",
                samples: Samples::Raw,
                data: decoded.into_rgb8().into_raw(),
                alpha: None,
            };
        }

        let rgba = decoded.into_rgba8();
        let pixels = rgba.as_raw();
        let mut rgb = Vec::with_capacity(pixels.len() / 4 * 3);
        let mut alpha = Vec::with_capacity(pixels.len() / 4);
        for pixel in pixels.chunks_exact(4) {
            rgb.extend_from_slice(&pixel[..3]);
            alpha.push(pixel[3]);
        }
        let opaque = alpha.iter().all(|&a| a == u8::MAX);

        Self {
            width,
            height,
            color_space: "/DeviceRGB",
            samples: Samples::Raw,
            data: rgb,
            alpha: (!opaque).then_some(alpha),
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    /// Add the image (and its soft mask) to `pdf`.
    pub fn write(&self, pdf: &mut PdfWriter) -> Result<ObjectId> {
        match self.samples {
            Samples::Dct => {
                let dict = format!(
                    "{} /Filter /DCTDecode",
                    image_dict(self.width, self.height, self.color_space)
                );
                Ok(pdf.add_encoded_stream(&dict, &self.data))
            }
            Samples::Raw => {
                let mut dict = image_dict(self.width, self.height, self.color_space);
                if let Some(ref alpha) = self.alpha {
                    let mask = pdf.add_stream(
                        &image_dict(self.width, self.height, "/DeviceGray"),
                        alpha,
                    )?;
                    dict.push_str(&format!(" /SMask {}", mask));
                }
                pdf.add_stream(&dict, &self.data)
            }
        }
    }

    /// Scale to fit inside a box, keeping the aspect ratio.
    pub fn fit(&self, max_width: f32, max_height: f32) -> (f32, f32) {
        let (w, h) = (self.width.max(1) as f32, self.height.max(1) as f32);
        let scale = (max_width / w).min(max_height / h);
        (w * scale, h * scale)
    }
}

/// XObject dictionary entries shared by images and masks.
fn image_dict(width: u32, height: u32, color_space: &str) -> String {
    format!(
        "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8",
        width, height, color_space
    )
}

fn unsupported(reason: &str) -> Error {
    Error::InvalidInput(format!("unsupported cover image: {reason}"))
}

/// Width, height and component count from the first SOF marker.
fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32, u8)> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut i = 2;
    while i + 4 <= data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = data[i + 1];
        match marker {
            // Fill byte
            0xFF => {
                i += 1;
                continue;
            }
            // Markers without a length
            0x01 | 0xD0..=0xD9 => {
                i += 2;
                continue;
            }
            _ => {}
        }

        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            if data.len() < i + 10 {
                return None;
            }
            let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
            let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
            return Some((width, height, data[i + 9]));
        }
        i += 2 + length;
    }
    None
}
