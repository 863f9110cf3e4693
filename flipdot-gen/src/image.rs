//! Greyscale images and their conversion to dots
//!
//! Anything drawn with intensity (the gradient, loaded pictures) goes
//! through a [`GrayImage`] and is thresholded to dots at the very end, with
//! optional Floyd-Steinberg error diffusion.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::Path;

use clap::ValueEnum;
use flipdot_protocol::DotState;
use thiserror::Error;

/// Intensity at or above which a dot is on
const THRESHOLD: i16 = 128;

/// Image loading errors
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode PNG: {0}")]
    Decode(#[from] png::DecodingError),
    #[error("image has no pixels")]
    Empty,
}

/// How a picture is fitted onto the panel
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Scale {
    /// Resize to the panel, ignoring aspect ratio
    Stretch,
    /// Keep aspect ratio, cover the panel and cut the overhang
    #[default]
    Fill,
    /// Keep aspect ratio, show everything with black bars
    Fit,
    /// No resizing, centre cut-out
    Crop,
}

/// 8-bit greyscale raster, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    width: usize,
    height: usize,
    levels: Vec<u8>,
}

impl GrayImage {
    /// Image filled with a single level
    #[cfg(test)]
    pub fn filled(width: usize, height: usize, level: u8) -> Self {
        Self {
            width,
            height,
            levels: vec![level; width * height],
        }
    }

    /// Radial gradient, bright at `(cx, cy)` and black from `radius` outwards
    pub fn radial(width: usize, height: usize, cx: f64, cy: f64, radius: f64) -> Self {
        let mut levels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let distance = (x as f64 - cx).hypot(y as f64 - cy);
                let level = 255.0 * (1.0 - distance / radius.max(f64::EPSILON));
                levels.push(level.clamp(0.0, 255.0).round() as u8);
            }
        }
        Self {
            width,
            height,
            levels,
        }
    }

    /// Load a PNG file
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        let file = File::open(path).map_err(|source| ImageError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::decode_png(BufReader::new(file))
    }

    /// Decode a PNG stream of any colour type to luminance
    pub fn decode_png<R: BufRead + Seek>(reader: R) -> Result<Self, ImageError> {
        let mut decoder = png::Decoder::new(reader);
        // Palette and low bit depths expand to 8-bit, 16-bit is stripped
        decoder.set_transformations(png::Transformations::normalize_to_color8());
        let mut reader = decoder.read_info()?;

        let (color, _) = reader.output_color_type();
        let (width, height) = {
            let info = reader.info();
            (info.width as usize, info.height as usize)
        };
        if width == 0 || height == 0 {
            return Err(ImageError::Empty);
        }

        let channels = color.samples();
        let mut buffer = vec![0; width * height * channels];
        reader.next_frame(&mut buffer)?;

        let levels = buffer
            .chunks_exact(channels)
            .map(|px| match px {
                // ITU-R 601 luma; alpha is ignored
                [r, g, b, ..] => {
                    let luma = 299 * u32::from(*r) + 587 * u32::from(*g) + 114 * u32::from(*b);
                    (luma / 1000) as u8
                }
                [gray, ..] => *gray,
                [] => 0,
            })
            .collect();

        Ok(Self {
            width,
            height,
            levels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn level(&self, x: usize, y: usize) -> u8 {
        self.levels[y * self.width + x]
    }

    /// Fit the image onto a `width` x `height` panel
    pub fn scale(&self, mode: Scale, width: usize, height: usize) -> Self {
        let (sw, sh) = (self.width, self.height);
        match mode {
            Scale::Stretch => self.resize(width, height),
            Scale::Crop => self.crop_centered(width, height),
            Scale::Fill | Scale::Fit => {
                // Compare aspect ratios without floats: sw/sh < width/height
                let taller = sw * height < width * sh;
                let match_width = taller == (mode == Scale::Fill);
                let (nw, nh) = if match_width {
                    (width, (width * sh / sw).max(1))
                } else {
                    ((height * sw / sh).max(1), height)
                };
                self.resize(nw, nh).crop_centered(width, height)
            }
        }
    }

    /// Area-average resample
    fn resize(&self, width: usize, height: usize) -> Self {
        let mut levels = Vec::with_capacity(width * height);
        for y in 0..height {
            let rows = span(y, height, self.height);
            for x in 0..width {
                let columns = span(x, width, self.width);
                let mut sum = 0u32;
                let mut count = 0u32;
                for sy in rows.clone() {
                    for sx in columns.clone() {
                        sum += u32::from(self.level(sx, sy));
                        count += 1;
                    }
                }
                levels.push((sum / count.max(1)) as u8);
            }
        }
        Self {
            width,
            height,
            levels,
        }
    }

    /// Centre cut-out; area outside the source is black
    fn crop_centered(&self, width: usize, height: usize) -> Self {
        let left = (self.width as i64 - width as i64).div_euclid(2);
        let top = (self.height as i64 - height as i64).div_euclid(2);
        let mut levels = Vec::with_capacity(width * height);
        for y in 0..height as i64 {
            for x in 0..width as i64 {
                let (sx, sy) = (x + left, y + top);
                let inside =
                    (0..self.width as i64).contains(&sx) && (0..self.height as i64).contains(&sy);
                levels.push(if inside {
                    self.level(sx as usize, sy as usize)
                } else {
                    0
                });
            }
        }
        Self {
            width,
            height,
            levels,
        }
    }

    /// Threshold to dots, row-major
    ///
    /// With `dither` the quantisation error is diffused to the neighbours
    /// (Floyd-Steinberg), so mid tones come out as a dot pattern instead of
    /// solid areas.
    pub fn dots(&self, dither: bool) -> Vec<DotState> {
        let width = self.width;
        let mut error: Vec<i16> = self.levels.iter().map(|&l| i16::from(l)).collect();
        let mut dots = Vec::with_capacity(error.len());

        for y in 0..self.height {
            for x in 0..width {
                let i = y * width + x;
                let value = error[i];
                let on = value >= THRESHOLD;
                dots.push(DotState::from(on));
                if !dither {
                    continue;
                }

                let err = value - if on { 255 } else { 0 };
                if x + 1 < width {
                    error[i + 1] += err * 7 / 16;
                }
                if y + 1 < self.height {
                    if x > 0 {
                        error[i + width - 1] += err * 3 / 16;
                    }
                    error[i + width] += err * 5 / 16;
                    if x + 1 < width {
                        error[i + width + 1] += err / 16;
                    }
                }
            }
        }
        dots
    }
}

/// Source range covered by destination index `i`
fn span(i: usize, dst: usize, src: usize) -> std::ops::Range<usize> {
    let start = i * src / dst;
    let end = ((i + 1) * src / dst).max(start + 1).min(src);
    start..end
}
