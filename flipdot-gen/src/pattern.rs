//! Test patterns

use clap::ValueEnum;
use flipdot_protocol::{DotState, PixelCommand};

use crate::image::{GrayImage, Scale};

/// Ratio between the gradient's horizontal and vertical sweep speeds
const GRADIENT_DRIFT: f64 = 2.3245;

/// Pattern to draw
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Pattern {
    /// Every dot on
    Fill,
    /// Every dot off
    Clear,
    /// Alternating rows, starting with an off row
    Rows,
    /// Alternating columns, starting with an off column
    Columns,
    /// Checkerboard, top-left dot off
    Checker,
    /// Random dots
    #[default]
    Random,
    /// Dithered radial gradient drifting across the panel over time
    Gradient,
}

/// Xorshift64 generator; plenty for test noise
#[derive(Debug, Clone)]
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        // splitmix64 step so small and zero seeds still give a good state
        let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        Self(if z == 0 { 1 } else { z })
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn next_bool(&mut self) -> bool {
        self.next_u64() >> 63 == 1
    }
}

/// One full frame of dot states, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u8,
    height: u8,
    dots: Vec<DotState>,
}

impl Frame {
    /// Draw `pattern` on a `width` x `height` panel
    ///
    /// `phase` is the animation time in seconds; only the gradient moves.
    pub fn draw(pattern: Pattern, width: u8, height: u8, rng: &mut XorShift, phase: f64) -> Self {
        let count = usize::from(width) * usize::from(height);
        let dots = match pattern {
            Pattern::Gradient => gradient(width, height, phase).dots(true),
            Pattern::Random => (0..count).map(|_| DotState::from(rng.next_bool())).collect(),
            Pattern::Fill => vec![DotState::On; count],
            Pattern::Clear => vec![DotState::Off; count],
            Pattern::Rows => raster(width, height, |_, row| row % 2 == 1),
            Pattern::Columns => raster(width, height, |column, _| column % 2 == 1),
            Pattern::Checker => raster(width, height, |column, row| (row + column) % 2 == 1),
        };

        Self {
            width,
            height,
            dots,
        }
    }

    /// Fit a picture onto a `width` x `height` panel
    pub fn from_image(image: &GrayImage, scale: Scale, width: u8, height: u8, dither: bool) -> Self {
        let fitted = image.scale(scale, usize::from(width), usize::from(height));
        Self {
            width,
            height,
            dots: fitted.dots(dither),
        }
    }

    /// Swap on and off dots
    pub fn invert(&mut self) {
        for dot in &mut self.dots {
            *dot = dot.toggled();
        }
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    #[cfg(test)]
    pub fn get(&self, column: u8, row: u8) -> Option<DotState> {
        if column >= self.width || row >= self.height {
            return None;
        }
        self.dots
            .get(usize::from(row) * usize::from(self.width) + usize::from(column))
            .copied()
    }

    /// Commands for every dot in raster order
    pub fn commands(&self) -> impl Iterator<Item = PixelCommand> + '_ {
        let width = self.width;
        self.dots.iter().enumerate().map(move |(i, &state)| {
            let column = (i % usize::from(width)) as u8;
            let row = (i / usize::from(width)) as u8;
            PixelCommand::new(column, row, state)
        })
    }

    /// Text preview, one line per row
    pub fn preview(&self) -> String {
        let mut out = String::with_capacity(self.dots.len() * 3 + usize::from(self.height));
        for line in self.dots.chunks(usize::from(self.width)) {
            out.extend(line.iter().map(|dot| if dot.is_on() { '█' } else { ' ' }));
            out.push('\n');
        }
        out
    }
}

fn raster(width: u8, height: u8, on: impl Fn(u8, u8) -> bool) -> Vec<DotState> {
    (0..height)
        .flat_map(|row| (0..width).map(move |column| (column, row)))
        .map(|(column, row)| DotState::from(on(column, row)))
        .collect()
}

/// Gradient blob at animation time `phase`
///
/// The centre follows a slow Lissajous path over the panel, starting at the
/// middle of the bottom edge.
fn gradient(width: u8, height: u8, phase: f64) -> GrayImage {
    let (w, h) = (f64::from(width), f64::from(height));
    let cx = w / 2.0 * (1.0 + phase.sin());
    let cy = h / 2.0 * (1.0 + (phase / GRADIENT_DRIFT).cos());
    GrayImage::radial(usize::from(width), usize::from(height), cx, cy, w.max(h) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn draw(pattern: Pattern, width: u8, height: u8) -> Frame {
        Frame::draw(pattern, width, height, &mut XorShift::new(7), 0.0)
    }

    #[test]
    fn test_fill_and_clear() {
        assert!(draw(Pattern::Fill, 4, 2).commands().all(|c| c.state == DotState::On));
        assert!(draw(Pattern::Clear, 4, 2).commands().all(|c| c.state == DotState::Off));
    }

    #[test]
    fn test_rows_and_columns_alternate() {
        let rows = draw(Pattern::Rows, 3, 4);
        assert_eq!(rows.get(2, 0), Some(DotState::Off));
        assert_eq!(rows.get(2, 1), Some(DotState::On));

        let columns = draw(Pattern::Columns, 3, 4);
        assert_eq!(columns.get(0, 3), Some(DotState::Off));
        assert_eq!(columns.get(1, 3), Some(DotState::On));
    }

    #[test]
    fn test_checker_preview() {
        let frame = draw(Pattern::Checker, 4, 2);
        assert_eq!(frame.preview(), " █ █\n█ █ \n");
    }

    #[test]
    fn test_commands_in_raster_order() {
        let positions: Vec<_> = draw(Pattern::Fill, 3, 2)
            .commands()
            .map(|c| (c.column, c.row))
            .collect();
        assert_eq!(positions, [(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
    }

    #[test]
    fn test_random_is_seeded() {
        let a = Frame::draw(Pattern::Random, 112, 16, &mut XorShift::new(42), 0.0);
        let b = Frame::draw(Pattern::Random, 112, 16, &mut XorShift::new(42), 0.0);
        let c = Frame::draw(Pattern::Random, 112, 16, &mut XorShift::new(43), 0.0);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let on = a.commands().filter(|c| c.state.is_on()).count();
        assert!((600..1200).contains(&on), "suspicious distribution: {on}");
    }

    #[test]
    fn test_out_of_frame_lookup() {
        let frame = draw(Pattern::Fill, 4, 2);
        assert_eq!(frame.get(4, 0), None);
        assert_eq!(frame.get(0, 2), None);
    }

    #[test]
    fn test_gradient_starts_bottom_centre() {
        let frame = draw(Pattern::Gradient, 112, 16);
        assert_eq!(frame.get(56, 15), Some(DotState::On));
        assert_eq!(frame.get(0, 0), Some(DotState::Off));
        assert_eq!(frame.get(111, 0), Some(DotState::Off));
    }

    #[test]
    fn test_gradient_moves_with_phase() {
        let mut rng = XorShift::new(1);
        let start = Frame::draw(Pattern::Gradient, 112, 16, &mut rng, 0.0);
        let later = Frame::draw(Pattern::Gradient, 112, 16, &mut rng, 1.5);
        let again = Frame::draw(Pattern::Gradient, 112, 16, &mut rng, 0.0);
        assert_ne!(start, later);
        assert_eq!(start, again);

        // sin(1.5) is close to 1, so the blob sits near the right edge
        assert_eq!(later.get(0, 8), Some(DotState::Off));
        assert!(later.commands().filter(|c| c.column >= 100).any(|c| c.state.is_on()));
    }

    #[test]
    fn test_static_patterns_ignore_phase() {
        for pattern in [Pattern::Fill, Pattern::Rows, Pattern::Checker] {
            let a = Frame::draw(pattern, 8, 4, &mut XorShift::new(3), 0.0);
            let b = Frame::draw(pattern, 8, 4, &mut XorShift::new(3), 12.0);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_invert() {
        let mut frame = draw(Pattern::Checker, 4, 2);
        frame.invert();
        assert_eq!(frame.preview(), "█ █ \n █ █\n");
    }

    #[test]
    fn test_image_frame_fills_panel() {
        let image = GrayImage::filled(40, 10, 255);
        let frame = Frame::from_image(&image, Scale::Fit, 8, 4, true);
        assert_eq!(frame.commands().count(), 32);
        // 4:1 picture on a 2:1 panel: full width, two black rows
        assert_eq!(frame.get(0, 0), Some(DotState::Off));
        assert_eq!(frame.get(0, 1), Some(DotState::On));
        assert_eq!(frame.get(7, 2), Some(DotState::On));
        assert_eq!(frame.get(7, 3), Some(DotState::Off));
    }

    proptest! {
        #[test]
        fn test_one_command_per_dot(width in 1u8..=128, height in 1u8..=16, seed: u64) {
            let frame = Frame::draw(Pattern::Random, width, height, &mut XorShift::new(seed), 0.0);
            let commands: Vec<_> = frame.commands().collect();
            prop_assert_eq!(commands.len(), usize::from(width) * usize::from(height));
            for command in commands {
                prop_assert!(command.column < width && command.row < height);
                prop_assert_eq!(frame.get(command.column, command.row), Some(command.state));
            }
        }
    }
}
