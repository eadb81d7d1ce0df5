//! Linear color gradients for the elapsed-time columns.

use crate::metrics::Elapsed;

/// Fresh threads.
pub const MINT_GREEN: Rgb = Rgb::new(102, 187, 106);
/// Stale threads.
pub const CORAL_RED: Rgb = Rgb::new(239, 83, 80);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `0xRRGGBB`, the form the xlsx writer takes.
    #[must_use]
    pub fn to_u32(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }
}

/// Interpolate between `start` and `end` by where `value` falls in `[min, max]`.
///
/// The ratio is clamped to `[0, 1]` and a degenerate range maps to `start`.
/// Channels are truncated, not rounded.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn interpolate_color(value: f64, min: f64, max: f64, start: Rgb, end: Rgb) -> Rgb {
    if max == min {
        return start;
    }
    let ratio = ((value - min) / (max - min)).clamp(0.0, 1.0);
    let channel = |s: u8, e: u8| (f64::from(s) + (f64::from(e) - f64::from(s)) * ratio) as u8;

    Rgb::new(
        channel(start.r, end.r),
        channel(start.g, end.g),
        channel(start.b, end.b),
    )
}

/// Two-stop scale fitted to the finite values of one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
    pub start: Rgb,
    pub end: Rgb,
}

impl ColorScale {
    /// Fit the scale to `values`, ignoring unparseable ones.
    ///
    /// Returns `None` when no value is finite, in which case nothing in the
    /// column gets a fill.
    pub fn fit<I>(values: I, start: Rgb, end: Rgb) -> Option<Self>
    where
        I: IntoIterator<Item = Elapsed>,
    {
        let mut range: Option<(f64, f64)> = None;
        for value in values.into_iter().filter_map(|v| v.finite()) {
            range = Some(match range {
                Some((lo, hi)) => (lo.min(value), hi.max(value)),
                None => (value, value),
            });
        }
        range.map(|(min, max)| Self {
            min,
            max,
            start,
            end,
        })
    }

    /// Fill color for one cell; unparseable values stay unstyled.
    #[must_use]
    pub fn color_for(&self, value: Elapsed) -> Option<Rgb> {
        value
            .finite()
            .map(|v| interpolate_color(v, self.min, self.max, self.start, self.end))
    }
}
