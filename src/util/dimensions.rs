//! 2D grid dimensions and pixel addressing.

use std::fmt;

/// Width and height of every field taking part in a bake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Create 2D dimensions.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels.
    #[inline]
    pub const fn num_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check if the grid holds no pixel.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Row-major linear index of a pixel.
    #[inline]
    pub const fn index(&self, x: u32, y: u32) -> u32 {
        y * self.width + x
    }

    /// Pixel coordinates of a linear index.
    #[inline]
    pub const fn coords(&self, index: u32) -> (u32, u32) {
        (index % self.width, index / self.width)
    }

    /// Resolve possibly out-of-range coordinates.
    ///
    /// With `tile` the coordinates wrap around, otherwise `None` is returned
    /// for anything outside the grid.
    #[inline]
    pub fn resolve(&self, x: i32, y: i32, tile: bool) -> Option<(u32, u32)> {
        let (w, h) = (self.width as i32, self.height as i32);
        if tile {
            Some((x.rem_euclid(w) as u32, y.rem_euclid(h) as u32))
        } else if x < 0 || y < 0 || x >= w || y >= h {
            None
        } else {
            Some((x as u32, y as u32))
        }
    }

    /// Resolve coordinates, clamping to the border instead of rejecting them.
    #[inline]
    pub fn wrap_or_clamp(&self, x: i32, y: i32, tile: bool) -> (u32, u32) {
        if tile {
            (x.rem_euclid(self.width as i32) as u32, y.rem_euclid(self.height as i32) as u32)
        } else {
            (
                x.clamp(0, self.width as i32 - 1) as u32,
                y.clamp(0, self.height as i32 - 1) as u32,
            )
        }
    }

    /// Dimensions as a (w, h) tuple.
    #[inline]
    pub const fn as_tuple(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} x {}]", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_coords() {
        let d = Dimensions::new(640, 480);
        assert_eq!(d.num_pixels(), 640 * 480);
        assert_eq!(d.index(3, 2), 2 * 640 + 3);
        assert_eq!(d.coords(d.index(3, 2)), (3, 2));
        assert_eq!(format!("{}", d), "[640 x 480]");
    }

    #[test]
    fn test_resolve() {
        let d = Dimensions::new(4, 4);
        assert_eq!(d.resolve(-1, 0, true), Some((3, 0)));
        assert_eq!(d.resolve(4, 5, true), Some((0, 1)));
        assert_eq!(d.resolve(-1, 0, false), None);
        assert_eq!(d.resolve(3, 3, false), Some((3, 3)));
        assert_eq!(d.wrap_or_clamp(-2, 9, false), (0, 3));
    }

    #[test]
    fn test_from_tuple() {
        let d: Dimensions = (800, 600).into();
        assert_eq!(d.as_tuple(), (800, 600));
        assert!(!d.is_empty());
        assert!(Dimensions::new(0, 3).is_empty());
    }
}
