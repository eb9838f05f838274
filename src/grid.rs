use std::ops::Range;

/// Row-major band of rows cut out of a full equirectangular raster.
/// Addressed with raster (global) coordinates. Columns wrap E-W; rows
/// outside the band are simply absent.
#[derive(Clone, Debug)]
pub struct RowBand<T> {
    pub data: Vec<T>,
    pub width: usize,
    pub rows: Range<usize>,
}

impl<T: Copy + Default> RowBand<T> {
    pub fn new(width: usize, rows: Range<usize>) -> Self {
        Self {
            data: vec![T::default(); width * rows.len()],
            width,
            rows,
        }
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && self.rows.contains(&y));
        (y - self.rows.start) * self.width + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: T) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    /// 8-connected neighbours of (x, y) held by this band, with E-W wrapping.
    pub fn neighbors8(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> {
        const OFFSETS: [(i32, i32); 8] = [
            (-1, -1), (0, -1), (1, -1),
            (-1, 0),           (1, 0),
            (-1, 1),  (0, 1),  (1, 1),
        ];
        let mut out = [(0usize, 0usize); 8];
        let mut n = 0;
        for (dx, dy) in OFFSETS {
            if let Some(pos) = self.wrap(x as i32 + dx, y as i32 + dy) {
                out[n] = pos;
                n += 1;
            }
        }
        out.into_iter().take(n)
    }

    /// Wrap x around the seam; None when y falls outside the band.
    #[inline]
    fn wrap(&self, x: i32, y: i32) -> Option<(usize, usize)> {
        if y < self.rows.start as i32 || y >= self.rows.end as i32 {
            return None;
        }
        let w = self.width as i32;
        Some((x.rem_euclid(w) as usize, y as usize))
    }
}

/// `rows` grown by one row on each side, clipped to the raster.
pub fn with_halo(rows: &Range<usize>, raster_height: usize) -> Range<usize> {
    rows.start.saturating_sub(1)..(rows.end + 1).min(raster_height)
}
