pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;
pub const PIXEL_COUNT: usize = WIDTH * HEIGHT;

/// Bytes used by one packed row of pixels.
pub const ROW_BYTES: usize = WIDTH / 8;

/// Framing byte that marks a display update.
pub const DISPLAY_FRAME_MARKER: u8 = 0x01;

/// Length of a display frame, including the framing byte.
pub const DISPLAY_FRAME_LEN: usize = 1 + ROW_BYTES * HEIGHT;

/// Handles the monochrome graphics state of the `Chip8`.
///
/// Besides the pixel grid this keeps a packed copy of the screen, ready to be
/// shipped to a renderer. The packed copy is only rebuilt when the grid has
/// changed since it was last requested.
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone)]
pub struct FrameBuffer {
    #[cfg_attr(feature = "persistence", serde(with = "serde_big_array::BigArray"))]
    vram: [bool; PIXEL_COUNT],
    #[cfg_attr(feature = "persistence", serde(with = "serde_big_array::BigArray"))]
    packed: [u8; DISPLAY_FRAME_LEN],
    dirty: bool,
    #[cfg_attr(feature = "persistence", serde(skip))]
    pack_count: u64,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        let mut packed = [0; DISPLAY_FRAME_LEN];
        packed[0] = DISPLAY_FRAME_MARKER;
        Self {
            vram: [false; PIXEL_COUNT],
            packed,
            dirty: true,
            pack_count: 0,
        }
    }
}

impl FrameBuffer {
    /// Create a new empty `FrameBuffer`.
    pub fn new() -> Self {
        Self::default()
    }

    /// XORs a byte of sprite data onto the screen at the given coordinates.
    /// Pixels that fall off an edge wrap around to the opposite one.
    ///
    /// Returns whether any lit pixel was switched off.
    pub fn draw_byte(&mut self, x: usize, y: usize, data: u8) -> bool {
        let row = (y % HEIGHT) * WIDTH;

        let mut collision = false;
        for b in 0..8 {
            if data & (0x80 >> b) == 0 {
                continue;
            }
            let pos = row + (x + b) % WIDTH;
            collision |= self.vram[pos];
            self.vram[pos] = !self.vram[pos];
        }
        self.dirty = true;
        collision
    }

    /// Draws a sprite one byte per row, starting at the given coordinates.
    /// The screen is marked as changed even when the sprite has no rows.
    ///
    /// Returns whether any lit pixel was switched off.
    pub fn draw_sprite(&mut self, x: usize, y: usize, rows: impl IntoIterator<Item = u8>) -> bool {
        self.dirty = true;
        rows.into_iter()
            .enumerate()
            .fold(false, |collision, (row, data)| {
                self.draw_byte(x, y + row, data) | collision
            })
    }

    /// Turn every pixel off.
    #[inline]
    pub fn clear(&mut self) {
        self.vram = [false; PIXEL_COUNT];
        self.dirty = true;
    }

    /// Returns whether the pixel at the given coordinates is lit.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.vram[(y % HEIGHT) * WIDTH + x % WIDTH]
    }

    /// Returns whether the grid changed since the last call to `display_frame`.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The display frame: the framing byte followed by `HEIGHT` rows of
    /// `ROW_BYTES` bytes, with the most significant bit being the leftmost pixel.
    pub fn display_frame(&mut self) -> &[u8; DISPLAY_FRAME_LEN] {
        if self.dirty {
            self.repack();
            self.dirty = false;
        }
        &self.packed
    }

    /// How many times the display frame has been rebuilt from the grid.
    pub fn pack_count(&self) -> u64 {
        self.pack_count
    }

    fn repack(&mut self) {
        for (byte, pixels) in self.packed[1..].iter_mut().zip(self.vram.chunks_exact(8)) {
            *byte = pixels
                .iter()
                .fold(0, |acc, &lit| (acc << 1) | u8::from(lit));
        }
        self.pack_count += 1;
    }
}
