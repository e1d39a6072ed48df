pub mod cell;
pub mod encode;
pub mod frame;
pub mod timing;

#[cfg(test)]
mod tests {
    use crate::cell::Rgb;
    use crate::encode::{encode_update, HALF_BLOCK};
    use crate::frame::Frame;

    /// Minimal terminal model: just enough ANSI to replay an encoded
    /// update and observe the resulting cell colors.
    struct VirtualTerminal {
        width: u16,
        cursor_x: u16,
        cursor_y: u16,
        fg: Rgb,
        bg: Rgb,
        grid: Vec<(Rgb, Rgb)>,
    }

    impl VirtualTerminal {
        fn from_frame(frame: &Frame) -> Self {
            Self {
                width: frame.width(),
                cursor_x: 0,
                cursor_y: 0,
                fg: Rgb::default(),
                bg: Rgb::default(),
                grid: frame.cells().iter().map(|c| (c.top, c.bottom)).collect(),
            }
        }

        fn apply(&mut self, bytes: &[u8]) {
            let mut i = 0;
            while i < bytes.len() {
                if bytes[i] == 0x1b {
                    assert_eq!(bytes[i + 1], b'[', "unknown escape introducer");
                    let mut j = i + 2;
                    while !bytes[j].is_ascii_alphabetic() {
                        j += 1;
                    }
                    let params: Vec<u16> = std::str::from_utf8(&bytes[i + 2..j])
                        .unwrap()
                        .split(';')
                        .map(|p| p.parse().unwrap())
                        .collect();
                    match bytes[j] {
                        b'H' => {
                            self.cursor_y = params[0] - 1;
                            self.cursor_x = params[1] - 1;
                        }
                        b'm' => match params[0] {
                            0 => {
                                self.fg = Rgb::default();
                                self.bg = Rgb::default();
                            }
                            38 => {
                                self.fg =
                                    Rgb::new(params[2] as u8, params[3] as u8, params[4] as u8)
                            }
                            48 => {
                                self.bg =
                                    Rgb::new(params[2] as u8, params[3] as u8, params[4] as u8)
                            }
                            other => panic!("unexpected SGR parameter {other}"),
                        },
                        other => panic!("unexpected final byte {}", other as char),
                    }
                    i = j + 1;
                } else {
                    assert_eq!(
                        &bytes[i..i + HALF_BLOCK.len()],
                        HALF_BLOCK.as_bytes(),
                        "only the half-block glyph may be printed"
                    );
                    let idx =
                        usize::from(self.cursor_y) * usize::from(self.width) + usize::from(self.cursor_x);
                    self.grid[idx] = (self.fg, self.bg);
                    self.cursor_x += 1;
                    i += HALF_BLOCK.len();
                }
            }
        }
    }

    fn gradient_pixels(width: u16, height: u16, salt: u8) -> Vec<u8> {
        let mut rgb = Vec::new();
        for py in 0..u32::from(height) * 2 {
            for px in 0..u32::from(width) {
                rgb.push((px * 7 + py) as u8 ^ salt);
                rgb.push((px + py * 11) as u8);
                rgb.push((px * 3 ^ py * 5) as u8);
            }
        }
        rgb
    }

    #[test]
    fn encoded_update_replays_to_exactly_the_new_frame() {
        let width = 32u16;
        let height = 12u16;

        let prev = Frame::from_rgb(&gradient_pixels(width, height, 0), width, height);

        // Perturb a diagonal band of source pixels.
        let mut raw = gradient_pixels(width, height, 0);
        for y in 0..usize::from(height) * 2 {
            let x = (y * 3) % usize::from(width);
            let off = (y * usize::from(width) + x) * 3;
            raw[off] ^= 0x80;
        }
        let current = Frame::from_rgb(&raw, width, height);

        let mut changes = current.diff_against(&prev);
        let changed = changes.len();
        assert!(changed > 0 && changed < usize::from(width) * usize::from(height));

        let mut buf = Vec::new();
        encode_update(&mut changes, height, &mut buf);

        let mut term = VirtualTerminal::from_frame(&prev);
        term.apply(&buf);

        // Changed coordinates now show the new colors; unchanged ones were
        // never touched, so the whole grid must equal the new frame.
        for (i, cell) in current.cells().iter().enumerate() {
            assert_eq!(term.grid[i], (cell.top, cell.bottom), "cell index {i}");
        }

        // Replay ends parked below the frame with default colors.
        assert_eq!((term.cursor_y, term.cursor_x), (height, 0));
        assert_eq!(term.fg, Rgb::default());
        assert_eq!(term.bg, Rgb::default());
    }

    #[test]
    fn identical_frames_write_nothing() {
        let frame = Frame::from_rgb(&gradient_pixels(16, 8, 3), 16, 8);
        let mut changes = frame.diff_against(&frame);
        let mut buf = vec![0xAAu8; 4];
        encode_update(&mut changes, 8, &mut buf);
        assert!(buf.is_empty());
    }

    #[test]
    fn resize_boundary_replays_as_full_repaint() {
        let prev = Frame::from_rgb(&gradient_pixels(20, 10, 0), 20, 10);
        let current = Frame::from_rgb(&gradient_pixels(24, 9, 0), 24, 9);

        let mut changes = current.diff_against(&prev);
        assert_eq!(changes.len(), 24 * 9);

        let mut buf = Vec::new();
        encode_update(&mut changes, current.height(), &mut buf);

        // Replaying onto a blank terminal of the new size reproduces the
        // frame: nothing incremental survives the boundary.
        let mut term = VirtualTerminal::from_frame(&Frame::new(24, 9));
        term.apply(&buf);
        for (i, cell) in current.cells().iter().enumerate() {
            assert_eq!(term.grid[i], (cell.top, cell.bottom), "cell index {i}");
        }
    }
}
