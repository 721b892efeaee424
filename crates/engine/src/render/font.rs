//! 3x5 bitmap font for debug text, covering printable ASCII.

use super::surface::write_pixel;

pub(crate) const GLYPH_WIDTH: i32 = 3;
pub(crate) const GLYPH_HEIGHT: i32 = 5;
pub(crate) const TEXT_SCALE: i32 = 2;
pub(crate) const GLYPH_ADVANCE: i32 = (GLYPH_WIDTH + 1) * TEXT_SCALE;
pub(crate) const LINE_ADVANCE: i32 = (GLYPH_HEIGHT + 2) * TEXT_SCALE;

type Glyph = [u8; GLYPH_HEIGHT as usize];

const BLANK: Glyph = [0; GLYPH_HEIGHT as usize];

// Indexed by `ch - ' '`.
const GLYPHS: [Glyph; 95] = [
    [0b000, 0b000, 0b000, 0b000, 0b000], // ' '
    [0b010, 0b010, 0b010, 0b000, 0b010], // '!'
    [0b101, 0b101, 0b000, 0b000, 0b000], // '"'
    [0b101, 0b111, 0b101, 0b111, 0b101], // '#'
    [0b111, 0b110, 0b111, 0b011, 0b111], // '$'
    [0b101, 0b001, 0b010, 0b100, 0b101], // '%'
    [0b010, 0b101, 0b010, 0b101, 0b011], // '&'
    [0b010, 0b010, 0b000, 0b000, 0b000], // "'"
    [0b001, 0b010, 0b010, 0b010, 0b001], // '('
    [0b100, 0b010, 0b010, 0b010, 0b100], // ')'
    [0b000, 0b101, 0b010, 0b101, 0b000], // '*'
    [0b000, 0b010, 0b111, 0b010, 0b000], // '+'
    [0b000, 0b000, 0b000, 0b010, 0b100], // ','
    [0b000, 0b000, 0b111, 0b000, 0b000], // '-'
    [0b000, 0b000, 0b000, 0b000, 0b010], // '.'
    [0b001, 0b001, 0b010, 0b100, 0b100], // '/'
    [0b111, 0b101, 0b101, 0b101, 0b111], // '0'
    [0b010, 0b110, 0b010, 0b010, 0b111], // '1'
    [0b111, 0b001, 0b111, 0b100, 0b111], // '2'
    [0b111, 0b001, 0b111, 0b001, 0b111], // '3'
    [0b101, 0b101, 0b111, 0b001, 0b001], // '4'
    [0b111, 0b100, 0b111, 0b001, 0b111], // '5'
    [0b111, 0b100, 0b111, 0b101, 0b111], // '6'
    [0b111, 0b001, 0b010, 0b010, 0b010], // '7'
    [0b111, 0b101, 0b111, 0b101, 0b111], // '8'
    [0b111, 0b101, 0b111, 0b001, 0b111], // '9'
    [0b000, 0b010, 0b000, 0b010, 0b000], // ':'
    [0b000, 0b010, 0b000, 0b010, 0b100], // ';'
    [0b001, 0b010, 0b100, 0b010, 0b001], // '<'
    [0b000, 0b111, 0b000, 0b111, 0b000], // '='
    [0b100, 0b010, 0b001, 0b010, 0b100], // '>'
    [0b111, 0b001, 0b011, 0b000, 0b010], // '?'
    [0b111, 0b101, 0b111, 0b100, 0b111], // '@'
    [0b010, 0b101, 0b111, 0b101, 0b101], // 'A'
    [0b110, 0b101, 0b110, 0b101, 0b110], // 'B'
    [0b111, 0b100, 0b100, 0b100, 0b111], // 'C'
    [0b110, 0b101, 0b101, 0b101, 0b110], // 'D'
    [0b111, 0b100, 0b110, 0b100, 0b111], // 'E'
    [0b111, 0b100, 0b110, 0b100, 0b100], // 'F'
    [0b111, 0b100, 0b101, 0b101, 0b111], // 'G'
    [0b101, 0b101, 0b111, 0b101, 0b101], // 'H'
    [0b111, 0b010, 0b010, 0b010, 0b111], // 'I'
    [0b111, 0b001, 0b001, 0b101, 0b111], // 'J'
    [0b101, 0b101, 0b110, 0b101, 0b101], // 'K'
    [0b100, 0b100, 0b100, 0b100, 0b111], // 'L'
    [0b101, 0b111, 0b111, 0b101, 0b101], // 'M'
    [0b101, 0b111, 0b111, 0b111, 0b101], // 'N'
    [0b111, 0b101, 0b101, 0b101, 0b111], // 'O'
    [0b110, 0b101, 0b110, 0b100, 0b100], // 'P'
    [0b111, 0b101, 0b101, 0b111, 0b001], // 'Q'
    [0b110, 0b101, 0b110, 0b101, 0b101], // 'R'
    [0b111, 0b100, 0b111, 0b001, 0b111], // 'S'
    [0b111, 0b010, 0b010, 0b010, 0b010], // 'T'
    [0b101, 0b101, 0b101, 0b101, 0b111], // 'U'
    [0b101, 0b101, 0b101, 0b101, 0b010], // 'V'
    [0b101, 0b101, 0b111, 0b111, 0b101], // 'W'
    [0b101, 0b101, 0b010, 0b101, 0b101], // 'X'
    [0b101, 0b101, 0b010, 0b010, 0b010], // 'Y'
    [0b111, 0b001, 0b010, 0b100, 0b111], // 'Z'
    [0b110, 0b100, 0b100, 0b100, 0b110], // '['
    [0b100, 0b100, 0b010, 0b001, 0b001], // '\\'
    [0b011, 0b001, 0b001, 0b001, 0b011], // ']'
    [0b010, 0b101, 0b000, 0b000, 0b000], // '^'
    [0b000, 0b000, 0b000, 0b000, 0b111], // '_'
    [0b100, 0b010, 0b000, 0b000, 0b000], // '`'
    [0b000, 0b111, 0b001, 0b111, 0b111], // 'a'
    [0b100, 0b100, 0b110, 0b101, 0b110], // 'b'
    [0b000, 0b111, 0b100, 0b100, 0b111], // 'c'
    [0b001, 0b001, 0b111, 0b101, 0b111], // 'd'
    [0b000, 0b111, 0b110, 0b100, 0b111], // 'e'
    [0b011, 0b100, 0b110, 0b100, 0b100], // 'f'
    [0b000, 0b111, 0b101, 0b111, 0b001], // 'g'
    [0b100, 0b100, 0b110, 0b101, 0b101], // 'h'
    [0b010, 0b000, 0b010, 0b010, 0b010], // 'i'
    [0b001, 0b000, 0b001, 0b101, 0b010], // 'j'
    [0b100, 0b101, 0b110, 0b101, 0b101], // 'k'
    [0b100, 0b100, 0b100, 0b100, 0b111], // 'l'
    [0b000, 0b110, 0b111, 0b101, 0b101], // 'm'
    [0b000, 0b110, 0b101, 0b101, 0b101], // 'n'
    [0b000, 0b111, 0b101, 0b101, 0b111], // 'o'
    [0b000, 0b110, 0b101, 0b110, 0b100], // 'p'
    [0b000, 0b111, 0b101, 0b111, 0b001], // 'q'
    [0b000, 0b110, 0b101, 0b100, 0b100], // 'r'
    [0b000, 0b111, 0b110, 0b001, 0b111], // 's'
    [0b010, 0b111, 0b010, 0b010, 0b011], // 't'
    [0b000, 0b101, 0b101, 0b101, 0b111], // 'u'
    [0b000, 0b101, 0b101, 0b101, 0b010], // 'v'
    [0b000, 0b101, 0b101, 0b111, 0b010], // 'w'
    [0b000, 0b101, 0b010, 0b010, 0b101], // 'x'
    [0b000, 0b101, 0b101, 0b111, 0b001], // 'y'
    [0b000, 0b111, 0b001, 0b010, 0b111], // 'z'
    [0b011, 0b010, 0b110, 0b010, 0b011], // '{'
    [0b010, 0b010, 0b010, 0b010, 0b010], // '|'
    [0b110, 0b010, 0b011, 0b010, 0b110], // '}'
    [0b000, 0b011, 0b110, 0b000, 0b000], // '~'
];

fn glyph_for(ch: char) -> Glyph {
    match ch {
        ' '..='~' => GLYPHS[(ch as u8 - b' ') as usize],
        _ => BLANK,
    }
}

pub(crate) fn text_width(text: &str) -> i32 {
    text.chars().count() as i32 * GLYPH_ADVANCE
}

/// Draws `text` into an RGBA8 buffer, clipping at the edges.
pub(crate) fn draw_text(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    (mut x, y): (i32, i32),
    text: &str,
    color: [u8; 4],
) {
    for ch in text.chars() {
        draw_glyph(pixels, width, height, x, y, glyph_for(ch), color);
        x += GLYPH_ADVANCE;
    }
}

fn draw_glyph(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    glyph: Glyph,
    color: [u8; 4],
) {
    let (width_i32, height_i32) = (width as i32, height as i32);
    for (row_index, row_bits) in glyph.iter().enumerate() {
        let glyph_y = y + row_index as i32 * TEXT_SCALE;
        for col in 0..GLYPH_WIDTH {
            if (row_bits & (1 << (GLYPH_WIDTH - 1 - col))) == 0 {
                continue;
            }
            let glyph_x = x + col * TEXT_SCALE;
            for sy in 0..TEXT_SCALE {
                let py = glyph_y + sy;
                if py < 0 || py >= height_i32 {
                    continue;
                }
                for sx in 0..TEXT_SCALE {
                    let px = glyph_x + sx;
                    if px < 0 || px >= width_i32 {
                        continue;
                    }
                    write_pixel(pixels, width as usize, px as usize, py as usize, color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_printable_ascii() {
        assert_eq!(glyph_for(' '), BLANK);
        assert_ne!(glyph_for('0'), BLANK);
        assert_ne!(glyph_for('~'), BLANK);
        assert_eq!(glyph_for('é'), BLANK);
    }

    #[test]
    fn clipped_text_never_writes_out_of_bounds() {
        let mut pixels = vec![0u8; 4 * 4 * 4];
        draw_text(&mut pixels, 4, 4, (-3, -3), "HELLO", [255; 4]);
        draw_text(&mut pixels, 4, 4, (2, 2), "W", [255; 4]);
        assert!(pixels.iter().any(|b| *b == 255));
    }

    #[test]
    fn width_follows_advance() {
        assert_eq!(text_width("abc"), 3 * GLYPH_ADVANCE);
    }
}
