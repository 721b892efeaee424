use super::font::{text_width, LINE_ADVANCE, TEXT_SCALE};
use super::Surface;

const OVERLAY_PADDING: i32 = 6 * TEXT_SCALE;
const PANEL_INSET_X: i32 = 4 * TEXT_SCALE;
const PANEL_INSET_Y: i32 = 3 * TEXT_SCALE;
const TEXT_PRIMARY_COLOR: [u8; 4] = [244, 248, 252, 255];
const TEXT_DIM_COLOR: [u8; 4] = [176, 198, 220, 255];
const PANEL_BG_COLOR: [u8; 4] = [10, 12, 16, 210];
const PANEL_BORDER_COLOR: [u8; 4] = [92, 106, 126, 255];

/// Lines starting with a space are secondary detail and drawn dimmed.
fn line_color(line: &str) -> [u8; 4] {
    if line.starts_with(' ') {
        TEXT_DIM_COLOR
    } else {
        TEXT_PRIMARY_COLOR
    }
}

/// Draws a backed text panel in the top-left corner.
pub(crate) fn draw_overlay(surface: &mut Surface, lines: &[String]) {
    if lines.is_empty() || surface.width() == 0 || surface.height() == 0 {
        return;
    }

    let longest = lines.iter().map(|line| text_width(line)).max().unwrap_or(0);
    let panel_left = OVERLAY_PADDING - PANEL_INSET_X;
    let panel_top = OVERLAY_PADDING - PANEL_INSET_Y;
    let panel_width = longest + PANEL_INSET_X * 2;
    let panel_height = lines.len() as i32 * LINE_ADVANCE + PANEL_INSET_Y * 2;
    surface.fill_rect(panel_left, panel_top, panel_width, panel_height, PANEL_BG_COLOR);
    surface.draw_rect_outline(
        panel_left,
        panel_top,
        panel_width,
        panel_height,
        PANEL_BORDER_COLOR,
    );

    let mut y = OVERLAY_PADDING;
    for line in lines {
        surface.draw_text(OVERLAY_PADDING, y, line, line_color(line));
        y += LINE_ADVANCE;
    }
}
