use crate::cell::{push_u16, Cell};
use crate::frame::ChangeSet;

/// Upper half block: the foreground paints the top source pixel, the
/// background the bottom one.
pub const HALF_BLOCK: &str = "▀";

/// Serialize a change set into the escape stream that repaints exactly
/// those cells, writing into `buf` (cleared first).
///
/// The change set is sorted by color pair first and position second, so
/// runs of identically colored cells emit their color escapes once. A
/// position escape still appears wherever the sorted order breaks same-row
/// adjacency.
///
/// The encoder starts cold: the first cell always sets position and both
/// colors. A non-empty update ends with a trailer that resets attributes
/// and parks the cursor on the line below the frame. An empty change set
/// produces no bytes at all.
pub fn encode_update(changes: &mut ChangeSet, frame_height: u16, buf: &mut Vec<u8>) {
    buf.clear();
    if changes.is_empty() {
        return;
    }

    changes.sort_unstable_by_key(Cell::sort_key);

    let mut prev: Option<Cell> = None;
    for cell in changes.iter() {
        // Contiguous same-row runs ride the terminal's natural cursor
        // advance; anything else repositions. Adjacency is judged in
        // sorted order, not screen order.
        let adjacent = prev.is_some_and(|p| p.y == cell.y && p.x + 1 == cell.x);
        if !adjacent {
            cell.write_position(buf);
        }
        if prev.is_none_or(|p| p.bottom != cell.bottom) {
            cell.write_bg(buf);
        }
        if prev.is_none_or(|p| p.top != cell.top) {
            cell.write_fg(buf);
        }
        buf.extend_from_slice(HALF_BLOCK.as_bytes());
        prev = Some(*cell);
    }

    write_trailer(buf, frame_height);
}

/// Reset attributes and park the cursor below the rendered region so
/// diagnostic text prints cleanly.
fn write_trailer(buf: &mut Vec<u8>, frame_height: u16) {
    buf.extend_from_slice(b"\x1b[0m\x1b[");
    push_u16(buf, frame_height + 1);
    buf.extend_from_slice(b";1H");
}
