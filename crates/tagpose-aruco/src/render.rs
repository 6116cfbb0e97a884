//! Marker rasterization, for printing and for synthetic test frames.

use tagpose_core::GrayImage;

use crate::dictionary::Dictionary;

/// Render marker `id` with a one-cell black border and `margin_cells` of
/// white quiet zone on every side. Each cell is `cell_px` pixels.
///
/// `None` when the id is outside the dictionary.
pub fn render_marker(
    dict: &Dictionary,
    id: u32,
    cell_px: usize,
    margin_cells: usize,
) -> Option<GrayImage> {
    let code = *dict.codes.get(id as usize)?;
    let bits = dict.marker_size;
    let cells = bits + 2; // one border cell each side
    let total = cells + 2 * margin_cells;
    let side = total * cell_px;
    let mut img = GrayImage::new(side, side, 255);

    for cy in 0..cells {
        for cx in 0..cells {
            let is_border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
            let is_black = if is_border {
                true
            } else {
                let idx = (cy - 1) * bits + (cx - 1);
                (code >> idx) & 1 == 1
            };
            if !is_black {
                continue;
            }
            let x0 = (margin_cells + cx) * cell_px;
            let y0 = (margin_cells + cy) * cell_px;
            for y in y0..y0 + cell_px {
                for x in x0..x0 + cell_px {
                    img.data[y * side + x] = 0;
                }
            }
        }
    }

    Some(img)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_border_is_black_and_margin_white() {
        let dict = Dictionary::by_name("ARUCO_5X5_50").expect("builtin");
        let img = render_marker(&dict, 0, 4, 1).expect("render");
        // 5 bits + 2 border + 2 margin = 9 cells of 4 px.
        assert_eq!(img.width, 36);
        assert_eq!(img.data[0], 255); // margin
        assert_eq!(img.data[6 * 36 + 6], 0); // border ring
    }

    #[test]
    fn out_of_range_id_is_rejected() {
        let dict = Dictionary::by_name("ARUCO_5X5_50").expect("builtin");
        assert!(render_marker(&dict, 50, 4, 1).is_none());
    }
}
