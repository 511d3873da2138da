/// Rasterizes normalized `(x0, y0, x1, y1)` boxes into binary masks.
///
/// Returns `boxes.len() * height * width` values laid out `[object, row, column]`.
/// A pixel belongs to a box when its center lies inside it.
pub fn box_masks(boxes: &[[f32; 4]], height: usize, width: usize) -> Vec<f32> {
    let mut masks = vec![0.0; boxes.len() * height * width];
    for (o, [x0, y0, x1, y1]) in boxes.iter().enumerate() {
        let offset = o * height * width;
        for row in 0..height {
            let y = (row as f32 + 0.5) / height as f32;
            if y < *y0 || y > *y1 {
                continue;
            }
            for col in 0..width {
                let x = (col as f32 + 0.5) / width as f32;
                if x >= *x0 && x <= *x1 {
                    masks[offset + row * width + col] = 1.0;
                }
            }
        }
    }
    masks
}

/// Groups a flat `[x0, y0, x1, y1, ...]` buffer into boxes.
pub fn chunk_boxes(flat: &[f32]) -> Vec<[f32; 4]> {
    flat.chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect()
}
