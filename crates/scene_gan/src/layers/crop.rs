use burn::{prelude::*, tensor::TensorData};

use crate::{
    error::GanError,
    layers::layout::chunk_boxes,
    util::{read_floats, read_ints},
};

/// Checks that `obj_to_img` routes every object into `[0, num_images)`.
pub fn check_routing(
    routes: &[i64],
    field: &'static str,
    num_images: usize,
) -> Result<(), GanError> {
    match routes
        .iter()
        .enumerate()
        .find(|(_, v)| **v < 0 || **v as usize >= num_images)
    {
        Some((index, value)) => Err(GanError::IndexOutOfRange {
            field,
            index,
            value: *value,
            bound: num_images,
        }),
        None => Ok(()),
    }
}

/// Sampling position of output cell `i` of `size` along an axis of `extent` pixels.
fn sample_axis(lo: f32, hi: f32, i: usize, size: usize, extent: usize) -> (i64, i64, f32) {
    let t = if size == 1 {
        0.5
    } else {
        i as f32 / (size - 1) as f32
    };
    let max = (extent - 1) as f32;
    let p = ((lo + (hi - lo) * t) * max).clamp(0.0, max);
    let p0 = p.floor();
    let p1 = (p0 + 1.0).min(max);
    (p0 as i64, p1 as i64, p - p0)
}

/// Extracts one `size`x`size` crop per object with bilinear sampling.
///
/// `boxes` are `[O, 4]` normalized `(x0, y0, x1, y1)` coordinates and
/// `obj_to_img` selects the image each crop is taken from. The box corners map
/// onto the corner pixel centers. The crops are differentiable with respect to
/// `images` only.
pub fn crop_bbox_batch<B: Backend>(
    images: Tensor<B, 4>,
    boxes: Tensor<B, 2>,
    obj_to_img: Tensor<B, 1, Int>,
    size: usize,
) -> Result<Tensor<B, 4>, GanError> {
    let [num_images, channels, height, width] = images.dims();
    let [num_objects, coords] = boxes.dims();
    if coords != 4 {
        return Err(GanError::ShapeMismatch {
            what: "boxes",
            expected: format!("[{}, 4]", num_objects),
            found: format!("{:?}", boxes.dims()),
        });
    }
    let [num_routes] = obj_to_img.dims();
    if num_routes != num_objects {
        return Err(GanError::LengthMismatch {
            field: "obj_to_img",
            expected: num_objects,
            found: num_routes,
        });
    }
    if size == 0 || height == 0 || width == 0 {
        return Err(GanError::ShapeMismatch {
            what: "crop size",
            expected: "positive crop and image sizes".into(),
            found: format!("crop {} from {}x{}", size, height, width),
        });
    }
    check_routing(&read_ints(&obj_to_img)?, "obj_to_img", num_images)?;
    let bboxes = chunk_boxes(&read_floats(&boxes)?);
    if let Some((index, bbox)) = bboxes
        .iter()
        .enumerate()
        .find(|(_, b)| b.iter().any(|v| !v.is_finite()))
    {
        return Err(GanError::InvalidBox {
            index,
            coords: *bbox,
        });
    }

    let samples = size * size;
    let mut indices: [Vec<i64>; 4] = Default::default();
    let mut weights: [Vec<f32>; 4] = Default::default();
    for [x0, y0, x1, y1] in bboxes.iter() {
        for row in 0..size {
            let (ya, yb, wy) = sample_axis(*y0, *y1, row, size, height);
            for col in 0..size {
                let (xa, xb, wx) = sample_axis(*x0, *x1, col, size, width);
                let w = width as i64;
                let corners = [
                    (ya * w + xa, (1.0 - wy) * (1.0 - wx)),
                    (ya * w + xb, (1.0 - wy) * wx),
                    (yb * w + xa, wy * (1.0 - wx)),
                    (yb * w + xb, wy * wx),
                ];
                for (k, (index, weight)) in corners.into_iter().enumerate() {
                    indices[k].push(index);
                    weights[k].push(weight);
                }
            }
        }
    }

    let device = images.device();
    let feats = images
        .select(0, obj_to_img)
        .reshape([num_objects, channels, height * width]);

    let crops = indices
        .into_iter()
        .zip(weights)
        .map(|(index, weight)| {
            let index = Tensor::<B, 2, Int>::from_data(
                TensorData::new(index, [num_objects, samples]),
                &device,
            )
            .unsqueeze_dim::<3>(1)
            .repeat_dim(1, channels);
            let weight = Tensor::<B, 2>::from_data(
                TensorData::new(weight, [num_objects, samples]),
                &device,
            )
            .unsqueeze_dim::<3>(1);
            feats.clone().gather(2, index) * weight
        })
        .reduce(|acc, corner| acc + corner)
        .ok_or(GanError::EmptyBatch("crop corners"))?;

    Ok(crops.reshape([num_objects, channels, size, size]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn images(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 4> {
        let values: Vec<f32> = (0..2 * 2 * 4 * 4).map(|v| v as f32).collect();
        Tensor::from_data(TensorData::new(values, [2, 2, 4, 4]), device)
    }

    #[test]
    fn full_box_reproduces_image() {
        let device = Default::default();
        let imgs = images(&device);
        let boxes = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 1.0, 1.0]], &device);
        let obj_to_img = Tensor::<TestBackend, 1, Int>::from_ints([1], &device);

        let crops = crop_bbox_batch(imgs.clone(), boxes, obj_to_img, 4).unwrap();

        assert_eq!(crops.dims(), [1, 2, 4, 4]);
        let expected = imgs.slice([1..2, 0..2, 0..4, 0..4]);
        let diff = (crops - expected).abs().max().into_scalar();
        assert!(diff < 1e-5);
    }

    #[test]
    fn one_crop_per_object() {
        let device = Default::default();
        let boxes = Tensor::<TestBackend, 2>::from_floats(
            [
                [0.0, 0.0, 0.5, 0.5],
                [0.25, 0.25, 1.0, 1.0],
                [0.1, 0.2, 0.3, 0.9],
            ],
            &device,
        );
        let obj_to_img = Tensor::<TestBackend, 1, Int>::from_ints([0, 0, 1], &device);
        let crops = crop_bbox_batch(images(&device), boxes, obj_to_img, 3).unwrap();
        assert_eq!(crops.dims(), [3, 2, 3, 3]);
    }

    #[test]
    fn top_left_pixel_box_is_constant() {
        let device = Default::default();
        let boxes = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 0.0, 0.0]], &device);
        let obj_to_img = Tensor::<TestBackend, 1, Int>::from_ints([0], &device);
        let crops = crop_bbox_batch(images(&device), boxes, obj_to_img, 2).unwrap();
        let values = crops.to_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![0.0, 0.0, 0.0, 0.0, 16.0, 16.0, 16.0, 16.0]);
    }

    #[test]
    fn rejects_out_of_range_routing() {
        let device = Default::default();
        let boxes = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 1.0, 1.0]], &device);
        let obj_to_img = Tensor::<TestBackend, 1, Int>::from_ints([2], &device);
        let result = crop_bbox_batch(images(&device), boxes, obj_to_img, 2);
        assert!(matches!(
            result,
            Err(GanError::IndexOutOfRange {
                field: "obj_to_img",
                value: 2,
                ..
            })
        ));
    }

    #[test]
    fn rejects_route_count_mismatch() {
        let device = Default::default();
        let boxes = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 1.0, 1.0]], &device);
        let obj_to_img = Tensor::<TestBackend, 1, Int>::from_ints([0, 1], &device);
        let result = crop_bbox_batch(images(&device), boxes, obj_to_img, 2);
        assert!(matches!(result, Err(GanError::LengthMismatch { .. })));
    }
}
