use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};
use log::warn;

use crate::{
    error::GanError,
    gan::generator::SceneGraph,
    layers::{
        crop::check_routing,
        layout::{box_masks, chunk_boxes},
    },
    util::{read_floats, read_ints},
};

use super::scene_dataset::SceneItem;

/// A collated batch of scenes, every tensor on the batcher's device.
#[derive(Clone, Debug)]
pub struct SceneBatch<B: Backend> {
    /// dim [N, 3, H, W] in [-1, 1]
    pub images: Tensor<B, 4>,
    /// dim [O]
    pub objects: Tensor<B, 1, Int>,
    /// dim [O, 4]
    pub boxes: Tensor<B, 2>,
    /// dim [T, 3]
    pub triples: Tensor<B, 2, Int>,
    /// dim [N, L, H, W]
    pub layouts: Option<Tensor<B, 4>>,
    /// dim [O]
    pub obj_to_img: Tensor<B, 1, Int>,
    /// dim [T]
    pub triple_to_img: Tensor<B, 1, Int>,
}

impl<B: Backend> SceneBatch<B> {
    pub fn num_images(&self) -> usize {
        self.images.dims()[0]
    }

    pub fn num_objects(&self) -> usize {
        self.objects.dims()[0]
    }

    /// Checks the cross tensor invariants of the batch. `num_categories`
    /// bounds the object ids.
    pub fn validate(&self, num_categories: usize) -> Result<(), GanError> {
        let [num_images, channels, height, width] = self.images.dims();
        let num_objects = self.num_objects();
        if num_images == 0 {
            return Err(GanError::EmptyBatch("images"));
        }
        if num_objects == 0 {
            return Err(GanError::EmptyBatch("objects"));
        }
        if channels != 3 {
            return Err(GanError::ShapeMismatch {
                what: "images",
                expected: format!("[{}, 3, {}, {}]", num_images, height, width),
                found: format!("{:?}", self.images.dims()),
            });
        }
        let [num_boxes, coords] = self.boxes.dims();
        if coords != 4 {
            return Err(GanError::ShapeMismatch {
                what: "boxes",
                expected: format!("[{}, 4]", num_objects),
                found: format!("{:?}", self.boxes.dims()),
            });
        }
        let [num_triples, triple_width] = self.triples.dims();
        if triple_width != 3 {
            return Err(GanError::ShapeMismatch {
                what: "triples",
                expected: format!("[{}, 3]", num_triples),
                found: format!("{:?}", self.triples.dims()),
            });
        }
        let lengths = [
            ("boxes", num_boxes, num_objects),
            ("obj_to_img", self.obj_to_img.dims()[0], num_objects),
            ("triple_to_img", self.triple_to_img.dims()[0], num_triples),
        ];
        for (field, found, expected) in lengths {
            if found != expected {
                return Err(GanError::LengthMismatch {
                    field,
                    expected,
                    found,
                });
            }
        }

        check_routing(&read_ints(&self.objects)?, "objects", num_categories)?;
        check_routing(&read_ints(&self.obj_to_img)?, "obj_to_img", num_images)?;
        if num_triples > 0 {
            check_routing(
                &read_ints(&self.triple_to_img)?,
                "triple_to_img",
                num_images,
            )?;
            let triples = read_ints(&self.triples)?;
            let endpoints: Vec<i64> = triples
                .chunks_exact(3)
                .flat_map(|t| [t[0], t[2]])
                .collect();
            check_routing(&endpoints, "triples", num_objects)?;
        }
        if let Some((index, bbox)) = chunk_boxes(&read_floats(&self.boxes)?)
            .into_iter()
            .enumerate()
            .find(|(_, b)| b.iter().any(|v| !v.is_finite()))
        {
            return Err(GanError::InvalidBox {
                index,
                coords: bbox,
            });
        }

        if let Some(layouts) = &self.layouts {
            let [n, _, h, w] = layouts.dims();
            if [n, h, w] != [num_images, height, width] {
                return Err(GanError::ShapeMismatch {
                    what: "layouts",
                    expected: format!("[{}, L, {}, {}]", num_images, height, width),
                    found: format!("{:?}", layouts.dims()),
                });
            }
        }
        Ok(())
    }

    /// The conditioning the generator sees for this batch.
    pub fn graph(&self) -> SceneGraph<B> {
        SceneGraph {
            objects: self.objects.clone(),
            triples: self.triples.clone(),
            obj_to_img: self.obj_to_img.clone(),
            boxes: self.boxes.clone(),
            num_images: self.num_images(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SceneBatcher<B: Backend> {
    device: B::Device,
    image_size: [usize; 2],
    /// one layout channel per category when set
    layout_categories: Option<usize>,
}

impl<B: Backend> SceneBatcher<B> {
    pub fn new(device: B::Device, image_size: [usize; 2]) -> Self {
        Self {
            device,
            image_size,
            layout_categories: None,
        }
    }

    /// Adds one-hot category layouts with `num_categories` channels to every batch.
    pub fn with_layouts(mut self, num_categories: usize) -> Self {
        self.layout_categories = Some(num_categories);
        self
    }

    fn layouts(&self, scenes: &[&SceneItem]) -> Option<Tensor<B, 4>> {
        let categories = self.layout_categories?;
        let [height, width] = self.image_size;
        let plane = height * width;
        let mut layouts = vec![0.0f32; scenes.len() * categories * plane];
        for (i, scene) in scenes.iter().enumerate() {
            let boxes: Vec<[f32; 4]> = scene.objects.iter().map(|o| o.bbox).collect();
            let masks = box_masks(&boxes, height, width);
            for (obj, mask) in scene.objects.iter().zip(masks.chunks_exact(plane)) {
                if obj.category >= categories {
                    continue;
                }
                let offset = (i * categories + obj.category) * plane;
                for (dst, m) in layouts[offset..offset + plane].iter_mut().zip(mask) {
                    *dst = dst.max(*m);
                }
            }
        }
        Some(Tensor::from_data(
            TensorData::new(layouts, [scenes.len(), categories, height, width]),
            &self.device,
        ))
    }
}

impl<B: Backend> Batcher<SceneItem, SceneBatch<B>> for SceneBatcher<B> {
    fn batch(&self, items: Vec<SceneItem>) -> SceneBatch<B> {
        let [height, width] = self.image_size;
        let mut images = vec![];
        let mut scenes = vec![];
        for item in items.iter() {
            match item.load_image(self.image_size) {
                Ok(data) => {
                    images.push(Tensor::<B, 4>::from_data(data, &self.device).permute([0, 3, 1, 2]));
                    scenes.push(item);
                }
                Err(e) => warn!("skipping {:?}: {}", item.image, e),
            }
        }

        let mut objects = vec![];
        let mut boxes = vec![];
        let mut obj_to_img = vec![];
        let mut triples = vec![];
        let mut triple_to_img = vec![];
        for (i, scene) in scenes.iter().enumerate() {
            let offset = objects.len() as i64;
            for obj in scene.objects.iter() {
                objects.push(obj.category as i64);
                boxes.extend_from_slice(&obj.bbox);
                obj_to_img.push(i as i64);
            }
            for t in scene.triples.iter() {
                triples.extend_from_slice(&[
                    t.subject as i64 + offset,
                    t.predicate as i64,
                    t.object as i64 + offset,
                ]);
                triple_to_img.push(i as i64);
            }
        }

        let images = if images.is_empty() {
            Tensor::zeros([0, 3, height, width], &self.device)
        } else {
            // normalize [-1, 1]
            (Tensor::cat(images, 0) - 127.5) / 127.5
        };
        let num_objects = objects.len();
        let num_triples = triple_to_img.len();
        SceneBatch {
            images,
            objects: Tensor::from_data(TensorData::new(objects, [num_objects]), &self.device),
            boxes: Tensor::from_data(TensorData::new(boxes, [num_objects, 4]), &self.device),
            triples: Tensor::from_data(TensorData::new(triples, [num_triples, 3]), &self.device),
            layouts: self.layouts(&scenes),
            obj_to_img: Tensor::from_data(TensorData::new(obj_to_img, [num_objects]), &self.device),
            triple_to_img: Tensor::from_data(
                TensorData::new(triple_to_img, [num_triples]),
                &self.device,
            ),
        }
    }
}
