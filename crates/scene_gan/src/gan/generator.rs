use burn::{
    module::Ignored,
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
    tensor::{TensorData, activation::tanh},
};

use crate::{
    error::GanError,
    layers::{
        backbone::{Activation, Backbone, BackboneConfig, Normalization},
        crop::check_routing,
        layout::{box_masks, chunk_boxes},
    },
    scene_database::vocab::Vocab,
    util::{read_floats, read_ints},
};

/// Conditioning passed to a [`SceneGenerator`].
#[derive(Debug, Clone)]
pub struct SceneGraph<B: Backend> {
    /// dim [O]
    pub objects: Tensor<B, 1, Int>,
    /// dim [T, 3]
    pub triples: Tensor<B, 2, Int>,
    /// dim [O]
    pub obj_to_img: Tensor<B, 1, Int>,
    /// ground truth boxes, dim [O, 4]
    pub boxes: Tensor<B, 2>,
    pub num_images: usize,
}

#[derive(Debug, Clone)]
pub struct GeneratorOutput<B: Backend> {
    /// dim [N, 3, H, W] in [-1, 1]
    pub image: Tensor<B, 4>,
    /// boxes the image was laid out with, dim [O, 4]
    pub boxes: Tensor<B, 2>,
    /// dim [O, H, W]
    pub masks: Option<Tensor<B, 3>>,
    pub scores: Option<Tensor<B, 2>>,
    /// dim [N, E, H, W]
    pub layout: Tensor<B, 4>,
}

/// Anything that turns a scene graph into an image batch.
pub trait SceneGenerator<B: Backend> {
    fn generate(&self, graph: SceneGraph<B>) -> Result<GeneratorOutput<B>, GanError>;

    fn image_size(&self) -> [usize; 2];
}

#[derive(Config, Debug)]
pub struct LayoutGeneratorConfig {
    pub num_objects: usize,
    #[config(default = 32)]
    pub embedding_dim: usize,
    #[config(default = 64)]
    pub hidden_dim: usize,
    #[config(default = "[64, 64]")]
    pub image_size: [usize; 2],
}

impl LayoutGeneratorConfig {
    pub fn from_vocab(vocab: &Vocab) -> Self {
        Self::new(vocab.num_objects())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<LayoutGenerator<B>, GanError> {
        let refine = BackboneConfig::new(format!(
            "I{e},C3-{h},C3-{h},C3-3",
            e = self.embedding_dim,
            h = self.hidden_dim
        ))
        .with_normalization(Normalization::Disabled)
        .with_activation(Activation::LeakyRelu(0.2))
        .init(device)?;
        Ok(LayoutGenerator {
            embedding: EmbeddingConfig::new(self.num_objects, self.embedding_dim).init(device),
            refine,
            num_objects: self.num_objects,
            image_size: Ignored(self.image_size),
        })
    }
}

/// Baseline generator: object embeddings are painted into their boxes,
/// summed per image and refined by a small conv stack.
#[derive(Module, Debug)]
pub struct LayoutGenerator<B: Backend> {
    embedding: Embedding<B>,
    refine: Backbone<B>,
    num_objects: usize,
    image_size: Ignored<[usize; 2]>,
}

impl<B: Backend> LayoutGenerator<B> {
    fn check_graph(&self, graph: &SceneGraph<B>) -> Result<Vec<[f32; 4]>, GanError> {
        let [num_objects] = graph.objects.dims();
        if num_objects == 0 {
            return Err(GanError::EmptyBatch("objects"));
        }
        if graph.num_images == 0 {
            return Err(GanError::EmptyBatch("images"));
        }
        let [num_boxes, coords] = graph.boxes.dims();
        if coords != 4 {
            return Err(GanError::ShapeMismatch {
                what: "boxes",
                expected: format!("[{}, 4]", num_objects),
                found: format!("{:?}", graph.boxes.dims()),
            });
        }
        for (field, found) in [("boxes", num_boxes), ("obj_to_img", graph.obj_to_img.dims()[0])] {
            if found != num_objects {
                return Err(GanError::LengthMismatch {
                    field,
                    expected: num_objects,
                    found,
                });
            }
        }
        check_routing(&read_ints(&graph.objects)?, "objects", self.num_objects)?;
        check_routing(&read_ints(&graph.obj_to_img)?, "obj_to_img", graph.num_images)?;
        Ok(chunk_boxes(&read_floats(&graph.boxes)?))
    }
}

impl<B: Backend> SceneGenerator<B> for LayoutGenerator<B> {
    fn generate(&self, graph: SceneGraph<B>) -> Result<GeneratorOutput<B>, GanError> {
        let bboxes = self.check_graph(&graph)?;
        let device = graph.objects.device();
        let [height, width] = self.image_size.0;
        let num_objects = bboxes.len();
        let num_images = graph.num_images;

        let masks = Tensor::<B, 3>::from_data(
            TensorData::new(box_masks(&bboxes, height, width), [num_objects, height, width]),
            &device,
        );

        // [O, E, H, W]
        let embedded = self.embedding.forward(graph.objects.unsqueeze_dim(0));
        let [_, _, dim] = embedded.dims();
        let painted = embedded.reshape([num_objects, dim, 1, 1])
            * masks.clone().unsqueeze_dim::<4>(1);

        // sums the painted objects of each image
        let routes = read_ints(&graph.obj_to_img)?;
        let mut routing = vec![0.0f32; num_images * num_objects];
        for (o, img) in routes.iter().enumerate() {
            routing[*img as usize * num_objects + o] = 1.0;
        }
        let routing = Tensor::<B, 2>::from_data(
            TensorData::new(routing, [num_images, num_objects]),
            &device,
        );
        let layout = routing
            .matmul(painted.reshape([num_objects, dim * height * width]))
            .reshape([num_images, dim, height, width]);

        let image = tanh(self.refine.forward(layout.clone()));
        Ok(GeneratorOutput {
            image,
            boxes: graph.boxes,
            masks: Some(masks),
            scores: None,
            layout,
        })
    }

    fn image_size(&self) -> [usize; 2] {
        self.image_size.0
    }
}
