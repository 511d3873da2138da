#[cfg(test)]
mod generator {
    use burn::{backend::NdArray, prelude::*};
    use scene_gan::{
        error::GanError,
        gan::generator::{LayoutGenerator, LayoutGeneratorConfig, SceneGenerator, SceneGraph},
    };

    type MyBackend = NdArray<f32>;

    fn generator() -> LayoutGenerator<MyBackend> {
        LayoutGeneratorConfig::new(6)
            .with_embedding_dim(4)
            .with_hidden_dim(8)
            .with_image_size([16, 24])
            .init(&Default::default())
            .unwrap()
    }

    fn graph() -> SceneGraph<MyBackend> {
        let device = Default::default();
        SceneGraph {
            objects: Tensor::from_ints([0, 5, 2], &device),
            triples: Tensor::from_ints([[0, 1, 1], [2, 0, 2]], &device),
            obj_to_img: Tensor::from_ints([0, 1, 1], &device),
            boxes: Tensor::from_floats(
                [[0.0, 0.0, 0.5, 0.5], [0.5, 0.5, 1.0, 1.0], [0.0, 0.0, 1.0, 0.25]],
                &device,
            ),
            num_images: 2,
        }
    }

    #[test]
    fn output_has_configured_shapes() {
        let generator = generator();
        assert_eq!(generator.image_size(), [16, 24]);

        let output = generator.generate(graph()).unwrap();

        assert_eq!(output.image.dims(), [2, 3, 16, 24]);
        assert_eq!(output.layout.dims(), [2, 4, 16, 24]);
        assert_eq!(output.masks.map(|m| m.dims()), Some([3, 16, 24]));
        assert!(output.scores.is_none());
    }

    #[test]
    fn images_stay_in_tanh_range() {
        let output = generator().generate(graph()).unwrap();
        let values = output.image.to_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn boxes_are_passed_through() {
        let graph = graph();
        let boxes = graph.boxes.to_data().to_vec::<f32>().unwrap();

        let output = generator().generate(graph).unwrap();

        assert_eq!(output.boxes.to_data().to_vec::<f32>().unwrap(), boxes);
    }

    #[test]
    fn layout_is_empty_outside_every_box() {
        let device = Default::default();
        let graph = SceneGraph {
            objects: Tensor::from_ints([3], &device),
            triples: Tensor::zeros([0, 3], &device),
            obj_to_img: Tensor::from_ints([1], &device),
            boxes: Tensor::from_floats([[0.0, 0.0, 1.0, 1.0]], &device),
            num_images: 2,
        };

        let output = generator().generate(graph).unwrap();

        // image 0 has no objects
        let empty = output
            .layout
            .slice([0..1, 0..4, 0..16, 0..24])
            .abs()
            .sum()
            .into_scalar();
        assert_eq!(empty, 0.0);
    }

    #[test]
    fn rejects_unknown_category() {
        let mut graph = graph();
        graph.objects = Tensor::from_ints([0, 6, 2], &Default::default());

        assert_eq!(
            generator().generate(graph).err(),
            Some(GanError::IndexOutOfRange {
                field: "objects",
                index: 1,
                value: 6,
                bound: 6,
            })
        );
    }

    #[test]
    fn rejects_routing_past_last_image() {
        let mut graph = graph();
        graph.num_images = 1;

        assert!(matches!(
            generator().generate(graph),
            Err(GanError::IndexOutOfRange {
                field: "obj_to_img",
                index: 1,
                ..
            })
        ));
    }

    #[test]
    fn rejects_box_count_mismatch() {
        let mut graph = graph();
        graph.boxes = Tensor::from_floats([[0.0, 0.0, 1.0, 1.0]], &Default::default());

        assert!(matches!(
            generator().generate(graph),
            Err(GanError::LengthMismatch { field: "boxes", .. })
        ));
    }
}
