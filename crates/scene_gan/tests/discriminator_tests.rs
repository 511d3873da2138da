#[cfg(test)]
mod discriminator {
    use burn::{
        backend::NdArray,
        prelude::*,
        tensor::{Distribution, Shape},
    };
    use scene_gan::{
        error::GanError,
        gan::discriminator::{
            AcCropDiscriminator, AcCropDiscriminatorConfig, AcDiscriminator,
            AcDiscriminatorConfig, PatchDiscriminator, PatchDiscriminatorConfig,
        },
        layers::Normalization,
        scene_database::vocab::Vocab,
    };

    type MyBackend = NdArray<f32>;

    fn images(n: usize, channels: usize, size: usize) -> Tensor<MyBackend, 4> {
        Tensor::random(
            [n, channels, size, size],
            Distribution::Uniform(-1.0, 1.0),
            &Default::default(),
        )
    }

    #[test]
    fn patch_scores_match_reported_grid() {
        let device = Default::default();
        let discriminator: PatchDiscriminator<MyBackend> =
            PatchDiscriminatorConfig::new("C4-16-2,C4-32-2,C3-32".into())
                .with_input_size([32, 32])
                .init(&device)
                .unwrap();

        let scores = discriminator.forward(images(2, 3, 32), None).unwrap();

        let [h, w] = discriminator.score_map_size();
        assert_eq!(Shape::new([2, 1, h, w]), scores.shape());
        assert_eq!([h, w], [8, 8]);
    }

    #[test]
    fn patch_rejects_layout_without_layout_dim() {
        let device = Default::default();
        let discriminator: PatchDiscriminator<MyBackend> =
            PatchDiscriminatorConfig::new("C4-16-2".into())
                .with_input_size([16, 16])
                .init(&device)
                .unwrap();

        let result = discriminator.forward(images(1, 3, 16), Some(images(1, 2, 16)));

        assert!(matches!(result, Err(GanError::UnexpectedLayout)));
    }

    #[test]
    fn patch_requires_layout_with_layout_dim() {
        let device = Default::default();
        let discriminator: PatchDiscriminator<MyBackend> =
            PatchDiscriminatorConfig::new("C4-16-2".into())
                .with_input_size([16, 16])
                .with_layout_dim(2)
                .init(&device)
                .unwrap();

        assert!(matches!(
            discriminator.forward(images(1, 3, 16), None),
            Err(GanError::MissingLayout(2))
        ));
        assert!(matches!(
            discriminator.forward(images(1, 3, 16), Some(images(1, 3, 16))),
            Err(GanError::ShapeMismatch { what: "layout", .. })
        ));
        let scores = discriminator
            .forward(images(1, 3, 16), Some(images(1, 2, 16)))
            .unwrap();
        assert_eq!(scores.dims(), [1, 1, 8, 8]);
    }

    #[test]
    fn ac_scores_rank_three_input_like_singleton_channel() {
        let device = Default::default();
        let discriminator: AcDiscriminator<MyBackend> =
            AcDiscriminatorConfig::new(5, "I1,C3-8-2,C3-16-2".into())
                .init(&device)
                .unwrap();
        let masks: Tensor<MyBackend, 3> =
            Tensor::random([3, 16, 16], Distribution::Default, &device);
        let labels = Tensor::<MyBackend, 1, Int>::from_ints([0, 3, 4], &device);

        let (scores_3d, loss_3d) = discriminator
            .forward_single_channel(masks.clone(), labels.clone())
            .unwrap();
        let (scores_4d, loss_4d) = discriminator
            .forward(masks.unsqueeze_dim(1), labels)
            .unwrap();

        assert_eq!(scores_3d.dims(), [3, 1]);
        assert_eq!(
            scores_3d.to_data().to_vec::<f32>().unwrap(),
            scores_4d.to_data().to_vec::<f32>().unwrap()
        );
        assert_eq!(
            loss_3d.to_data().to_vec::<f32>().unwrap(),
            loss_4d.to_data().to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn ac_rejects_label_count_mismatch() {
        let device = Default::default();
        let discriminator: AcDiscriminator<MyBackend> =
            AcDiscriminatorConfig::new(5, "C3-8-2".into())
                .init(&device)
                .unwrap();
        let labels = Tensor::<MyBackend, 1, Int>::from_ints([0], &device);

        assert!(matches!(
            discriminator.forward(images(2, 3, 8), labels),
            Err(GanError::LengthMismatch { field: "labels", .. })
        ));
    }

    #[test]
    fn ac_rejects_unknown_label() {
        let device = Default::default();
        let discriminator: AcCropDiscriminator<MyBackend> = AcCropDiscriminatorConfig::new(
            AcDiscriminatorConfig::new(10, "C4-16-2".into()),
        )
        .with_object_size(16)
        .init(&device)
        .unwrap();
        let boxes = Tensor::<MyBackend, 2>::from_floats(
            [[0.0, 0.0, 0.5, 0.5], [0.0, 0.0, 1.0, 1.0]],
            &device,
        );
        let objects = Tensor::<MyBackend, 1, Int>::from_ints([3, 10], &device);
        let obj_to_img = Tensor::<MyBackend, 1, Int>::from_ints([0, 0], &device);

        assert_eq!(
            discriminator
                .forward(images(1, 3, 32), objects, boxes, obj_to_img)
                .err(),
            Some(GanError::IndexOutOfRange {
                field: "labels",
                index: 1,
                value: 10,
                bound: 10,
            })
        );
    }

    #[test]
    fn crop_discriminator_scores_every_object() {
        let device = Default::default();
        let vocab = Vocab::new((0..10).map(|i| format!("object_{}", i)).collect(), vec![]);
        let discriminator: AcCropDiscriminator<MyBackend> = AcCropDiscriminatorConfig::new(
            AcDiscriminatorConfig::from_vocab(&vocab, "C4-16-2,C4-64-2")
                .with_normalization(Normalization::Batch),
        )
        .with_object_size(32)
        .init(&device)
        .unwrap();
        assert_eq!(discriminator.num_objects(), 10);

        let boxes = Tensor::<MyBackend, 2>::from_floats(
            [
                [0.0, 0.0, 0.5, 0.5],
                [0.5, 0.5, 1.0, 1.0],
                [0.2, 0.1, 0.9, 0.7],
                [0.0, 0.0, 1.0, 1.0],
            ],
            &device,
        );
        let objects = Tensor::<MyBackend, 1, Int>::from_ints([1, 2, 3, 9], &device);
        let obj_to_img = Tensor::<MyBackend, 1, Int>::from_ints([0, 0, 1, 1], &device);

        let (scores, ac_loss) = discriminator
            .forward(images(2, 3, 48), objects, boxes, obj_to_img)
            .unwrap();

        assert_eq!(scores.dims(), [4, 1]);
        assert_eq!(ac_loss.dims(), [1]);
    }
}
