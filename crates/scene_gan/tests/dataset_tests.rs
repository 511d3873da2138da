#[cfg(test)]
mod dataset {
    use std::{fs, path::PathBuf};

    use burn::data::dataset::Dataset;
    use scene_gan::scene_database::{
        scene_dataset::{SceneDataset, SceneDatasetError, SceneItem, SceneObject, SceneTriple},
        vocab::Vocab,
    };

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scene_gan_dataset_{}", name));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn dataset(size: usize) -> SceneDataset {
        let items = (0..size)
            .map(|i| SceneItem {
                image: PathBuf::from(format!("images/{:04}.png", i)),
                objects: vec![
                    SceneObject {
                        category: i % 3,
                        bbox: [0.0, 0.0, 0.5, 0.5],
                    },
                    SceneObject {
                        category: 0,
                        bbox: [0.25, 0.25, 1.0, 1.0],
                    },
                ],
                triples: vec![SceneTriple {
                    subject: 0,
                    predicate: 1,
                    object: 1,
                }],
            })
            .collect();
        SceneDataset::new("scenes", items)
    }

    #[test]
    fn dataset_survives_ron_round_trip() {
        let path = scratch_dir("round_trip").join("scenes.ron");
        let dataset = dataset(5);

        dataset.save_to_ron(&path).unwrap();
        // saving twice overwrites the first file
        dataset.save_to_ron(&path).unwrap();

        assert_eq!(SceneDataset::load_from_ron(&path).unwrap(), dataset);
    }

    #[test]
    fn triples_default_to_empty() {
        let path = scratch_dir("no_triples").join("scenes.ron");
        fs::write(
            &path,
            r#"(name: "plain", items: [(image: "a.png", objects: [(category: 2, bbox: (0.0, 0.0, 1.0, 1.0))])])"#,
        )
        .unwrap();

        let dataset = SceneDataset::load_from_ron(&path).unwrap();

        assert_eq!(dataset.name(), "plain");
        let item = dataset.get(0).unwrap();
        assert!(item.triples.is_empty());
        assert_eq!(item.objects[0].category, 2);
    }

    #[test]
    fn loading_a_directory_fails() {
        let dir = scratch_dir("directory");
        assert!(matches!(
            SceneDataset::load_from_ron(&dir),
            Err(SceneDatasetError::InvalidPath { .. })
        ));
        assert!(matches!(
            SceneDataset::load_from_ron(&dir.join("missing.ron")),
            Err(SceneDatasetError::InvalidPath { .. })
        ));
    }

    #[test]
    fn split_partitions_every_item() {
        let (train, valid) = dataset(10).split(0.7).unwrap();

        assert_eq!(train.len(), 7);
        assert_eq!(valid.len(), 3);
        let mut images: Vec<PathBuf> = train
            .iter()
            .chain(valid.iter())
            .map(|item| item.image)
            .collect();
        images.sort();
        images.dedup();
        assert_eq!(images.len(), 10);
    }

    #[test]
    fn split_rejects_degenerate_ratios() {
        for ratio in [0.0, 1.0, -0.5, 1.5] {
            assert!(matches!(
                dataset(4).split(ratio),
                Err(SceneDatasetError::InvalidSplitRatio(_))
            ));
        }
    }

    #[test]
    fn filter_keeps_matching_items() {
        let filtered = dataset(9).filter(|item| item.objects[0].category == 1);

        assert_eq!(filtered.name(), "scenes");
        assert_eq!(filtered.len(), 3);
        assert!(filtered.iter().all(|item| item.objects[0].category == 1));
    }

    #[test]
    fn vocab_survives_ron_round_trip() {
        let path = scratch_dir("vocab").join("vocab.ron");
        let vocab = Vocab::new(
            vec!["__image__".into(), "sky".into(), "tree".into()],
            vec!["__in_image__".into(), "above".into()],
        );

        vocab.save_to_ron(&path).unwrap();
        let loaded = Vocab::load_from_ron(&path).unwrap();

        assert_eq!(loaded.num_objects(), 3);
        assert_eq!(loaded.num_predicates(), 2);
        assert_eq!(loaded.object_index("tree"), Some(2));
    }
}
