use rand::rngs::StdRng;
use rand::SeedableRng;
use visearch::search::feedback::feedback_gain;
use visearch::template::sampler::{sample_vector, SIMILARITY_SCALES};
use visearch::{
    build_object_responses, build_patch_prototypes, build_vector_prototypes, Config, FilterBank,
    GrayImage, Model, VisearchError,
};

fn bars(n: usize, vertical: bool) -> GrayImage {
    GrayImage::from_fn(n, n, |x, y| {
        let t = if vertical { x } else { y };
        if (t / 4) % 2 == 0 {
            1.0
        } else {
            0.0
        }
    })
    .unwrap()
}

fn small_config() -> Config {
    Config {
        scale_sizes: vec![7, 9, 11],
        prototype_size: 5,
        num_kept_weights: 20,
        num_patch_prototypes: 16,
        num_vector_prototypes_per_object: 4,
        ..Config::default()
    }
}

fn trained_model(cfg: &Config, seed: u64) -> (Model, [GrayImage; 2]) {
    let objects = [bars(64, true), bars(64, false)];
    let views: Vec<_> = objects.iter().map(GrayImage::view).collect();
    let bank = FilterBank::build(&cfg.scale_sizes).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let patches = build_patch_prototypes(&views, &bank, cfg, &mut rng).unwrap();
    assert_eq!(patches.len(), cfg.num_patch_prototypes);
    let model = Model::with_bank(cfg.clone(), bank, patches).unwrap();
    (model, objects)
}

#[test]
fn objects_recognize_themselves() {
    let cfg = small_config();
    let (model, objects) = trained_model(&cfg, 7);
    let views: Vec<_> = objects.iter().map(GrayImage::view).collect();
    let mut rng = StdRng::seed_from_u64(8);
    let set = build_vector_prototypes(&model, &views, &mut rng).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.dim(), cfg.num_patch_prototypes);

    for (object_id, view) in views.iter().enumerate() {
        let decision = model.recognize(*view, &set).unwrap();
        assert_eq!(decision.object_id, object_id, "scores {:?}", decision.scores);
        assert_eq!(decision.scores.len(), 2);
        assert!(decision.scores.iter().all(|s| (-1.0..=1.0).contains(s)));
    }
}

#[test]
fn s2b_responses_are_bounded_and_shaped() {
    let cfg = small_config();
    let (model, objects) = trained_model(&cfg, 11);
    let c1 = model.features(objects[0].view()).unwrap();
    let s2b = model.s2b(objects[0].view()).unwrap();
    assert_eq!(s2b.len(), cfg.scale_sizes.len());
    for (c, s) in c1.levels().iter().zip(s2b.levels()) {
        assert_eq!(s.height(), c.height() - cfg.prototype_size + 1);
        assert_eq!(s.width(), c.width() - cfg.prototype_size + 1);
        assert_eq!(s.depth(), cfg.num_patch_prototypes);
        assert!(s.as_slice().iter().all(|v| (-1.0 - 1e-9..=1.0 + 1e-9).contains(v)));
    }

    let c2b = model.c2b(objects[0].view()).unwrap();
    assert_eq!(c2b.len(), cfg.num_patch_prototypes);
    let mut rng = StdRng::seed_from_u64(3);
    let vector = sample_vector(&s2b, 0, &mut rng, &cfg).unwrap();
    assert!(s2b.coarsest(SIMILARITY_SCALES).contains(&vector.scale_idx()));
}

#[test]
fn feedback_gain_is_bounded_for_real_responses() {
    let cfg = small_config();
    let (model, objects) = trained_model(&cfg, 21);
    let views: Vec<_> = objects.iter().map(GrayImage::view).collect();
    let responses = build_object_responses(&model, &views).unwrap();
    assert_eq!(responses.len(), 2);
    for target in 0..2 {
        let gain = feedback_gain(&responses, target, &cfg).unwrap();
        assert_eq!(gain.len(), cfg.num_patch_prototypes);
        assert!(gain.iter().all(|g| (1.0..=2.0).contains(g)));
        assert!(gain.iter().any(|&g| g == 1.0));
        assert!(gain.iter().any(|&g| (g - 2.0).abs() < 1e-12));
    }
}

#[test]
fn prototypes_need_room_on_every_sampled_scale() {
    let cfg = Config {
        scale_sizes: vec![7],
        prototype_size: 16,
        ..small_config()
    };
    let bank = FilterBank::build(&cfg.scale_sizes).unwrap();
    let image = bars(64, true);
    let mut rng = StdRng::seed_from_u64(1);
    let err = build_patch_prototypes(&[image.view()], &bank, &cfg, &mut rng).unwrap_err();
    assert!(matches!(err, VisearchError::InputShape { .. }));
    assert!(build_patch_prototypes(&[], &bank, &cfg, &mut rng).is_err());
}

#[test]
fn model_rejects_empty_prototype_list() {
    assert!(matches!(
        Model::new(small_config(), Vec::new()),
        Err(VisearchError::InputShape { .. })
    ));
}
