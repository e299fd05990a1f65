#![cfg(feature = "rayon")]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use visearch::conv::s1_layer;
use visearch::search::attention::priority_map;
use visearch::search::s2b::s2b_layer;
use visearch::search::similarity::s3_scores;
use visearch::{
    build_patch_prototypes, Config, FeatureHierarchy, FeatureStack, FilterBank, GrayImage,
    ObjectPrototypeSet, VectorPrototype,
};

fn configs() -> (Config, Config) {
    let seq = Config {
        scale_sizes: vec![7, 9, 11, 13],
        prototype_size: 5,
        num_kept_weights: 20,
        num_patch_prototypes: 10,
        parallel: false,
        ..Config::default()
    };
    let par = Config {
        parallel: true,
        ..seq.clone()
    };
    (seq, par)
}

fn noise_image(seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    GrayImage::from_fn(72, 64, |_, _| rng.random_range(0.0..255.0)).unwrap()
}

#[test]
fn parallel_matches_sequential_s1_and_s2b() {
    let (seq, par) = configs();
    let bank = FilterBank::build(&seq.scale_sizes).unwrap();
    let image = noise_image(4);

    let s1_seq = s1_layer(image.view(), &bank, &seq).unwrap();
    let s1_par = s1_layer(image.view(), &bank, &par).unwrap();
    assert_eq!(s1_seq, s1_par);

    let mut rng = StdRng::seed_from_u64(12);
    let patches = build_patch_prototypes(&[image.view()], &bank, &seq, &mut rng).unwrap();
    let plans: Vec<_> = patches.iter().map(|p| p.plan()).collect();
    let c1 = visearch::c_layer(&s1_seq, seq.pool_size).unwrap();
    let s2b_seq = s2b_layer(&c1, &plans, &seq).unwrap();
    let s2b_par = s2b_layer(&c1, &plans, &par).unwrap();
    assert_eq!(s2b_seq, s2b_par);
}

#[test]
fn parallel_matches_sequential_priority_and_similarity() {
    let (seq, par) = configs();
    let mut rng = StdRng::seed_from_u64(77);
    let levels = [(10, 12), (7, 8), (4, 5)]
        .iter()
        .map(|&(h, w)| FeatureStack::from_fn(h, w, 6, |_, _, _| rng.random_range(0.0..1.0)).unwrap())
        .collect();
    let lip = FeatureHierarchy::new(levels, vec![7, 11, 15]).unwrap();

    let map_seq = priority_map(&lip, 64, 56, &seq).unwrap();
    let map_par = priority_map(&lip, 64, 56, &par).unwrap();
    assert_eq!(map_seq, map_par);

    let objects = (0..5)
        .map(|id| {
            (0..3)
                .map(|_| VectorPrototype::new(id, 2, (0..6).map(|_| rng.random_range(0.0..1.0)).collect()))
                .collect()
        })
        .collect();
    let set = ObjectPrototypeSet::new(objects).unwrap();
    assert_eq!(s3_scores(&lip, &set, &seq).unwrap(), s3_scores(&lip, &set, &par).unwrap());
}
