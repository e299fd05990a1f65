use visearch::{
    Config, FeatureHierarchy, FeatureStack, FloatMode, GrayImage, ImageView, ObjectPrototypeSet,
    PatchPrototype, VectorPrototype, VisearchError,
};

#[test]
fn image_view_rejects_invalid_dimensions() {
    let data = [0.0f64; 4];

    let err = ImageView::from_slice(&data, 0, 1).err().unwrap();
    assert_eq!(
        err,
        VisearchError::InvalidDimensions {
            width: 0,
            height: 1,
        }
    );

    let err = ImageView::new(&data, 4, 1, 3).err().unwrap();
    assert_eq!(
        err,
        VisearchError::InvalidStride {
            width: 4,
            stride: 3,
        }
    );

    let err = ImageView::from_slice(&data, 3, 2).err().unwrap();
    assert_eq!(err, VisearchError::BufferTooSmall { needed: 6, got: 4 });
}

#[test]
fn roi_shares_the_parent_stride() {
    let data: Vec<f64> = (0..20).map(f64::from).collect();
    let view = ImageView::new(&data, 4, 4, 5).unwrap();
    let roi = view.roi(1, 2, 2, 2).unwrap();
    assert_eq!(roi.stride(), 5);
    assert_eq!(roi.row(0), Some(&[11.0, 12.0][..]));
    assert_eq!(roi.get(1, 1), Some(&17.0));

    let err = view.roi(3, 0, 2, 1).err().unwrap();
    assert!(matches!(err, VisearchError::RoiOutOfBounds { x: 3, .. }));
}

#[test]
fn gray_image_copies_strided_views() {
    let data = [1.0, 2.0, -1.0, 3.0, 4.0, -1.0];
    let view = ImageView::new(&data, 2, 2, 3).unwrap();
    let image = GrayImage::from_view(view).unwrap();
    assert_eq!(image.data(), &[1.0, 2.0, 3.0, 4.0]);
    let bytes = GrayImage::from_u8(&[0, 255], 2, 1).unwrap();
    assert_eq!(bytes.data(), &[0.0, 255.0]);
}

#[test]
fn config_validation_reports_input_shape() {
    let cfg = Config {
        pool_size: 0,
        ..Config::default()
    };
    assert!(matches!(
        cfg.validate(),
        Err(VisearchError::InputShape {
            context: "config",
            ..
        })
    ));
    let cfg = Config {
        inhibition_sigma: 0.0,
        ..Config::default()
    };
    assert!(cfg.validate().is_err());
    assert_eq!(Config::default().float_mode, FloatMode::Trap);
}

#[test]
fn patch_prototype_counts_kept_cells() {
    let mut weights = vec![-1.0; 2 * 2 * 3];
    weights[1] = 0.6;
    weights[6] = 0.8;
    weights[11] = 0.0;
    let proto = PatchPrototype::from_weights(2, 3, weights).unwrap();
    assert_eq!(proto.kept_count(), 3);
    assert_eq!(proto.weight(0, 1, 0), 0.6);
    assert_eq!(proto.weight(1, 0, 1), 0.8);

    // Zero-weight cells are kept but never visited by the matcher.
    let plan = proto.plan();
    assert_eq!(plan.taps().len(), 2);
    assert!((plan.weight_sq_sum() - 1.0).abs() < 1e-12);

    assert!(PatchPrototype::from_weights(2, 3, vec![0.0; 5]).is_err());
}

#[test]
fn object_prototype_set_validates_shape() {
    assert!(ObjectPrototypeSet::new(Vec::new()).is_err());
    assert!(ObjectPrototypeSet::new(vec![vec![]]).is_err());
    let ragged = vec![
        vec![VectorPrototype::new(0, 0, vec![1.0, 0.0])],
        vec![VectorPrototype::new(1, 0, vec![1.0])],
    ];
    assert!(ObjectPrototypeSet::new(ragged).is_err());

    let set = ObjectPrototypeSet::new(vec![
        vec![VectorPrototype::new(0, 1, vec![0.6, 0.8])],
        vec![
            VectorPrototype::new(1, 0, vec![1.0, 0.0]),
            VectorPrototype::new(1, 1, vec![0.0, 1.0]),
        ],
    ])
    .unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.dim(), 2);
    assert_eq!(set.object(1).map(<[_]>::len), Some(2));
}

#[test]
fn hierarchy_iterates_rf_sizes_in_order() {
    let stacks = vec![
        FeatureStack::zeros(4, 4, 2).unwrap(),
        FeatureStack::zeros(2, 2, 2).unwrap(),
    ];
    let hierarchy = FeatureHierarchy::new(stacks, vec![7, 9]).unwrap();
    let rfs: Vec<usize> = hierarchy.iter().map(|(rf, _)| rf).collect();
    assert_eq!(rfs, vec![7, 9]);
    assert_eq!(hierarchy.level(1).unwrap().height(), 2);
    assert!(FeatureStack::zeros(0, 3, 1).is_err());
}
