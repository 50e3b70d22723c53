use slidecube_core::manifest::ExperimentManifest;

fn manifest() -> ExperimentManifest {
    ExperimentManifest {
        image_path: "/data/slide.vsi".into(),
        tile_size_x: 512,
        tile_size_y: 512,
        dimension_order: "XYCZT".into(),
        sel_level: 1,
        pixel_size_sel: 0.6894,
        layer_names: vec!["ppl 10x".into(), "xpl 10x".into()],
        series_span: vec![1, 4],
    }
}

#[test]
fn test_json_field_names() {
    let json = serde_json::to_string_pretty(&manifest()).unwrap();
    for key in [
        "image_path",
        "tileSizeX",
        "tileSizeY",
        "dimension_order",
        "sel_level",
        "pixel_size_sel",
        "layer_names",
        "series_span",
    ] {
        assert!(json.contains(&format!("\"{key}\"")), "missing key {key}");
    }
}

#[test]
fn test_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("experimental_metadata.json");
    manifest().save(&path).unwrap();

    let restored = ExperimentManifest::load(&path).unwrap();
    assert_eq!(restored.tile_size_x, 512);
    assert_eq!(restored.sel_level, 1);
    assert_eq!(restored.layer_names, vec!["ppl 10x", "xpl 10x"]);
    assert_eq!(restored.series_span, vec![1, 4]);
}

#[test]
fn test_unbalanced_spans_rejected() {
    let mut bad = manifest();
    bad.series_span.pop();
    assert!(bad.validate().is_err());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("experimental_metadata.json");
    assert!(bad.save(&path).is_err());
}
