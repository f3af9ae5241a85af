use scv_config::*;

#[test]
fn scenario_later_layer_switches_completion_rule() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let over = dir.path().join("marker.yaml");
    std::fs::write(
        &base,
        "watch:\n  root_dir: /var/sidecars\n  completion:\n    rule: suffix\n    data_suffix: .rcd\n",
    )
    .unwrap();
    std::fs::write(
        &over,
        "watch:\n  completion:\n    rule: companion_marker\n    marker_suffix: .rcd_sig\n",
    )
    .unwrap();

    let loaded = load_layered_yaml(&[
        base.to_str().unwrap(),
        over.to_str().unwrap(),
    ])
    .unwrap();
    assert_eq!(loaded.config.watch.root_dir, "/var/sidecars");
    assert_eq!(
        loaded.config.watch.completion,
        CompletionConfig::CompanionMarker {
            data_suffix: ".rcd".to_string(),
            marker_suffix: ".rcd_sig".to_string(),
        }
    );
    assert_eq!(loaded.config.drain, DrainConfig::default());
    assert!(report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap()
        .is_clean());
}

#[test]
fn scenario_missing_file_names_the_path() {
    let err = load_layered_yaml(&["/definitely/not/here.yaml"]).unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.yaml"));
}
