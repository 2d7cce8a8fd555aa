use room_ngin::{
    RoomConfig, RoomError,
    camera::Viewpoints,
    data_structures::material::BakedLayer,
    manifest::{AssetEntry, AssetManifest, AssetRole, ResourceKind, SceneMarkers},
};

const MANIFEST: &str = r#"{
    "entries": [
        { "name": "room", "path": "models/room.draco.glb", "fallback": "models/room.glb",
          "kind": "mesh", "role": "structure", "mandatory": true },
        { "name": "baked_day", "path": "textures/day.jpg", "kind": "texture",
          "role": { "baked": "day" } },
        { "name": "screen_left", "path": "videos/left.mp4", "kind": "video",
          "role": { "screen": { "target": "screen_left" } } }
    ]
}"#;

#[test]
fn manifest_is_read_from_json() {
    let manifest = AssetManifest::from_json(MANIFEST).unwrap();

    assert_eq!(manifest.entries().len(), 3);
    let room = manifest.get("room").unwrap();
    assert!(room.mandatory);
    assert_eq!(room.fallback.as_deref(), Some("models/room.glb"));
    assert_eq!(room.role, AssetRole::Structure);
    assert_eq!(
        manifest.get("baked_day").unwrap().role,
        AssetRole::Baked(BakedLayer::Day)
    );
    assert!(!manifest.get("screen_left").unwrap().mandatory);
    assert_eq!(*manifest.viewpoints(), Viewpoints::default());
    assert_eq!(*manifest.markers(), SceneMarkers::default());
}

#[test]
fn duplicate_names_are_rejected() {
    let entries = vec![
        AssetEntry::new("chair", "models/chair.glb", ResourceKind::Mesh, AssetRole::Chair),
        AssetEntry::new("chair", "models/chair2.glb", ResourceKind::Mesh, AssetRole::Chair),
    ];

    let result = AssetManifest::new(entries, Viewpoints::default());

    assert!(matches!(result, Err(RoomError::Manifest(_))));
}

#[test]
fn kind_must_match_the_role() {
    let entries = vec![AssetEntry::new(
        "steam",
        "textures/steam.png",
        ResourceKind::Mesh,
        AssetRole::Steam,
    )];

    assert!(matches!(
        AssetManifest::new(entries, Viewpoints::default()),
        Err(RoomError::Manifest(_))
    ));
}

#[test]
fn only_one_structure_is_allowed() {
    let entries = vec![
        AssetEntry::new("a", "models/a.glb", ResourceKind::Mesh, AssetRole::Structure),
        AssetEntry::new("b", "models/b.glb", ResourceKind::Mesh, AssetRole::Structure),
    ];

    assert!(AssetManifest::new(entries, Viewpoints::default()).is_err());
}

#[test]
fn malformed_json_is_an_error() {
    assert!(matches!(
        AssetManifest::from_json("{ \"entries\": [ { \"name\": 1 } ] }"),
        Err(RoomError::Json(_))
    ));
}

#[test]
fn operator_room_is_complete() {
    let manifest = AssetManifest::operator_room();

    let mandatory: Vec<_> = manifest
        .entries()
        .iter()
        .filter(|entry| entry.mandatory)
        .map(|entry| entry.name.as_str())
        .collect();
    assert_eq!(mandatory, vec!["room"]);
    for entry in manifest.entries() {
        assert_eq!(entry.role.expected_kind(), entry.kind, "{}", entry.name);
    }
    let videos = manifest
        .entries()
        .iter()
        .filter(|entry| entry.kind == ResourceKind::Video)
        .count();
    assert_eq!(videos, 2);
}

#[test]
fn markers_match_case_insensitively() {
    let markers = SceneMarkers::default();

    assert!(markers.is_screen("Screen_Left"));
    assert!(markers.is_structural("WALL_north"));
    assert!(markers.is_structural("ceiling.001"));
    assert!(!markers.is_structural("desk"));
}

#[test]
fn partial_config_keeps_the_defaults() {
    let config = RoomConfig::from_json(r#"{ "play_intro": false, "ambient": { "steam_particles": 3 } }"#)
        .unwrap();

    assert!(!config.play_intro);
    assert_eq!(config.ambient.steam_particles, 3);
    assert_eq!(config.move_duration_ms, RoomConfig::default().move_duration_ms);
    assert_eq!(config.storage_key, "operator_room_state");
    assert_eq!(
        config.ambient.led_blink_period_ms,
        RoomConfig::default().ambient.led_blink_period_ms
    );
}
