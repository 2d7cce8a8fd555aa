use std::path::PathBuf;

use room_ngin::resources::fetch::{asset_path, extension, load_binary, sibling, stem};

#[test]
fn extension_is_lowercased_and_ignores_directories() {
    assert_eq!(extension("textures/Day.JPG").as_deref(), Some("jpg"));
    assert_eq!(extension("models/room.draco.glb").as_deref(), Some("glb"));
    assert_eq!(extension("models.v2/room"), None);
    assert_eq!(extension("README"), None);
}

#[test]
fn stem_drops_directories_and_every_extension() {
    assert_eq!(stem("models/room.draco.glb"), "room");
    assert_eq!(stem("/srv/assets/chair.glb"), "chair");
    assert_eq!(stem("leds"), "leds");
}

#[test]
fn sibling_stays_in_the_directory_of_its_file() {
    assert_eq!(sibling("models/room.gltf", "room.bin"), "models/room.bin");
    assert_eq!(
        sibling("/srv/assets/models/room.gltf", "textures/wood.png"),
        "/srv/assets/models/textures/wood.png"
    );
    assert_eq!(sibling("room.gltf", "room.bin"), "room.bin");
}

#[test]
fn relative_paths_resolve_below_the_asset_root() {
    assert!(asset_path("models/room.glb").ends_with("models/room.glb"));
    assert_eq!(
        asset_path("/srv/assets/room.glb"),
        PathBuf::from("/srv/assets/room.glb")
    );
}

#[tokio::test]
async fn missing_files_name_the_path() {
    let missing = format!("{}/tests/fixtures/nowhere.bin", env!("CARGO_MANIFEST_DIR"));

    let error = load_binary(&missing).await.unwrap_err();

    assert!(format!("{error:#}").contains("nowhere.bin"));
}

#[tokio::test]
async fn fixture_files_are_read_whole() {
    let triangle = format!("{}/tests/fixtures/triangle.bin", env!("CARGO_MANIFEST_DIR"));

    let data = load_binary(&triangle).await.unwrap();

    assert_eq!(data.len(), 36);
}
