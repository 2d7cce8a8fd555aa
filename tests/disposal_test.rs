use room_ngin::{
    builder::SceneGraphBuilder,
    config::AmbientConfig,
    context::SceneContext,
    data_structures::{
        material::{BakedLayer, BakedVariant, MaterialVariant},
        scene_graph::SceneGraph,
    },
    disposal::DisposalManager,
    engine::{Engine, LoadedResource},
    manifest::{AssetManifest, ResourceKind},
};

use crate::common::test_utils::{MockEngine, room_engine, test_manifest};

mod common;

/// A fully built context with a renderer, a scheduled frame and every asset of the test manifest.
async fn built_context(engine: &MockEngine, manifest: &AssetManifest) -> SceneContext {
    let ambient = AmbientConfig::default();
    let mut ctx = SceneContext {
        renderer: Some(engine.create_renderer(()).await.unwrap()),
        scene: Some(SceneGraph::new()),
        frame: Some(engine.request_frame()),
        ..Default::default()
    };
    let scene = ctx.scene.as_mut().unwrap();
    for entry in manifest.entries() {
        let path = entry.fallback.as_deref().unwrap_or(&entry.path);
        let resource = engine.load(entry.kind, path).await.unwrap();
        SceneGraphBuilder::new(scene, engine, manifest, &ambient)
            .attach(&entry.name, resource)
            .unwrap();
    }
    SceneGraphBuilder::new(scene, engine, manifest, &ambient).finalize();
    ctx
}

#[tokio::test]
async fn everything_is_released_exactly_once() {
    let engine = room_engine();
    let manifest = test_manifest();
    let mut ctx = built_context(&engine, &manifest).await;
    assert!(engine.live_count() > 0);
    let mut disposal = DisposalManager::new();

    disposal.dispose_all(&engine, &mut ctx);
    disposal.dispose_all(&engine, &mut ctx);

    assert_eq!(engine.live_count(), 0);
    assert_eq!(engine.double_releases(), 0);
    assert!(ctx.is_empty());
    assert_eq!(disposal.released_count(), engine.released().len());
}

#[tokio::test]
async fn retired_materials_are_released_before_teardown() {
    let engine = room_engine();
    let manifest = test_manifest();
    let mut ctx = built_context(&engine, &manifest).await;
    let mut disposal = DisposalManager::new();

    let retired: Vec<_> = {
        let scene = ctx.scene.as_mut().unwrap();
        let ids = scene.retired.iter().map(|material| material.id).collect();
        disposal.release_retired(&engine, scene);
        assert!(scene.retired.is_empty());
        ids
    };
    assert!(retired.iter().all(|id| disposal.is_released(*id)));

    disposal.dispose_all(&engine, &mut ctx);

    assert_eq!(engine.live_count(), 0);
    assert_eq!(engine.double_releases(), 0);
}

#[tokio::test]
async fn retired_baked_material_leaves_its_layers_alone() {
    let engine = MockEngine::new();
    let mut scene = SceneGraph::new();
    let day = match engine.load(ResourceKind::Texture, "textures/day.jpg").await.unwrap() {
        LoadedResource::Texture(texture) => texture,
        other => panic!("unexpected {other:?}"),
    };
    scene.baked_layers.push((BakedLayer::Day, day.clone()));
    let baked = engine
        .create_material(
            "baked",
            &MaterialVariant::Baked(BakedVariant::Standard),
            std::slice::from_ref(&day),
        )
        .unwrap();
    let material = baked.id;
    scene.retired.push(baked);
    let mut disposal = DisposalManager::new();

    disposal.release_retired(&engine, &mut scene);

    assert!(!engine.is_live(material));
    assert!(engine.is_live(day.id));

    let mut ctx = SceneContext {
        scene: Some(scene),
        ..Default::default()
    };
    disposal.dispose_all(&engine, &mut ctx);
    assert_eq!(engine.live_count(), 0);
    assert_eq!(engine.double_releases(), 0);
}

#[tokio::test]
async fn videos_stop_before_their_texture_is_released() {
    let engine = room_engine();
    let manifest = test_manifest();
    let mut ctx = built_context(&engine, &manifest).await;
    let video = ctx
        .scene
        .as_ref()
        .and_then(|scene| scene.root.find("screen_left"))
        .and_then(|node| node.mesh.as_ref())
        .map(|binding| binding.materials[0].textures[0].id)
        .unwrap();

    DisposalManager::new().dispose_all(&engine, &mut ctx);

    let pause = engine.position("pause videos/left.mp4").unwrap();
    let detach = engine.position("detach videos/left.mp4").unwrap();
    let release = engine.position(&format!("release {video}")).unwrap();
    assert!(pause < detach);
    assert!(detach < release);
}

#[tokio::test]
async fn renderer_goes_last_and_the_frame_is_cancelled() {
    let engine = room_engine();
    let manifest = test_manifest();
    let mut ctx = built_context(&engine, &manifest).await;
    let frame = ctx.frame.unwrap();

    DisposalManager::new().dispose_all(&engine, &mut ctx);

    let journal = engine.journal();
    assert!(journal.last().unwrap().starts_with("release_renderer"));
    assert_eq!(engine.cancelled(), vec![frame]);
}

#[tokio::test]
async fn partial_context_is_torn_down() {
    let engine = MockEngine::new();
    let mut ctx = SceneContext {
        renderer: Some(engine.create_renderer(()).await.unwrap()),
        ..Default::default()
    };

    DisposalManager::new().dispose_all(&engine, &mut ctx);

    assert_eq!(engine.live_count(), 0);
    assert!(engine.cancelled().is_empty());
}

#[tokio::test]
async fn orphans_are_released_with_their_subtree() {
    let engine = room_engine();
    let mut disposal = DisposalManager::new();
    let mesh = engine.load(ResourceKind::Mesh, "models/room.glb").await.unwrap();
    let video = engine.load(ResourceKind::Video, "videos/left.mp4").await.unwrap();
    assert!(matches!(mesh, LoadedResource::Mesh(_)));

    disposal.release_orphan(&engine, mesh);
    disposal.release_orphan(&engine, video);

    assert_eq!(engine.live_count(), 0);
    assert_eq!(engine.double_releases(), 0);
    assert!(engine.position("detach videos/left.mp4").is_some());
}
