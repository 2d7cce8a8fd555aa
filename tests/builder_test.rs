use room_ngin::{
    builder::SceneGraphBuilder,
    config::AmbientConfig,
    data_structures::{
        material::{BakedVariant, MaterialVariant},
        scene_graph::{NodeRole, Owner, SceneGraph, SceneNode},
    },
    engine::{Engine, LoadedResource},
    manifest::{AssetManifest, ResourceKind},
};

use crate::common::test_utils::{MockEngine, room_engine, test_manifest};

mod common;

async fn load(engine: &MockEngine, kind: ResourceKind, path: &str) -> LoadedResource {
    engine.load(kind, path).await.unwrap()
}

fn material_label<'a>(graph: &'a SceneGraph, node: &str) -> &'a str {
    let node = graph.root.find(node).unwrap();
    &node.mesh.as_ref().unwrap().materials[0].label
}

struct Fixture {
    engine: MockEngine,
    manifest: AssetManifest,
    ambient: AmbientConfig,
    graph: SceneGraph,
}

impl Fixture {
    fn new() -> Self {
        Self {
            engine: room_engine(),
            manifest: test_manifest(),
            ambient: AmbientConfig::default(),
            graph: SceneGraph::new(),
        }
    }

    async fn attach(&mut self, name: &str, kind: ResourceKind, path: &str) -> Result<(), LoadedResource> {
        let resource = load(&self.engine, kind, path).await;
        SceneGraphBuilder::new(&mut self.graph, &self.engine, &self.manifest, &self.ambient)
            .attach(name, resource)
    }

    fn finalize(&mut self) -> usize {
        SceneGraphBuilder::new(&mut self.graph, &self.engine, &self.manifest, &self.ambient).finalize()
    }
}

#[tokio::test]
async fn structure_is_claimed_and_screens_are_tagged() {
    let mut fixture = Fixture::new();
    fixture
        .attach("room", ResourceKind::Mesh, "models/room.glb")
        .await
        .unwrap();

    let structure = fixture.graph.subtree(Owner::Structure).unwrap();
    assert_eq!(structure.find("desk").unwrap().role, NodeRole::Structural);
    let screen = structure.find("screen_left").unwrap();
    assert_eq!(screen.role, NodeRole::Screen);
    assert_eq!(screen.owner, Owner::Screens);
    assert!(fixture.graph.is_attached("room"));
}

#[tokio::test]
async fn second_attach_of_the_same_asset_is_rejected() {
    let mut fixture = Fixture::new();
    fixture
        .attach("room", ResourceKind::Mesh, "models/room.glb")
        .await
        .unwrap();
    let nodes = fixture.graph.node_count();

    let rejected = fixture.attach("room", ResourceKind::Mesh, "models/room.glb").await;

    assert!(matches!(rejected, Err(LoadedResource::Mesh(_))));
    assert_eq!(fixture.graph.node_count(), nodes);
}

#[tokio::test]
async fn wrong_kind_and_unknown_names_are_rejected() {
    let mut fixture = Fixture::new();

    let wrong_kind = fixture.attach("chair", ResourceKind::Texture, "textures/chair.png").await;
    let unknown = fixture.attach("plant", ResourceKind::Mesh, "models/plant.glb").await;

    assert!(matches!(wrong_kind, Err(LoadedResource::Texture(_))));
    assert!(matches!(unknown, Err(LoadedResource::Mesh(_))));
    assert_eq!(fixture.graph.node_count(), 1);
}

#[tokio::test]
async fn features_claim_their_own_subtrees() {
    let mut fixture = Fixture::new();
    fixture
        .attach("chair", ResourceKind::Mesh, "models/chair.glb")
        .await
        .unwrap();
    fixture
        .attach("leds", ResourceKind::Mesh, "models/leds.glb")
        .await
        .unwrap();

    let chair = fixture.graph.subtree(Owner::Chair).unwrap();
    assert_eq!(chair.role, NodeRole::Interactive);
    let leds = fixture.graph.subtree(Owner::Leds).unwrap();
    assert_eq!(leds.children.len(), 3);
    assert!(leds.children.iter().all(|led| led.role == NodeRole::Decorative));
}

#[tokio::test]
async fn video_arriving_before_the_structure_is_bound_later() {
    let mut fixture = Fixture::new();
    fixture
        .attach("screen_left", ResourceKind::Video, "videos/left.mp4")
        .await
        .unwrap();
    assert_eq!(fixture.graph.parked_videos.len(), 1);

    fixture
        .attach("room", ResourceKind::Mesh, "models/room.glb")
        .await
        .unwrap();

    assert!(fixture.graph.parked_videos.is_empty());
    assert_eq!(material_label(&fixture.graph, "screen_left"), "video:screen_left");
    assert!(fixture.engine.position("play videos/left.mp4").is_some());
}

#[tokio::test]
async fn baked_pass_follows_the_rule_order() {
    let mut fixture = Fixture::new();
    fixture
        .attach("room", ResourceKind::Mesh, "models/room.glb")
        .await
        .unwrap();
    fixture
        .attach("screen_left", ResourceKind::Video, "videos/left.mp4")
        .await
        .unwrap();
    fixture
        .attach("baked_night", ResourceKind::Texture, "textures/night.jpg")
        .await
        .unwrap();
    fixture
        .attach("baked_day", ResourceKind::Texture, "textures/day.jpg")
        .await
        .unwrap();

    let assigned = fixture.finalize();

    // wall_north, ceiling and desk; both screens are skipped
    assert_eq!(assigned, 3);
    let graph = &fixture.graph;
    assert_eq!(material_label(graph, "screen_left"), "video:screen_left");
    assert_eq!(material_label(graph, "screen_right"), "models/room.glb#material");
    assert_eq!(material_label(graph, "desk"), "baked");

    let wall = &graph.root.find("wall_north").unwrap().mesh.as_ref().unwrap().materials[0];
    let ceiling = &graph.root.find("ceiling").unwrap().mesh.as_ref().unwrap().materials[0];
    assert_eq!(wall.id, ceiling.id);
    assert!(matches!(
        wall.variant,
        MaterialVariant::Baked(BakedVariant::WallVariant { .. })
    ));
    // layers are bound in layer order, not arrival order
    let layers: Vec<_> = wall.textures.iter().map(|t| t.label.as_str()).collect();
    assert_eq!(layers, vec!["textures/day.jpg", "textures/night.jpg"]);
}

#[tokio::test]
async fn wall_only_structure_creates_only_the_wall_variant() {
    let mut fixture = Fixture {
        engine: MockEngine::new().with_mesh("room", &["wall_north", "ceiling", "screen_left"]),
        ..Fixture::new()
    };
    fixture
        .attach("room", ResourceKind::Mesh, "models/room.glb")
        .await
        .unwrap();
    fixture
        .attach("baked_day", ResourceKind::Texture, "textures/day.jpg")
        .await
        .unwrap();

    assert_eq!(fixture.finalize(), 2);

    assert_eq!(material_label(&fixture.graph, "wall_north"), "baked-wall");
    assert!(fixture.graph.retired.iter().all(|material| !material.is_baked()));
}

#[tokio::test]
async fn shared_native_material_is_only_retired_once_unused() {
    let mut fixture = Fixture::new();
    fixture
        .attach("room", ResourceKind::Mesh, "models/room.glb")
        .await
        .unwrap();
    fixture
        .attach("baked_day", ResourceKind::Texture, "textures/day.jpg")
        .await
        .unwrap();

    fixture.finalize();

    // screen_right still draws with the native material
    assert!(
        fixture
            .graph
            .retired
            .iter()
            .all(|material| material.label != "models/room.glb#material")
    );
}

#[tokio::test]
async fn without_baked_layers_the_structure_keeps_its_materials() {
    let mut fixture = Fixture::new();
    fixture
        .attach("room", ResourceKind::Mesh, "models/room.glb")
        .await
        .unwrap();

    assert_eq!(fixture.finalize(), 0);
    assert_eq!(material_label(&fixture.graph, "desk"), "models/room.glb#material");
}

#[tokio::test]
async fn unmatched_video_is_left_for_release() {
    let mut fixture = Fixture::new();
    fixture
        .attach("screen_left", ResourceKind::Video, "videos/left.mp4")
        .await
        .unwrap();

    fixture.finalize();

    assert!(fixture.graph.parked_videos.is_empty());
    assert_eq!(fixture.graph.unused.len(), 1);
    assert!(fixture.graph.unused[0].is_video());
}

#[tokio::test]
async fn steam_is_built_from_particles() {
    let mut fixture = Fixture::new();
    fixture
        .attach("steam", ResourceKind::Texture, "textures/steam.png")
        .await
        .unwrap();

    let steam = fixture.graph.subtree(Owner::Steam).unwrap();
    assert_eq!(steam.children.len(), fixture.ambient.steam_particles);
    let material = steam.children[0].mesh.as_ref().unwrap().materials[0].id;
    assert!(
        steam
            .children
            .iter()
            .all(|particle| particle.mesh.as_ref().unwrap().materials[0].id == material)
    );
}

#[tokio::test]
async fn environment_is_attached_once() {
    let engine = MockEngine::new();
    let manifest = test_manifest();
    let ambient = AmbientConfig::default();
    let mut graph = SceneGraph::new();
    let first = load(&engine, ResourceKind::Panorama, "environment/studio.hdr").await;
    let second = load(&engine, ResourceKind::Panorama, "environment/night.hdr").await;

    let mut builder = SceneGraphBuilder::new(&mut graph, &engine, &manifest, &ambient);
    builder.attach("environment", first).unwrap();
    assert!(builder.attach("environment", second).is_err());
    assert_eq!(graph.environment.as_ref().unwrap().label, "environment/studio.hdr");
}

#[test]
fn walking_the_world_skips_hidden_subtrees() {
    let mut root = SceneNode::container("root");
    let mut hidden = SceneNode::container("hidden");
    hidden.add_child(SceneNode::container("child"));
    hidden.visible = false;
    root.add_child(hidden);
    root.add_child(SceneNode::container("shown"));

    let mut visited = Vec::new();
    root.visit_world(&Default::default(), &mut |node, _| visited.push(node.name.clone()));

    assert_eq!(visited, vec!["root", "shown"]);
}
