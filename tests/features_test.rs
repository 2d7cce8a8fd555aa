use cgmath::{One, Quaternion};
use instant::Duration;
use room_ngin::{
    config::AmbientConfig,
    data_structures::scene_graph::{NodeRole, Owner, SceneGraph, SceneNode},
    features::{FeatureAnimator, ambient_animators, animate_all},
};

fn feature(name: &str, owner: Owner, children: usize) -> SceneNode {
    let mut node = SceneNode::container(name);
    for i in 0..children {
        node.add_child(SceneNode::container(format!("{name}_{i}")));
    }
    node.claim(NodeRole::Decorative, owner);
    node
}

fn graph() -> SceneGraph {
    let mut graph = SceneGraph::new();
    graph.root.add_child(feature("structure", Owner::Structure, 2));
    graph.root.add_child(feature("leds", Owner::Leds, 4));
    graph.root.add_child(feature("chair", Owner::Chair, 0));
    graph.root.add_child(feature("steam", Owner::Steam, 3));
    graph
}

fn visible(graph: &SceneGraph, owner: Owner) -> Vec<bool> {
    graph
        .subtree(owner)
        .unwrap()
        .children
        .iter()
        .map(|child| child.visible)
        .collect()
}

#[test]
fn only_present_features_are_animated() {
    let mut graph = SceneGraph::new();
    graph.root.add_child(feature("leds", Owner::Leds, 2));

    let animators = ambient_animators(&graph, &AmbientConfig::default());

    assert_eq!(animators.len(), 1);
    assert_eq!(animators[0].owner(), Owner::Leds);
}

#[test]
fn leds_alternate_every_half_period() {
    let config = AmbientConfig {
        led_blink_period_ms: 1_000,
        ..Default::default()
    };
    let mut graph = graph();
    let mut animators = ambient_animators(&graph, &config);
    let dt = Duration::from_millis(16);

    animate_all(&mut animators, &mut graph, Duration::from_millis(100), dt);
    assert_eq!(visible(&graph, Owner::Leds), vec![true, false, true, false]);

    animate_all(&mut animators, &mut graph, Duration::from_millis(600), dt);
    assert_eq!(visible(&graph, Owner::Leds), vec![false, true, false, true]);

    animate_all(&mut animators, &mut graph, Duration::from_millis(1_100), dt);
    assert_eq!(visible(&graph, Owner::Leds), vec![true, false, true, false]);
}

#[test]
fn steam_wraps_to_the_bottom() {
    let config = AmbientConfig {
        steam_rise_speed: 1.0,
        steam_height: 0.5,
        ..Default::default()
    };
    let mut graph = graph();
    let mut animators = ambient_animators(&graph, &config);

    animate_all(
        &mut animators,
        &mut graph,
        Duration::from_millis(700),
        Duration::from_millis(700),
    );

    let steam = graph.subtree(Owner::Steam).unwrap();
    for particle in &steam.children {
        let y = particle.transform.position.y;
        assert!((0.0..0.5).contains(&y), "{y}");
        assert!((y - 0.2).abs() < 1e-4);
    }
}

#[test]
fn chair_sways_around_y() {
    let mut graph = graph();
    let mut animators = ambient_animators(&graph, &AmbientConfig::default());

    animate_all(
        &mut animators,
        &mut graph,
        Duration::from_millis(1_000),
        Duration::from_millis(16),
    );

    let rotation = graph.subtree(Owner::Chair).unwrap().transform.rotation;
    assert_ne!(rotation, Quaternion::one());
    assert!(rotation.v.x.abs() < 1e-6);
    assert!(rotation.v.z.abs() < 1e-6);
}

#[test]
fn other_subtrees_are_untouched() {
    let mut graph = graph();
    let mut animators = ambient_animators(&graph, &AmbientConfig::default());

    for step in 1..20 {
        animate_all(
            &mut animators,
            &mut graph,
            Duration::from_millis(step * 250),
            Duration::from_millis(250),
        );
    }

    let structure = graph.subtree(Owner::Structure).unwrap();
    assert!(structure.children.iter().all(|child| child.visible));
    structure.walk(&mut |node| assert_eq!(node.transform, Default::default()));
}
