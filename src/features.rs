//! Ambient per-frame animation of the room's feature subtrees.

use std::f32::consts::TAU;

use cgmath::{Deg, Quaternion, Rotation3};
use instant::Duration;

use crate::{
    config::AmbientConfig,
    data_structures::scene_graph::{Owner, SceneGraph, SceneNode},
};

/// Animates the subtree owned by one feature and nothing else.
pub trait FeatureAnimator {
    fn owner(&self) -> Owner;

    fn animate(&mut self, subtree: &mut SceneNode, elapsed: Duration, dt: Duration);
}

/// Alternates the LEDs between two groups.
pub struct LedBlink {
    period: Duration,
}

impl FeatureAnimator for LedBlink {
    fn owner(&self) -> Owner {
        Owner::Leds
    }

    fn animate(&mut self, subtree: &mut SceneNode, elapsed: Duration, _dt: Duration) {
        let half = (self.period.as_millis() / 2).max(1);
        let phase = (elapsed.as_millis() / half) % 2 == 0;
        for (i, led) in subtree.children.iter_mut().enumerate() {
            led.visible = (i % 2 == 0) == phase;
        }
    }
}

pub struct ChairSway {
    amplitude: f32,
    period: Duration,
}

impl FeatureAnimator for ChairSway {
    fn owner(&self) -> Owner {
        Owner::Chair
    }

    fn animate(&mut self, subtree: &mut SceneNode, elapsed: Duration, _dt: Duration) {
        let period = self.period.as_secs_f32().max(f32::EPSILON);
        let angle = self.amplitude * (TAU * elapsed.as_secs_f32() / period).sin();
        subtree.transform.rotation = Quaternion::from_angle_y(Deg(angle));
    }
}

/// Lets steam particles rise and wraps them back to the bottom of the column.
pub struct SteamRise {
    speed: f32,
    height: f32,
}

impl FeatureAnimator for SteamRise {
    fn owner(&self) -> Owner {
        Owner::Steam
    }

    fn animate(&mut self, subtree: &mut SceneNode, _elapsed: Duration, dt: Duration) {
        if self.height <= 0.0 {
            return;
        }
        for particle in subtree.children.iter_mut() {
            let position = &mut particle.transform.position;
            position.y = (position.y + self.speed * dt.as_secs_f32()).rem_euclid(self.height);
            let fade = 1.0 - position.y / self.height;
            particle.transform.scale = cgmath::Vector3::new(1.0, 1.0, 1.0) * (0.6 + 0.4 * fade);
        }
    }
}

/// Animators for the features that made it into the graph.
pub fn ambient_animators(graph: &SceneGraph, config: &AmbientConfig) -> Vec<Box<dyn FeatureAnimator>> {
    let mut animators: Vec<Box<dyn FeatureAnimator>> = Vec::new();
    if graph.subtree(Owner::Leds).is_some() {
        animators.push(Box::new(LedBlink {
            period: Duration::from_millis(config.led_blink_period_ms),
        }));
    }
    if graph.subtree(Owner::Chair).is_some() {
        animators.push(Box::new(ChairSway {
            amplitude: config.chair_sway_degrees,
            period: Duration::from_millis(config.chair_sway_period_ms),
        }));
    }
    if graph.subtree(Owner::Steam).is_some() {
        animators.push(Box::new(SteamRise {
            speed: config.steam_rise_speed,
            height: config.steam_height,
        }));
    }
    animators
}

/// Runs every animator on the root child its feature owns.
pub fn animate_all(
    animators: &mut [Box<dyn FeatureAnimator>],
    graph: &mut SceneGraph,
    elapsed: Duration,
    dt: Duration,
) {
    for animator in animators.iter_mut() {
        let owner = animator.owner();
        if let Some(subtree) = graph
            .root
            .children
            .iter_mut()
            .find(|child| child.owner == owner)
        {
            animator.animate(subtree, elapsed, dt);
        }
    }
}
