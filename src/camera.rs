//! Camera state, orbit controls and the camera transition state machine.
//!
//! The [`CameraRig`] is the single authority over the camera. A transition
//! moves the camera between named [`Viewpoint`]s along an ease-in-out path
//! while orbit controls are suspended:
//!
//! ```text
//! Idle(at) --request(intent)--> Transitioning(from, to, started_at) --done--> Idle(to)
//! ```
//!
//! Requests issued while a transition is running are rejected, never queued.

use std::f32::consts::FRAC_PI_2;

use cgmath::{EuclideanSpace, InnerSpace, MetricSpace, Point3, Vector3};
use instant::Duration;
use serde::{Deserialize, Serialize};

/// A camera position together with the point it looks at.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl CameraPose {
    pub fn new(position: [f32; 3], target: [f32; 3]) -> Self {
        Self { position, target }
    }

    pub fn eye(&self) -> Point3<f32> {
        self.position.into()
    }

    pub fn look_at(&self) -> Point3<f32> {
        self.target.into()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewpointName {
    Initial,
    Computer,
    Screen,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewpoint {
    pub pose: CameraPose,
    /// Whether orbit controls are handed back once the camera arrives here.
    pub free_look: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewpoints {
    pub initial: Viewpoint,
    pub computer: Viewpoint,
    pub screen: Viewpoint,
    /// Where the intro animation starts before flying to `initial`.
    pub intro_start: CameraPose,
}

impl Viewpoints {
    pub fn get(&self, name: ViewpointName) -> &Viewpoint {
        match name {
            ViewpointName::Initial => &self.initial,
            ViewpointName::Computer => &self.computer,
            ViewpointName::Screen => &self.screen,
        }
    }
}

impl Default for Viewpoints {
    fn default() -> Self {
        Self {
            initial: Viewpoint {
                pose: CameraPose::new([-3.2, 2.6, 4.8], [0.0, 1.2, 0.0]),
                free_look: true,
            },
            computer: Viewpoint {
                pose: CameraPose::new([-0.4, 1.6, 1.6], [-0.4, 1.3, -0.6]),
                free_look: true,
            },
            screen: Viewpoint {
                pose: CameraPose::new([-0.4, 1.35, 0.35], [-0.4, 1.35, -0.6]),
                free_look: false,
            },
            intro_start: CameraPose::new([-9.0, 7.5, 14.0], [0.0, 1.2, 0.0]),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CameraIntent {
    MoveToComputer,
    MoveToScreen,
    MoveToInitial,
    IntroAnimation,
}

impl CameraIntent {
    pub fn destination(&self) -> ViewpointName {
        match self {
            CameraIntent::MoveToComputer => ViewpointName::Computer,
            CameraIntent::MoveToScreen => ViewpointName::Screen,
            CameraIntent::MoveToInitial | CameraIntent::IntroAnimation => ViewpointName::Initial,
        }
    }
}

/// The one authoritative camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    pub position: Point3<f32>,
    pub look_at: Point3<f32>,
    /// Set while a transition owns the camera.
    pub active: bool,
}

impl CameraState {
    pub fn from_pose(pose: &CameraPose) -> Self {
        Self {
            position: pose.eye(),
            look_at: pose.look_at(),
            active: false,
        }
    }

    pub fn view_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::look_at_rh(self.position, self.look_at, Vector3::unit_y())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransitionState {
    Idle {
        at: ViewpointName,
    },
    Transitioning {
        from: Point3<f32>,
        to: ViewpointName,
        started_at: Duration,
        duration: Duration,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    Started,
    Rejected,
}

pub type TransitionCallback = Box<dyn FnOnce(ViewpointName)>;

/// Quadratic ease-in-out, piecewise at the midpoint. `t` is clamped to `0..=1`.
pub fn ease_in_out_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        -1.0 + (4.0 - 2.0 * t) * t
    }
}

/// Orbit-style free look around a target point.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitControls {
    pub enabled: bool,
    pub target: Point3<f32>,
    pub distance: f32,
    pub azimuth: f32,
    pub elevation: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_elevation: f32,
    pub max_elevation: f32,
    /// Radians per pixel of drag.
    pub sensitivity: f32,
    pub zoom_factor: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            enabled: false,
            target: Point3::origin(),
            distance: 6.0,
            azimuth: 0.0,
            elevation: 0.3,
            min_distance: 1.5,
            max_distance: 12.0,
            min_elevation: 0.05,
            max_elevation: FRAC_PI_2 - 0.05,
            sensitivity: 0.005,
            zoom_factor: 1.1,
        }
    }
}

impl OrbitControls {
    /// Derives orbit parameters from the camera's current pose.
    pub fn sync_with_camera(&mut self, camera: &CameraState) {
        self.target = camera.look_at;
        let offset = camera.position - camera.look_at;
        let distance = offset.magnitude();
        if distance <= f32::EPSILON {
            return;
        }
        self.distance = distance;
        self.elevation = (offset.y / distance).clamp(-1.0, 1.0).asin();
        self.azimuth = offset.z.atan2(offset.x);
    }

    fn position(&self) -> Point3<f32> {
        let horizontal = self.distance * self.elevation.cos();
        self.target
            + Vector3::new(
                horizontal * self.azimuth.cos(),
                self.distance * self.elevation.sin(),
                horizontal * self.azimuth.sin(),
            )
    }

    fn rotate(&mut self, dx: f32, dy: f32) {
        self.azimuth += dx * self.sensitivity;
        self.elevation =
            (self.elevation + dy * self.sensitivity).clamp(self.min_elevation, self.max_elevation);
    }

    fn zoom(&mut self, delta: f32) {
        if delta > 0.0 {
            self.distance /= self.zoom_factor;
        } else if delta < 0.0 {
            self.distance *= self.zoom_factor;
        }
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);
    }

    fn apply(&self, camera: &mut CameraState) {
        camera.position = self.position();
        camera.look_at = self.target;
    }
}

/**
 * Owns the camera and its controls and animates between viewpoints.
 *
 * Time only advances through [`CameraRig::update`], so transitions are driven
 * by the frame loop and are deterministic under test.
 */
pub struct CameraRig {
    state: TransitionState,
    camera: CameraState,
    controls: OrbitControls,
    viewpoints: Viewpoints,
    move_duration: Duration,
    intro_duration: Duration,
    clock: Duration,
    on_complete: Option<TransitionCallback>,
}

impl CameraRig {
    /// A rig resting at the initial viewpoint.
    pub fn new(viewpoints: Viewpoints, move_duration: Duration, intro_duration: Duration) -> Self {
        let initial = viewpoints.initial;
        let camera = CameraState::from_pose(&initial.pose);
        let mut controls = OrbitControls::default();
        controls.sync_with_camera(&camera);
        controls.enabled = initial.free_look;
        Self {
            state: TransitionState::Idle {
                at: ViewpointName::Initial,
            },
            camera,
            controls,
            viewpoints,
            move_duration,
            intro_duration,
            clock: Duration::ZERO,
            on_complete: None,
        }
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn state(&self) -> &TransitionState {
        &self.state
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn viewpoints(&self) -> &Viewpoints {
        &self.viewpoints
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.state, TransitionState::Transitioning { .. })
    }

    /**
     * Starts a transition towards the intent's viewpoint.
     *
     * Rejected while another transition is running. `on_complete` fires exactly
     * once, when this transition arrives.
     */
    pub fn request(
        &mut self,
        intent: CameraIntent,
        on_complete: Option<TransitionCallback>,
    ) -> TransitionOutcome {
        if let TransitionState::Transitioning { to, .. } = self.state {
            log::warn!(
                "Camera request {:?} rejected: already transitioning to {:?}",
                intent,
                to
            );
            return TransitionOutcome::Rejected;
        }

        let to = intent.destination();
        let (from, duration) = match intent {
            CameraIntent::IntroAnimation => (self.viewpoints.intro_start.eye(), self.intro_duration),
            _ => (self.camera.position, self.move_duration),
        };
        log::debug!("Camera transition {:?} -> {:?} over {:?}", intent, to, duration);

        self.controls.enabled = false;
        self.camera.position = from;
        self.camera.look_at = self.viewpoints.get(to).pose.look_at();
        self.camera.active = true;
        self.on_complete = on_complete;
        self.state = TransitionState::Transitioning {
            from,
            to,
            started_at: self.clock,
            duration,
        };
        TransitionOutcome::Started
    }

    /// Advances the rig clock and the running transition by `dt`.
    pub fn update(&mut self, dt: Duration) {
        self.clock += dt;
        let TransitionState::Transitioning {
            from,
            to,
            started_at,
            duration,
        } = self.state
        else {
            return;
        };

        let destination = *self.viewpoints.get(to);
        let elapsed = self.clock.saturating_sub(started_at);
        let progress = if duration.is_zero() {
            1.0
        } else {
            elapsed.as_secs_f32() / duration.as_secs_f32()
        };

        let end = destination.pose.eye();
        let eased = ease_in_out_quad(progress);
        self.camera.position = from + (end - from) * eased;
        // orientation always follows the destination's fixed target
        self.camera.look_at = destination.pose.look_at();

        if progress >= 1.0 {
            self.camera.position = end;
            self.camera.active = false;
            self.state = TransitionState::Idle { at: to };
            self.controls.sync_with_camera(&self.camera);
            self.controls.enabled = destination.free_look;
            log::debug!(
                "Camera arrived at {:?} (free look: {}), distance travelled {:.2}",
                to,
                destination.free_look,
                from.distance(end)
            );
            if let Some(on_complete) = self.on_complete.take() {
                on_complete(to);
            }
        }
    }

    /// Orbit drag in pixels. Ignored unless the rig is idle and free look is enabled.
    pub fn drag(&mut self, dx: f32, dy: f32) -> bool {
        if !self.accepts_input() {
            return false;
        }
        self.controls.rotate(dx, dy);
        self.controls.apply(&mut self.camera);
        true
    }

    /// Positive `delta` zooms in.
    pub fn zoom(&mut self, delta: f32) -> bool {
        if !self.accepts_input() {
            return false;
        }
        self.controls.zoom(delta);
        self.controls.apply(&mut self.camera);
        true
    }

    fn accepts_input(&self) -> bool {
        self.controls.enabled && !self.is_transitioning()
    }
}
