//! Ephemeral trail effects.
//!
//! Two effects share the decaying-history pattern:
//! - the shooting star, a short position history shifted every frame and
//!   invalidated wholesale whenever the star fades out;
//! - the warp tunnel, a fixed set of independent streaks that respawn
//!   individually once they pass the camera plane.

use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::error::{SceneError, SceneResult};
use crate::scene_graph::{EntityId, EntityKind, Owner, ResourceKind, SceneGraph, Transform};

/// Fixed-capacity ring of optional points, oldest overwritten first.
/// A `None` slot is an invalid point and never produces a segment.
#[derive(Debug, Clone)]
pub struct TrailBuffer {
    points: Vec<Option<Vec3>>,
    cursor: usize, // Next write position, also the oldest slot
}

impl TrailBuffer {
    pub fn new(capacity: usize) -> SceneResult<Self> {
        if capacity == 0 {
            return Err(SceneError::degenerate("trail_length", "must be at least 1"));
        }
        Ok(Self {
            points: vec![None; capacity],
            cursor: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.points.len()
    }

    /// Append the newest point, discarding the oldest.
    pub fn push(&mut self, point: Vec3) {
        self.points[self.cursor] = Some(point);
        self.cursor = (self.cursor + 1) % self.points.len();
    }

    /// Mark every stored point invalid.
    pub fn invalidate(&mut self) {
        for p in &mut self.points {
            *p = None;
        }
    }

    /// Slots in order, oldest to newest.
    pub fn ordered_points(&self) -> impl Iterator<Item = Option<Vec3>> + '_ {
        let len = self.points.len();
        (0..len).map(move |i| self.points[(self.cursor + i) % len])
    }

    pub fn valid_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_some()).count()
    }

    pub fn newest(&self) -> Option<Vec3> {
        let len = self.points.len();
        self.points[(self.cursor + len - 1) % len]
    }

    /// Line segments between adjacent valid points.
    pub fn segments(&self) -> Vec<(Vec3, Vec3)> {
        let ordered: Vec<Option<Vec3>> = self.ordered_points().collect();
        ordered
            .windows(2)
            .filter_map(|w| match (w[0], w[1]) {
                (Some(a), Some(b)) => Some((a, b)),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// Shooting star
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShootingStarConfig {
    pub trail_length: usize,
    /// Angular frequency of the sweep, radians per second.
    pub frequency: f32,
    /// Sweep amplitude on x and y.
    pub amplitude: [f32; 2],
    pub peak_opacity: f32,
    /// Respawn origins are drawn from `[0, range)` on x and y.
    pub spawn_range: [f32; 2],
    /// Distance in front of the camera.
    pub depth: f32,
    pub emissive_gain: f32,
}

impl Default for ShootingStarConfig {
    fn default() -> Self {
        Self {
            trail_length: 7,
            frequency: 4.0,
            amplitude: [12.0, 4.0],
            peak_opacity: 0.8,
            spawn_range: [50.0, 5.0],
            depth: 100.0,
            emissive_gain: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShootingStar {
    pub enabled: bool,
    pub origin: Vec3,
    pub head: Vec3,
    pub trail: TrailBuffer,
    /// Trail opacity for the current frame.
    pub visibility: f32,
    pub respawns: u64,
    config: ShootingStarConfig,
}

impl ShootingStar {
    pub fn new(config: ShootingStarConfig, camera_position: Vec3) -> SceneResult<Self> {
        let trail = TrailBuffer::new(config.trail_length)?;
        let origin = Vec3::new(0.0, 0.0, camera_position.z - config.depth);
        Ok(Self {
            enabled: false,
            origin,
            head: origin,
            trail,
            visibility: 0.0,
            respawns: 0,
            config,
        })
    }

    /// Flip the user toggle, returning the new state.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn emissive_intensity(&self) -> f32 {
        self.visibility * self.config.emissive_gain
    }

    /// Advance to `elapsed`. When the star is invisible the trail is wiped and
    /// the origin jumps, so no segment ever joins the old and new positions.
    pub fn update<R: Rng + ?Sized>(&mut self, elapsed: f32, camera_position: Vec3, rng: &mut R) {
        let phase = elapsed * self.config.frequency;
        self.visibility = if self.enabled {
            self.config.peak_opacity * (phase + FRAC_PI_2).sin().max(0.0)
        } else {
            0.0
        };

        if self.visibility <= 0.0 {
            self.respawn(camera_position, rng);
            return;
        }

        self.head = Vec3::new(
            self.config.amplitude[0] * phase.sin() + self.origin.x,
            self.config.amplitude[1] * phase.cos() + self.origin.y,
            self.origin.z,
        );
        self.trail.push(self.head);
    }

    fn respawn<R: Rng + ?Sized>(&mut self, camera_position: Vec3, rng: &mut R) {
        self.origin = Vec3::new(
            rng.random::<f32>() * self.config.spawn_range[0],
            rng.random::<f32>() * self.config.spawn_range[1],
            camera_position.z - self.config.depth,
        );
        self.head.z = self.origin.z;
        self.trail.invalidate();
        self.respawns += 1;
    }
}

// ============================================================================
// Warp tunnel
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    pub streak_count: usize,
    /// Half-width of the square the streaks spawn in, around the camera axis.
    pub spread: f32,
    /// Spawn distance in front of the camera, [min, max).
    pub far_distance: [f32; 2],
    pub velocity: [f32; 2],
    pub length: [f32; 2],
    pub tail_scale: f32,
    /// Exponent applied to the eased progress for tail length.
    pub tail_exponent: f32,
    pub easing: Easing,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            streak_count: 1000,
            spread: 12.0,
            far_distance: [40.0, 200.0],
            velocity: [1.0, 4.0],
            length: [2.0, 10.0],
            tail_scale: 1.0,
            tail_exponent: 1.4,
            easing: Easing::CubicIn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpStreak {
    pub head: Vec3,
    pub tail: Vec3,
    pub velocity: f32,
    pub length: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarpStatus {
    Running,
    Finished,
}

/// The warp-speed streak field shown while a transition is in flight.
#[derive(Debug)]
pub struct WarpTunnel {
    pub streaks: Vec<WarpStreak>,
    pub respawns: u64,
    started_at: f32,
    duration: f32,
    progress: f32,
    entity: Option<EntityId>,
    config: WarpConfig,
}

impl WarpTunnel {
    /// Spawn the streak field. `started_at` and `duration` are in seconds of
    /// elapsed frame time.
    pub fn start<R: Rng + ?Sized>(
        config: WarpConfig,
        camera_position: Vec3,
        started_at: f32,
        duration: f32,
        rng: &mut R,
    ) -> SceneResult<Self> {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(SceneError::degenerate("warp duration", "must be positive"));
        }
        if config.streak_count == 0 {
            return Err(SceneError::degenerate("streak_count", "must be at least 1"));
        }
        if config.far_distance[0] > config.far_distance[1] || config.far_distance[0] <= 0.0 {
            return Err(SceneError::degenerate("far_distance", "expected 0 < min <= max"));
        }

        let mut tunnel = Self {
            streaks: Vec::with_capacity(config.streak_count),
            respawns: 0,
            started_at,
            duration,
            progress: 0.0,
            entity: None,
            config,
        };
        for _ in 0..tunnel.config.streak_count {
            let streak = tunnel.spawn_streak(camera_position, rng);
            tunnel.streaks.push(streak);
        }
        Ok(tunnel)
    }

    /// Allocate the line geometry for the streaks.
    pub fn attach(&mut self, scene: &mut SceneGraph) {
        if self.entity.is_some() {
            return;
        }
        let id = scene.create(
            "warp_tunnel",
            Owner::Effect("warp"),
            Transform::default(),
            EntityKind::Lines {
                capacity: self.streaks.len(),
                opacity: 1.0,
            },
        );
        scene.allocate_resource(id, ResourceKind::Geometry, "warp streak geometry");
        scene.allocate_resource(id, ResourceKind::Material, "warp streak material");
        scene.add_to_scene(id);
        self.entity = Some(id);
    }

    /// Release the line geometry. Safe to call more than once.
    pub fn dispose(&mut self, scene: &mut SceneGraph) {
        if let Some(id) = self.entity.take() {
            scene.destroy(id);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.entity.is_some()
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Advance the field to `now` (seconds).
    pub fn update<R: Rng + ?Sized>(&mut self, now: f32, camera_position: Vec3, rng: &mut R) -> WarpStatus {
        self.progress = ((now - self.started_at) / self.duration).clamp(0.0, 1.0);
        let eased = self.config.easing.apply(self.progress);
        let tail_factor = eased.powf(self.config.tail_exponent) * self.config.tail_scale;

        for i in 0..self.streaks.len() {
            let mut streak = self.streaks[i];
            streak.head.z += streak.velocity * eased;
            if streak.head.z > camera_position.z {
                streak = self.spawn_streak(camera_position, rng);
                self.respawns += 1;
            }
            streak.tail = streak.head - Vec3::Z * (streak.length * tail_factor);
            self.streaks[i] = streak;
        }

        if self.progress >= 1.0 {
            WarpStatus::Finished
        } else {
            WarpStatus::Running
        }
    }

    fn spawn_streak<R: Rng + ?Sized>(&self, camera_position: Vec3, rng: &mut R) -> WarpStreak {
        let c = &self.config;
        let head = Vec3::new(
            camera_position.x + (rng.random::<f32>() * 2.0 - 1.0) * c.spread,
            camera_position.y + (rng.random::<f32>() * 2.0 - 1.0) * c.spread,
            camera_position.z - lerp_range(c.far_distance, rng.random::<f32>()),
        );
        WarpStreak {
            head,
            tail: head,
            velocity: lerp_range(c.velocity, rng.random::<f32>()),
            length: lerp_range(c.length, rng.random::<f32>()),
        }
    }
}

fn lerp_range(range: [f32; 2], t: f32) -> f32 {
    range[0] + (range[1] - range[0]) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    #[test]
    fn test_trail_shifts_oldest_out() {
        let mut trail = TrailBuffer::new(3).unwrap();
        for x in 1..=4 {
            trail.push(Vec3::new(x as f32, 0.0, 0.0));
        }
        let xs: Vec<f32> = trail.ordered_points().map(|p| p.unwrap().x).collect();
        assert_eq!(xs, vec![2.0, 3.0, 4.0]);
        assert_eq!(trail.newest().unwrap().x, 4.0);
        assert_eq!(trail.segments().len(), 2);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(TrailBuffer::new(0).is_err());
    }

    #[test]
    fn test_invalidated_trail_leaves_no_stale_segment() {
        let mut trail = TrailBuffer::new(7).unwrap();
        for x in 0..7 {
            trail.push(Vec3::new(x as f32, 1.0, 0.0));
        }
        for _ in 0..trail.capacity() {
            trail.invalidate();
        }
        assert_eq!(trail.valid_count(), 0);
        assert!(trail.ordered_points().all(|p| p.is_none()));

        let fresh = Vec3::new(100.0, 100.0, 100.0);
        trail.push(fresh);
        assert_eq!(trail.valid_count(), 1);
        assert!(trail.segments().is_empty());
        trail.push(fresh + Vec3::X);
        let segments = trail.segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].0, fresh);
    }

    #[test]
    fn test_disabled_star_respawns_every_frame() {
        let mut rng = Pcg64Mcg::seed_from_u64(5);
        let camera = Vec3::new(-10.0, 10.0, 40.0);
        let mut star = ShootingStar::new(ShootingStarConfig::default(), camera).unwrap();
        for frame in 0..7 {
            star.update(frame as f32 * 0.016, camera, &mut rng);
            assert_eq!(star.visibility, 0.0);
        }
        assert_eq!(star.respawns, 7);
        assert_eq!(star.trail.valid_count(), 0);
        assert_eq!(star.origin.z, camera.z - 100.0);
        assert!(star.origin.x >= 0.0 && star.origin.x < 50.0);
    }

    #[test]
    fn test_enabled_star_builds_trail_then_fades() {
        let mut rng = Pcg64Mcg::seed_from_u64(6);
        let camera = Vec3::new(0.0, 0.0, 40.0);
        let mut star = ShootingStar::new(ShootingStarConfig::default(), camera).unwrap();
        assert!(star.toggle());

        // sin(4t + pi/2) = cos(4t) is positive for t < pi/8.
        let mut t = 0.0;
        for _ in 0..7 {
            star.update(t, camera, &mut rng);
            t += 0.01;
        }
        assert!(star.visibility > 0.0);
        assert_eq!(star.trail.valid_count(), 7);
        assert!((star.emissive_intensity() - 2.0 * star.visibility).abs() < 1e-6);

        // cos(4t) < 0 for t in (pi/8, 3pi/8).
        star.update(0.6, camera, &mut rng);
        assert_eq!(star.visibility, 0.0);
        assert_eq!(star.trail.valid_count(), 0);
    }

    fn small_warp() -> WarpConfig {
        WarpConfig {
            streak_count: 64,
            ..Default::default()
        }
    }

    #[test]
    fn test_warp_streaks_stay_in_front_of_camera() {
        let mut rng = Pcg64Mcg::seed_from_u64(11);
        let camera = Vec3::new(-10.0, 10.0, 40.0);
        let mut warp = WarpTunnel::start(small_warp(), camera, 0.0, 3.0, &mut rng).unwrap();
        let mut now = 0.0;
        while warp.update(now, camera, &mut rng) == WarpStatus::Running {
            for s in &warp.streaks {
                assert!(s.head.z <= camera.z);
                assert!(s.tail.z <= s.head.z);
            }
            now += 1.0 / 60.0;
        }
        assert!(warp.respawns > 0);
        assert_eq!(warp.progress(), 1.0);
    }

    #[test]
    fn test_warp_tail_grows_with_progress() {
        let mut rng = Pcg64Mcg::seed_from_u64(12);
        let camera = Vec3::new(0.0, 0.0, 40.0);
        let config = WarpConfig {
            streak_count: 1,
            far_distance: [1000.0, 1000.0],
            ..Default::default()
        };
        let mut warp = WarpTunnel::start(config, camera, 0.0, 2.0, &mut rng).unwrap();
        warp.update(0.0, camera, &mut rng);
        let s = warp.streaks[0];
        assert_eq!(s.head, s.tail);

        warp.update(1.0, camera, &mut rng);
        let s = warp.streaks[0];
        let expected = s.length * 0.125_f32.powf(1.4);
        assert!(((s.head.z - s.tail.z) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_warp_geometry_released_once() {
        let mut rng = Pcg64Mcg::seed_from_u64(13);
        let mut scene = SceneGraph::new();
        let mut warp = WarpTunnel::start(small_warp(), Vec3::ZERO, 0.0, 1.0, &mut rng).unwrap();
        warp.attach(&mut scene);
        warp.attach(&mut scene);
        assert_eq!(scene.resource_count(), 2);
        warp.dispose(&mut scene);
        warp.dispose(&mut scene);
        assert_eq!(scene.resource_count(), 0);
        assert!(!warp.is_attached());
    }

    #[test]
    fn test_warp_rejects_bad_duration() {
        let mut rng = Pcg64Mcg::seed_from_u64(0);
        assert!(WarpTunnel::start(small_warp(), Vec3::ZERO, 0.0, 0.0, &mut rng).is_err());
    }
}
