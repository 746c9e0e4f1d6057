use glam::{Mat2, Vec2};
use tracing::{debug, trace};

use crate::physics::body_properties::{RigidPose, Rot, SolverPosition, SolverVelocity};
use crate::physics::body_set::BodySet;
use crate::physics::collidables::fixture::FixtureSet;
use crate::physics::collision_detection::contact_manifold::{ManifoldType, WorldManifold};
use crate::physics::collision_detection::narrow_phase_callbacks::ContactImpulse;
use crate::physics::collision_detection::pair_cache::PairCache;
use crate::physics::handles::ContactHandle;
use crate::physics::settings::{SimulationSettings, MAX_MANIFOLD_POINTS};
use crate::physics::solve_description::TimeStep;
use crate::utilities::math_helper::{cross, cross_sv, cross_vs};

#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityConstraintPoint {
    pub r_a: Vec2,
    pub r_b: Vec2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub normal_mass: f32,
    pub tangent_mass: f32,
    pub velocity_bias: f32,
}

/// Per-step velocity constraint derived from one contact.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactVelocityConstraint {
    pub points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    pub normal: Vec2,
    /// Inverse of `k`, used by the block solver.
    pub normal_mass: Mat2,
    pub k: Mat2,
    pub index_a: usize,
    pub index_b: usize,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
    pub friction: f32,
    pub restitution: f32,
    pub tangent_speed: f32,
    pub point_count: usize,
    pub contact: ContactHandle,
}

/// Per-step position constraint derived from one contact. Holds only local data so it stays
/// valid while the position solver moves the bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactPositionConstraint {
    pub local_points: [Vec2; MAX_MANIFOLD_POINTS],
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub index_a: usize,
    pub index_b: usize,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub local_center_a: Vec2,
    pub local_center_b: Vec2,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
    pub manifold_type: ManifoldType,
    pub radius_a: f32,
    pub radius_b: f32,
    pub point_count: usize,
}

/// World space normal, point and separation of one position constraint point.
#[derive(Debug, Clone, Copy)]
pub struct PositionSolverManifold {
    pub normal: Vec2,
    pub point: Vec2,
    pub separation: f32,
}

impl PositionSolverManifold {
    pub fn new(
        pc: &ContactPositionConstraint,
        xf_a: &RigidPose,
        xf_b: &RigidPose,
        index: usize,
    ) -> Self {
        debug_assert!(pc.point_count > 0);
        match pc.manifold_type {
            ManifoldType::Circles => {
                let point_a = xf_a.transform(pc.local_point);
                let point_b = xf_b.transform(pc.local_points[0]);
                let normal = (point_b - point_a).normalize_or_zero();
                Self {
                    normal,
                    point: 0.5 * (point_a + point_b),
                    separation: (point_b - point_a).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldType::FaceA => {
                let normal = xf_a.rotation.apply(pc.local_normal);
                let plane_point = xf_a.transform(pc.local_point);
                let clip_point = xf_b.transform(pc.local_points[index]);
                Self {
                    normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.rotation.apply(pc.local_normal);
                let plane_point = xf_b.transform(pc.local_point);
                let clip_point = xf_a.transform(pc.local_points[index]);
                Self {
                    // Ensure normal points from A to B.
                    normal: -normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SolverTuning {
    linear_slop: f32,
    velocity_threshold: f32,
    max_linear_correction: f32,
    baumgarte: f32,
    toi_baumgarte: f32,
    max_condition_number: f32,
}

impl From<&SimulationSettings> for SolverTuning {
    fn from(settings: &SimulationSettings) -> Self {
        Self {
            linear_slop: settings.linear_slop,
            velocity_threshold: settings.velocity_threshold,
            max_linear_correction: settings.max_linear_correction,
            baumgarte: settings.baumgarte,
            toi_baumgarte: settings.toi_baumgarte,
            max_condition_number: settings.max_condition_number,
        }
    }
}

/// Sequential impulse solver for contact constraints.
///
/// Constraint arrays are kept between steps and only grow; `count` marks how many entries the
/// current step uses. Body state is read from and written to solver arrays indexed by each
/// body's solver index.
#[derive(Debug, Clone)]
pub struct ContactSolver {
    step: TimeStep,
    tuning: SolverTuning,
    velocity_constraints: Vec<ContactVelocityConstraint>,
    position_constraints: Vec<ContactPositionConstraint>,
    count: usize,
}

/// Transform of a body given its center of mass position and angle.
#[inline(always)]
fn pose_from_center(c: Vec2, a: f32, local_center: Vec2) -> RigidPose {
    let rotation = Rot::from_angle(a);
    RigidPose {
        position: c - rotation.apply(local_center),
        rotation,
    }
}

impl ContactSolver {
    pub fn new(settings: &SimulationSettings) -> Self {
        Self {
            step: TimeStep {
                dt: 0.0,
                inv_dt: 0.0,
                dt_ratio: 1.0,
                velocity_iterations: settings.velocity_iterations,
                position_iterations: settings.position_iterations,
                warm_starting: settings.warm_starting,
            },
            tuning: SolverTuning::from(settings),
            velocity_constraints: Vec::new(),
            position_constraints: Vec::new(),
            count: 0,
        }
    }

    pub fn set_settings(&mut self, settings: &SimulationSettings) {
        self.tuning = SolverTuning::from(settings);
    }

    /// Step the constraints were last built for.
    #[inline(always)]
    pub fn step(&self) -> &TimeStep {
        &self.step
    }

    /// Number of constraints in use this step.
    #[inline(always)]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of constraint slots allocated across all steps.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.velocity_constraints.len()
    }

    #[inline(always)]
    pub fn velocity_constraints(&self) -> &[ContactVelocityConstraint] {
        &self.velocity_constraints[..self.count]
    }

    #[inline(always)]
    pub fn position_constraints(&self) -> &[ContactPositionConstraint] {
        &self.position_constraints[..self.count]
    }

    /// Builds constraints for `active` contacts. Every referenced body must already have its
    /// solver index assigned. Contacts with stale handles or without points are skipped.
    pub fn reset(
        &mut self,
        step: &TimeStep,
        contacts: &PairCache,
        active: &[ContactHandle],
        fixtures: &FixtureSet,
        bodies: &BodySet,
    ) {
        self.step = *step;
        self.count = 0;
        let capacity = self.velocity_constraints.len();

        for &handle in active {
            let Some(contact) = contacts.get(handle) else {
                continue;
            };
            let manifold = contact.manifold();
            let point_count = manifold.point_count;
            if point_count == 0 {
                continue;
            }
            let (Some(body_a), Some(body_b)) = (bodies.get(contact.body_a()), bodies.get(contact.body_b()))
            else {
                continue;
            };
            let (Some(fixture_a), Some(fixture_b)) =
                (fixtures.get(contact.fixture_a()), fixtures.get(contact.fixture_b()))
            else {
                continue;
            };

            let mut vc = ContactVelocityConstraint {
                friction: contact.friction(),
                restitution: contact.restitution(),
                tangent_speed: contact.tangent_speed(),
                index_a: body_a.solver_index,
                index_b: body_b.solver_index,
                inv_mass_a: body_a.inertia().inverse_mass,
                inv_mass_b: body_b.inertia().inverse_mass,
                inv_i_a: body_a.inertia().inverse_inertia,
                inv_i_b: body_b.inertia().inverse_inertia,
                contact: handle,
                point_count,
                ..Default::default()
            };

            let mut pc = ContactPositionConstraint {
                index_a: body_a.solver_index,
                index_b: body_b.solver_index,
                inv_mass_a: vc.inv_mass_a,
                inv_mass_b: vc.inv_mass_b,
                local_center_a: body_a.local_center(),
                local_center_b: body_b.local_center(),
                inv_i_a: vc.inv_i_a,
                inv_i_b: vc.inv_i_b,
                local_normal: manifold.local_normal,
                local_point: manifold.local_point,
                point_count,
                radius_a: fixture_a.shape().radius(),
                radius_b: fixture_b.shape().radius(),
                manifold_type: manifold.manifold_type,
                ..Default::default()
            };

            for (j, cp) in manifold.points().iter().enumerate() {
                let vcp = &mut vc.points[j];
                if step.warm_starting {
                    vcp.normal_impulse = step.dt_ratio * cp.normal_impulse;
                    vcp.tangent_impulse = step.dt_ratio * cp.tangent_impulse;
                }
                pc.local_points[j] = cp.local_point;
            }

            if self.count < self.velocity_constraints.len() {
                self.velocity_constraints[self.count] = vc;
                self.position_constraints[self.count] = pc;
            } else {
                self.velocity_constraints.push(vc);
                self.position_constraints.push(pc);
            }
            self.count += 1;
        }

        if self.velocity_constraints.len() > capacity {
            debug!(
                from = capacity,
                to = self.velocity_constraints.len(),
                "grew contact constraint pool"
            );
        }
    }

    /// Computes anchors, effective masses and restitution bias from the current positions.
    pub fn initialize_velocity_constraints(
        &mut self,
        contacts: &PairCache,
        positions: &[SolverPosition],
        velocities: &[SolverVelocity],
    ) {
        let mut dropped = 0;
        for (vc, pc) in self.velocity_constraints[..self.count]
            .iter_mut()
            .zip(&self.position_constraints[..self.count])
        {
            let Some(contact) = contacts.get(vc.contact) else {
                vc.point_count = 0;
                continue;
            };
            let manifold = contact.manifold();

            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);

            let SolverPosition { c: c_a, a: a_a } = positions[vc.index_a];
            let SolverVelocity { v: v_a, w: w_a } = velocities[vc.index_a];
            let SolverPosition { c: c_b, a: a_b } = positions[vc.index_b];
            let SolverVelocity { v: v_b, w: w_b } = velocities[vc.index_b];

            let xf_a = pose_from_center(c_a, a_a, pc.local_center_a);
            let xf_b = pose_from_center(c_b, a_b, pc.local_center_b);

            let world_manifold =
                WorldManifold::initialize(manifold, &xf_a, pc.radius_a, &xf_b, pc.radius_b);

            vc.normal = world_manifold.normal;
            let tangent = cross_vs(vc.normal, 1.0);

            for j in 0..vc.point_count {
                let vcp = &mut vc.points[j];

                vcp.r_a = world_manifold.points[j] - c_a;
                vcp.r_b = world_manifold.points[j] - c_b;

                let rn_a = cross(vcp.r_a, vc.normal);
                let rn_b = cross(vcp.r_b, vc.normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = cross(vcp.r_a, tangent);
                let rt_b = cross(vcp.r_b, tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Setup a velocity bias for restitution.
                vcp.velocity_bias = 0.0;
                let v_rel = vc.normal.dot(
                    v_b + cross_sv(w_b, vcp.r_b) - v_a - cross_sv(w_a, vcp.r_a),
                );
                if v_rel < -self.tuning.velocity_threshold {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }

            // If we have two points, then prepare the block solver.
            if vc.point_count == 2 {
                let (vcp1, vcp2) = (&vc.points[0], &vc.points[1]);

                let rn1_a = cross(vcp1.r_a, vc.normal);
                let rn1_b = cross(vcp1.r_b, vc.normal);
                let rn2_a = cross(vcp2.r_a, vc.normal);
                let rn2_b = cross(vcp2.r_b, vc.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                if k11 * k11 < self.tuning.max_condition_number * (k11 * k22 - k12 * k12) {
                    // K is safe to invert.
                    vc.k = Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    vc.normal_mass = vc.k.inverse();
                } else {
                    // The constraints are redundant, just use one.
                    vc.point_count = 1;
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            debug!(dropped, "ill-conditioned two-point manifolds solved as one point");
        }
    }

    /// Applies the impulses carried over from the previous step.
    pub fn warm_start(&self, velocities: &mut [SolverVelocity]) {
        for vc in &self.velocity_constraints[..self.count] {
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);
            let SolverVelocity { v: mut v_a, w: mut w_a } = velocities[vc.index_a];
            let SolverVelocity { v: mut v_b, w: mut w_b } = velocities[vc.index_b];

            let normal = vc.normal;
            let tangent = cross_vs(normal, 1.0);

            for vcp in &vc.points[..vc.point_count] {
                let p = vcp.normal_impulse * normal + vcp.tangent_impulse * tangent;
                w_a -= i_a * cross(vcp.r_a, p);
                v_a -= m_a * p;
                w_b += i_b * cross(vcp.r_b, p);
                v_b += m_b * p;
            }

            velocities[vc.index_a] = SolverVelocity { v: v_a, w: w_a };
            velocities[vc.index_b] = SolverVelocity { v: v_b, w: w_b };
        }
    }

    /// Runs one iteration over every constraint: friction first, then the normal impulses.
    pub fn solve_velocity_constraints(&mut self, velocities: &mut [SolverVelocity]) {
        for vc in &mut self.velocity_constraints[..self.count] {
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);
            let point_count = vc.point_count;

            let SolverVelocity { v: mut v_a, w: mut w_a } = velocities[vc.index_a];
            let SolverVelocity { v: mut v_b, w: mut w_b } = velocities[vc.index_b];

            let normal = vc.normal;
            let tangent = cross_vs(normal, 1.0);
            let friction = vc.friction;

            debug_assert!(point_count == 1 || point_count == 2);

            // Solve tangent constraints first because non-penetration is more important
            // than friction.
            for vcp in &mut vc.points[..point_count] {
                // Relative velocity at contact
                let dv = v_b + cross_sv(w_b, vcp.r_b) - v_a - cross_sv(w_a, vcp.r_a);

                // Compute tangent force
                let vt = dv.dot(tangent) - vc.tangent_speed;
                let lambda = vcp.tangent_mass * (-vt);

                // Clamp the accumulated force
                let max_friction = friction * vcp.normal_impulse;
                let new_impulse =
                    (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                // Apply contact impulse
                let p = lambda * tangent;
                v_a -= m_a * p;
                w_a -= i_a * cross(vcp.r_a, p);
                v_b += m_b * p;
                w_b += i_b * cross(vcp.r_b, p);
            }

            if point_count == 1 {
                let vcp = &mut vc.points[0];

                let dv = v_b + cross_sv(w_b, vcp.r_b) - v_a - cross_sv(w_a, vcp.r_a);
                let vn = dv.dot(normal);
                let lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

                // Clamp the accumulated impulse
                let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - vcp.normal_impulse;
                vcp.normal_impulse = new_impulse;

                let p = lambda * normal;
                v_a -= m_a * p;
                w_a -= i_a * cross(vcp.r_a, p);
                v_b += m_b * p;
                w_b += i_b * cross(vcp.r_b, p);
            } else {
                let accepted = solve_block(
                    vc, normal, m_a, m_b, i_a, i_b, &mut v_a, &mut w_a, &mut v_b, &mut w_b,
                );
                if !accepted {
                    trace!(contact = %vc.contact, "block solver found no valid case");
                }
            }

            velocities[vc.index_a] = SolverVelocity { v: v_a, w: w_a };
            velocities[vc.index_b] = SolverVelocity { v: v_b, w: w_b };
        }
    }

    /// Writes the accumulated impulses back into the contact manifolds for the next step.
    pub fn store_impulses(&self, contacts: &mut PairCache) {
        for vc in &self.velocity_constraints[..self.count] {
            let Some(contact) = contacts.get_mut(vc.contact) else {
                continue;
            };
            let manifold = contact.manifold_mut();
            for (point, vcp) in manifold.points_mut().iter_mut().zip(&vc.points) {
                point.normal_impulse = vcp.normal_impulse;
                point.tangent_impulse = vcp.tangent_impulse;
            }
        }
    }

    /// Impulses of every constraint solved this step, for post-solve reporting.
    pub fn impulses(&self) -> impl Iterator<Item = (ContactHandle, ContactImpulse)> + '_ {
        self.velocity_constraints[..self.count].iter().map(|vc| {
            let mut impulse = ContactImpulse {
                count: vc.point_count,
                ..Default::default()
            };
            for (j, vcp) in vc.points[..vc.point_count].iter().enumerate() {
                impulse.normal_impulses[j] = vcp.normal_impulse;
                impulse.tangent_impulses[j] = vcp.tangent_impulse;
            }
            (vc.contact, impulse)
        })
    }

    /// Runs one position correction pass. Returns true when the deepest penetration is within
    /// three linear slops.
    pub fn solve_position_constraints(&self, positions: &mut [SolverPosition]) -> bool {
        let min_separation = self.solve_positions(positions, self.tuning.baumgarte, |pc| {
            (pc.inv_mass_a, pc.inv_i_a, pc.inv_mass_b, pc.inv_i_b)
        });
        // We can't expect min_separation >= -linear_slop because we don't push the separation
        // above -linear_slop.
        min_separation >= -3.0 * self.tuning.linear_slop
    }

    /// Runs one position correction pass for a time of impact sub-step. Only the bodies at
    /// `toi_index_a` and `toi_index_b` move; every other body is treated as static.
    pub fn solve_toi_position_constraints(
        &self,
        positions: &mut [SolverPosition],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        let min_separation = self.solve_positions(positions, self.tuning.toi_baumgarte, |pc| {
            let (mut m_a, mut i_a, mut m_b, mut i_b) = (0.0, 0.0, 0.0, 0.0);
            if pc.index_a == toi_index_a || pc.index_a == toi_index_b {
                m_a = pc.inv_mass_a;
                i_a = pc.inv_i_a;
            }
            if pc.index_b == toi_index_a || pc.index_b == toi_index_b {
                m_b = pc.inv_mass_b;
                i_b = pc.inv_i_b;
            }
            (m_a, i_a, m_b, i_b)
        });
        min_separation >= -1.5 * self.tuning.linear_slop
    }

    /// Sequential Baumgarte correction. Returns the minimum separation seen.
    fn solve_positions(
        &self,
        positions: &mut [SolverPosition],
        baumgarte: f32,
        masses: impl Fn(&ContactPositionConstraint) -> (f32, f32, f32, f32),
    ) -> f32 {
        let mut min_separation = 0.0f32;

        for pc in &self.position_constraints[..self.count] {
            let (m_a, i_a, m_b, i_b) = masses(pc);

            let SolverPosition { c: mut c_a, a: mut a_a } = positions[pc.index_a];
            let SolverPosition { c: mut c_b, a: mut a_b } = positions[pc.index_b];

            // Solve normal constraints
            for j in 0..pc.point_count {
                let xf_a = pose_from_center(c_a, a_a, pc.local_center_a);
                let xf_b = pose_from_center(c_b, a_b, pc.local_center_b);

                let psm = PositionSolverManifold::new(pc, &xf_a, &xf_b, j);
                let normal = psm.normal;

                let r_a = psm.point - c_a;
                let r_b = psm.point - c_b;

                // Track max constraint error.
                min_separation = min_separation.min(psm.separation);

                // Prevent large corrections and allow slop.
                let c = (baumgarte * (psm.separation + self.tuning.linear_slop))
                    .clamp(-self.tuning.max_linear_correction, 0.0);

                // Compute the effective mass.
                let rn_a = cross(r_a, normal);
                let rn_b = cross(r_b, normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

                // Compute normal impulse
                let impulse = if k > 0.0 { -c / k } else { 0.0 };

                let p = impulse * normal;

                c_a -= m_a * p;
                a_a -= i_a * cross(r_a, p);

                c_b += m_b * p;
                a_b += i_b * cross(r_b, p);
            }

            positions[pc.index_a] = SolverPosition { c: c_a, a: a_a };
            positions[pc.index_b] = SolverPosition { c: c_b, a: a_b };
        }

        min_separation
    }
}

/// Solves the two normal impulses of a two-point constraint as a linear complementarity
/// problem. Cases are tried in order: both points active, only the first, only the second,
/// neither. The first case whose impulses and resulting normal velocities are non-negative is
/// applied. Returns false if no case was valid, in which case nothing changes.
///
/// With `x` the new total impulses, `a` the old ones, and `b` the normal velocity error
/// excluding the old impulses:
///
/// ```text
/// vn = K * x + b,   x >= 0,   vn >= 0,   x_i * vn_i = 0
/// ```
#[allow(clippy::too_many_arguments)]
fn solve_block(
    vc: &mut ContactVelocityConstraint,
    normal: Vec2,
    m_a: f32,
    m_b: f32,
    i_a: f32,
    i_b: f32,
    v_a: &mut Vec2,
    w_a: &mut f32,
    v_b: &mut Vec2,
    w_b: &mut f32,
) -> bool {
    let a = Vec2::new(vc.points[0].normal_impulse, vc.points[1].normal_impulse);
    debug_assert!(a.x >= 0.0 && a.y >= 0.0);

    let (r1_a, r1_b) = (vc.points[0].r_a, vc.points[0].r_b);
    let (r2_a, r2_b) = (vc.points[1].r_a, vc.points[1].r_b);

    // Relative velocity at contact
    let dv1 = *v_b + cross_sv(*w_b, r1_b) - *v_a - cross_sv(*w_a, r1_a);
    let dv2 = *v_b + cross_sv(*w_b, r2_b) - *v_a - cross_sv(*w_a, r2_a);

    // Compute normal velocity
    let vn1 = dv1.dot(normal);
    let vn2 = dv2.dot(normal);

    let b = Vec2::new(vn1 - vc.points[0].velocity_bias, vn2 - vc.points[1].velocity_bias);

    // Compute b'
    let b = b - vc.k * a;

    let candidates = [
        // Case 1: vn = 0, both points active.
        {
            let x = -(vc.normal_mass * b);
            (x, Vec2::ZERO)
        },
        // Case 2: vn1 = 0 and x2 = 0.
        {
            let x = Vec2::new(-vc.points[0].normal_mass * b.x, 0.0);
            (x, Vec2::new(0.0, vc.k.x_axis.y * x.x + b.y))
        },
        // Case 3: vn2 = 0 and x1 = 0.
        {
            let x = Vec2::new(0.0, -vc.points[1].normal_mass * b.y);
            (x, Vec2::new(vc.k.y_axis.x * x.y + b.x, 0.0))
        },
        // Case 4: x1 = x2 = 0.
        (Vec2::ZERO, b),
    ];

    for (x, vn) in candidates {
        if x.x >= 0.0 && x.y >= 0.0 && vn.x >= 0.0 && vn.y >= 0.0 {
            // Get the incremental impulse
            let d = x - a;

            // Apply incremental impulse
            let p1 = d.x * normal;
            let p2 = d.y * normal;
            *v_a -= m_a * (p1 + p2);
            *w_a -= i_a * (cross(r1_a, p1) + cross(r2_a, p2));

            *v_b += m_b * (p1 + p2);
            *w_b += i_b * (cross(r1_b, p1) + cross(r2_b, p2));

            // Accumulate
            vc.points[0].normal_impulse = x.x;
            vc.points[1].normal_impulse = x.y;
            return true;
        }
    }

    // No solution, give up. This is hit sometimes, but it doesn't seem to matter.
    false
}
