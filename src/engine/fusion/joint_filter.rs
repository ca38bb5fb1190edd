//! Per-joint temporal state estimation.
//!
//! One linear Kalman filter per joint, tracking position, velocity and
//! acceleration per axis (9 states). Predicted forward once per fusion
//! cycle with a constant-acceleration motion model, then corrected by
//! each sensor's aligned position observation in turn. Only positions
//! are measured; velocity and acceleration are solved for.

use crate::core::types::Vec3;

const STATE_DIM: usize = 9;

type StateVector = [f32; STATE_DIM];
type StateMatrix = [[f32; STATE_DIM]; STATE_DIM];

/// Noise and initialization parameters for a joint filter.
#[derive(Debug, Clone, Copy)]
pub struct JointFilterConfig {
    /// Process noise variance on the position states (m²).
    ///
    /// Default: 0.25
    pub process_noise_position: f32,

    /// Process noise variance on the acceleration states ((m/s²)²).
    /// Velocity states carry no direct process noise.
    ///
    /// Default: 0.025
    pub process_noise_acceleration: f32,

    /// Measurement noise variance on observed positions (m²).
    ///
    /// Default: 60.0
    pub measurement_noise_position: f32,

    /// Scalar blended into the initial covariance diagonal. Small values
    /// start the filter trusting its (zero) state and converge slowly;
    /// larger values weight early measurements heavily.
    ///
    /// Default: 0.1
    pub initial_error: f32,
}

impl Default for JointFilterConfig {
    fn default() -> Self {
        Self {
            process_noise_position: 0.25,
            process_noise_acceleration: 0.025,
            measurement_noise_position: 60.0,
            initial_error: 0.1,
        }
    }
}

/// Position/velocity/acceleration Kalman filter for one joint.
#[derive(Debug, Clone)]
pub struct JointFilter {
    config: JointFilterConfig,
    /// State: [px py pz vx vy vz ax ay az].
    state: StateVector,
    /// Error covariance.
    covariance: StateMatrix,
}

impl JointFilter {
    /// Create a filter at rest at the origin.
    pub fn new(config: JointFilterConfig) -> Self {
        let mut covariance = [[0.0f32; STATE_DIM]; STATE_DIM];
        for (i, row) in covariance.iter_mut().enumerate() {
            row[i] = config.initial_error;
        }
        Self {
            config,
            state: [0.0; STATE_DIM],
            covariance,
        }
    }

    /// Current position estimate: the fused joint position.
    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.state[0], self.state[1], self.state[2])
    }

    /// Current velocity estimate.
    #[inline]
    pub fn velocity(&self) -> Vec3 {
        Vec3::new(self.state[3], self.state[4], self.state[5])
    }

    /// Current acceleration estimate.
    #[inline]
    pub fn acceleration(&self) -> Vec3 {
        Vec3::new(self.state[6], self.state[7], self.state[8])
    }

    /// Position covariance diagonal, for confidence reporting.
    pub fn position_variance(&self) -> Vec3 {
        Vec3::new(
            self.covariance[0][0],
            self.covariance[1][1],
            self.covariance[2][2],
        )
    }

    /// Prediction step: advance the state by `dt` seconds under constant
    /// acceleration and inflate the covariance by the process noise.
    ///
    /// Runs once per fusion cycle, before any measurement.
    pub fn predict(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let half_dt_sq = 0.5 * dt * dt;

        // x' = F x with F the constant-acceleration transition.
        for axis in 0..3 {
            let p = axis;
            let v = axis + 3;
            let a = axis + 6;
            self.state[p] += self.state[v] * dt + self.state[a] * half_dt_sq;
            self.state[v] += self.state[a] * dt;
        }

        // P' = F P Fᵀ + Q.
        let f = transition_matrix(dt);
        let fp = mat_mul(&f, &self.covariance);
        self.covariance = mat_mul_transpose_b(&fp, &f);

        for axis in 0..3 {
            self.covariance[axis][axis] += self.config.process_noise_position;
            self.covariance[axis + 6][axis + 6] += self.config.process_noise_acceleration;
        }
    }

    /// Correction step with one sensor's position observation.
    ///
    /// `H = [I₃ 0 0]`: only positions are measured. Sensors reporting the
    /// same joint in one cycle call this sequentially, each narrowing the
    /// estimate further.
    pub fn update(&mut self, measurement: Vec3) {
        let z = [measurement.x, measurement.y, measurement.z];

        // Innovation covariance S = H P Hᵀ + R is the position block of P
        // plus the measurement noise.
        let mut s = [[0.0f32; 3]; 3];
        for r in 0..3 {
            for c in 0..3 {
                s[r][c] = self.covariance[r][c];
            }
            s[r][r] += self.config.measurement_noise_position;
        }
        let s_inv = match crate::core::math::invert_symmetric3(&s) {
            Some(inv) => inv,
            // S is P's position block plus a positive diagonal; a singular
            // S means the covariance has collapsed numerically. Skip the
            // correction rather than inject NaNs.
            None => return,
        };

        // Kalman gain K = P Hᵀ S⁻¹ (9×3): only P's first three columns
        // participate.
        let mut k = [[0.0f32; 3]; STATE_DIM];
        for r in 0..STATE_DIM {
            for c in 0..3 {
                let mut sum = 0.0;
                for m in 0..3 {
                    sum += self.covariance[r][m] * s_inv[m][c];
                }
                k[r][c] = sum;
            }
        }

        // State correction x += K (z − H x).
        let innovation = [
            z[0] - self.state[0],
            z[1] - self.state[1],
            z[2] - self.state[2],
        ];
        for r in 0..STATE_DIM {
            for (c, innov) in innovation.iter().enumerate() {
                self.state[r] += k[r][c] * innov;
            }
        }

        // Covariance update P = (I − K H) P.
        let mut updated = [[0.0f32; STATE_DIM]; STATE_DIM];
        for r in 0..STATE_DIM {
            for c in 0..STATE_DIM {
                let mut sum = self.covariance[r][c];
                for m in 0..3 {
                    sum -= k[r][m] * self.covariance[m][c];
                }
                updated[r][c] = sum;
            }
        }
        self.covariance = updated;
    }
}

/// Constant-acceleration transition matrix for `dt` seconds.
fn transition_matrix(dt: f32) -> StateMatrix {
    let mut f = [[0.0f32; STATE_DIM]; STATE_DIM];
    let half_dt_sq = 0.5 * dt * dt;
    for i in 0..STATE_DIM {
        f[i][i] = 1.0;
    }
    for axis in 0..3 {
        f[axis][axis + 3] = dt;
        f[axis][axis + 6] = half_dt_sq;
        f[axis + 3][axis + 6] = dt;
    }
    f
}

fn mat_mul(a: &StateMatrix, b: &StateMatrix) -> StateMatrix {
    let mut out = [[0.0f32; STATE_DIM]; STATE_DIM];
    for r in 0..STATE_DIM {
        for m in 0..STATE_DIM {
            let arm = a[r][m];
            if arm == 0.0 {
                continue;
            }
            for c in 0..STATE_DIM {
                out[r][c] += arm * b[m][c];
            }
        }
    }
    out
}

/// `a * bᵀ`.
fn mat_mul_transpose_b(a: &StateMatrix, b: &StateMatrix) -> StateMatrix {
    let mut out = [[0.0f32; STATE_DIM]; STATE_DIM];
    for r in 0..STATE_DIM {
        for c in 0..STATE_DIM {
            let mut sum = 0.0;
            for m in 0..STATE_DIM {
                sum += a[r][m] * b[c][m];
            }
            out[r][c] = sum;
        }
    }
    out
}
