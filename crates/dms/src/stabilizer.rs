//! Landmark stabilization
//!
//! Two independent smoothers:
//! - a constant-velocity Kalman filter over the tracked eye center,
//! - exponential smoothing over the 12 raw eye landmarks.
//!
//! Neither feeds the decision path; they produce stable positions for
//! overlays and downstream consumers.

use ndarray::{arr2, Array1, Array2};

use crate::geometry::Point;

/// Constant-velocity Kalman filter.
///
/// State `[x, y, vx, vy]`, measurement `[x, y]`, one time step per frame.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    /// State estimate
    x: Array1<f64>,
    /// State covariance
    p: Array2<f64>,
    /// Transition
    f: Array2<f64>,
    /// Observation
    h: Array2<f64>,
    /// Process noise covariance
    q: Array2<f64>,
    /// Measurement noise covariance
    r: Array2<f64>,
}

impl KalmanFilter {
    /// Initialize at an observed position with zero velocity and unit covariance
    pub fn new(initial: Point, process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            x: Array1::from(vec![initial.x, initial.y, 0.0, 0.0]),
            p: Array2::eye(4),
            f: arr2(&[
                [1.0, 0.0, 1.0, 0.0],
                [0.0, 1.0, 0.0, 1.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ]),
            h: arr2(&[[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]]),
            q: Array2::eye(4) * process_noise,
            r: Array2::eye(2) * measurement_noise,
        }
    }

    /// x ← F·x, P ← F·P·Fᵀ + Q. Returns the predicted position.
    pub fn predict(&mut self) -> Point {
        self.x = self.f.dot(&self.x);
        self.p = self.f.dot(&self.p).dot(&self.f.t()) + &self.q;
        self.position()
    }

    /// Fold in a position measurement. Returns the corrected position.
    ///
    /// A singular innovation covariance leaves the prediction in place.
    pub fn correct(&mut self, measurement: Point) -> Point {
        let z = Array1::from(vec![measurement.x, measurement.y]);
        let innovation = &z - &self.h.dot(&self.x);
        let s = self.h.dot(&self.p).dot(&self.h.t()) + &self.r;

        let s_inv = match invert_2x2(&s) {
            Some(m) => m,
            None => return self.position(),
        };

        let k = self.p.dot(&self.h.t()).dot(&s_inv);
        self.x = &self.x + &k.dot(&innovation);
        let i_kh = Array2::<f64>::eye(4) - k.dot(&self.h);
        self.p = i_kh.dot(&self.p);
        self.position()
    }

    pub fn position(&self) -> Point {
        Point::new(self.x[0], self.x[1])
    }

    pub fn velocity(&self) -> (f64, f64) {
        (self.x[2], self.x[3])
    }

    /// Trace of the position block of P
    pub fn position_uncertainty(&self) -> f64 {
        self.p[[0, 0]] + self.p[[1, 1]]
    }
}

fn invert_2x2(m: &Array2<f64>) -> Option<Array2<f64>> {
    let det = m[[0, 0]] * m[[1, 1]] - m[[0, 1]] * m[[1, 0]];
    if det.abs() < 1e-12 || !det.is_finite() {
        return None;
    }
    Some(arr2(&[
        [m[[1, 1]] / det, -m[[0, 1]] / det],
        [-m[[1, 0]] / det, m[[0, 0]] / det],
    ]))
}

/// Kalman-tracked eye center, lazily initialized on the first detection
#[derive(Debug, Clone)]
pub struct EyeCenterStabilizer {
    process_noise: f64,
    measurement_noise: f64,
    filter: Option<KalmanFilter>,
}

impl EyeCenterStabilizer {
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            process_noise,
            measurement_noise,
            filter: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.filter.is_some()
    }

    /// Stabilized position for this frame's observed center.
    ///
    /// The first observation seeds the filter and is returned unchanged.
    /// A non-finite observation leaves the filter untouched.
    pub fn update(&mut self, observed: Point) -> Point {
        match &mut self.filter {
            Some(filter) if !observed.is_finite() => filter.position(),
            None if !observed.is_finite() => observed,
            Some(filter) => {
                filter.predict();
                filter.correct(observed)
            }
            None => {
                self.filter = Some(KalmanFilter::new(
                    observed,
                    self.process_noise,
                    self.measurement_noise,
                ));
                observed
            }
        }
    }

    pub fn reset(&mut self) {
        self.filter = None;
    }
}

/// Per-coordinate exponential smoothing: `w·previous + (1−w)·current`
#[derive(Debug, Clone)]
pub struct PointSmoother<const N: usize> {
    weight: f64,
    previous: Option<[Point; N]>,
}

impl<const N: usize> PointSmoother<N> {
    pub fn new(weight: f64) -> Self {
        Self {
            weight,
            previous: None,
        }
    }

    /// Smoothed points. A frame with any non-finite point is not folded in;
    /// the previous output is returned instead.
    pub fn update(&mut self, current: &[Point; N]) -> [Point; N] {
        if !current.iter().all(Point::is_finite) {
            return self.previous.unwrap_or(*current);
        }
        let w = self.weight;
        let smoothed = match &self.previous {
            Some(prev) => std::array::from_fn(|i| {
                Point::new(
                    w * prev[i].x + (1.0 - w) * current[i].x,
                    w * prev[i].y + (1.0 - w) * current[i].y,
                )
            }),
            None => *current,
        };
        self.previous = Some(smoothed);
        smoothed
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}
