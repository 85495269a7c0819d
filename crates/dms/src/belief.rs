//! Belief mass assignment and temporal fusion
//!
//! Each channel (eye, mouth) has a fixed frame of three mutually exclusive
//! hypotheses. Per-frame evidence becomes a basic belief assignment (BBA)
//! and is fused with the previous frame's BBA using Dempster's rule
//! restricted to singletons: matching masses are multiplied and the
//! products renormalized, so disagreement mass is dropped.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tracing::warn;

use crate::DmsConfig;

/// A fixed frame of discernment with exactly three hypotheses
pub trait Hypothesis: Copy + Eq + fmt::Debug + 'static {
    /// All hypotheses, in mass-vector order
    const ALL: [Self; 3];

    fn index(self) -> usize;

    fn label(self) -> &'static str;
}

/// Eye openness hypotheses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EyeHypothesis {
    Normal,
    Medium,
    Fatigue,
}

impl Hypothesis for EyeHypothesis {
    const ALL: [Self; 3] = [Self::Normal, Self::Medium, Self::Fatigue];

    fn index(self) -> usize {
        match self {
            Self::Normal => 0,
            Self::Medium => 1,
            Self::Fatigue => 2,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Medium => "medium",
            Self::Fatigue => "fatigue",
        }
    }
}

/// Mouth activity hypotheses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouthHypothesis {
    Closing,
    Speaking,
    Yawning,
}

impl Hypothesis for MouthHypothesis {
    const ALL: [Self; 3] = [Self::Closing, Self::Speaking, Self::Yawning];

    fn index(self) -> usize {
        match self {
            Self::Closing => 0,
            Self::Speaking => 1,
            Self::Yawning => 2,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Closing => "closing",
            Self::Speaking => "speaking",
            Self::Yawning => "yawning",
        }
    }
}

/// Belief mass vector over the hypotheses of `H`. Masses are non-negative
/// and sum to one.
#[derive(Clone, Copy, PartialEq)]
pub struct Bba<H: Hypothesis> {
    masses: [f64; 3],
    _frame: PhantomData<H>,
}

pub type EyeBba = Bba<EyeHypothesis>;
pub type MouthBba = Bba<MouthHypothesis>;

impl<H: Hypothesis> Bba<H> {
    /// Normalize raw non-negative masses. Returns `None` when any mass is
    /// negative or not finite, or when all masses are zero.
    pub fn from_masses(masses: [f64; 3]) -> Option<Self> {
        if masses.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return None;
        }
        let total: f64 = masses.iter().sum();
        if total <= 0.0 {
            return None;
        }
        Some(Self {
            masses: masses.map(|m| m / total),
            _frame: PhantomData,
        })
    }

    /// Equal mass on every hypothesis; the neutral element of `combine`
    pub fn uniform() -> Self {
        Self {
            masses: [1.0 / 3.0; 3],
            _frame: PhantomData,
        }
    }

    /// `mass` on `focus`, the remainder split evenly over the other two with
    /// each at least `epsilon`, then renormalized.
    pub fn focused(focus: H, mass: f64, epsilon: f64) -> Self {
        let rest = ((1.0 - mass) / 2.0).max(epsilon);
        let mut masses = [rest; 3];
        masses[focus.index()] = mass;
        let total: f64 = masses.iter().sum();
        Self {
            masses: masses.map(|m| m / total),
            _frame: PhantomData,
        }
    }

    pub fn mass(&self, hypothesis: H) -> f64 {
        self.masses[hypothesis.index()]
    }

    pub fn masses(&self) -> [f64; 3] {
        self.masses
    }

    pub fn total(&self) -> f64 {
        self.masses.iter().sum()
    }

    /// Hypothesis with the largest mass
    pub fn dominant(&self) -> H {
        H::ALL
            .into_iter()
            .fold(H::ALL[0], |best, h| if self.mass(h) > self.mass(best) { h } else { best })
    }

    /// Raise every mass to at least `floor` and renormalize
    pub fn with_floor(self, floor: f64) -> Self {
        if floor <= 0.0 {
            return self;
        }
        let floored = self.masses.map(|m| m.max(floor));
        let total: f64 = floored.iter().sum();
        Self {
            masses: floored.map(|m| m / total),
            _frame: PhantomData,
        }
    }
}

impl<H: Hypothesis> fmt::Debug for Bba<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for h in H::ALL {
            map.entry(&h.label(), &self.mass(h));
        }
        map.finish()
    }
}

impl<H: Hypothesis> Serialize for Bba<H> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(3))?;
        for h in H::ALL {
            map.serialize_entry(h.label(), &self.mass(h))?;
        }
        map.end()
    }
}

/// Result of combining two BBAs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Combination<H: Hypothesis> {
    /// Normalized product of matching masses, with the agreement total
    Fused { bba: Bba<H>, agreement: f64 },
    /// No hypothesis had mass in both inputs; the current BBA is passed through
    Fallback(Bba<H>),
}

impl<H: Hypothesis> Combination<H> {
    pub fn bba(&self) -> Bba<H> {
        match self {
            Combination::Fused { bba, .. } => *bba,
            Combination::Fallback(bba) => *bba,
        }
    }
}

/// Singleton-restricted Dempster combination of `previous` and `current`
pub fn combine<H: Hypothesis>(previous: &Bba<H>, current: &Bba<H>) -> Combination<H> {
    let products: [f64; 3] = std::array::from_fn(|i| previous.masses[i] * current.masses[i]);
    let agreement: f64 = products.iter().sum();

    if agreement <= f64::MIN_POSITIVE || !agreement.is_finite() {
        return Combination::Fallback(*current);
    }

    Combination::Fused {
        bba: Bba {
            masses: products.map(|p| p / agreement),
            _frame: PhantomData,
        },
        agreement,
    }
}

/// Zone thresholds and mass parameters for producing per-frame BBAs
#[derive(Debug, Clone, Copy)]
pub struct MassModel {
    pub eye_danger: f64,
    pub eye_warning: f64,
    pub mouth_speak: f64,
    pub mouth_yawn: f64,
    pub eye_closed_threshold: Duration,
    pub yawn_threshold: Duration,
    pub base_mass: f64,
    pub boosted_mass: f64,
    pub epsilon_mass: f64,
}

impl MassModel {
    pub fn from_config(config: &DmsConfig) -> Self {
        Self {
            eye_danger: config.eye_danger_threshold,
            eye_warning: config.eye_warning_threshold,
            mouth_speak: config.mouth_speak_threshold,
            mouth_yawn: config.mouth_yawn_threshold,
            eye_closed_threshold: Duration::from_millis(config.eye_closed_threshold_ms),
            yawn_threshold: Duration::from_millis(config.yawn_threshold_ms),
            base_mass: config.base_mass,
            boosted_mass: config.boosted_mass,
            epsilon_mass: config.epsilon_mass,
        }
    }

    pub fn eye_zone(&self, ear: f64) -> EyeHypothesis {
        if ear < self.eye_danger {
            EyeHypothesis::Fatigue
        } else if ear < self.eye_warning {
            EyeHypothesis::Medium
        } else {
            EyeHypothesis::Normal
        }
    }

    pub fn mouth_zone(&self, mar: f64) -> MouthHypothesis {
        if mar > self.mouth_yawn {
            MouthHypothesis::Yawning
        } else if mar > self.mouth_speak {
            MouthHypothesis::Speaking
        } else {
            MouthHypothesis::Closing
        }
    }

    /// Evidence from one EAR sample and the last closed-eye episode length
    pub fn eye_bba(&self, ear: f64, closed_duration: Duration) -> EyeBba {
        let zone = self.eye_zone(ear);
        let boosted =
            zone == EyeHypothesis::Fatigue && closed_duration > self.eye_closed_threshold;
        Bba::focused(zone, self.zone_mass(boosted), self.epsilon_mass)
    }

    /// Evidence from one MAR sample and the last yawn length
    pub fn mouth_bba(&self, mar: f64, yawn_duration: Duration) -> MouthBba {
        let zone = self.mouth_zone(mar);
        let boosted = zone == MouthHypothesis::Yawning && yawn_duration > self.yawn_threshold;
        Bba::focused(zone, self.zone_mass(boosted), self.epsilon_mass)
    }

    fn zone_mass(&self, boosted: bool) -> f64 {
        if boosted {
            self.boosted_mass
        } else {
            self.base_mass
        }
    }
}

/// Previous fused BBA per channel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FusionHistory {
    pub eye: Option<EyeBba>,
    pub mouth: Option<MouthBba>,
}

/// Combines each frame's BBAs with the stream's history
#[derive(Debug, Clone)]
pub struct FusionEngine {
    mass_floor: f64,
    history: FusionHistory,
}

impl FusionEngine {
    pub fn new(mass_floor: f64) -> Self {
        Self {
            mass_floor,
            history: FusionHistory::default(),
        }
    }

    pub fn history(&self) -> &FusionHistory {
        &self.history
    }

    pub fn fuse_eye(&mut self, current: EyeBba) -> EyeBba {
        let fused = fuse_channel(self.history.eye.as_ref(), current, self.mass_floor, "eye");
        self.history.eye = Some(fused);
        fused
    }

    pub fn fuse_mouth(&mut self, current: MouthBba) -> MouthBba {
        let fused = fuse_channel(self.history.mouth.as_ref(), current, self.mass_floor, "mouth");
        self.history.mouth = Some(fused);
        fused
    }

    pub fn reset(&mut self) {
        self.history = FusionHistory::default();
    }
}

fn fuse_channel<H: Hypothesis>(
    previous: Option<&Bba<H>>,
    current: Bba<H>,
    floor: f64,
    channel: &str,
) -> Bba<H> {
    let Some(previous) = previous else {
        return current;
    };
    match combine(previous, &current) {
        Combination::Fused { bba, .. } => bba.with_floor(floor),
        Combination::Fallback(bba) => {
            warn!("No agreement in {} belief fusion, using current frame", channel);
            bba
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn model() -> MassModel {
        MassModel::from_config(&DmsConfig::default())
    }

    fn assert_normalized<H: Hypothesis>(bba: &Bba<H>) {
        assert!((bba.total() - 1.0).abs() < 1e-9, "total = {}", bba.total());
        assert!(bba.masses().iter().all(|m| *m >= 0.0));
    }

    #[test]
    fn test_eye_zones() {
        let m = model();
        assert_eq!(m.eye_zone(0.10), EyeHypothesis::Fatigue);
        assert_eq!(m.eye_zone(0.16), EyeHypothesis::Medium);
        assert_eq!(m.eye_zone(0.21), EyeHypothesis::Medium);
        assert_eq!(m.eye_zone(0.22), EyeHypothesis::Normal);
    }

    #[test]
    fn test_mouth_zones() {
        let m = model();
        assert_eq!(m.mouth_zone(0.1), MouthHypothesis::Closing);
        assert_eq!(m.mouth_zone(0.35), MouthHypothesis::Closing);
        assert_eq!(m.mouth_zone(0.5), MouthHypothesis::Speaking);
        assert_eq!(m.mouth_zone(0.61), MouthHypothesis::Yawning);
    }

    #[test]
    fn test_base_mass_without_duration() {
        let bba = model().eye_bba(0.10, Duration::ZERO);
        assert!((bba.mass(EyeHypothesis::Fatigue) - 0.9).abs() < 1e-12);
        assert!((bba.mass(EyeHypothesis::Normal) - 0.05).abs() < 1e-12);
        assert_normalized(&bba);
    }

    #[test]
    fn test_boost_after_long_closure() {
        let m = model();
        let bba = m.eye_bba(0.10, Duration::from_millis(2000));
        assert!((bba.mass(EyeHypothesis::Fatigue) - 0.98).abs() < 1e-12);
        assert!(bba.mass(EyeHypothesis::Medium) > 0.0);
        assert_normalized(&bba);

        // duration only boosts the fatigue zone
        let open = m.eye_bba(0.30, Duration::from_millis(2000));
        assert!((open.mass(EyeHypothesis::Normal) - 0.9).abs() < 1e-12);

        let yawn = m.mouth_bba(0.8, Duration::from_millis(3500));
        assert!((yawn.mass(MouthHypothesis::Yawning) - 0.98).abs() < 1e-12);
    }

    #[test]
    fn test_epsilon_keeps_masses_positive() {
        let bba = EyeBba::focused(EyeHypothesis::Fatigue, 0.999, 0.005);
        assert!(bba.mass(EyeHypothesis::Normal) > 0.0);
        assert_normalized(&bba);
    }

    #[test]
    fn test_uniform_is_neutral() {
        let b = EyeBba::from_masses([0.7, 0.2, 0.1]).unwrap();
        let fused = combine(&EyeBba::uniform(), &b).bba();
        for h in EyeHypothesis::ALL {
            assert!((fused.mass(h) - b.mass(h)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_combine_fixed_point_is_idempotent() {
        let u = MouthBba::uniform();
        let fused = combine(&u, &u).bba();
        for h in MouthHypothesis::ALL {
            assert!((fused.mass(h) - u.mass(h)).abs() < 1e-12);
        }

        let certain = MouthBba::from_masses([0.0, 0.0, 1.0]).unwrap();
        assert_eq!(combine(&certain, &certain).bba(), certain);
    }

    #[test]
    fn test_combine_rewards_agreement() {
        let a = EyeBba::from_masses([0.1, 0.1, 0.8]).unwrap();
        let fused = combine(&a, &a);
        match fused {
            Combination::Fused { bba, agreement } => {
                assert!((agreement - 0.66).abs() < 1e-12);
                assert!(bba.mass(EyeHypothesis::Fatigue) > 0.8);
                assert_eq!(bba.dominant(), EyeHypothesis::Fatigue);
            }
            Combination::Fallback(_) => panic!("expected fusion"),
        }
    }

    #[test]
    fn test_zero_agreement_falls_back_to_current() {
        let previous = EyeBba::from_masses([1.0, 0.0, 0.0]).unwrap();
        let current = EyeBba::from_masses([0.0, 0.5, 0.5]).unwrap();
        assert_eq!(combine(&previous, &current), Combination::Fallback(current));

        let mut engine = FusionEngine::new(0.0);
        engine.fuse_eye(previous);
        assert_eq!(engine.fuse_eye(current), current);
    }

    #[test]
    fn test_from_masses_rejects_invalid() {
        assert!(EyeBba::from_masses([0.0, 0.0, 0.0]).is_none());
        assert!(EyeBba::from_masses([0.5, -0.1, 0.6]).is_none());
        assert!(EyeBba::from_masses([f64::NAN, 0.5, 0.5]).is_none());
    }

    #[test]
    fn test_single_frame_dip_does_not_alert() {
        let m = model();
        let config = DmsConfig::default();
        let threshold = config.high_fatigue_threshold;
        let mut engine = FusionEngine::new(config.mass_floor);

        for ear in [0.30, 0.10, 0.30] {
            let fused = engine.fuse_eye(m.eye_bba(ear, Duration::ZERO));
            assert!(fused.mass(EyeHypothesis::Fatigue) <= threshold);
            assert_normalized(&fused);
        }
    }

    /// Closed frames after a long open stretch until fused fatigue crosses
    /// the threshold
    fn closure_latency(floor: f64) -> usize {
        let m = model();
        let threshold = DmsConfig::default().high_fatigue_threshold;
        let mut engine = FusionEngine::new(floor);

        for _ in 0..300 {
            engine.fuse_eye(m.eye_bba(0.30, Duration::ZERO));
        }
        let mut frames = 0;
        while engine.history().eye.map_or(0.0, |b| b.mass(EyeHypothesis::Fatigue)) <= threshold {
            engine.fuse_eye(m.eye_bba(0.10, Duration::ZERO));
            frames += 1;
            assert!(frames < 100, "fatigue never crossed threshold");
        }
        frames
    }

    #[test]
    fn test_sustained_closure_alerts() {
        let frames = closure_latency(DmsConfig::default().mass_floor);
        // longer than a blink (400 ms), within a second at 30 fps
        assert!(frames > 13, "alerted after {} frames", frames);
        assert!(frames <= 30, "alerted after {} frames", frames);
    }

    #[test]
    fn test_floor_sets_closure_latency() {
        assert!(closure_latency(1e-6) < closure_latency(1e-22));
    }

    #[test]
    fn test_floor_prevents_absorbing_zero() {
        let floor = DmsConfig::default().mass_floor;
        let mut engine = FusionEngine::new(floor);
        let m = model();
        for _ in 0..5000 {
            engine.fuse_eye(m.eye_bba(0.30, Duration::ZERO));
        }
        let fused = engine.history().eye.unwrap();
        assert!(fused.mass(EyeHypothesis::Fatigue) >= floor / 2.0);
        assert!(fused.mass(EyeHypothesis::Fatigue) > 0.0);
    }

    #[test]
    fn test_debug_lists_labels() {
        let text = format!("{:?}", MouthBba::uniform());
        assert!(text.contains("yawning"));
        assert!(text.contains("closing"));
    }

    proptest! {
        #[test]
        fn prop_produced_bba_sums_to_one(ear in 0.0f64..1.0, ms in 0u64..10_000) {
            let bba = model().eye_bba(ear, Duration::from_millis(ms));
            prop_assert!((bba.total() - 1.0).abs() < 1e-9);
            prop_assert!(bba.masses().iter().all(|m| *m > 0.0));
        }

        #[test]
        fn prop_combined_bba_sums_to_one(
            a in prop::array::uniform3(0.001f64..1.0),
            b in prop::array::uniform3(0.001f64..1.0),
        ) {
            let a = EyeBba::from_masses(a).unwrap();
            let b = EyeBba::from_masses(b).unwrap();
            let fused = combine(&a, &b).bba();
            prop_assert!((fused.total() - 1.0).abs() < 1e-9);
            prop_assert!(fused.masses().iter().all(|m| *m >= 0.0));

            let floored = fused.with_floor(1e-6);
            prop_assert!((floored.total() - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_fused_stream_stays_normalized(mars in prop::collection::vec(0.0f64..1.2, 1..60)) {
            let m = model();
            let mut engine = FusionEngine::new(1e-6);
            for mar in mars {
                let fused = engine.fuse_mouth(m.mouth_bba(mar, Duration::ZERO));
                prop_assert!((fused.total() - 1.0).abs() < 1e-9);
            }
        }
    }
}
