// src/analysis/zone_state.rs
//
// Per-zone seating state machine and occupancy hysteresis.
//
// Each (zone, customer track) pair walks:
//
//   Unseen ──first customer──▶ Candidate ──slow──▶ Stable ──dwell──▶ Seated
//                                  ▲                 │                 │
//                                  └──────fast───────┘                 │
//                                  └──────────displaced > max──────────┘
//
// A seated person keeps counting through short occlusions until their
// state has been unseen for `ttl_lost` seconds. The zone's `occupied` flag
// is a strict-majority vote over the last `hist_frames` frames.

use crate::geometry::{Point, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Static description of a zone, as loaded from the zone file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub id: String,
    pub polygon: Polygon,
    /// Inclusive [y_min, y_max] band the person center must fall in
    #[serde(default)]
    pub y_band: Option<(f32, f32)>,
    /// Overrides the classifier's minimum in-zone area fraction
    #[serde(default)]
    pub iop_thr: Option<f32>,
}

impl ZoneConfig {
    pub fn new(id: impl Into<String>, polygon: Polygon) -> Self {
        Self {
            id: id.into(),
            polygon,
            y_band: None,
            iop_thr: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeatingConfig {
    /// Average speed (px/s) below which a customer counts as still
    pub v_thr_px_s: f32,
    /// Minimum time since candidacy started before seating
    pub sit_seconds: f64,
    /// Minimum continuous stillness before seating
    pub min_stability_time: f64,
    /// Displacement (px) from the pinned seat position that unseats a person
    pub max_displacement_px: f32,
    /// Seconds a seat state survives without observations
    pub ttl_lost: f64,
    /// Occupancy vote window (frames)
    pub hist_frames: usize,
}

impl Default for SeatingConfig {
    fn default() -> Self {
        Self {
            v_thr_px_s: 32.0,
            sit_seconds: 2.0,
            min_stability_time: 1.8,
            max_displacement_px: 75.0,
            ttl_lost: 11.0,
            hist_frames: 6,
        }
    }
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SeatState {
    pub candidacy_start: f64,
    pub last_seen: f64,
    pub seated: bool,
    pub stability_start: f64,
    pub stable: bool,
    /// Center pinned when seating was confirmed
    pub seated_position: Option<Point>,
}

impl SeatState {
    fn new(now: f64) -> Self {
        Self {
            candidacy_start: now,
            last_seen: now,
            seated: false,
            stability_start: now,
            stable: false,
            seated_position: None,
        }
    }

    fn restart_candidacy(&mut self, now: f64) {
        self.candidacy_start = now;
        self.stability_start = now;
        self.stable = false;
    }
}

/// Fixed-capacity window of per-frame occupancy votes.
#[derive(Debug, Clone)]
pub struct HysteresisWindow {
    votes: VecDeque<bool>,
    capacity: usize,
}

impl HysteresisWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            votes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one vote and return the resulting decision.
    pub fn push(&mut self, vote: bool) -> bool {
        self.votes.push_back(vote);
        while self.votes.len() > self.capacity {
            self.votes.pop_front();
        }
        self.decision()
    }

    /// Strict majority of the full capacity, not of the votes seen so far.
    pub fn decision(&self) -> bool {
        self.votes.iter().filter(|&&v| v).count() >= self.capacity / 2 + 1
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.votes.len()
    }
}

/// A configured zone plus everything learned about it at runtime.
#[derive(Debug, Clone)]
pub struct Zone {
    pub config: ZoneConfig,
    pub occupied: bool,
    pub people_seated: usize,
    history: HysteresisWindow,
    seat_states: HashMap<u32, SeatState>,
    staff: BTreeSet<u32>,
    seated: BTreeSet<u32>,
}

impl Zone {
    pub fn new(config: ZoneConfig, hist_frames: usize) -> Self {
        Self {
            config,
            occupied: false,
            people_seated: 0,
            history: HysteresisWindow::new(hist_frames),
            seat_states: HashMap::new(),
            staff: BTreeSet::new(),
            seated: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn seat_state(&self, track_id: u32) -> Option<&SeatState> {
        self.seat_states.get(&track_id)
    }

    pub fn seat_states(&self) -> &HashMap<u32, SeatState> {
        &self.seat_states
    }

    pub fn staff_ids(&self) -> &BTreeSet<u32> {
        &self.staff
    }

    pub fn seated_ids(&self) -> &BTreeSet<u32> {
        &self.seated
    }
}

/// A customer observed in a zone this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeatObservation {
    pub track_id: u32,
    pub center: Point,
    pub avg_speed: f32,
}

/// Something that changed in a zone during one update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZoneTransition {
    TrackSeated { track_id: u32, position: Point },
    TrackUnseated { track_id: u32, displacement: f32 },
    SeatedTrackLost { track_id: u32, unseen_secs: f64 },
    Occupied { people_seated: usize },
    Vacated,
}

impl ZoneTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneTransition::TrackSeated { .. } => "track_seated",
            ZoneTransition::TrackUnseated { .. } => "track_unseated",
            ZoneTransition::SeatedTrackLost { .. } => "seated_track_lost",
            ZoneTransition::Occupied { .. } => "occupied",
            ZoneTransition::Vacated => "vacated",
        }
    }
}

// ============================================================================
// STATE MACHINE
// ============================================================================

pub struct ZoneStateMachine {
    config: SeatingConfig,
}

impl ZoneStateMachine {
    pub fn new(config: SeatingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SeatingConfig {
        &self.config
    }

    pub fn new_zone(&self, config: ZoneConfig) -> Zone {
        Zone::new(config, self.config.hist_frames)
    }

    /// Advance one zone by one frame.
    ///
    /// `customers` are the tracks classified as customers for this zone,
    /// `staff` the ones classified as staff (replacing last frame's set).
    pub fn update_zone(
        &self,
        zone: &mut Zone,
        customers: &[SeatObservation],
        staff: BTreeSet<u32>,
        now: f64,
    ) -> Vec<ZoneTransition> {
        let cfg = &self.config;
        let mut transitions = Vec::new();
        zone.staff = staff;

        // ════════════════════════════════════════════════════════════
        // SEATING
        // ════════════════════════════════════════════════════════════
        for obs in customers {
            let st = zone
                .seat_states
                .entry(obs.track_id)
                .or_insert_with(|| SeatState::new(now));

            if st.seated {
                let displacement = st
                    .seated_position
                    .map_or(0.0, |p| p.distance(&obs.center));
                if displacement > cfg.max_displacement_px {
                    st.seated = false;
                    st.seated_position = None;
                    st.restart_candidacy(now);
                    debug!(
                        "Zone {}: T{} displaced {:.0}px, no longer seated",
                        zone.config.id, obs.track_id, displacement
                    );
                    transitions.push(ZoneTransition::TrackUnseated {
                        track_id: obs.track_id,
                        displacement,
                    });
                }
            } else if obs.avg_speed < cfg.v_thr_px_s {
                if !st.stable {
                    st.stability_start = now;
                    st.stable = true;
                }
                if now - st.stability_start >= cfg.min_stability_time
                    && now - st.candidacy_start >= cfg.sit_seconds
                {
                    st.seated = true;
                    st.seated_position = Some(obs.center);
                    info!(
                        "Zone {}: T{} seated at ({:.0}, {:.0})",
                        zone.config.id, obs.track_id, obs.center.x, obs.center.y
                    );
                    transitions.push(ZoneTransition::TrackSeated {
                        track_id: obs.track_id,
                        position: obs.center,
                    });
                }
            } else {
                st.stable = false;
                st.candidacy_start = now;
            }

            st.last_seen = now;
        }

        // ════════════════════════════════════════════════════════════
        // EVICTION
        // ════════════════════════════════════════════════════════════
        let zone_id = &zone.config.id;
        zone.seat_states.retain(|&track_id, st| {
            let unseen = now - st.last_seen;
            if unseen <= cfg.ttl_lost {
                return true;
            }
            if st.seated {
                info!(
                    "Zone {}: lost seated T{} after {:.1}s unseen",
                    zone_id, track_id, unseen
                );
                transitions.push(ZoneTransition::SeatedTrackLost {
                    track_id,
                    unseen_secs: unseen,
                });
            }
            false
        });

        // ════════════════════════════════════════════════════════════
        // OCCUPANCY
        // ════════════════════════════════════════════════════════════
        zone.seated = zone
            .seat_states
            .iter()
            .filter(|(_, st)| st.seated)
            .map(|(&id, _)| id)
            .collect();
        zone.people_seated = zone.seated.len();

        let was_occupied = zone.occupied;
        zone.occupied = zone.history.push(zone.people_seated > 0);
        if zone.occupied != was_occupied {
            if zone.occupied {
                info!(
                    "Zone {} OCCUPIED ({} seated)",
                    zone.config.id, zone.people_seated
                );
                transitions.push(ZoneTransition::Occupied {
                    people_seated: zone.people_seated,
                });
            } else {
                info!("Zone {} VACATED", zone.config.id);
                transitions.push(ZoneTransition::Vacated);
            }
        }

        transitions
    }
}

impl Default for ZoneStateMachine {
    fn default() -> Self {
        Self::new(SeatingConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.1;

    fn zone(sm: &ZoneStateMachine) -> Zone {
        sm.new_zone(ZoneConfig::new(
            "T1",
            Polygon::from_coords(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]),
        ))
    }

    fn obs(track_id: u32, x: f32, y: f32, avg_speed: f32) -> SeatObservation {
        SeatObservation {
            track_id,
            center: Point::new(x, y),
            avg_speed,
        }
    }

    /// Feed the same observation every DT seconds over [start, end].
    fn run(
        sm: &ZoneStateMachine,
        z: &mut Zone,
        o: SeatObservation,
        start: f64,
        end: f64,
    ) -> Vec<ZoneTransition> {
        let steps = ((end - start) / DT).round() as usize;
        (0..=steps)
            .flat_map(|i| sm.update_zone(z, &[o], BTreeSet::new(), start + i as f64 * DT))
            .collect()
    }

    #[test]
    fn test_slow_track_is_seated_after_dwell() {
        let sm = ZoneStateMachine::default();
        let mut z = zone(&sm);
        let events = run(&sm, &mut z, obs(1, 50.0, 50.0, 5.0), 0.0, 3.8);

        assert!(z.seat_state(1).unwrap().seated);
        assert_eq!(z.people_seated, 1);
        assert!(z.occupied);
        assert!(events.contains(&ZoneTransition::TrackSeated {
            track_id: 1,
            position: Point::new(50.0, 50.0)
        }));
        assert!(events.iter().any(|e| matches!(e, ZoneTransition::Occupied { .. })));
    }

    #[test]
    fn test_seating_waits_for_both_clocks() {
        let sm = ZoneStateMachine::default();
        let mut z = zone(&sm);
        run(&sm, &mut z, obs(1, 50.0, 50.0, 5.0), 0.0, 1.9);
        assert!(!z.seat_state(1).unwrap().seated);
        run(&sm, &mut z, obs(1, 50.0, 50.0, 5.0), 2.0, 2.0);
        assert!(z.seat_state(1).unwrap().seated);
    }

    #[test]
    fn test_fast_track_never_seated() {
        let sm = ZoneStateMachine::default();
        let mut z = zone(&sm);
        run(&sm, &mut z, obs(1, 50.0, 50.0, 50.0), 0.0, 10.0);
        let st = z.seat_state(1).unwrap();
        assert!(!st.seated);
        assert!(!st.stable);
        assert_eq!(z.people_seated, 0);
        assert!(!z.occupied);
    }

    #[test]
    fn test_speed_burst_restarts_candidacy() {
        let sm = ZoneStateMachine::default();
        let mut z = zone(&sm);
        run(&sm, &mut z, obs(1, 50.0, 50.0, 5.0), 0.0, 1.5);
        sm.update_zone(&mut z, &[obs(1, 50.0, 50.0, 40.0)], BTreeSet::new(), 1.6);
        assert_eq!(z.seat_state(1).unwrap().candidacy_start, 1.6);

        run(&sm, &mut z, obs(1, 50.0, 50.0, 5.0), 1.7, 3.5);
        assert!(!z.seat_state(1).unwrap().seated);
        run(&sm, &mut z, obs(1, 50.0, 50.0, 5.0), 3.6, 3.7);
        assert!(z.seat_state(1).unwrap().seated);
    }

    #[test]
    fn test_seated_track_ignores_speed_but_not_displacement() {
        let sm = ZoneStateMachine::default();
        let mut z = zone(&sm);
        run(&sm, &mut z, obs(1, 50.0, 50.0, 5.0), 0.0, 2.5);
        assert!(z.seat_state(1).unwrap().seated);

        // Fidgeting fast within the displacement radius keeps the seat
        sm.update_zone(&mut z, &[obs(1, 90.0, 50.0, 60.0)], BTreeSet::new(), 2.6);
        assert!(z.seat_state(1).unwrap().seated);

        // max_displacement_px + 1 away from the pinned center
        let events = sm.update_zone(&mut z, &[obs(1, 126.0, 50.0, 5.0)], BTreeSet::new(), 2.7);
        let st = z.seat_state(1).unwrap();
        assert!(!st.seated);
        assert!(!st.stable);
        assert_eq!(st.seated_position, None);
        assert_eq!(st.candidacy_start, 2.7);
        assert_eq!(st.stability_start, 2.7);
        assert_eq!(z.people_seated, 0);
        assert_eq!(
            events,
            vec![ZoneTransition::TrackUnseated {
                track_id: 1,
                displacement: 76.0
            }]
        );
    }

    #[test]
    fn test_seated_track_survives_occlusion_then_evicted() {
        let sm = ZoneStateMachine::default();
        let mut z = zone(&sm);
        run(&sm, &mut z, obs(1, 50.0, 50.0, 5.0), 0.0, 2.5);

        // Unseen for exactly ttl_lost: still counted
        sm.update_zone(&mut z, &[], BTreeSet::new(), 13.5);
        assert_eq!(z.people_seated, 1);
        assert!(z.seated_ids().contains(&1));

        let events = sm.update_zone(&mut z, &[], BTreeSet::new(), 13.6);
        assert!(z.seat_state(1).is_none());
        assert_eq!(z.people_seated, 0);
        assert!(matches!(
            events[0],
            ZoneTransition::SeatedTrackLost { track_id: 1, .. }
        ));
    }

    #[test]
    fn test_unseated_state_evicted_silently() {
        let sm = ZoneStateMachine::default();
        let mut z = zone(&sm);
        sm.update_zone(&mut z, &[obs(3, 50.0, 50.0, 50.0)], BTreeSet::new(), 0.0);
        let events = sm.update_zone(&mut z, &[], BTreeSet::new(), 11.5);
        assert!(z.seat_state(3).is_none());
        assert!(events.is_empty());
    }

    #[test]
    fn test_staff_replaced_each_frame_and_never_seated() {
        let sm = ZoneStateMachine::default();
        let mut z = zone(&sm);
        sm.update_zone(&mut z, &[], [4, 5].into_iter().collect(), 0.0);
        assert_eq!(z.staff_ids().len(), 2);
        sm.update_zone(&mut z, &[], [5].into_iter().collect(), 0.1);
        assert_eq!(z.staff_ids().iter().copied().collect::<Vec<_>>(), vec![5]);
        assert!(z.seat_states().is_empty());
        assert!(!z.occupied);
    }

    #[test]
    fn test_people_seated_matches_seated_set() {
        let sm = ZoneStateMachine::default();
        let mut z = zone(&sm);
        let mut t = 0.0;
        while t <= 3.0 {
            sm.update_zone(
                &mut z,
                &[obs(1, 20.0, 20.0, 1.0), obs(2, 80.0, 80.0, 1.0), obs(3, 50.0, 50.0, 45.0)],
                BTreeSet::new(),
                t,
            );
            assert_eq!(z.people_seated, z.seated_ids().len());
            t += DT;
        }
        assert_eq!(z.people_seated, 2);
    }

    #[test]
    fn test_hysteresis_strict_majority_of_capacity() {
        let mut w = HysteresisWindow::new(6);
        let decisions: Vec<bool> = [true, true, true, false, false, false]
            .iter()
            .map(|&v| w.push(v))
            .collect();
        assert_eq!(decisions, vec![false; 6]);

        let mut w = HysteresisWindow::new(6);
        let decisions: Vec<bool> = [true, true, true, true, false, false, false]
            .iter()
            .map(|&v| w.push(v))
            .collect();
        // Flips at the 4th vote, holds through two misses, drops at the third
        assert_eq!(decisions, vec![false, false, false, true, true, true, false]);
        assert_eq!(w.len(), 6);
    }

    #[test]
    fn test_zone_vacates_after_seat_lost() {
        let sm = ZoneStateMachine::default();
        let mut z = zone(&sm);
        run(&sm, &mut z, obs(1, 50.0, 50.0, 5.0), 0.0, 3.0);
        assert!(z.occupied);

        let mut events = Vec::new();
        let mut t = 14.1;
        for _ in 0..6 {
            events.extend(sm.update_zone(&mut z, &[], BTreeSet::new(), t));
            t += DT;
        }
        assert!(!z.occupied);
        assert!(events.contains(&ZoneTransition::Vacated));
    }
}
