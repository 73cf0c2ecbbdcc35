use ndarray::prelude::*;
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::assignment;
use crate::bbox::{BBox, Ltrb};
use crate::{Detection, Track};

/// Cost of pairing with a padding row or column
const PADDING_COST: f64 = 1.0;

/// Floor for the predicted box diagonal used to normalize center distances
const MIN_DIAGONAL: f32 = 1e-3;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimal IoU between the predicted track box and a detection to accept a match
    pub iou_threshold: f32,

    /// Consecutive unmatched frames a track survives
    pub max_misses: u32,

    /// Weight of the new detection in the exponential box smoothing
    pub smoothing: f32,

    /// Weight of the normalized center distance in the matching cost
    pub distance_weight: f32,
    pub max_center_distance: f32,

    /// Boxes larger than this (px^2) get one extra frame before removal
    pub large_box_area: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            max_misses: 5,
            smoothing: 0.6,
            distance_weight: 0.5,
            max_center_distance: 10.0,
            large_box_area: 10_000.0,
        }
    }
}

/// IoU tracker with globally optimal frame-to-frame association.
///
/// Identities start at 1 and only ever grow; `reset` keeps the counter so an
/// identity is never handed out twice by the same tracker.
#[derive(Debug)]
pub struct Tracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u32,
    frame: u64,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::with_capacity(32),
            next_id: 1,
            frame: 0,
        }
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Identity the next spawned track will receive
    #[inline]
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn reset(&mut self) {
        debug!(tracks = self.tracks.len(), "tracker reset");

        self.tracks.clear();
        self.frame = 0;
    }

    fn cost(&self, predicted: &BBox<Ltrb>, det: &BBox<Ltrb>) -> f64 {
        let iou = predicted.iou(det);
        let diag = predicted.diagonal().max(MIN_DIAGONAL);
        let dist = (predicted.center_distance(det) / diag).min(self.config.max_center_distance);

        let cost = (1.0 - iou) + self.config.distance_weight * dist;

        f64::from(cost.max(0.0))
    }

    /// Matches `detections` against the live tracks.
    ///
    /// Returns the identity of every detection, in input order.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<u32> {
        self.frame += 1;

        let frame = self.frame;
        let predicted: Vec<_> = self.tracks.iter().map(|t| t.predict(frame)).collect();

        let n_tracks = self.tracks.len();
        let n_dets = detections.len();
        let n = n_tracks.max(n_dets);

        let costs = Array2::from_shape_fn((n, n), |(r, c)| {
            if r < n_tracks && c < n_dets {
                self.cost(&predicted[r], &detections[c].bbox)
            } else {
                PADDING_COST
            }
        });

        let solution = if n_tracks > 0 && n_dets > 0 {
            assignment::solve(costs.view())
        } else {
            vec![None; n]
        };

        let mut ids: Vec<Option<u32>> = vec![None; n_dets];
        let mut matched = vec![false; n_tracks];

        for (r, c) in solution.into_iter().enumerate() {
            let c = match c {
                Some(c) if r < n_tracks && c < n_dets => c,
                _ => continue,
            };

            let iou = predicted[r].iou(&detections[c].bbox);

            if iou < self.config.iou_threshold {
                trace!(track = self.tracks[r].id, det = c, iou, "match rejected");
                continue;
            }

            let track = &mut self.tracks[r];
            track.update(&detections[c].bbox, self.config.smoothing, frame);

            ids[c] = Some(track.id);
            matched[r] = true;
        }

        let max_misses = self.config.max_misses;
        let large_box_area = self.config.large_box_area;
        let mut idx = 0;

        self.tracks.retain_mut(|t| {
            let was_matched = matched[idx];
            idx += 1;

            if was_matched {
                return true;
            }

            let misses = t.mark_missed();
            let grace = if t.area() > large_box_area { 1 } else { 0 };

            if misses > max_misses + grace {
                debug!(id = t.id, misses, "track expired");
                false
            } else {
                true
            }
        });

        detections
            .iter()
            .zip(ids)
            .map(|(det, id)| match id {
                Some(id) => id,
                None => {
                    let id = self.next_id;
                    self.next_id += 1;

                    debug!(id, label = %det.label, "track spawned");
                    self.tracks.push(Track::new(id, det.bbox, frame));

                    id
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn det(l: f32, t: f32, r: f32, b: f32) -> Detection {
        Detection::new(BBox::ltrb(l, t, r, b), "car", 0.9)
    }

    fn small(x: f32) -> Detection {
        det(x, 0.0, x + 50.0, 50.0)
    }

    #[test]
    fn test_empty_tracker_spawns_every_detection() {
        let mut tracker = Tracker::default();
        let ids = tracker.update(&[small(0.0), small(200.0), small(400.0)]);

        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(tracker.tracks().len(), 3);
        assert_eq!(tracker.frame(), 1);
    }

    #[test]
    fn test_identity_persists_under_small_motion() {
        let mut tracker = Tracker::default();

        let first = tracker.update(&[small(0.0), small(300.0)]);
        let second = tracker.update(&[small(303.0), small(2.0)]);
        let third = tracker.update(&[small(5.0), small(306.0)]);

        assert_eq!(first, vec![1, 2]);
        assert_eq!(second, vec![2, 1]);
        assert_eq!(third, vec![1, 2]);
        assert_eq!(tracker.next_id(), 3);
    }

    #[test]
    fn test_low_iou_match_is_rejected() {
        let mut tracker = Tracker::default();
        tracker.update(&[small(0.0)]);

        // Only pairing available, but IoU is ~0.11 (< 0.3)
        let ids = tracker.update(&[small(40.0)]);

        assert_eq!(ids, vec![2]);
        assert_eq!(tracker.tracks().len(), 2);
        assert_eq!(tracker.tracks()[0].misses, 1);
    }

    #[test]
    fn test_box_smoothing() {
        let mut tracker = Tracker::default();
        tracker.update(&[det(0.0, 0.0, 100.0, 100.0)]);
        tracker.update(&[det(10.0, 0.0, 110.0, 100.0)]);

        let t = &tracker.tracks()[0];
        assert_abs_diff_eq!(t.bbox.left(), 6.0, epsilon = 1e-4);
        assert_abs_diff_eq!(t.bbox.right(), 106.0, epsilon = 1e-4);
        assert_eq!(t.prev_bbox, Some(BBox::ltrb(0.0, 0.0, 100.0, 100.0)));
        assert_eq!(t.last_seen_frame, 2);
    }

    #[test]
    fn test_prediction_follows_constant_motion() {
        let config = TrackerConfig {
            smoothing: 1.0,
            ..Default::default()
        };
        let mut tracker = Tracker::new(config);

        // From the third frame on the box moves 30px per frame, which alone would
        // drop the IoU against the last box to 0.25
        let mut ids = Vec::new();
        for x in [0.0, 20.0, 50.0, 80.0, 110.0, 140.0] {
            ids.extend(tracker.update(&[small(x)]));
        }

        assert_eq!(ids, vec![1; 6]);
    }

    #[test]
    fn test_small_track_expires_after_max_misses() {
        let config = TrackerConfig {
            max_misses: 2,
            ..Default::default()
        };
        let mut tracker = Tracker::new(config);
        tracker.update(&[small(0.0)]);

        tracker.update(&[]);
        tracker.update(&[]);
        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(tracker.tracks()[0].misses, 2);

        tracker.update(&[]);
        assert!(tracker.tracks().is_empty());

        // The same spot later on gets a fresh identity
        assert_eq!(tracker.update(&[small(0.0)]), vec![2]);
    }

    #[test]
    fn test_large_track_gets_one_extra_frame() {
        let config = TrackerConfig {
            max_misses: 2,
            ..Default::default()
        };
        let mut tracker = Tracker::new(config);
        tracker.update(&[det(0.0, 0.0, 200.0, 200.0)]);

        for _ in 0..3 {
            tracker.update(&[]);
        }
        assert_eq!(tracker.tracks().len(), 1);

        tracker.update(&[]);
        assert!(tracker.tracks().is_empty());
    }

    #[test]
    fn test_reset_never_reuses_identities() {
        let mut tracker = Tracker::default();
        assert_eq!(tracker.update(&[small(0.0), small(100.0)]), vec![1, 2]);

        tracker.reset();
        assert!(tracker.tracks().is_empty());
        assert_eq!(tracker.frame(), 0);

        assert_eq!(tracker.update(&[small(0.0), small(100.0)]), vec![3, 4]);
    }

    #[test]
    fn test_more_tracks_than_detections() {
        let mut tracker = Tracker::default();
        tracker.update(&[small(0.0), small(200.0), small(400.0)]);

        let ids = tracker.update(&[small(401.0)]);
        assert_eq!(ids, vec![3]);

        let misses: Vec<_> = tracker.tracks().iter().map(|t| t.misses).collect();
        assert_eq!(misses, vec![1, 1, 0]);
    }

    #[test]
    fn test_cost_caps_distance_of_degenerate_prediction() {
        let tracker = Tracker::default();

        // zero diagonal falls back to the floor, so the distance term saturates
        let point = BBox::ltrb(10.0, 10.0, 10.0, 10.0);
        let cost = tracker.cost(&point, &BBox::ltrb(100.0, 100.0, 150.0, 150.0));

        assert_abs_diff_eq!(cost, 1.0 + 0.5 * 10.0);
    }

    #[test]
    fn test_cost_combines_iou_and_center_distance() {
        let tracker = Tracker::default();

        // diagonal 50, centers 25 apart, IoU 300 / 2100
        let predicted = BBox::ltrb(0.0, 0.0, 30.0, 40.0);
        let cost = tracker.cost(&predicted, &BBox::ltrb(15.0, 20.0, 45.0, 60.0));

        assert_abs_diff_eq!(cost, (1.0 - 1.0 / 7.0) + 0.5 * 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(tracker.cost(&predicted, &predicted), 0.0);
    }

    #[test]
    fn test_nearer_center_wins_on_equal_iou() {
        let mut tracker = Tracker::default();
        tracker.update(&[det(0.0, 0.0, 100.0, 100.0)]);

        // both have IoU 2/3 with the track, centers 25 and 20 away
        let taller = det(0.0, 0.0, 100.0, 150.0);
        let shifted = det(20.0, 0.0, 120.0, 100.0);

        let ids = tracker.update(&[taller, shifted]);

        assert_eq!(ids, vec![2, 1]);
        assert_eq!(tracker.tracks()[0].misses, 0);
        assert_abs_diff_eq!(tracker.tracks()[0].bbox.left(), 12.0, epsilon = 1e-4);
    }
}
