use bisindo::landmarks::{HAND_LANDMARK_COUNT, Hand, LandmarkPoint};

/// A hand pose for letter number `letter`, wobbling slightly with `frame`.
///
/// Poses for different letters sit far apart so a small network separates
/// them quickly.
pub fn pose(letter: usize, frame: u64) -> Hand {
    let wobble = ((frame % 7) as f32 - 3.0) * 0.004;
    let offset = letter as f32 * 0.3;
    let points = (0..HAND_LANDMARK_COUNT)
        .map(|idx| {
            let t = idx as f32 / HAND_LANDMARK_COUNT as f32;
            let bend = if letter % 2 == 0 { t } else { 1.0 - t };
            LandmarkPoint::new(offset + t + wobble, bend * 0.5 + wobble, -0.05 * t)
        })
        .collect();
    Hand::new(points)
}
