use bitarray::{BitArray, Hamming};
use log::*;
use space::{Knn, LinearKnn};

/// A correspondence from a reference descriptor to its nearest scene descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorMatch {
    /// Index into the reference keypoint/descriptor lists.
    pub reference: usize,
    /// Index into the scene keypoint/descriptor lists.
    pub scene: usize,
    /// Hamming distance between the two descriptors.
    pub distance: u32,
}

/// Finds the nearest scene descriptor for every reference descriptor.
///
/// Matching is one-directional: every reference descriptor yields exactly one
/// match, and nothing requires the relation to hold in reverse. Ambiguity is
/// handled downstream by [`filter_matches`] and the consensus step rather
/// than by a ratio test here.
pub fn match_descriptors(reference: &[BitArray<64>], scene: &[BitArray<64>]) -> Vec<DescriptorMatch> {
    if scene.is_empty() {
        return Vec::new();
    }
    let knn = LinearKnn {
        metric: Hamming,
        iter: scene.iter(),
    };
    reference
        .iter()
        .enumerate()
        .map(|(ix, descriptor)| {
            let neighbors = knn.knn(descriptor, 1);
            DescriptorMatch {
                reference: ix,
                scene: neighbors[0].index,
                distance: neighbors[0].distance,
            }
        })
        .collect()
}

/// Retains the matches whose distance is strictly below three times the
/// smallest distance in this batch. The threshold is relative to the batch's
/// own best match, so its strictness varies from call to call.
///
/// Binary descriptors can reach a distance of exactly zero on pixel-identical
/// patches, where `< 3 * 0` would discard everything including the perfect
/// matches; when the minimum is zero, exactly the zero-distance matches are
/// kept instead.
pub fn filter_matches(matches: &[DescriptorMatch]) -> Vec<DescriptorMatch> {
    let min = match matches.iter().map(|m| m.distance).min() {
        Some(min) => min,
        None => return Vec::new(),
    };
    let max = matches.iter().map(|m| m.distance).max().unwrap_or(min);
    debug!("match distances: min {}, max {}", min, max);
    matches
        .iter()
        .copied()
        .filter(|m| {
            if min == 0 {
                m.distance == 0
            } else {
                m.distance < 3 * min
            }
        })
        .collect()
}
