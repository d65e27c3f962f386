//! Admissibility of cluster pairs
use crate::element_tree::ElementNode;
use crate::settings::HMatrixSettings;

/// Classification of a block of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Admissibility {
    /// The clusters are not separated, the block is subdivided.
    Recurse,
    /// The clusters are separated, the block is approximated by interpolation.
    LowRank,
    /// The clusters are not separated and small, the block is stored densely.
    Dense,
}

/// Classify the block of the clusters `c1` and `c2` on a mesh of refinement
/// level `level`.
///
/// Two clusters are separated if the distance of their bounding spheres is
/// positive and `max(r1, r2) / dist < eta`.
pub fn classify(
    c1: &ElementNode,
    c2: &ElementNode,
    level: usize,
    settings: &HMatrixSettings,
) -> Admissibility {
    debug_assert_eq!(c1.level(), c2.level());
    let (s1, s2) = (c1.sphere(), c2.sphere());
    let dist = s1.distance(s2);
    let identical = c1.level() == c2.level() && c1.number() == c2.number();

    if identical || dist <= 0.0 || s1.radius.max(s2.radius) / dist >= settings.eta() {
        if level.saturating_sub(c1.level()) <= settings.min_bsize() {
            Admissibility::Dense
        } else {
            Admissibility::Recurse
        }
    } else {
        Admissibility::LowRank
    }
}
