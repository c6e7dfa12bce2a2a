//! Victim selection.
//!
//! Filtering and picking are pure functions over a listed pod set. The
//! random source is supplied by the caller so each workload owns its own
//! generator and tests can inject a seeded one.

use crate::errors::ChaosError;
use crate::models::PodSummary;
use rand::Rng;
use std::collections::HashSet;

/// Reduce a listed pod set to the pods eligible for termination.
///
/// Excludes the pod named `self_pod_name` (when non-empty) and any pod
/// without a `Ready=True` condition. Each pod appears at most once, in list
/// order, regardless of how many qualifying conditions it carries.
///
/// # Errors
///
/// - `ChaosError::NoCandidates` - nothing survived filtering
pub fn select_candidates(
    pods: &[PodSummary],
    self_pod_name: &str,
) -> Result<Vec<PodSummary>, ChaosError> {
    let mut seen: HashSet<&str> = HashSet::new();

    let candidates: Vec<PodSummary> = pods
        .iter()
        .filter(|pod| self_pod_name.is_empty() || pod.name != self_pod_name)
        .filter(|pod| pod.is_ready())
        .filter(|pod| seen.insert(pod.name.as_str()))
        .cloned()
        .collect();

    if candidates.is_empty() {
        return Err(ChaosError::NoCandidates { listed: pods.len() });
    }

    Ok(candidates)
}

/// Draw one candidate uniformly at random over `[0, len)`.
///
/// Returns `None` only for an empty slice.
pub fn pick_candidate<'a, R>(candidates: &'a [PodSummary], rng: &mut R) -> Option<&'a PodSummary>
where
    R: Rng + ?Sized,
{
    if candidates.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..candidates.len());
    candidates.get(index)
}
