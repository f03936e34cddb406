use std::collections::HashSet;

use crate::error::Result;
use crate::gateway::Gateway;

/// Return the candidates whose patch already exists on `target`.
///
/// Every commit reachable from `target` is fingerprinted once; candidates are
/// then tested against that set. A commit whose fingerprint cannot be
/// computed never matches. The result preserves candidate order.
///
/// # Errors
/// Fails only when the commits on `target` cannot be listed at all (for
/// example, the branch does not exist).
pub fn detect_duplicates<G: Gateway + ?Sized>(
    gateway: &G,
    target: &str,
    candidates: &[String],
) -> Result<Vec<String>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let on_target = gateway.reachable(target)?;
    let mut patches = HashSet::with_capacity(on_target.len());
    for id in &on_target {
        match gateway.fingerprint(id) {
            Ok(pid) if !pid.is_empty() => {
                patches.insert(pid);
            }
            Ok(_) => {}
            Err(e) => log::debug!("no fingerprint for {} on {}: {}", id, target, e),
        }
    }

    let mut duplicates = Vec::new();
    for id in candidates {
        match gateway.fingerprint(id) {
            Ok(pid) if patches.contains(&pid) => duplicates.push(id.clone()),
            Ok(_) => {}
            Err(e) => log::warn!("could not fingerprint {}; assuming not applied: {}", id, e),
        }
    }

    log::debug!(
        "{} of {} candidate(s) already on {}",
        duplicates.len(),
        candidates.len(),
        target
    );
    Ok(duplicates)
}
