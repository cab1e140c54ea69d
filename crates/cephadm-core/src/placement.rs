//! Placement resolution (§4.E): turns a `ServiceSpec`'s `PlacementSpec`
//! into a concrete `(hostname, network, name)` triple list.

use cephadm_inventory::{Host, HostPlacement, PlacementSpec, ServiceSpec};
use rand::seq::SliceRandom;

use crate::error::CephadmError;

/// Scheduler used when a placement is count-only
pub trait Scheduler: Send + Sync {
    /// Pick `count` hosts from `candidates`
    ///
    /// # Errors
    /// Returns `CephadmError::PlacementError` if the pool is empty or
    /// smaller than `count`.
    fn select(&self, candidates: &[Host], count: usize) -> Result<Vec<Host>, CephadmError>;
}

/// Default scheduler: shuffle the candidate pool and take the first `count`
#[derive(Debug, Default)]
pub struct SimpleScheduler;

impl Scheduler for SimpleScheduler {
    fn select(&self, candidates: &[Host], count: usize) -> Result<Vec<Host>, CephadmError> {
        if candidates.is_empty() {
            return Err(CephadmError::PlacementError(
                "no candidate hosts available for placement".to_string(),
            ));
        }
        if count > candidates.len() {
            return Err(CephadmError::PlacementError(format!(
                "placement requires {count} hosts but only {} are available",
                candidates.len()
            )));
        }

        let mut shuffled: Vec<Host> = candidates.to_vec();
        shuffled.shuffle(&mut rand::rng());
        shuffled.truncate(count);
        Ok(shuffled)
    }
}

/// Resolve `spec.placement` into a concrete host list, applying the
/// first-match-wins rules from §4.E. Returns the resolved triples; the
/// caller is responsible for writing them back onto the spec if desired.
///
/// # Errors
/// Returns `CephadmError::PlacementError` if a label selects no hosts or a
/// count-only placement cannot be satisfied by the candidate pool.
pub fn resolve_placement(
    spec: &ServiceSpec,
    all_hosts: &[Host],
    scheduler: &dyn Scheduler,
) -> Result<Vec<HostPlacement>, CephadmError> {
    match &spec.placement {
        PlacementSpec::Hosts(hosts) => Ok(hosts.clone()),
        PlacementSpec::Label(label) => {
            let matching: Vec<HostPlacement> = all_hosts
                .iter()
                .filter(|h| h.has_label(label))
                .map(|h| HostPlacement::bare(h.name.clone()))
                .collect();
            if matching.is_empty() {
                return Err(CephadmError::PlacementError(format!(
                    "no hosts carry label {label:?}"
                )));
            }
            Ok(matching)
        }
        PlacementSpec::Count(count) => {
            let selected = scheduler.select(all_hosts, *count)?;
            Ok(selected
                .into_iter()
                .map(|h| HostPlacement::bare(h.name))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(name: &str) -> Host {
        Host::new(name)
    }

    #[test]
    fn explicit_hosts_pass_through_unchanged() {
        let spec = ServiceSpec::new(
            "mgr",
            PlacementSpec::Hosts(vec![HostPlacement::bare("h1")]),
        );
        let resolved = resolve_placement(&spec, &[], &SimpleScheduler).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].hostname, "h1");
    }

    #[test]
    fn label_selects_matching_hosts_only() {
        let mut h1 = host("h1");
        h1.labels.insert("mon".to_string());
        let h2 = host("h2");

        let spec = ServiceSpec::new("mon", PlacementSpec::Label("mon".to_string()));
        let resolved = resolve_placement(&spec, &[h1, h2], &SimpleScheduler).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].hostname, "h1");
    }

    #[test]
    fn label_with_no_matches_errors() {
        let spec = ServiceSpec::new("mon", PlacementSpec::Label("nonexistent".to_string()));
        let resolved = resolve_placement(&spec, &[host("h1")], &SimpleScheduler);
        assert!(resolved.is_err());
    }

    #[test]
    fn count_selects_exactly_n_distinct_hosts() {
        let hosts = vec![host("h1"), host("h2"), host("h3")];
        let spec = ServiceSpec::new("mgr", PlacementSpec::Count(2));
        let resolved = resolve_placement(&spec, &hosts, &SimpleScheduler).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_ne!(resolved[0].hostname, resolved[1].hostname);
    }

    #[test]
    fn count_exceeding_pool_size_errors() {
        let hosts = vec![host("h1")];
        let spec = ServiceSpec::new("mgr", PlacementSpec::Count(3));
        assert!(resolve_placement(&spec, &hosts, &SimpleScheduler).is_err());
    }

    #[test]
    fn count_with_empty_pool_errors() {
        let spec = ServiceSpec::new("mgr", PlacementSpec::Count(1));
        assert!(resolve_placement(&spec, &[], &SimpleScheduler).is_err());
    }
}
