//! Daemon filtering: `get_daemons(filter, ...)` from §4.D, expressed as a
//! typed builder in the same chained-setter style the package used for its
//! SQL query builder.

use crate::types::DaemonDescription;

/// Selects a subset of daemons from the cache by type/id/service/host/style/fsid
#[derive(Debug, Clone, Default)]
pub struct DaemonFilter {
    daemon_type: Option<String>,
    daemon_id: Option<String>,
    service_name: Option<String>,
    hostname: Option<String>,
    style: Option<String>,
    fsid: Option<String>,
}

impl DaemonFilter {
    /// No restriction — matches every daemon
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one daemon type, e.g. `mon`
    #[must_use]
    pub fn daemon_type(mut self, daemon_type: impl Into<String>) -> Self {
        self.daemon_type = Some(daemon_type.into());
        self
    }

    /// Restrict to one daemon id
    #[must_use]
    pub fn daemon_id(mut self, daemon_id: impl Into<String>) -> Self {
        self.daemon_id = Some(daemon_id.into());
        self
    }

    /// Restrict to daemon ids carrying this service-name prefix
    #[must_use]
    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Restrict to one host
    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Restrict to a deployment style prefix, e.g. `cephadm`
    #[must_use]
    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Restrict to one cluster fsid
    #[must_use]
    pub fn fsid(mut self, fsid: impl Into<String>) -> Self {
        self.fsid = Some(fsid.into());
        self
    }

    /// Whether a daemon description matches every set criterion
    #[must_use]
    pub fn matches(&self, daemon: &DaemonDescription) -> bool {
        if let Some(want) = &self.daemon_type
            && &daemon.daemon_type != want
        {
            return false;
        }
        if let Some(want) = &self.daemon_id
            && &daemon.daemon_id != want
        {
            return false;
        }
        if let Some(want) = &self.service_name
            && !daemon.daemon_id.starts_with(want.as_str())
        {
            return false;
        }
        if let Some(want) = &self.hostname
            && &daemon.hostname != want
        {
            return false;
        }
        if let Some(want) = &self.style {
            match &daemon.style {
                Some(style) if style.starts_with(want.as_str()) => {}
                _ => return false,
            }
        }
        if let Some(want) = &self.fsid
            && daemon.fsid.as_deref() != Some(want.as_str())
        {
            return false;
        }
        true
    }
}

/// Apply a filter over a daemon list
pub fn filter_daemons<'a>(
    daemons: impl IntoIterator<Item = &'a DaemonDescription>,
    filter: &DaemonFilter,
) -> Vec<&'a DaemonDescription> {
    daemons.into_iter().filter(|d| filter.matches(d)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DaemonStatus;

    fn daemon(daemon_type: &str, daemon_id: &str, hostname: &str) -> DaemonDescription {
        let mut d = DaemonDescription::new(daemon_type, daemon_id, hostname);
        d.status = DaemonStatus::Running;
        d.style = Some("cephadm:v1".to_string());
        d.fsid = Some("abc-123".to_string());
        d
    }

    #[test]
    fn filter_by_type_restricts_results() {
        let daemons = vec![
            daemon("mon", "a", "host1"),
            daemon("mgr", "a", "host1"),
        ];
        let filter = DaemonFilter::new().daemon_type("mon");
        let matched = filter_daemons(&daemons, &filter);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].daemon_type, "mon");
    }

    #[test]
    fn filter_by_service_name_matches_prefix() {
        let daemons = vec![daemon("rgw", "myrgw.host1.abcdef", "host1")];
        let filter = DaemonFilter::new().service_name("myrgw");
        assert_eq!(filter_daemons(&daemons, &filter).len(), 1);

        let filter = DaemonFilter::new().service_name("otherrgw");
        assert_eq!(filter_daemons(&daemons, &filter).len(), 0);
    }

    #[test]
    fn filter_by_fsid_excludes_mismatched_cluster() {
        let mut d = daemon("mon", "a", "host1");
        d.fsid = Some("different".to_string());
        let daemons = vec![d];
        let filter = DaemonFilter::new().fsid("abc-123");
        assert_eq!(filter_daemons(&daemons, &filter).len(), 0);
    }

    #[test]
    fn empty_filter_matches_everything() {
        let daemons = vec![daemon("mon", "a", "host1"), daemon("mgr", "a", "host1")];
        let filter = DaemonFilter::new();
        assert_eq!(filter_daemons(&daemons, &filter).len(), 2);
    }
}
