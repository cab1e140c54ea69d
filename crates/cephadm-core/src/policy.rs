//! Daemon-type policy table (§4.L), grounded in the repeated
//! `if daemon_type == 'mon'`/`'mgr'`/... branches throughout the original
//! `module.py`: expressed as data instead of scattered conditionals.

use serde::{Deserialize, Serialize};

/// Every daemon type the engine knows how to deploy and manage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DaemonType {
    Mon,
    Mgr,
    Mds,
    Rgw,
    RbdMirror,
    Osd,
    Crash,
    Prometheus,
    NodeExporter,
    Alertmanager,
    Grafana,
    Nfs,
}

impl DaemonType {
    /// Wire string used in `type.id` names and remote commands
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DaemonType::Mon => "mon",
            DaemonType::Mgr => "mgr",
            DaemonType::Mds => "mds",
            DaemonType::Rgw => "rgw",
            DaemonType::RbdMirror => "rbd-mirror",
            DaemonType::Osd => "osd",
            DaemonType::Crash => "crash",
            DaemonType::Prometheus => "prometheus",
            DaemonType::NodeExporter => "node-exporter",
            DaemonType::Alertmanager => "alertmanager",
            DaemonType::Grafana => "grafana",
            DaemonType::Nfs => "nfs",
        }
    }

    /// Parse the wire string back into a type, if recognized
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "mon" => DaemonType::Mon,
            "mgr" => DaemonType::Mgr,
            "mds" => DaemonType::Mds,
            "rgw" => DaemonType::Rgw,
            "rbd-mirror" => DaemonType::RbdMirror,
            "osd" => DaemonType::Osd,
            "crash" => DaemonType::Crash,
            "prometheus" => DaemonType::Prometheus,
            "node-exporter" => DaemonType::NodeExporter,
            "alertmanager" => DaemonType::Alertmanager,
            "grafana" => DaemonType::Grafana,
            "nfs" => DaemonType::Nfs,
            _ => return None,
        })
    }

    /// The row describing this type's policy
    #[must_use]
    pub fn policy(self) -> &'static DaemonTypePolicy {
        policy_row(self)
    }
}

/// One row of the policy table: what F/G/H need to know per daemon type,
/// instead of branching on `daemon_type` throughout those modules.
#[derive(Debug, Clone, Copy)]
pub struct DaemonTypePolicy {
    /// Entity-name template: some types use a `client.` prefix for auth entities
    pub client_prefix: bool,
    /// Whether this type participates in the upgrade ok-to-stop safety gate
    pub ok_to_stop_gate: bool,
    /// Whether this type needs a per-host crash keyring alongside its own
    pub needs_crash_keyring: bool,
    /// Whether placement entries for this type must carry a network
    pub network_required: bool,
    /// Whether this type is redeployed as part of the upgrade state machine
    pub upgrade_eligible: bool,
    /// Position in the fixed upgrade order `[mgr, mon, osd, rgw, mds]`;
    /// `None` for types the upgrade state machine does not drive.
    pub upgrade_order: Option<u8>,
}

const fn row(
    client_prefix: bool,
    ok_to_stop_gate: bool,
    needs_crash_keyring: bool,
    network_required: bool,
    upgrade_eligible: bool,
    upgrade_order: Option<u8>,
) -> DaemonTypePolicy {
    DaemonTypePolicy {
        client_prefix,
        ok_to_stop_gate,
        needs_crash_keyring,
        network_required,
        upgrade_eligible,
        upgrade_order,
    }
}

fn policy_row(daemon_type: DaemonType) -> &'static DaemonTypePolicy {
    static MON: DaemonTypePolicy = row(false, true, true, true, true, Some(1));
    static MGR: DaemonTypePolicy = row(false, false, true, false, true, Some(0));
    static MDS: DaemonTypePolicy = row(true, true, true, false, true, Some(4));
    static RGW: DaemonTypePolicy = row(true, false, true, false, true, Some(3));
    static RBD_MIRROR: DaemonTypePolicy = row(true, false, true, false, false, None);
    static OSD: DaemonTypePolicy = row(false, true, true, false, true, Some(2));
    static CRASH: DaemonTypePolicy = row(false, false, false, false, false, None);
    static PROMETHEUS: DaemonTypePolicy = row(false, false, true, false, false, None);
    static NODE_EXPORTER: DaemonTypePolicy = row(false, false, true, false, false, None);
    static ALERTMANAGER: DaemonTypePolicy = row(false, false, true, false, false, None);
    static GRAFANA: DaemonTypePolicy = row(false, false, true, false, false, None);
    static NFS: DaemonTypePolicy = row(true, false, true, false, false, None);

    match daemon_type {
        DaemonType::Mon => &MON,
        DaemonType::Mgr => &MGR,
        DaemonType::Mds => &MDS,
        DaemonType::Rgw => &RGW,
        DaemonType::RbdMirror => &RBD_MIRROR,
        DaemonType::Osd => &OSD,
        DaemonType::Crash => &CRASH,
        DaemonType::Prometheus => &PROMETHEUS,
        DaemonType::NodeExporter => &NODE_EXPORTER,
        DaemonType::Alertmanager => &ALERTMANAGER,
        DaemonType::Grafana => &GRAFANA,
        DaemonType::Nfs => &NFS,
    }
}

/// Fixed upgrade order from §4.H step 3
pub const UPGRADE_ORDER: [DaemonType; 5] = [
    DaemonType::Mgr,
    DaemonType::Mon,
    DaemonType::Osd,
    DaemonType::Rgw,
    DaemonType::Mds,
];

/// Derive the auth entity name for a daemon: `client.type.id` for types
/// that need the client prefix, raw `type.id` otherwise.
#[must_use]
pub fn entity_name(daemon_type: DaemonType, daemon_id: &str) -> String {
    let base = format!("{}.{daemon_id}", daemon_type.as_str());
    if daemon_type.policy().client_prefix {
        format!("client.{base}")
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_wire_string() {
        for dt in [
            DaemonType::Mon,
            DaemonType::Mgr,
            DaemonType::RbdMirror,
            DaemonType::NodeExporter,
        ] {
            assert_eq!(DaemonType::parse(dt.as_str()), Some(dt));
        }
    }

    #[test]
    fn mon_requires_network_and_gates_upgrade() {
        let p = DaemonType::Mon.policy();
        assert!(p.network_required);
        assert!(p.ok_to_stop_gate);
    }

    #[test]
    fn rgw_entity_name_carries_client_prefix() {
        assert_eq!(entity_name(DaemonType::Rgw, "myrgw.host1.abcdef"), "client.rgw.myrgw.host1.abcdef");
    }

    #[test]
    fn mon_entity_name_has_no_client_prefix() {
        assert_eq!(entity_name(DaemonType::Mon, "host1"), "mon.host1");
    }

    #[test]
    fn upgrade_order_matches_spec_sequence() {
        assert_eq!(
            UPGRADE_ORDER.map(DaemonType::as_str),
            ["mgr", "mon", "osd", "rgw", "mds"]
        );
    }
}
