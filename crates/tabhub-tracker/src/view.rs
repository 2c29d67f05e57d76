//! Derived, presentation-facing snapshots of the known tabs.
//!
//! Views are recomputed from scratch after every mutation of the known
//! set and on every recompute tick. The set is bounded by one user's
//! concurrently open tabs, so full recomputation stays cheap.

use chrono::{DateTime, Utc};

use tabhub_core::config::presence::PresenceConfig;
use tabhub_core::types::DeviceId;
use tabhub_entity::tab::{Liveness, TabRecord};

use crate::classify::classify;
use crate::identity::LocalIdentity;

/// One classified tab.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DerivedTab {
    /// Liveness at the view's `now` reference.
    pub liveness: Liveness,
    /// The underlying record.
    pub record: TabRecord,
    /// Whether this is the tab of the running process. Used only for
    /// ordering and labeling, never for classification.
    pub is_self: bool,
}

/// All tabs of one device, self tab first, the rest freshest first.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DeviceGroup {
    /// The device the tabs run on.
    pub device_id: DeviceId,
    /// Whether this is the device of the running process.
    pub is_self_device: bool,
    /// The device's tabs.
    pub tabs: Vec<DerivedTab>,
}

/// A complete derived snapshot for the current user.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TabsView {
    /// The logical `now` the classifications were derived against.
    pub now: DateTime<Utc>,
    /// Every known tab, freshest first.
    pub all: Vec<DerivedTab>,
    /// Tabs grouped by device; the self device sorts first, remaining
    /// groups by their freshest tab.
    pub devices: Vec<DeviceGroup>,
}

impl TabsView {
    /// An empty view, published before sign-in and after sign-out.
    pub fn empty() -> Self {
        Self {
            now: Utc::now(),
            all: Vec::new(),
            devices: Vec::new(),
        }
    }

    /// Tabs classified active.
    pub fn active(&self) -> Vec<&DerivedTab> {
        self.filtered(Liveness::Active)
    }

    /// Tabs classified idle.
    pub fn idle(&self) -> Vec<&DerivedTab> {
        self.filtered(Liveness::Idle)
    }

    /// Tabs classified stale.
    pub fn stale(&self) -> Vec<&DerivedTab> {
        self.filtered(Liveness::Stale)
    }

    /// The view for this process's own tab, if it has heartbeated yet.
    pub fn self_tab(&self) -> Option<&DerivedTab> {
        self.all.iter().find(|t| t.is_self)
    }

    fn filtered(&self, liveness: Liveness) -> Vec<&DerivedTab> {
        self.all.iter().filter(|t| t.liveness == liveness).collect()
    }
}

/// Derive a full view from the known records.
pub fn derive_view<'a>(
    records: impl IntoIterator<Item = &'a TabRecord>,
    now: DateTime<Utc>,
    config: &PresenceConfig,
    identity: &LocalIdentity,
) -> TabsView {
    let mut all: Vec<DerivedTab> = records
        .into_iter()
        .map(|record| DerivedTab {
            liveness: classify(record, now, config),
            record: record.clone(),
            is_self: record.tab_id == identity.tab_id,
        })
        .collect();
    all.sort_by(|a, b| b.record.last_seen.cmp(&a.record.last_seen));

    let mut devices: Vec<DeviceGroup> = Vec::new();
    for tab in &all {
        let device_id = tab.record.device_id;
        match devices.iter_mut().find(|g| g.device_id == device_id) {
            Some(group) => group.tabs.push(tab.clone()),
            None => devices.push(DeviceGroup {
                device_id,
                is_self_device: device_id == identity.device_id,
                tabs: vec![tab.clone()],
            }),
        }
    }

    // Within a group: the self tab first, the rest keep freshest-first.
    for group in &mut devices {
        group
            .tabs
            .sort_by(|a, b| b.is_self.cmp(&a.is_self).then(b.record.last_seen.cmp(&a.record.last_seen)));
    }

    // Groups inherit freshest-first order from `all`; self device wins.
    devices.sort_by(|a, b| b.is_self_device.cmp(&a.is_self_device));

    TabsView { now, all, devices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tabhub_core::types::{TabId, UserId};

    fn record(
        user_id: UserId,
        device_id: DeviceId,
        tab_id: TabId,
        seen_seconds_ago: i64,
        now: DateTime<Utc>,
    ) -> TabRecord {
        TabRecord {
            user_id,
            device_id,
            tab_id,
            user_agent: "test".to_string(),
            is_active: true,
            last_seen: now - Duration::seconds(seen_seconds_ago),
            created_at: now - Duration::seconds(120),
        }
    }

    #[test]
    fn test_two_devices_form_two_groups_with_self_first() {
        let now = Utc::now();
        let user = UserId::new();
        let identity = LocalIdentity {
            device_id: DeviceId::new(),
            tab_id: TabId::new(),
        };
        let other_device = DeviceId::new();

        let records = vec![
            // Freshest tab overall lives on the other device.
            record(user, other_device, TabId::new(), 2, now),
            record(user, identity.device_id, TabId::new(), 5, now),
            record(user, identity.device_id, identity.tab_id, 30, now),
        ];

        let view = derive_view(&records, now, &PresenceConfig::default(), &identity);

        assert_eq!(view.devices.len(), 2);
        assert!(view.devices[0].is_self_device);
        assert_eq!(view.devices[1].device_id, other_device);

        // The self tab sorts first in its group despite being older.
        let own = &view.devices[0].tabs;
        assert!(own[0].is_self);
        assert_eq!(own[1].record.last_seen, now - Duration::seconds(5));
    }

    #[test]
    fn test_exactly_one_self_tab() {
        let now = Utc::now();
        let user = UserId::new();
        let identity = LocalIdentity {
            device_id: DeviceId::new(),
            tab_id: TabId::new(),
        };
        let records = vec![
            record(user, identity.device_id, identity.tab_id, 1, now),
            record(user, identity.device_id, TabId::new(), 1, now),
            record(user, DeviceId::new(), TabId::new(), 1, now),
        ];

        let view = derive_view(&records, now, &PresenceConfig::default(), &identity);
        assert_eq!(view.all.iter().filter(|t| t.is_self).count(), 1);
        assert!(view.self_tab().is_some());
    }

    #[test]
    fn test_filtered_lists_partition_the_view() {
        let now = Utc::now();
        let user = UserId::new();
        let identity = LocalIdentity {
            device_id: DeviceId::new(),
            tab_id: TabId::new(),
        };
        let records = vec![
            record(user, identity.device_id, identity.tab_id, 5, now),
            record(user, identity.device_id, TabId::new(), 30, now),
            record(user, DeviceId::new(), TabId::new(), 300, now),
        ];

        let view = derive_view(&records, now, &PresenceConfig::default(), &identity);
        assert_eq!(view.active().len(), 1);
        assert_eq!(view.idle().len(), 1);
        assert_eq!(view.stale().len(), 1);
        assert_eq!(view.all.len(), 3);
    }

    #[test]
    fn test_all_is_freshest_first() {
        let now = Utc::now();
        let user = UserId::new();
        let identity = LocalIdentity {
            device_id: DeviceId::new(),
            tab_id: TabId::new(),
        };
        let records = vec![
            record(user, DeviceId::new(), TabId::new(), 50, now),
            record(user, DeviceId::new(), TabId::new(), 5, now),
            record(user, DeviceId::new(), TabId::new(), 20, now),
        ];

        let view = derive_view(&records, now, &PresenceConfig::default(), &identity);
        let seen: Vec<_> = view.all.iter().map(|t| t.record.last_seen).collect();
        let mut sorted = seen.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(seen, sorted);
    }
}
