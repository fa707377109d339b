// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Discrete health level exposed by each component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OverallStatus {
    Ok,
    #[default]
    Warn,
    Crit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusGauge {
    pub label: String,
    pub value: f64,
    pub max: Option<f64>,
    pub unit: Option<String>,
}

impl StatusGauge {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
            max: None,
            unit: None,
        }
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub overall: OverallStatus,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub gauges: Vec<StatusGauge>,
}

/// Immutable snapshot handed to whoever renders status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatusSnapshot {
    pub name: String,
    pub overall: OverallStatus,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub gauges: Vec<StatusGauge>,
}

pub trait ServiceStatusReporter: Send + Sync {
    fn service_name(&self) -> &'static str;
    fn status(&self) -> ServiceStatusSnapshot;
}

/// Cloneable handle so a component can mutate its own status while others read it.
#[derive(Clone)]
pub struct ServiceStatusHandle {
    name: &'static str,
    inner: Arc<RwLock<ServiceStatus>>,
}

impl ServiceStatusHandle {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(RwLock::new(ServiceStatus::default())),
        }
    }

    pub fn service_name(&self) -> &'static str {
        self.name
    }

    pub fn update<F>(&self, mutator: F)
    where
        F: FnOnce(&mut ServiceStatus),
    {
        let mut guard = self.inner.write();
        mutator(&mut guard);
    }

    pub fn set_overall(&self, status: OverallStatus) {
        self.update(|s| s.overall = status);
    }

    /// Pushes a warning unless an identical one is already present.
    pub fn push_warning(&self, msg: impl Into<String>) {
        let msg = msg.into();
        self.update(|s| {
            if !s.warnings.contains(&msg) {
                s.warnings.push(msg);
            }
        });
    }

    pub fn clear_warnings_matching(&self, predicate: impl Fn(&str) -> bool) {
        self.update(|s| s.warnings.retain(|w| !predicate(w)));
    }

    pub fn push_error(&self, msg: impl Into<String>) {
        self.update(|s| s.errors.push(msg.into()));
    }

    pub fn clear_errors_matching(&self, predicate: impl Fn(&str) -> bool) {
        self.update(|s| s.errors.retain(|e| !predicate(e)));
    }

    pub fn set_gauges(&self, gauges: Vec<StatusGauge>) {
        self.update(|s| s.gauges = gauges);
    }

    pub fn snapshot(&self) -> ServiceStatusSnapshot {
        let guard = self.inner.read();
        ServiceStatusSnapshot {
            name: self.name.to_string(),
            overall: guard.overall,
            warnings: guard.warnings.clone(),
            errors: guard.errors.clone(),
            gauges: guard.gauges.clone(),
        }
    }

    pub fn overall(&self) -> OverallStatus {
        self.inner.read().overall
    }
}

impl ServiceStatusReporter for ServiceStatusHandle {
    fn service_name(&self) -> &'static str {
        self.name
    }

    fn status(&self) -> ServiceStatusSnapshot {
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_deduplicated_and_clearable() {
        let status = ServiceStatusHandle::new("metadata_search");
        status.push_warning("circuit open");
        status.push_warning("circuit open");
        status.push_warning("slow responses");
        assert_eq!(status.snapshot().warnings.len(), 2);

        status.clear_warnings_matching(|w| w.contains("circuit"));
        assert_eq!(status.snapshot().warnings, vec!["slow responses".to_string()]);
    }

    #[test]
    fn clones_share_state() {
        let status = ServiceStatusHandle::new("ranking");
        let other = status.clone();
        other.set_overall(OverallStatus::Ok);
        other.set_gauges(vec![StatusGauge::new("pending_reorders", 1.0)]);
        assert_eq!(status.overall(), OverallStatus::Ok);
        assert_eq!(status.snapshot().gauges[0].label, "pending_reorders");
    }
}
