//! Host load sampling via `sysinfo`.

use crate::activity::{ActivityTracker, PointerSource};
use std::path::Path;
use std::time::Instant;
use sysinfo::{Disks, System};
use well_core::{LoadProbe, Resources};

/// CPU, memory and root-disk usage plus pointer-based user presence.
pub struct SystemProbe<P> {
    system: System,
    activity: ActivityTracker<P>,
}

impl<P: PointerSource> SystemProbe<P> {
    /// Blocks for `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL` so the first
    /// CPU sample is meaningful.
    pub fn new(activity: ActivityTracker<P>) -> Self {
        let mut system = System::new();
        // CPU usage is a delta between refreshes; prime the first one.
        system.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        Self { system, activity }
    }

    fn cpu_percent(&mut self) -> f32 {
        self.system.refresh_cpu_usage();
        self.system.global_cpu_usage().clamp(0.0, 100.0)
    }

    fn memory_percent(&mut self) -> f32 {
        self.system.refresh_memory();
        percent(self.system.used_memory(), self.system.total_memory())
    }
}

fn disk_percent(mount: &Path) -> f32 {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .find(|d| d.mount_point() == mount)
        .map(|d| percent(d.total_space().saturating_sub(d.available_space()), d.total_space()))
        .unwrap_or(0.0)
}

fn percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 100.0) as f32
}

impl<P: PointerSource> LoadProbe for SystemProbe<P> {
    fn resources(&mut self) -> Resources {
        Resources {
            cpu: self.cpu_percent(),
            memory: self.memory_percent(),
            disk: disk_percent(Path::new("/")),
        }
    }

    fn user_active(&mut self) -> bool {
        self.activity.is_active(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::NoPointer;
    use std::time::Duration;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(50, 200), 25.0);
    }

    #[test]
    fn test_resources_in_range() {
        let mut probe = SystemProbe::new(ActivityTracker::new(NoPointer, Duration::from_secs(60)));
        let r = probe.resources();
        for v in [r.cpu, r.memory, r.disk] {
            assert!((0.0..=100.0).contains(&v), "{v} out of range");
        }
        assert!(probe.user_active());
    }

    #[test]
    fn test_new_waits_for_cpu_delta() {
        let start = std::time::Instant::now();
        let _sampler = SystemProbe::new(ActivityTracker::new(NoPointer, Duration::from_secs(60)));
        assert!(start.elapsed() >= sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    }
}
