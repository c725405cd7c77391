use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::PathBuf,
};

use tracing::trace;

/// Discovers external processes a job may have spawned without registering them.
pub trait ChildDiscovery: Send + Sync {
    /// Pids of the matching processes right now.
    fn snapshot(&self) -> BTreeSet<u32>;
}

/// Discovery that never finds anything; for jobs that register their children explicitly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDiscovery;

impl ChildDiscovery for NoDiscovery {
    fn snapshot(&self) -> BTreeSet<u32> {
        BTreeSet::new()
    }
}

/// `/proc` scanner matching processes by command name.
///
/// On systems without `/proc` every snapshot is empty.
#[derive(Debug, Clone)]
pub struct ProcScan {
    pattern: String,
    root: PathBuf,
    ancestor: Option<u32>,
}

impl Default for ProcScan {
    fn default() -> Self {
        Self::new("chrome")
    }
}

impl ProcScan {
    /// Match processes whose command name contains `pattern` (case-insensitive).
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into().to_ascii_lowercase(),
            root: PathBuf::from("/proc"),
            ancestor: None,
        }
    }

    /// Only report descendants of `pid`.
    pub fn descendants_of(mut self, pid: u32) -> Self {
        self.ancestor = Some(pid);
        self
    }

    /// Only report descendants of the current process.
    pub fn own_descendants(self) -> Self {
        self.descendants_of(std::process::id())
    }

    /// Scan an alternative procfs mount.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    fn scan(&self) -> HashMap<u32, (String, u32)> {
        let mut table = HashMap::new();
        let Ok(entries) = fs::read_dir(&self.root) else {
            return table;
        };
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            // Processes may vanish between listing and reading.
            let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            if let Some((comm, ppid)) = parse_stat(&stat) {
                table.insert(pid, (comm, ppid));
            }
        }
        table
    }
}

impl ChildDiscovery for ProcScan {
    fn snapshot(&self) -> BTreeSet<u32> {
        let table = self.scan();
        let found: BTreeSet<u32> = table
            .iter()
            .filter(|(_, (comm, _))| comm.to_ascii_lowercase().contains(&self.pattern))
            .filter(|(pid, _)| match self.ancestor {
                Some(root) => descends_from(&table, **pid, root),
                None => true,
            })
            .map(|(pid, _)| *pid)
            .collect();
        trace!(target: "taskctl.exec.discover", pattern = %self.pattern, count = found.len(), "proc scan");
        found
    }
}

/// `(comm, ppid)` from a `/proc/<pid>/stat` line.
///
/// `comm` may itself contain spaces and parentheses, so fields are taken after the last `)`.
fn parse_stat(stat: &str) -> Option<(String, u32)> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    if close <= open {
        return None;
    }
    let comm = stat[open + 1..close].to_string();
    let mut rest = stat[close + 1..].split_whitespace();
    let _state = rest.next()?;
    let ppid = rest.next()?.parse().ok()?;
    Some((comm, ppid))
}

fn descends_from(table: &HashMap<u32, (String, u32)>, pid: u32, ancestor: u32) -> bool {
    let mut current = pid;
    // Bounded walk; pid reuse can create cycles in a racy snapshot.
    for _ in 0..table.len() {
        let Some((_, ppid)) = table.get(&current) else {
            return false;
        };
        if *ppid == ancestor {
            return true;
        }
        if *ppid == 0 || *ppid == current {
            return false;
        }
        current = *ppid;
    }
    false
}
