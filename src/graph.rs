//! Dependency graph and build scheduler.
//!
//! Every output file is one [`BuildTarget`]. Construction validates the whole
//! target set before anything runs, then groups targets into topological
//! levels (Kahn's algorithm):
//!
//! ```text
//! level 0   posts/a.html   posts/b.html   about.html   style.css
//!                 \              |             /
//! level 1          index.html  sitemap.xml  feed.xml
//! ```
//!
//! Levels execute one after another; targets inside a level run in parallel
//! on a rayon pool.

use crate::error::BuildError;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    time::SystemTime,
};

/// When a target's action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Run when the output is missing or older than any dependency.
    Timestamp,
    /// Run on every build. The action decides whether to touch the output.
    Always,
}

/// One output file together with everything it is built from.
#[derive(Debug, Clone)]
pub struct BuildTarget<A> {
    pub output: PathBuf,
    pub deps: Vec<PathBuf>,
    pub action: A,
    pub freshness: Freshness,
    /// Human-readable origin, used in error messages.
    pub label: Option<String>,
}

impl<A> BuildTarget<A> {
    pub fn new(output: PathBuf, deps: Vec<PathBuf>, action: A) -> Self {
        Self {
            output,
            deps,
            action,
            freshness: Freshness::Timestamp,
            label: None,
        }
    }

    pub fn always(mut self) -> Self {
        self.freshness = Freshness::Always;
        self
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The label, or the output path when none was given.
    pub fn describe(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self.output.display().to_string(),
        }
    }

    /// Whether the action has to run.
    pub fn needs_run(&self) -> bool {
        match self.freshness {
            Freshness::Always => true,
            Freshness::Timestamp => is_stale(&self.output, &self.deps),
        }
    }
}

/// Stale iff `output` is missing or any dependency is strictly newer.
///
/// An unreadable dependency timestamp counts as newer.
pub fn is_stale(output: &Path, deps: &[PathBuf]) -> bool {
    let Some(out_time) = modified(output) else {
        return true;
    };
    deps.iter()
        .any(|dep| modified(dep).is_none_or(|dep_time| dep_time > out_time))
}

fn modified(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

// ============================================================================
// Graph construction
// ============================================================================

/// Validated, topologically ordered target set.
#[derive(Debug)]
pub struct DependencyGraph<A> {
    targets: Vec<BuildTarget<A>>,
    /// Target indices per level, each level in declaration order.
    levels: Vec<Vec<usize>>,
}

impl<A> DependencyGraph<A> {
    /// Validate `targets` and compute execution levels.
    ///
    /// Fails on a duplicate output, a dependency that is neither another
    /// target's output nor an existing file, or a cycle.
    pub fn new(targets: Vec<BuildTarget<A>>) -> Result<Self, BuildError> {
        let mut by_output: HashMap<&Path, usize> = HashMap::with_capacity(targets.len());
        for (idx, target) in targets.iter().enumerate() {
            if let Some(first) = by_output.insert(&target.output, idx) {
                return Err(BuildError::DuplicateOutput {
                    output: target.output.clone(),
                    first: targets[first].describe(),
                    second: target.describe(),
                });
            }
        }

        // dependents[b] lists every target that depends on b's output
        let mut dependents = vec![Vec::new(); targets.len()];
        let mut in_degree = vec![0usize; targets.len()];
        for (idx, target) in targets.iter().enumerate() {
            for dep in &target.deps {
                match by_output.get(dep.as_path()) {
                    Some(&producer) => {
                        dependents[producer].push(idx);
                        in_degree[idx] += 1;
                    }
                    None if dep.exists() => {}
                    None => {
                        return Err(BuildError::MissingDependency {
                            target: target.output.clone(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
        }

        let mut levels = Vec::new();
        let mut current: Vec<usize> = (0..targets.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut placed = 0;
        while !current.is_empty() {
            placed += current.len();
            let mut next = Vec::new();
            for &idx in &current {
                for &dependent in &dependents[idx] {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            next.sort_unstable();
            levels.push(std::mem::replace(&mut current, next));
        }

        if placed < targets.len() {
            let cycle = find_cycle(&targets, &by_output, &in_degree);
            return Err(BuildError::Cycle(cycle));
        }

        Ok(Self { targets, levels })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Execution levels as target output paths.
    pub fn levels(&self) -> impl Iterator<Item = Vec<&Path>> {
        self.levels
            .iter()
            .map(|level| level.iter().map(|&i| self.targets[i].output.as_path()).collect())
    }
}

/// Walk backwards through unplaced targets until one repeats.
///
/// Every unplaced target has at least one unplaced producer, so the walk
/// always closes a loop.
fn find_cycle<A>(
    targets: &[BuildTarget<A>],
    by_output: &HashMap<&Path, usize>,
    in_degree: &[usize],
) -> Vec<PathBuf> {
    let Some(start) = in_degree.iter().position(|&d| d > 0) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut seen = HashMap::from([(start, 0usize)]);
    let mut current = start;
    loop {
        let producer = targets[current]
            .deps
            .iter()
            .filter_map(|dep| by_output.get(dep.as_path()).copied())
            .find(|&p| in_degree[p] > 0);
        let Some(producer) = producer else {
            break;
        };
        if let Some(&pos) = seen.get(&producer) {
            path.drain(..pos);
            break;
        }
        seen.insert(producer, path.len());
        path.push(producer);
        current = producer;
    }

    // walked against the edges; report in dependency order
    path.reverse();
    path.into_iter()
        .map(|i| targets[i].output.clone())
        .collect()
}

// ============================================================================
// Execution
// ============================================================================

/// What happened to one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The action ran and wrote the output.
    Rendered,
    /// The action ran but left the output as it was.
    Unchanged,
    /// Up to date; the action did not run.
    Fresh,
}

/// Per-target outcomes in execution order.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub steps: Vec<(PathBuf, Outcome)>,
}

impl BuildReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.steps.iter().filter(|(_, o)| *o == outcome).count()
    }

    #[cfg(test)]
    pub fn rendered(&self) -> impl Iterator<Item = &Path> {
        self.steps
            .iter()
            .filter(|(_, o)| *o == Outcome::Rendered)
            .map(|(p, _)| p.as_path())
    }

    #[cfg(test)]
    pub fn outcome(&self, output: &Path) -> Option<Outcome> {
        self.steps
            .iter()
            .find(|(p, _)| p == output)
            .map(|(_, o)| *o)
    }
}

impl<A: Sync> DependencyGraph<A> {
    /// Run every target that needs it, level by level.
    ///
    /// `run` returns whether it wrote the output. The first error stops the
    /// build: targets already running in the same level finish, nothing else
    /// starts. `jobs = None` uses one thread per CPU.
    pub fn execute<F>(&self, jobs: Option<usize>, run: F) -> Result<BuildReport>
    where
        F: Fn(&BuildTarget<A>) -> Result<bool> + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.unwrap_or(0))
            .build()
            .context("Failed to start worker pool")?;

        let has_error = AtomicBool::new(false);
        let mut report = BuildReport::default();

        for level in &self.levels {
            let results: Vec<Result<Option<Outcome>>> = pool.install(|| {
                level
                    .par_iter()
                    .map(|&idx| {
                        if has_error.load(Ordering::Relaxed) {
                            return Ok(None);
                        }
                        let target = &self.targets[idx];
                        if !target.needs_run() {
                            return Ok(Some(Outcome::Fresh));
                        }
                        match run(target) {
                            Ok(true) => Ok(Some(Outcome::Rendered)),
                            Ok(false) => Ok(Some(Outcome::Unchanged)),
                            Err(e) => {
                                has_error.store(true, Ordering::Relaxed);
                                Err(e)
                            }
                        }
                    })
                    .collect()
            });

            for (&idx, result) in level.iter().zip(results) {
                if let Some(outcome) = result? {
                    report.steps.push((self.targets[idx].output.clone(), outcome));
                }
            }
        }

        Ok(report)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        fs,
        sync::Mutex,
        time::{Duration, SystemTime},
    };
    use tempfile::TempDir;

    /// Concatenate every dependency into the output.
    fn concat(target: &BuildTarget<()>) -> Result<bool> {
        let mut out = Vec::new();
        for dep in &target.deps {
            out.extend(fs::read(dep)?);
        }
        crate::utils::fs::write_atomic(&target.output, &out)?;
        Ok(true)
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn t(output: &Path, deps: &[&Path]) -> BuildTarget<()> {
        BuildTarget::new(
            output.to_path_buf(),
            deps.iter().map(|d| d.to_path_buf()).collect(),
            (),
        )
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("a.html");
        let err = DependencyGraph::new(vec![t(&out, &[]).labeled("a.md"), t(&out, &[])])
            .unwrap_err();
        assert!(matches!(
            &err,
            BuildError::DuplicateOutput { output, first, second }
                if *output == out && first == "a.md" && *second == out.display().to_string()
        ));
        assert!(err.to_string().contains("`a.md`"));
    }

    #[test]
    fn test_missing_dependency_rejected() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("a.html");
        let missing = dir.path().join("a.md");
        let err = DependencyGraph::new(vec![t(&out, &[&missing])]).unwrap_err();
        assert!(matches!(
            err,
            BuildError::MissingDependency { target, dependency }
                if target == out && dependency == missing
        ));
    }

    #[test]
    fn test_cycle_rejected_before_anything_is_written() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.html");
        let b = dir.path().join("b.html");
        let c = dir.path().join("c.html");

        let err = DependencyGraph::new(vec![t(&c, &[]), t(&a, &[&b]), t(&b, &[&a, &c])])
            .unwrap_err();

        let BuildError::Cycle(cycle) = &err else {
            panic!("expected cycle, got {err:?}");
        };
        assert_eq!(cycle.len(), 2);
        assert!(cycle.contains(&a) && cycle.contains(&b));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.html");
        let err = DependencyGraph::new(vec![t(&a, &[&a])]).unwrap_err();
        assert!(matches!(err, BuildError::Cycle(c) if c == vec![a]));
    }

    #[test]
    fn test_levels_follow_dependencies() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.md");
        fs::write(&src, "a").unwrap();
        let a = dir.path().join("a.html");
        let b = dir.path().join("b.html");
        let index = dir.path().join("index.html");

        let graph =
            DependencyGraph::new(vec![t(&index, &[&a, &b]), t(&a, &[&src]), t(&b, &[&a])]).unwrap();

        let levels: Vec<_> = graph.levels().collect();
        assert_eq!(
            levels,
            vec![vec![a.as_path()], vec![b.as_path()], vec![index.as_path()]]
        );
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_dependency_completes_before_dependent_starts() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let mut targets = Vec::new();
        let mut leaves = Vec::new();
        for i in 0..8 {
            let src = root.join(format!("{i}.md"));
            fs::write(&src, format!("{i}")).unwrap();
            let out = root.join(format!("{i}.html"));
            targets.push(t(&out, &[&src]));
            leaves.push(out);
        }
        let index = root.join("index.html");
        let deps: Vec<&Path> = leaves.iter().map(PathBuf::as_path).collect();
        targets.push(t(&index, &deps));

        let events = Mutex::new(Vec::new());
        let graph = DependencyGraph::new(targets).unwrap();
        graph
            .execute(Some(4), |target| {
                events.lock().unwrap().push(("start", target.output.clone()));
                let written = concat(target)?;
                events.lock().unwrap().push(("end", target.output.clone()));
                Ok(written)
            })
            .unwrap();

        let events = events.into_inner().unwrap();
        let index_start = events
            .iter()
            .position(|e| *e == ("start", index.clone()))
            .unwrap();
        for leaf in &leaves {
            let end = events
                .iter()
                .position(|e| *e == ("end", leaf.clone()))
                .unwrap();
            assert!(end < index_start);
        }
        assert_eq!(fs::read_to_string(&index).unwrap(), "01234567");
    }

    #[test]
    fn test_fresh_targets_are_skipped() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.md");
        let out = dir.path().join("a.html");
        fs::write(&src, "v1").unwrap();

        let graph = DependencyGraph::new(vec![t(&out, &[&src])]).unwrap();
        let first = graph.execute(Some(1), concat).unwrap();
        assert_eq!(first.outcome(&out), Some(Outcome::Rendered));
        let mtime = fs::metadata(&out).unwrap().modified().unwrap();

        let second = graph.execute(Some(1), concat).unwrap();
        assert_eq!(second.outcome(&out), Some(Outcome::Fresh));
        assert_eq!(fs::metadata(&out).unwrap().modified().unwrap(), mtime);
    }

    #[test]
    fn test_newer_dependency_triggers_rebuild() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.md");
        let out = dir.path().join("a.html");
        fs::write(&src, "old").unwrap();

        let graph = DependencyGraph::new(vec![t(&out, &[&src])]).unwrap();
        graph.execute(None, concat).unwrap();

        let past = SystemTime::now() - Duration::from_secs(60);
        set_mtime(&out, past);
        fs::write(&src, "new").unwrap();
        set_mtime(&src, past + Duration::from_secs(1));

        assert!(is_stale(&out, std::slice::from_ref(&src)));
        let report = graph.execute(None, concat).unwrap();
        assert_eq!(report.count(Outcome::Rendered), 1);
        assert_eq!(fs::read_to_string(&out).unwrap(), "new");
    }

    #[test]
    fn test_equal_mtime_is_fresh() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.md");
        let out = dir.path().join("a.html");
        fs::write(&src, "a").unwrap();
        fs::write(&out, "a").unwrap();
        let when = SystemTime::now() - Duration::from_secs(10);
        set_mtime(&src, when);
        set_mtime(&out, when);

        assert!(!is_stale(&out, &[src]));
        assert!(is_stale(&dir.path().join("missing.html"), &[]));
    }

    #[test]
    fn test_always_targets_report_unchanged() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("feed.xml");
        let graph = DependencyGraph::new(vec![t(&out, &[]).always()]).unwrap();

        let write = |target: &BuildTarget<()>| {
            crate::utils::fs::write_if_changed(&target.output, b"<feed/>")
        };
        assert_eq!(
            graph.execute(None, write).unwrap().outcome(&out),
            Some(Outcome::Rendered)
        );
        assert_eq!(
            graph.execute(None, write).unwrap().outcome(&out),
            Some(Outcome::Unchanged)
        );
    }

    #[test]
    fn test_failure_stops_later_levels() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.html");
        let b = dir.path().join("b.html");
        let graph = DependencyGraph::new(vec![t(&a, &[]), t(&b, &[&a])]).unwrap();

        let ran = Mutex::new(Vec::new());
        let err = graph
            .execute(Some(2), |target| {
                ran.lock().unwrap().push(target.output.clone());
                anyhow::bail!("boom: {}", target.output.display())
            })
            .unwrap_err();

        assert!(err.to_string().contains("a.html"));
        assert_eq!(ran.into_inner().unwrap(), vec![a]);
        assert!(!b.exists());
    }
}
