//! Index-prefix cache: a trie of jobs keyed by index array
//!
//! Combine nodes buffer jobs here until their counterparts arrive. Lookups
//! are either exact or by prefix, and whole subtrees can be cut once they
//! have been consumed so long streams do not accumulate state.

use iteration_types::Job;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct CacheNode {
    job: Option<Job>,
    children: BTreeMap<usize, CacheNode>,
}

impl CacheNode {
    fn is_empty(&self) -> bool {
        self.job.is_none() && self.children.is_empty()
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Job>) {
        if let Some(job) = &self.job {
            out.push(job);
        }
        for child in self.children.values() {
            child.collect(out);
        }
    }

    fn count(&self) -> usize {
        usize::from(self.job.is_some()) + self.children.values().map(CacheNode::count).sum::<usize>()
    }

    /// Remove the subtree at `path`, pruning emptied ancestors
    fn cut(&mut self, path: &[usize]) -> Option<CacheNode> {
        match path.split_first() {
            None => Some(std::mem::take(self)),
            Some((head, rest)) => {
                let child = self.children.get_mut(head)?;
                let removed = if rest.is_empty() {
                    Some(std::mem::take(child))
                } else {
                    child.cut(rest)
                };
                if self.children.get(head).is_some_and(CacheNode::is_empty) {
                    self.children.remove(head);
                }
                removed
            }
        }
    }

    /// Remove only the job at `path`, keeping deeper entries
    fn remove(&mut self, path: &[usize]) -> Option<Job> {
        match path.split_first() {
            None => self.job.take(),
            Some((head, rest)) => {
                let child = self.children.get_mut(head)?;
                let removed = child.remove(rest);
                if child.is_empty() {
                    self.children.remove(head);
                }
                removed
            }
        }
    }
}

/// Trie over index arrays, one per (node, input, owning process)
#[derive(Debug, Default)]
pub struct TreeCache {
    root: CacheNode,
    index_length: Option<usize>,
    len: usize,
}

impl TreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a job at its index, replacing any job already there
    pub fn insert(&mut self, job: Job) {
        let index_length = job.index().len();
        let mut node = &mut self.root;
        for position in job.index() {
            node = node.children.entry(*position).or_default();
        }
        if node.job.replace(job).is_none() {
            self.len += 1;
        }
        self.index_length = Some(index_length);
    }

    /// Job stored at exactly this index
    pub fn get(&self, index: &[usize]) -> Option<&Job> {
        self.node_at(index).and_then(|node| node.job.as_ref())
    }

    /// Remove and return the job stored at exactly this index
    pub fn remove(&mut self, index: &[usize]) -> Option<Job> {
        let removed = self.root.remove(index);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Every job whose index starts with `prefix`, in index order
    pub fn jobs_with_prefix(&self, prefix: &[usize]) -> Vec<&Job> {
        let mut jobs = Vec::new();
        if let Some(node) = self.node_at(prefix) {
            node.collect(&mut jobs);
        }
        jobs
    }

    /// Remove every job whose index starts with `prefix`; returns how many
    pub fn cut(&mut self, prefix: &[usize]) -> usize {
        let removed = self.root.cut(prefix).map_or(0, |subtree| subtree.count());
        self.len -= removed;
        removed
    }

    /// Index length of the most recently stored job, zero when nothing has
    /// been stored
    pub fn index_length(&self) -> usize {
        self.index_length.unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node_at(&self, index: &[usize]) -> Option<&CacheNode> {
        let mut node = &self.root;
        for position in index {
            node = node.children.get(position)?;
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iteration_types::{DataRef, InvocationContext, OwningProcess};
    use proptest::prelude::*;

    fn job(index: &[usize]) -> Job {
        Job::single(
            OwningProcess::new("run"),
            index.to_vec(),
            "p",
            DataRef::new(format!("ref{:?}", index)),
            InvocationContext::default(),
        )
    }

    fn indices(jobs: &[&Job]) -> Vec<Vec<usize>> {
        jobs.iter().map(|j| j.index().to_vec()).collect()
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = TreeCache::new();
        cache.insert(job(&[0, 1]));
        cache.insert(job(&[1, 0]));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.index_length(), 2);
        assert!(cache.get(&[0, 1]).is_some());
        assert!(cache.get(&[0]).is_none());
        assert!(cache.get(&[2, 0]).is_none());
    }

    #[test]
    fn test_empty_cache_index_length() {
        let cache = TreeCache::new();
        assert_eq!(cache.index_length(), 0);
        assert!(cache.get(&[]).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_replace_does_not_double_count() {
        let mut cache = TreeCache::new();
        cache.insert(job(&[3]));
        cache.insert(job(&[3]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_jobs_with_prefix_in_index_order() {
        let mut cache = TreeCache::new();
        cache.insert(job(&[1, 1]));
        cache.insert(job(&[0, 1]));
        cache.insert(job(&[0, 0]));
        cache.insert(job(&[1, 0]));

        assert_eq!(
            indices(&cache.jobs_with_prefix(&[0])),
            vec![vec![0, 0], vec![0, 1]]
        );
        assert_eq!(cache.jobs_with_prefix(&[]).len(), 4);
        assert!(cache.jobs_with_prefix(&[5]).is_empty());
    }

    #[test]
    fn test_cut_removes_subtree() {
        let mut cache = TreeCache::new();
        cache.insert(job(&[0, 0]));
        cache.insert(job(&[0, 1]));
        cache.insert(job(&[1, 0]));

        assert_eq!(cache.cut(&[0]), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.jobs_with_prefix(&[0]).is_empty());
        assert!(cache.get(&[0, 1]).is_none());
        assert!(cache.get(&[1, 0]).is_some());

        assert_eq!(cache.cut(&[7]), 0);
        assert_eq!(cache.cut(&[]), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_exact_keeps_deeper_entries() {
        let mut cache = TreeCache::new();
        cache.insert(job(&[0]));
        cache.insert(job(&[0, 0]));

        assert!(cache.remove(&[0]).is_some());
        assert!(cache.remove(&[0]).is_none());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&[0, 0]).is_some());
    }

    proptest! {
        #[test]
        fn property_cut_hides_prefix(
            entries in proptest::collection::vec(proptest::collection::vec(0usize..3, 2), 0..20),
            prefix in proptest::collection::vec(0usize..3, 0..2),
        ) {
            let mut cache = TreeCache::new();
            for index in &entries {
                cache.insert(job(index));
            }
            let before = cache.len();
            let removed = cache.cut(&prefix);

            prop_assert!(cache.jobs_with_prefix(&prefix).is_empty());
            prop_assert_eq!(cache.len(), before - removed);
            for index in &entries {
                let under_prefix = index.starts_with(&prefix);
                prop_assert_eq!(cache.get(index).is_some(), !under_prefix);
            }
        }
    }
}
