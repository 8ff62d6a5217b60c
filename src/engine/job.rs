//! Job descriptions and the crossover window planner.

use crate::population::Buffer;
use crate::strategy::CrossoverPolicy;

/// One unit of work, referencing population slots by index.
///
/// The coordinator builds job lists whose slot sets are pairwise disjoint
/// within a phase; the queue and workers rely on that invariant instead of
/// locking entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Job {
    /// Mutate one cell in place and mark it stale. The post-crossover
    /// mutation pass targets freshly written children in the `Next` buffer;
    /// every other mutation targets `Current`.
    Mutate { index: usize, buffer: Buffer },
    /// Recompute one cell's score and clear its staleness.
    Fitness { index: usize },
    /// Read `parents` from the current buffer and overwrite `children` in
    /// the next buffer.
    Crossover {
        parents: Vec<usize>,
        children: Vec<usize>,
    },
}

impl Job {
    /// The population slots this job touches.
    #[cfg(any(test, debug_assertions))]
    pub fn slots(&self) -> Vec<(Buffer, usize)> {
        match self {
            Job::Mutate { index, buffer } => vec![(*buffer, *index)],
            Job::Fitness { index } => vec![(Buffer::Current, *index)],
            Job::Crossover { parents, children } => parents
                .iter()
                .map(|&index| (Buffer::Current, index))
                .chain(children.iter().map(|&index| (Buffer::Next, index)))
                .collect(),
        }
    }
}

/// Plans the crossover jobs for one generation over a ranked population.
///
/// Parent windows start at rank 0 and slide by
/// `max(parent_stride, parent_num)` ranks per job, so windows never
/// overlap. Child windows take `children_num` slots from the bottom of the
/// ranking, moving upward. Planning stops as soon as the next parent window
/// would reach into the remaining child region, which keeps every slot
/// referenced at most once per generation and never touches the top ranks
/// as children.
pub(crate) fn plan_crossover_jobs(num_cells: usize, policy: &CrossoverPolicy) -> Vec<Job> {
    let parent_num = policy.get_parent_num();
    let children_num = policy.get_children_num();
    let advance = policy.get_parent_stride().max(parent_num);

    let mut jobs = Vec::new();
    let mut parent_start = 0;
    let mut child_end = num_cells;
    loop {
        let parent_end = parent_start + parent_num;
        let child_start = match child_end.checked_sub(children_num) {
            Some(start) => start,
            None => break,
        };
        if parent_end > child_start {
            break;
        }
        jobs.push(Job::Crossover {
            parents: (parent_start..parent_end).collect(),
            children: (child_start..child_end).collect(),
        });
        parent_start += advance;
        child_end = child_start;
    }
    jobs
}
