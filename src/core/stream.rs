//! Lazily composed entity queries
//!
//! An [`EntityStream`] is a plan, not a result: filters, sorts, skip and limit
//! steps are recorded in order and only evaluated by a [`StreamSource`] when a
//! terminal operation (`to_list`, `count`) runs.

use crate::core::entity::Entity;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Row predicate
pub type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Row comparator
pub type Comparator<E> = Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

/// One recorded step of a query
pub enum QueryStep<E> {
    Where(Predicate<E>),
    SortBy(Comparator<E>),
    Skip(u64),
    Limit(u64),
}

impl<E> Clone for QueryStep<E> {
    fn clone(&self) -> Self {
        match self {
            QueryStep::Where(p) => QueryStep::Where(Arc::clone(p)),
            QueryStep::SortBy(c) => QueryStep::SortBy(Arc::clone(c)),
            QueryStep::Skip(n) => QueryStep::Skip(*n),
            QueryStep::Limit(n) => QueryStep::Limit(*n),
        }
    }
}

impl<E> fmt::Debug for QueryStep<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStep::Where(_) => f.write_str("where"),
            QueryStep::SortBy(_) => f.write_str("sort"),
            QueryStep::Skip(n) => write!(f, "skip({})", n),
            QueryStep::Limit(n) => write!(f, "limit({})", n),
        }
    }
}

/// Ordered list of query steps plus the soft-delete scope
///
/// When `live_only` is set, the first step is a predicate dropping
/// soft-deleted rows, so any source that runs the steps in order excludes
/// them and skip/limit count live rows only.
pub struct QueryPlan<E> {
    steps: Vec<QueryStep<E>>,
    live_only: bool,
}

impl<E> Clone for QueryPlan<E> {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
            live_only: self.live_only,
        }
    }
}

impl<E> Default for QueryPlan<E> {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            live_only: false,
        }
    }
}

impl<E: Entity> QueryPlan<E> {
    pub fn steps(&self) -> &[QueryStep<E>] {
        &self.steps
    }

    pub fn excludes_deleted(&self) -> bool {
        self.live_only
    }

    /// Run the plan over a set of rows
    pub fn evaluate<I>(&self, rows: I) -> Vec<E>
    where
        I: IntoIterator<Item = E>,
    {
        let mut rows: Vec<E> = rows.into_iter().collect();

        for step in &self.steps {
            match step {
                QueryStep::Where(predicate) => rows.retain(|row| predicate(row)),
                QueryStep::SortBy(compare) => rows.sort_by(|a, b| compare(a, b)),
                QueryStep::Skip(n) => {
                    let n = usize::try_from(*n).unwrap_or(usize::MAX).min(rows.len());
                    rows.drain(..n);
                }
                QueryStep::Limit(n) => {
                    rows.truncate(usize::try_from(*n).unwrap_or(usize::MAX));
                }
            }
        }

        rows
    }

    /// Human-readable plan, for debug logging
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self.steps.iter().map(|s| format!("{:?}", s)).collect();
        if parts.is_empty() {
            parts.push("all".to_string());
        }
        let mut description = parts.join(" -> ");
        if self.live_only {
            description.push_str(" [live rows]");
        }
        description
    }
}

/// Backend able to evaluate a [`QueryPlan`]
///
/// The in-memory store runs the plan directly; a database-backed source would
/// translate it.
pub trait StreamSource<E: Entity>: Send + Sync {
    /// Evaluate the plan and return the matching rows
    fn fetch(&self, plan: &QueryPlan<E>) -> anyhow::Result<Vec<E>>;

    /// Count the rows matching the plan
    fn count(&self, plan: &QueryPlan<E>) -> anyhow::Result<u64> {
        Ok(self.fetch(plan)?.len() as u64)
    }
}

/// A query being built against a [`StreamSource`]
pub struct EntityStream<E: Entity> {
    source: Arc<dyn StreamSource<E>>,
    plan: QueryPlan<E>,
}

impl<E: Entity> Clone for EntityStream<E> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            plan: self.plan.clone(),
        }
    }
}

impl<E: Entity> EntityStream<E> {
    /// Start an unfiltered query over every row of the source
    pub fn new(source: Arc<dyn StreamSource<E>>) -> Self {
        Self {
            source,
            plan: QueryPlan::default(),
        }
    }

    /// Keep rows matching the predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.push(QueryStep::Where(Arc::new(predicate)))
    }

    /// Order rows with a comparator
    ///
    /// Sorting is stable; a later sort takes precedence over an earlier one.
    pub fn sorted_by<F>(self, compare: F) -> Self
    where
        F: Fn(&E, &E) -> Ordering + Send + Sync + 'static,
    {
        self.push(QueryStep::SortBy(Arc::new(compare)))
    }

    pub fn skip(self, n: u64) -> Self {
        self.push(QueryStep::Skip(n))
    }

    pub fn limit(self, n: u64) -> Self {
        self.push(QueryStep::Limit(n))
    }

    /// Restrict the query to rows that are not soft-deleted
    ///
    /// The predicate goes ahead of every recorded step, whenever this is
    /// called.
    pub fn exclude_deleted(mut self) -> Self {
        if !self.plan.live_only {
            self.plan.live_only = true;
            self.plan
                .steps
                .insert(0, QueryStep::Where(Arc::new(|row: &E| !row.is_deleted())));
        }
        self
    }

    pub fn plan(&self) -> &QueryPlan<E> {
        &self.plan
    }

    /// Evaluate the query
    pub fn to_list(&self) -> anyhow::Result<Vec<E>> {
        self.source.fetch(&self.plan)
    }

    /// Count the matching rows
    pub fn count(&self) -> anyhow::Result<u64> {
        self.source.count(&self.plan)
    }

    fn push(mut self, step: QueryStep<E>) -> Self {
        self.plan.steps.push(step);
        self
    }
}
