//! Per-render bookkeeping shared by every pass of one render session.
//!
//! The context tracks three disjoint sets of dependency keys, all reduced
//! to their [minimal form](TemplateKey::minimal) so the same template
//! reached along different routes is one node:
//!
//! - resolved: content fetched, ready to splice, with the actual backing
//!   key that matched
//! - missing: confirmed absent in the backing store
//! - unresolved: referenced by a directive but not fetched yet
//!
//! Transitions are monotonic. A key moves unresolved to resolved or
//! missing exactly once and never back, which is what bounds the number
//! of render passes.
//!
//! The context also owns the dependency graph (every discovered edge is
//! recorded, including edges to already-resolved keys, so cycles closing
//! through a template resolved in an earlier batch are still caught) and
//! the current-template pointer that nested directives resolve their
//! references against.

use std::collections::{HashMap, HashSet};

use crate::error::ResolveError;
use crate::graph::DependencyGraph;
use crate::key::TemplateKey;
use crate::resolver::ResolvedTemplate;

#[derive(Debug)]
pub(crate) struct ResolutionContext {
    graph: DependencyGraph,
    resolved: HashMap<TemplateKey, ResolvedTemplate>,
    unresolved: HashSet<TemplateKey>,
    missing: HashSet<TemplateKey>,
    current: TemplateKey,
}

impl ResolutionContext {
    /// Creates the context for one render session, seeded with the
    /// already-resolved root template.
    pub(crate) fn new(root: ResolvedTemplate) -> Self {
        let current = root.key().clone();
        let mut resolved = HashMap::new();
        resolved.insert(current.minimal(), root);
        Self {
            graph: DependencyGraph::new(),
            resolved,
            unresolved: HashSet::new(),
            missing: HashSet::new(),
            current,
        }
    }

    /// The actual key of the template whose directives are executing.
    pub(crate) fn current(&self) -> &TemplateKey {
        &self.current
    }

    /// Repoints the current template, returning the previous key so the
    /// caller can restore it after a nested render.
    pub(crate) fn swap_current(&mut self, key: TemplateKey) -> TemplateKey {
        std::mem::replace(&mut self.current, key)
    }

    /// Registers a dependency edge discovered by a directive.
    ///
    /// Validates visibility and acyclicity, records the edge, and marks
    /// the dependency unresolved unless its content state is already
    /// known.
    ///
    /// # Errors
    ///
    /// [`ResolveError::VisibilityViolation`] when the dependency is
    /// scoped out of the dependent's reach,
    /// [`ResolveError::CyclicDependency`] when the edge would close a
    /// loop.
    pub(crate) fn add_dependency(
        &mut self,
        dependent: &TemplateKey,
        dependency: &TemplateKey,
    ) -> Result<(), ResolveError> {
        let dependent = dependent.minimal();
        let dependency = dependency.minimal();
        if !dependency.is_accessible_from(&dependent) {
            return Err(ResolveError::VisibilityViolation {
                dependent,
                dependency,
            });
        }
        if self.graph.would_cycle(&dependent, &dependency) {
            return Err(ResolveError::CyclicDependency {
                dependent,
                dependency,
            });
        }
        self.graph.add_edge(&dependent, &dependency);
        if !self.resolved.contains_key(&dependency) && !self.missing.contains(&dependency) {
            tracing::trace!("Added dependency: {dependent} -> {dependency}");
            self.unresolved.insert(dependency);
        }
        Ok(())
    }

    /// Records fetched content for a dependency key.
    pub(crate) fn add_resolved(&mut self, key: &TemplateKey, template: ResolvedTemplate) {
        let key = key.minimal();
        self.unresolved.remove(&key);
        self.resolved.insert(key, template);
    }

    /// Records a confirmed backing-store miss for a dependency key.
    pub(crate) fn add_missing(&mut self, key: &TemplateKey) {
        let key = key.minimal();
        self.unresolved.remove(&key);
        self.missing.insert(key);
    }

    /// The resolved template for a key, if its content has been fetched.
    ///
    /// The returned template carries the actual backing key that matched,
    /// which may differ from `key` in module, locale, or index suffix.
    pub(crate) fn resolved(&self, key: &TemplateKey) -> Option<&ResolvedTemplate> {
        self.resolved.get(&key.minimal())
    }

    pub(crate) fn is_missing(&self, key: &TemplateKey) -> bool {
        self.missing.contains(&key.minimal())
    }

    pub(crate) fn has_unresolved(&self) -> bool {
        !self.unresolved.is_empty()
    }

    /// The unresolved keys to fetch in the next batch.
    pub(crate) fn unresolved_snapshot(&self) -> Vec<TemplateKey> {
        self.unresolved.iter().cloned().collect()
    }
}
