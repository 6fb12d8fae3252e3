//! Engine-side directive handling.
//!
//! A [`DirectiveScope`] is the [`DirectiveHost`] for one render pass. It
//! derives each directive's dependency key relative to the currently
//! executing template, registers the edge with the resolution context,
//! and either recurses into already-fetched content or tells the
//! renderer to move on.
//!
//! The context sits behind a `RefCell` because nested renders re-enter
//! the host through the same shared reference; every borrow is released
//! before the renderer runs, so re-entry never observes a held borrow.

use std::cell::RefCell;

use serde_json::json;

use crate::bindings::Bindings;
use crate::context::ResolutionContext;
use crate::error::{RenderError, ResolveError};
use crate::key::TemplateKey;
use crate::name::{SCOPE_MARKER, SEPARATOR};
use crate::render::{
    DirectiveCall, DirectiveHost, DirectiveKind, DirectiveOutcome, TemplateRenderer,
};
use crate::resolver::ResolvedTemplate;

pub(crate) struct DirectiveScope<'a> {
    context: RefCell<&'a mut ResolutionContext>,
    renderer: &'a dyn TemplateRenderer,
    bindings: &'a Bindings,
}

impl<'a> DirectiveScope<'a> {
    pub(crate) fn new(
        context: &'a mut ResolutionContext,
        renderer: &'a dyn TemplateRenderer,
        bindings: &'a Bindings,
    ) -> Self {
        Self {
            context: RefCell::new(context),
            renderer,
            bindings,
        }
    }

    /// Renders already-fetched dependency content, with the current
    /// pointer swapped so its own directives resolve relative to it.
    fn render_dependency(
        &self,
        call: &DirectiveCall,
        template: ResolvedTemplate,
    ) -> Result<DirectiveOutcome, RenderError> {
        let previous = self
            .context
            .borrow_mut()
            .swap_current(template.key().clone());
        let result = self
            .renderer
            .render(template.key(), template.content(), self.bindings, self);
        self.context.borrow_mut().swap_current(previous);
        let content = result?;

        match call.kind {
            DirectiveKind::Include => Ok(DirectiveOutcome::Spliced(content)),
            DirectiveKind::Import => {
                let alias = match &call.alias {
                    Some(alias) => alias.clone(),
                    None => default_alias(template.key()).map_err(RenderError::aborted)?,
                };
                tracing::debug!("Importing {} as {alias}", template.key());
                Ok(DirectiveOutcome::Bound {
                    alias,
                    value: json!({
                        "name": template.key().name(),
                        "content": content,
                    }),
                })
            }
        }
    }
}

impl DirectiveHost for DirectiveScope<'_> {
    fn directive(&self, call: DirectiveCall) -> Result<DirectiveOutcome, RenderError> {
        let (dependent, dependency) = {
            let context = self.context.borrow();
            let dependent = context.current().clone();
            let dependency = dependent
                .dependency_key(&call.name)
                .map_err(RenderError::aborted)?;
            (dependent, dependency)
        };

        self.context
            .borrow_mut()
            .add_dependency(&dependent, &dependency)
            .map_err(RenderError::aborted)?;

        let resolved = self.context.borrow().resolved(&dependency).cloned();
        if let Some(template) = resolved {
            return self.render_dependency(&call, template);
        }

        if self.context.borrow().is_missing(&dependency) {
            if call.required {
                return Err(RenderError::aborted(
                    ResolveError::MissingRequiredDependency {
                        dependent: dependent.minimal(),
                        dependency: dependency.minimal(),
                    },
                ));
            }
            return Ok(DirectiveOutcome::Pending);
        }

        // Registered as unresolved above; fetched before the next pass.
        Ok(DirectiveOutcome::Pending)
    }
}

/// Import namespace for a template that declared no alias: the last
/// segment of the base name, scope marker stripped.
fn default_alias(key: &TemplateKey) -> Result<String, ResolveError> {
    let base = key.base_name()?;
    let last = base.rsplit(SEPARATOR).next().unwrap_or(&base);
    Ok(last.strip_prefix(SCOPE_MARKER).unwrap_or(last).to_string())
}
