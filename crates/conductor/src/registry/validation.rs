//! Registration-time validation

use crate::composer::{ChildWorkflow, Composition, CompositionKind};
use crate::workflow::WorkflowDefinition;

use super::error::ValidationError;

/// Check a definition's shape before it is stored
pub fn validate_definition(definition: &WorkflowDefinition) -> Result<(), ValidationError> {
    if definition.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    check_padding(&definition.name)?;
    let workflow = definition.name.clone();

    if definition.steps.is_empty() {
        return Err(ValidationError::NoSteps { workflow });
    }

    if definition.timeout.is_some_and(|t| t.is_zero()) {
        return Err(ValidationError::InvalidTimeout { workflow });
    }

    for (index, dependency) in definition.dependencies.iter().enumerate() {
        if dependency.workflow.trim().is_empty() {
            return Err(ValidationError::UnnamedDependency { workflow, index });
        }
        if dependency.workflow == workflow {
            return Err(ValidationError::SelfDependency { workflow, index });
        }
    }

    for (index, step) in definition.steps.iter().enumerate() {
        if step.name().trim().is_empty() {
            return Err(ValidationError::UnnamedStep { workflow, index });
        }
        if step.timeout().is_some_and(|t| t.is_zero()) {
            return Err(ValidationError::InvalidStepTimeout {
                workflow,
                step: step.name().to_string(),
            });
        }
        if let Some(condition) = step.condition() {
            if let Err(e) = condition.validate() {
                return Err(ValidationError::InvalidCondition {
                    workflow,
                    step: step.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Check a composition's shape, including inline child definitions
pub fn validate_composition(composition: &Composition) -> Result<(), ValidationError> {
    if composition.name.trim().is_empty() {
        return Err(ValidationError::EmptyCompositionName);
    }
    check_padding(&composition.name)?;
    let composition_name = composition.name.clone();

    match &composition.kind {
        CompositionKind::Sequential { workflows, .. } | CompositionKind::Parallel { workflows, .. } => {
            if workflows.is_empty() {
                return Err(ValidationError::NoChildren {
                    composition: composition_name,
                });
            }
        }
        CompositionKind::Conditional { branches, options } => {
            if branches.is_empty() && options.default_workflow.is_none() {
                return Err(ValidationError::NoChildren {
                    composition: composition_name,
                });
            }
            for (index, branch) in branches.iter().enumerate() {
                if let Err(e) = branch.condition.validate() {
                    return Err(ValidationError::InvalidBranchCondition {
                        composition: composition_name,
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }
        CompositionKind::Retry { options, .. } => {
            if options.policy.max_attempts == 0 {
                return Err(ValidationError::InvalidMaxAttempts {
                    composition: composition_name,
                });
            }
        }
    }

    for (index, child) in composition.children().into_iter().enumerate() {
        match child {
            ChildWorkflow::Named(workflow) if workflow.trim().is_empty() => {
                return Err(ValidationError::UnnamedChild {
                    composition: composition_name,
                    index,
                });
            }
            ChildWorkflow::Named(workflow) if *workflow == composition_name => {
                return Err(ValidationError::SelfReference {
                    composition: composition_name,
                    index,
                });
            }
            ChildWorkflow::Named(_) => {}
            ChildWorkflow::Inline(definition) => {
                validate_definition(definition).map_err(|source| ValidationError::InvalidChild {
                    composition: composition_name.clone(),
                    index,
                    source: Box::new(source),
                })?;
            }
        }
    }

    Ok(())
}

fn check_padding(name: &str) -> Result<(), ValidationError> {
    if name.trim() != name {
        return Err(ValidationError::PaddedName {
            name: name.to_string(),
        });
    }
    Ok(())
}
