use indexmap::IndexMap;

use crate::pipeline::PipelineDefinition;

const BUILD_PROVIDER: &str = "CodeBuild";
const PROJECT_NAME_KEY: &str = "ProjectName";
const APPROVAL_CATEGORY: &str = "Approval";

/// Returns the build project configured for `action_name`, or `None` when the
/// action is not a build action and so has no logs to tail.
pub fn resolve_project(definition: &PipelineDefinition, action_name: &str) -> Option<String> {
    definition
        .stages
        .iter()
        .flat_map(|stage| &stage.actions)
        .find(|action| action.action_type_id.provider == BUILD_PROVIDER && action.name == action_name)
        .and_then(|action| action.configuration.get(PROJECT_NAME_KEY).cloned())
}

/// What the static definition says about a named action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionInfo {
    pub category: String,
    pub provider: String,
    pub project: Option<String>,
}

/// Lookup from action name to its declaration, built once per trace.
///
/// When several stages declare an action with the same name the first
/// declaration supplies its category.
#[derive(Debug, Clone, Default)]
pub struct ActionIndex {
    actions: IndexMap<String, ActionInfo>,
    approval_action: String,
}

impl ActionIndex {
    pub fn new(definition: &PipelineDefinition, approval_action: &str) -> Self {
        let mut actions = IndexMap::new();
        for action in definition.stages.iter().flat_map(|stage| &stage.actions) {
            if actions.contains_key(&action.name) {
                continue;
            }
            let info = ActionInfo {
                category: action.action_type_id.category.clone(),
                provider: action.action_type_id.provider.clone(),
                project: resolve_project(definition, &action.name),
            };
            log::trace!(
                "Action {}: {} via {}",
                action.name,
                info.category,
                info.provider
            );
            actions.insert(action.name.clone(), info);
        }

        log::debug!(
            "Indexed {} actions, {} with build projects",
            actions.len(),
            actions.values().filter(|info| info.project.is_some()).count()
        );

        Self {
            actions,
            approval_action: approval_action.to_string(),
        }
    }

    pub fn get(&self, action_name: &str) -> Option<&ActionInfo> {
        self.actions.get(action_name)
    }

    /// Build project whose logs belong to `action_name`.
    pub fn project(&self, action_name: &str) -> Option<&str> {
        self.get(action_name)?.project.as_deref()
    }

    /// Whether `action_name` waits on a human.
    pub fn is_approval(&self, action_name: &str) -> bool {
        action_name == self.approval_action
            || self
                .get(action_name)
                .is_some_and(|info| info.category == APPROVAL_CATEGORY)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
