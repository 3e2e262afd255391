use crate::ai_edit::AiEdit;
use crate::autocomplete::Autocomplete;
use crate::blocks::BlockFormat;
use crate::config::BehaviorConfig;
use crate::decorators::Decorators;
use crate::equation::EquationDetection;
use crate::housekeeping::Housekeeping;
use crate::links::Links;
use crate::rich_text::RichText;
use scribe_editor::{Editor, Registration};
use tracing::debug;

/// An independently installable set of commands, transforms and listeners
pub trait Behavior {
    /// Unique identifier for this behavior
    fn name(&self) -> &'static str;

    /// Register everything on `editor` and hand back the registrations so
    /// they can be removed together
    fn install(&self, editor: &mut Editor) -> Vec<Registration>;
}

/// Behaviors installed on one editor
pub struct BehaviorSet {
    behaviors: Vec<Box<dyn Behavior>>,
    installed: Vec<(&'static str, Vec<Registration>)>,
    autocomplete: Option<Autocomplete>,
    ai_edit: Option<AiEdit>,
}

impl BehaviorSet {
    /// Every built-in behavior. Autocomplete and AI edits are included only
    /// when their model is configured.
    pub fn standard(config: &BehaviorConfig) -> Self {
        let mut set = Self::empty();
        set.add(Box::new(RichText));
        set.add(Box::new(BlockFormat));
        set.add(Box::new(Links));
        set.add(Box::new(Decorators));
        set.add(Box::new(Housekeeping));
        set.add(Box::new(EquationDetection));
        if let Some(model) = &config.autocomplete_model {
            let autocomplete = Autocomplete::new(model.clone());
            set.autocomplete = Some(autocomplete.clone());
            set.add(Box::new(autocomplete));
        }
        if let Some(model) = &config.edit_model {
            let ai_edit = AiEdit::new(model.clone());
            set.ai_edit = Some(ai_edit.clone());
            set.add(Box::new(ai_edit));
        }
        set
    }

    pub fn empty() -> Self {
        Self {
            behaviors: Vec::new(),
            installed: Vec::new(),
            autocomplete: None,
            ai_edit: None,
        }
    }

    pub fn add(&mut self, behavior: Box<dyn Behavior>) {
        self.behaviors.push(behavior);
    }

    pub fn behaviors(&self) -> &[Box<dyn Behavior>] {
        &self.behaviors
    }

    /// Host handle for the autocomplete behavior, when it is part of the set
    pub fn autocomplete(&self) -> Option<&Autocomplete> {
        self.autocomplete.as_ref()
    }

    pub fn ai_edit(&self) -> Option<&AiEdit> {
        self.ai_edit.as_ref()
    }

    pub fn is_installed(&self) -> bool {
        !self.installed.is_empty()
    }

    /// Install every behavior not installed yet
    pub fn install(&mut self, editor: &mut Editor) {
        for behavior in &self.behaviors[self.installed.len()..] {
            let registrations = behavior.install(editor);
            debug!(
                behavior = behavior.name(),
                registrations = registrations.len(),
                "installed behavior"
            );
            self.installed.push((behavior.name(), registrations));
        }
    }

    /// Remove everything the set registered, newest first
    pub fn uninstall(&mut self, editor: &mut Editor) {
        while let Some((name, registrations)) = self.installed.pop() {
            for registration in registrations {
                editor.unregister(registration);
            }
            debug!(behavior = name, "uninstalled behavior");
        }
    }
}

impl Default for BehaviorSet {
    fn default() -> Self {
        Self::standard(&BehaviorConfig::default())
    }
}

impl std::fmt::Debug for BehaviorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorSet")
            .field("behaviors", &format!("{} behaviors", self.behaviors.len()))
            .field("installed", &self.installed.len())
            .finish()
    }
}
