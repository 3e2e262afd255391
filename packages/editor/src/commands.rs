//! # Command Bus
//!
//! Named commands with typed payloads, dispatched to handlers in priority
//! order.
//!
//! ```text
//! dispatch(INSERT_TEXT, "a")
//!   Critical → High → Normal → Low → Editor
//!   (registration order within a tier; Stop ends the dispatch)
//! ```
//!
//! Commands are declared as [`CommandKey`] constants so a handler receives
//! the payload type it was registered for.

use crate::editor::Editor;
use crate::errors::EditorResult;
use crate::node::TextFormatType;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

/// Typed command identifier
pub struct CommandKey<P: 'static> {
    name: &'static str,
    payload: PhantomData<fn() -> P>,
}

impl<P: 'static> CommandKey<P> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            payload: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<P: 'static> Clone for CommandKey<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: 'static> Copy for CommandKey<P> {}

impl<P: 'static> fmt::Debug for CommandKey<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandKey({})", self.name)
    }
}

pub const SELECTION_CHANGE: CommandKey<()> = CommandKey::new("SELECTION_CHANGE");
pub const UNDO: CommandKey<()> = CommandKey::new("UNDO");
pub const REDO: CommandKey<()> = CommandKey::new("REDO");
pub const INSERT_TEXT: CommandKey<String> = CommandKey::new("INSERT_TEXT");
pub const FORMAT_TEXT: CommandKey<TextFormatType> = CommandKey::new("FORMAT_TEXT");
pub const KEY_BACKSPACE: CommandKey<()> = CommandKey::new("KEY_BACKSPACE");
pub const KEY_DELETE: CommandKey<()> = CommandKey::new("KEY_DELETE");
pub const KEY_TAB: CommandKey<()> = CommandKey::new("KEY_TAB");

/// Handler tiers, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandPriority {
    Editor,
    Low,
    Normal,
    High,
    Critical,
}

/// What a handler wants to happen after it ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// The command is handled; later handlers don't run
    Stop,
    Continue,
}

pub(crate) type ErasedHandler = Rc<dyn Fn(&mut Editor, &dyn Any) -> EditorResult<Propagation>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandHandle {
    name: &'static str,
    id: u64,
}

impl CommandHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

struct Registered {
    id: u64,
    priority: CommandPriority,
    handler: ErasedHandler,
}

#[derive(Default)]
pub struct CommandBus {
    next_id: u64,
    handlers: HashMap<&'static str, Vec<Registered>>,
}

impl CommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P, F>(
        &mut self,
        key: CommandKey<P>,
        priority: CommandPriority,
        handler: F,
    ) -> CommandHandle
    where
        P: 'static,
        F: Fn(&mut Editor, &P) -> EditorResult<Propagation> + 'static,
    {
        let erased: ErasedHandler = Rc::new(move |editor: &mut Editor, payload: &dyn Any| {
            match payload.downcast_ref::<P>() {
                Some(payload) => handler(editor, payload),
                None => Ok(Propagation::Continue),
            }
        });
        let id = self.next_id;
        self.next_id += 1;
        self.handlers.entry(key.name).or_default().push(Registered {
            id,
            priority,
            handler: erased,
        });
        CommandHandle { name: key.name, id }
    }

    /// Remove a handler; returns whether it was still registered
    pub fn unregister(&mut self, handle: CommandHandle) -> bool {
        let Some(list) = self.handlers.get_mut(handle.name) else {
            return false;
        };
        let before = list.len();
        list.retain(|registered| registered.id != handle.id);
        before != list.len()
    }

    pub fn is_registered(&self, handle: CommandHandle) -> bool {
        self.handlers
            .get(handle.name)
            .is_some_and(|list| list.iter().any(|registered| registered.id == handle.id))
    }

    /// Handlers for `name` in dispatch order
    pub(crate) fn dispatch_order(&self, name: &'static str) -> Vec<(CommandHandle, ErasedHandler)> {
        let Some(list) = self.handlers.get(name) else {
            return Vec::new();
        };
        let mut ordered: Vec<&Registered> = list.iter().collect();
        // Stable sort keeps registration order within a tier
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));
        ordered
            .into_iter()
            .map(|registered| {
                (
                    CommandHandle {
                        name,
                        id: registered.id,
                    },
                    Rc::clone(&registered.handler),
                )
            })
            .collect()
    }

    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers.get(name).map_or(0, Vec::len)
    }
}

impl fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total: usize = self.handlers.values().map(Vec::len).sum();
        f.debug_struct("CommandBus")
            .field("handlers", &format!("{} handlers", total))
            .finish()
    }
}
