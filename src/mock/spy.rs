use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::{Implementation, Mock, MockBehavior, MockKind};
use crate::{err_msg, HarnessError, Result, Value};

/// A shared table of named callables.
///
/// This is the capability code under test calls through. Cloning shares the
/// table, so a spy installed by a test is visible to every holder.
#[derive(Clone, Default)]
pub struct Handlers {
    entries: Rc<RefCell<BTreeMap<String, Implementation>>>,
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("names", &self.names())
            .finish()
    }
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `implementation` under `name`, returning the previous entry.
    pub fn insert(
        &self,
        name: impl Into<String>,
        implementation: Implementation,
    ) -> Option<Implementation> {
        self.entries.borrow_mut().insert(name.into(), implementation)
    }

    pub fn get(&self, name: &str) -> Option<Implementation> {
        self.entries.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// Calls the entry named `name`.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        let implementation = self.get(name).ok_or_else(|| {
            HarnessError::typed("HandlerNotFound", format!("no handler named '{}'", name))
        })?;
        implementation.call(args).await
    }
}

/// An interception installed over one entry of a [`Handlers`] table.
///
/// The spy owns the original entry until [`Spy::restore`] puts it back. Other
/// code replacing the same entry in the meantime is not detected.
pub struct Spy {
    mock: Mock,
    owner: Handlers,
    name: String,
    original: RefCell<Option<Implementation>>,
}

impl fmt::Debug for Spy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spy")
            .field("name", &self.name)
            .field("restored", &self.is_restored())
            .finish_non_exhaustive()
    }
}

impl Spy {
    /// The recorder behind the spy. Its behavior starts as the original entry.
    pub fn mock(&self) -> &Mock {
        &self.mock
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_restored(&self) -> bool {
        self.original.borrow().is_none()
    }

    /// Reinstates the original entry. Later calls do nothing.
    pub fn restore(&self) {
        if let Some(original) = self.original.borrow_mut().take() {
            self.owner.insert(self.name.clone(), original);
        }
    }
}

/// Wraps the entry `name` of `owner` in a recording spy.
///
/// Calls through the table keep reaching the original handler, and
/// each is recorded on [`Spy::mock`].
pub fn spy_on(owner: &Handlers, name: &str) -> Result<Spy> {
    let original = owner
        .get(name)
        .ok_or_else(|| err_msg!(Usage, "cannot spy on '{}': no such handler", name))?;

    let mock = Mock::with_kind(MockKind::Function, name, MockBehavior::None);
    mock.set_implementation(original.clone());
    owner.insert(name, mock.as_implementation());

    Ok(Spy {
        mock,
        owner: owner.clone(),
        name: name.to_string(),
        original: RefCell::new(Some(original)),
    })
}
