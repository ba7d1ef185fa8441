use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::StateId;

/// Property coordinate inside a state node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropKey {
    /// A named property of an object.
    Field(Rc<str>),
    /// The whole content of a collection.
    Items,
}

impl PropKey {
    pub fn field(name: &str) -> Self {
        PropKey::Field(Rc::from(name))
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropKey::Field(name) => f.write_str(name),
            PropKey::Items => f.write_str("[*]"),
        }
    }
}

/// Dependency address without the binding kind: which property of which node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub state: StateId,
    pub key: PropKey,
}

impl Dependency {
    pub fn new(state: StateId, key: PropKey) -> Self {
        Self { state, key }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.state, self.key)
    }
}

pub type Touched = SmallVec<[Dependency; 4]>;

thread_local! {
    // `None` frames come from `untrack` and swallow reads.
    static FRAMES: RefCell<Vec<Option<Touched>>> = const { RefCell::new(Vec::new()) };
}

/// Record a property read into the innermost tracking frame, if any.
pub fn record(dep: Dependency) {
    FRAMES.with(|frames| {
        if let Some(Some(top)) = frames.borrow_mut().last_mut()
            && !top.contains(&dep)
        {
            top.push(dep);
        }
    });
}

/// Run `f` in a fresh frame and return its result along with every
/// dependency it read. Frames nest; the enclosing frame never sees reads made
/// inside `f`.
pub fn track<T>(f: impl FnOnce() -> T) -> (T, Touched) {
    // pops on unwind too
    struct Pop;
    impl Drop for Pop {
        fn drop(&mut self) {
            FRAMES.with(|frames| {
                frames.borrow_mut().pop();
            });
        }
    }

    FRAMES.with(|frames| frames.borrow_mut().push(Some(Touched::new())));
    let guard = Pop;
    let value = f();
    let touched = FRAMES
        .with(|frames| frames.borrow_mut().last_mut().and_then(Option::take))
        .unwrap_or_default();
    drop(guard);
    (value, touched)
}

/// Run `f` without recording any of its reads.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    struct Pop;
    impl Drop for Pop {
        fn drop(&mut self) {
            FRAMES.with(|frames| {
                frames.borrow_mut().pop();
            });
        }
    }

    FRAMES.with(|frames| frames.borrow_mut().push(None));
    let _guard = Pop;
    f()
}
