//! Registry of the mutable heap objects a VM creates.
//!
//! Values are reference counted, so an instance stored in its own field would
//! never be freed by counting alone. Any cycle has to pass through a method
//! table, a field table, or an upvalue cell. The heap keeps weak references to
//! the owners of those containers; a collection empties the ones that were not
//! reached from the VM roots, and teardown empties all of them.

use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};

use ahash::AHashSet;

use crate::value::{Class, Instance, Table, Upvalue, Value};

const INITIAL_COLLECT_THRESHOLD: usize = 1024;

/// Identity of a heap object, shared by its `Rc` and its `Weak` handles.
pub type ObjectId = usize;

pub fn object_id<T>(object: &Rc<T>) -> ObjectId {
    Rc::as_ptr(object).cast::<()>() as usize
}

pub struct Heap {
    classes: Vec<Weak<RefCell<Class>>>,
    instances: Vec<Weak<RefCell<Instance>>>,
    upvalues: Vec<Weak<RefCell<Upvalue>>>,
    /// Tracked entry count at which the next collection runs.
    next_collect: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            instances: Vec::new(),
            upvalues: Vec::new(),
            next_collect: INITIAL_COLLECT_THRESHOLD,
        }
    }

    pub fn track_class(&mut self, class: &Rc<RefCell<Class>>) {
        self.classes.push(Rc::downgrade(class));
    }

    pub fn track_instance(&mut self, instance: &Rc<RefCell<Instance>>) {
        self.instances.push(Rc::downgrade(instance));
    }

    pub fn track_upvalue(&mut self, upvalue: &Rc<RefCell<Upvalue>>) {
        self.upvalues.push(Rc::downgrade(upvalue));
    }

    /// Number of registry entries, live or not.
    pub fn tracked(&self) -> usize {
        self.classes.len() + self.instances.len() + self.upvalues.len()
    }

    /// Number of tracked objects still alive.
    pub fn live(&self) -> usize {
        count_live(&self.classes) + count_live(&self.instances) + count_live(&self.upvalues)
    }

    /// Whether the registry has grown enough to be worth a collection.
    pub fn should_collect(&self) -> bool {
        self.tracked() >= self.next_collect
    }

    /// Empty every tracked object whose id is not in `marked` and forget it,
    /// along with entries that already died. Returns how many were emptied.
    pub fn sweep(&mut self, marked: &AHashSet<ObjectId>) -> usize {
        let classes = take_unmarked(&mut self.classes, marked);
        let instances = take_unmarked(&mut self.instances, marked);
        let upvalues = take_unmarked(&mut self.upvalues, marked);
        let released = empty_objects(&classes, &instances, &upvalues);

        self.next_collect = (self.tracked() * 2).max(INITIAL_COLLECT_THRESHOLD);
        released
    }

    /// Empty every live method table, field table, and upvalue cell so that
    /// reference cycles fall apart. Returns how many objects were cleared.
    pub fn break_cycles(&mut self) -> usize {
        let classes: Vec<_> = self.classes.drain(..).filter_map(|w| w.upgrade()).collect();
        let instances: Vec<_> = self.instances.drain(..).filter_map(|w| w.upgrade()).collect();
        let upvalues: Vec<_> = self.upvalues.drain(..).filter_map(|w| w.upgrade()).collect();
        self.next_collect = INITIAL_COLLECT_THRESHOLD;
        empty_objects(&classes, &instances, &upvalues)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

fn count_live<T>(entries: &[Weak<T>]) -> usize {
    entries.iter().filter(|w| w.strong_count() > 0).count()
}

/// Drop dead entries, keep marked ones, and return the live unmarked objects.
fn take_unmarked<T>(
    entries: &mut Vec<Weak<RefCell<T>>>,
    marked: &AHashSet<ObjectId>,
) -> Vec<Rc<RefCell<T>>> {
    let mut unmarked = Vec::new();
    entries.retain(|weak| match weak.upgrade() {
        None => false,
        Some(object) if marked.contains(&object_id(&object)) => true,
        Some(object) => {
            unmarked.push(object);
            false
        }
    });
    unmarked
}

/// Move the contents out of every object first, then drop them together, so
/// no object is torn down while another one is still borrowed.
fn empty_objects(
    classes: &[Rc<RefCell<Class>>],
    instances: &[Rc<RefCell<Instance>>],
    upvalues: &[Rc<RefCell<Upvalue>>],
) -> usize {
    let method_tables: Vec<_> = classes
        .iter()
        .map(|class| mem::take(&mut class.borrow_mut().methods))
        .collect();
    let field_tables: Vec<Table> = instances
        .iter()
        .map(|instance| mem::take(&mut instance.borrow_mut().fields))
        .collect();
    let closed_values: Vec<Upvalue> = upvalues
        .iter()
        .map(|cell| mem::replace(&mut *cell.borrow_mut(), Upvalue::Closed(Value::Nil)))
        .collect();

    drop(method_tables);
    drop(field_tables);
    drop(closed_values);
    classes.len() + instances.len() + upvalues.len()
}
