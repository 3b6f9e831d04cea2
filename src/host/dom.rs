use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

/// Identity of a node within one document. Never reused, so it is safe to key
/// side tables by it after the node itself has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

pub struct Element {
    id: ElementId,
    tag: String,
    attributes: RefCell<BTreeMap<String, String>>,
    parent: RefCell<Weak<Element>>,
    children: RefCell<Vec<Rc<Element>>>,
}

impl Element {
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Upper-case tag name, as the DOM reports it.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_form(&self) -> bool {
        self.tag == "FORM"
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.borrow().get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.attributes
            .borrow_mut()
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn parent(&self) -> Option<Rc<Element>> {
        self.parent.borrow().upgrade()
    }

    pub fn children(&self) -> Vec<Rc<Element>> {
        self.children.borrow().clone()
    }

    pub fn append_child(self: &Rc<Self>, child: Rc<Element>) {
        if let Some(old_parent) = child.parent() {
            old_parent.detach_child(child.id);
        }
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.children.borrow_mut().push(child);
    }

    /// Detaches this node from its parent. Once the caller drops its own
    /// handle the node is reclaimed.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent.detach_child(self.id);
        }
        *self.parent.borrow_mut() = Weak::new();
    }

    fn detach_child(&self, id: ElementId) {
        self.children.borrow_mut().retain(|c| c.id != id);
    }

    /// Nearest inclusive ancestor that is a `<form>`.
    pub fn closest_form(self: &Rc<Self>) -> Option<Rc<Element>> {
        let mut cursor = Some(Rc::clone(self));
        while let Some(node) = cursor {
            if node.is_form() {
                return Some(node);
            }
            cursor = node.parent();
        }
        None
    }

    /// Ancestors from the outermost node down to (excluding) `self`.
    pub fn ancestors(&self) -> Vec<Rc<Element>> {
        let mut path = Vec::new();
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            cursor = node.parent();
            path.push(node);
        }
        path.reverse();
        path
    }

    /// Browser activation rule: buttons default to `submit` for missing or
    /// unknown `type` values, inputs only submit with an explicit type.
    pub fn activates_submission(&self) -> bool {
        let kind = self.attribute("type").map(|t| t.to_ascii_lowercase());
        match self.tag.as_str() {
            "BUTTON" => !matches!(kind.as_deref(), Some("button") | Some("reset")),
            "INPUT" => matches!(kind.as_deref(), Some("submit") | Some("image")),
            _ => false,
        }
    }

    fn walk(self: &Rc<Self>, visit: &mut dyn FnMut(&Rc<Element>) -> bool) -> Option<Rc<Element>> {
        if visit(self) {
            return Some(Rc::clone(self));
        }
        for child in self.children() {
            if let Some(found) = child.walk(visit) {
                return Some(found);
            }
        }
        None
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("attributes", &self.attributes.borrow())
            .finish()
    }
}

pub struct Document {
    root: Rc<Element>,
    next_id: Cell<u64>,
    ready_state: Cell<ReadyState>,
}

impl Document {
    pub fn new(ready_state: ReadyState) -> Self {
        let root = Rc::new(Element {
            id: ElementId(0),
            tag: "BODY".to_string(),
            attributes: RefCell::new(BTreeMap::new()),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
        });
        Self {
            root,
            next_id: Cell::new(1),
            ready_state: Cell::new(ready_state),
        }
    }

    pub fn body(&self) -> Rc<Element> {
        Rc::clone(&self.root)
    }

    pub fn create_element(&self, tag: &str) -> Rc<Element> {
        let id = ElementId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        Rc::new(Element {
            id,
            tag: tag.to_ascii_uppercase(),
            attributes: RefCell::new(BTreeMap::new()),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
        })
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state.get()
    }

    pub(crate) fn set_ready_state(&self, state: ReadyState) {
        self.ready_state.set(state);
    }

    /// First `<form>` in document order carrying `attr="value"`.
    pub fn first_form_with(&self, attr: &str, value: &str) -> Option<Rc<Element>> {
        self.root.walk(&mut |el| {
            el.is_form() && el.attribute(attr).as_deref() == Some(value)
        })
    }

    pub fn first_by_tag(&self, tag: &str) -> Option<Rc<Element>> {
        let tag = tag.to_ascii_uppercase();
        self.root.walk(&mut |el| el.tag == tag)
    }

    /// Lookup by the HTML `id` attribute.
    pub fn get_element_by_id(&self, html_id: &str) -> Option<Rc<Element>> {
        self.root
            .walk(&mut |el| el.attribute("id").as_deref() == Some(html_id))
    }
}
