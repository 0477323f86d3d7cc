// In-memory host page.
//
// A small arena DOM that models just enough of the host site for the engine
// to run against: a location, an app root, the profile column and the stats
// block, plus the helpers a host SPA uses to rewrite itself in place
// (`navigate`, `render_profile_shell`, `render_profile_stats`). Used by the
// `replay` command and by the engine tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::MountError;
use crate::page::{Anchor, HostPage, FRAGMENT_ID};
use crate::render::Fragment;

const ROOT_CLASS: &str = "container";
const CONTENT_CLASSES: [&str; 2] = ["col", "pl-md-4"];
const STATS_ID: &str = "profile-stats";
const FRAGMENT_CLASSES: [&str; 2] = ["row", "mt-3"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    /// Opaque markup for injected nodes; never parsed.
    inner_html: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct DomPage {
    nodes: Vec<Option<Element>>,
    /// Slots freed by removals, reused before the arena grows. A `NodeId`
    /// of a removed node may therefore later name a different node.
    free: Vec<NodeId>,
    body: NodeId,
    location: String,
}

impl DomPage {
    /// An empty document (bare `<body>`) at `path`.
    pub fn new(path: &str) -> Self {
        let body = Element {
            tag: "body".into(),
            id: None,
            classes: Vec::new(),
            inner_html: None,
            parent: None,
            children: Vec::new(),
        };
        DomPage {
            nodes: vec![Some(body)],
            free: Vec::new(),
            body: NodeId(0),
            location: path.to_string(),
        }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn set_location(&mut self, path: &str) {
        self.location = path.to_string();
    }

    fn element(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0).and_then(Option::as_ref)
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(node.0).and_then(Option::as_mut)
    }

    fn create_detached(&mut self, tag: &str, id: Option<&str>, classes: &[&str]) -> NodeId {
        let element = Element {
            tag: tag.to_string(),
            id: id.map(str::to_string),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            inner_html: None,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(node) => {
                self.nodes[node.0] = Some(element);
                node
            }
            None => {
                self.nodes.push(Some(element));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Create an element and append it as the last child of `parent`.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        id: Option<&str>,
        classes: &[&str],
    ) -> Result<NodeId, MountError> {
        if self.element(parent).is_none() {
            return Err(MountError::Host(format!("no such parent node {}", parent.0)));
        }
        let node = self.create_detached(tag, id, classes);
        if let Some(el) = self.element_mut(node) {
            el.parent = Some(parent);
        }
        if let Some(p) = self.element_mut(parent) {
            p.children.push(node);
        }
        Ok(node)
    }

    /// Insert detached `child` into `parent` right before `reference`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<(), MountError> {
        let position = self
            .element(parent)
            .and_then(|p| p.children.iter().position(|c| *c == reference))
            .ok_or(MountError::DetachedAnchor)?;

        match self.element_mut(child) {
            Some(el) if el.parent.is_none() => el.parent = Some(parent),
            Some(_) => return Err(MountError::Host("node is already attached".into())),
            None => return Err(MountError::Host(format!("no such node {}", child.0))),
        }
        if let Some(p) = self.element_mut(parent) {
            p.children.insert(position, child);
        }
        Ok(())
    }

    /// Detach `node` and free it together with its subtree.
    pub fn remove_node(&mut self, node: NodeId) {
        let parent = self.element(node).and_then(|el| el.parent);
        if let Some(p) = parent.and_then(|p| self.element_mut(p)) {
            p.children.retain(|c| *c != node);
        }
        self.free_subtree(node);
    }

    /// Remove every child of `node`, keeping `node` itself.
    pub fn clear_children(&mut self, node: NodeId) {
        let children = match self.element_mut(node) {
            Some(el) => std::mem::take(&mut el.children),
            None => return,
        };
        for child in children {
            self.free_subtree(child);
        }
    }

    fn free_subtree(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(el) = self.nodes.get_mut(current.0).and_then(Option::take) {
                stack.extend(el.children);
                self.free.push(current);
            }
        }
    }

    /// Connected elements in document order.
    fn connected(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.body];
        while let Some(node) = stack.pop() {
            if let Some(el) = self.element(node) {
                out.push(node);
                stack.extend(el.children.iter().rev());
            }
        }
        out
    }

    pub fn by_id_all(&self, id: &str) -> Vec<NodeId> {
        self.connected()
            .into_iter()
            .filter(|n| self.element(*n).and_then(|el| el.id.as_deref()) == Some(id))
            .collect()
    }

    /// First connected element carrying every class in `classes`.
    pub fn first_with_classes(&self, classes: &[&str]) -> Option<NodeId> {
        self.connected().into_iter().find(|n| {
            self.element(*n)
                .is_some_and(|el| classes.iter().all(|c| el.classes.iter().any(|k| k == c)))
        })
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.element(node).and_then(|el| el.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.element(node).map(|el| el.children.clone()).unwrap_or_default()
    }

    pub fn id_of(&self, node: NodeId) -> Option<&str> {
        self.element(node).and_then(|el| el.id.as_deref())
    }

    /// Markup of every mounted panel, in document order.
    pub fn fragment_html(&self) -> Vec<String> {
        self.by_id_all(FRAGMENT_ID)
            .into_iter()
            .filter_map(|n| self.element(n).and_then(|el| el.inner_html.clone()))
            .collect()
    }

    /// Serialize `node` and its subtree.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(el) = self.element(node) else {
            return;
        };
        out.push('<');
        out.push_str(&el.tag);
        if let Some(id) = &el.id {
            out.push_str(&format!(" id=\"{id}\""));
        }
        if !el.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", el.classes.join(" ")));
        }
        out.push('>');
        if let Some(inner) = &el.inner_html {
            out.push_str(inner);
        }
        for child in &el.children {
            self.write_html(*child, out);
        }
        out.push_str(&format!("</{}>", el.tag));
    }

    // -----------------------------------------------------------------------
    // Host application behaviour
    // -----------------------------------------------------------------------

    /// Initial hydration: the app root appears under `<body>`.
    pub fn mount_app_root(&mut self) -> Result<NodeId, MountError> {
        match self.first_with_classes(&[ROOT_CLASS]) {
            Some(root) => Ok(root),
            None => self.append_element(self.body, "div", None, &[ROOT_CLASS]),
        }
    }

    /// Client-side route change: new location, root content torn down.
    pub fn navigate(&mut self, path: &str) {
        self.set_location(path);
        if let Some(root) = self.first_with_classes(&[ROOT_CLASS]) {
            self.clear_children(root);
        }
    }

    /// First render pass of a profile view: header and profile column,
    /// no stats yet.
    pub fn render_profile_shell(&mut self) -> Result<NodeId, MountError> {
        let root = self.mount_app_root()?;
        self.append_element(root, "div", Some("profile-header"), &["row"])?;
        self.append_element(root, "div", None, &CONTENT_CLASSES)
    }

    /// Second render pass: the stats block appears inside the profile
    /// column.
    pub fn render_profile_stats(&mut self) -> Result<NodeId, MountError> {
        let content = self
            .first_with_classes(&CONTENT_CLASSES)
            .ok_or(MountError::AnchorsMissing {
                content: false,
                stats: false,
            })?;
        self.append_element(content, "div", Some(STATS_ID), &["row"])
    }

    /// Full profile render in one go.
    pub fn render_profile(&mut self) -> Result<(), MountError> {
        self.render_profile_shell()?;
        self.render_profile_stats()?;
        Ok(())
    }
}

impl HostPage for DomPage {
    fn location_path(&self) -> String {
        self.location.clone()
    }

    fn contains(&self, anchor: Anchor) -> bool {
        match anchor {
            Anchor::AppRoot => self.first_with_classes(&[ROOT_CLASS]).is_some(),
            Anchor::ContentContainer => self.first_with_classes(&CONTENT_CLASSES).is_some(),
            Anchor::ProfileStats => !self.by_id_all(STATS_ID).is_empty(),
        }
    }

    fn fragment_count(&self) -> usize {
        self.by_id_all(FRAGMENT_ID).len()
    }

    fn remove_fragments(&mut self) -> usize {
        let found = self.by_id_all(FRAGMENT_ID);
        for node in &found {
            self.remove_node(*node);
        }
        found.len()
    }

    fn insert_before_stats(&mut self, fragment: &Fragment) -> Result<(), MountError> {
        let content = self.first_with_classes(&CONTENT_CLASSES);
        let stats = self.by_id_all(STATS_ID).first().copied();
        let (content, stats) = match (content, stats) {
            (Some(c), Some(s)) => (c, s),
            (c, s) => {
                return Err(MountError::AnchorsMissing {
                    content: c.is_some(),
                    stats: s.is_some(),
                })
            }
        };
        if self.parent(stats) != Some(content) {
            return Err(MountError::DetachedAnchor);
        }

        let node = self.create_detached("div", Some(FRAGMENT_ID), &FRAGMENT_CLASSES);
        if let Some(el) = self.element_mut(node) {
            el.inner_html = Some(fragment.html.clone());
        }
        self.insert_before(content, node, stats)
    }
}

/// Shared handle to a `DomPage`, for a host simulator and the engine living
/// on the same thread. Borrows are never held across an `.await`.
#[derive(Debug, Clone)]
pub struct SharedDom(Rc<RefCell<DomPage>>);

impl SharedDom {
    pub fn new(page: DomPage) -> Self {
        SharedDom(Rc::new(RefCell::new(page)))
    }

    pub fn with<R>(&self, f: impl FnOnce(&DomPage) -> R) -> R {
        f(&*self.0.borrow())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut DomPage) -> R) -> R {
        f(&mut *self.0.borrow_mut())
    }
}

impl HostPage for SharedDom {
    fn location_path(&self) -> String {
        self.0.borrow().location_path()
    }

    fn contains(&self, anchor: Anchor) -> bool {
        self.0.borrow().contains(anchor)
    }

    fn fragment_count(&self) -> usize {
        self.0.borrow().fragment_count()
    }

    fn remove_fragments(&mut self) -> usize {
        self.0.borrow_mut().remove_fragments()
    }

    fn insert_before_stats(&mut self, fragment: &Fragment) -> Result<(), MountError> {
        self.0.borrow_mut().insert_before_stats(fragment)
    }
}
