//! In-memory [`Page`] used by the automation tests.

use std::sync::Mutex;

use async_trait::async_trait;

use super::page::{ElementId, Key, Page, PageError, Query};

const CODE_LABEL: &str = "lbl-code";
const CODE_INPUT: &str = "code-input";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Label,
    Input,
    Checkbox,
    Radio,
    Option,
    Link,
}

#[derive(Debug, Clone)]
struct Element {
    id: String,
    kind: Kind,
    text: String,
    value: String,
    checked: bool,
    href: String,
    /// `for` of a label.
    target: Option<String>,
    group: Option<String>,
    visible: bool,
}

impl Element {
    fn new(id: &str, kind: Kind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            text: String::new(),
            value: String::new(),
            checked: false,
            href: String::new(),
            target: None,
            group: None,
            visible: true,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    path: String,
    elements: Vec<Element>,
    path_reads: usize,
    queries: usize,
    clicks: Vec<String>,
    value_writes: usize,
    keys: Vec<Key>,
    reveal_on: Option<String>,
    keyboard_pick: Option<String>,
    armed: bool,
}

impl State {
    fn find(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    fn visible(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.visible)
    }
}

#[derive(Debug)]
pub(crate) struct FakePage {
    state: Mutex<State>,
}

impl FakePage {
    pub fn at(path: &str) -> Self {
        Self {
            state: Mutex::new(State {
                path: path.to_string(),
                ..State::default()
            }),
        }
    }

    fn push(self, element: Element) -> Self {
        self.state.lock().unwrap().elements.push(element);
        self
    }

    fn label(id: &str, text: &str, target: Option<&str>) -> Element {
        let mut label = Element::new(id, Kind::Label);
        label.text = text.to_string();
        label.target = target.map(str::to_string);
        label
    }

    /// A labelled text input holding `value`.
    pub fn with_code_field(self, label_text: &str, value: &str) -> Self {
        let mut input = Element::new(CODE_INPUT, Kind::Input);
        input.value = value.to_string();
        self.push(Self::label(CODE_LABEL, label_text, Some(CODE_INPUT)))
            .push(input)
    }

    /// The label alone, as seen while the host is still rendering the group.
    pub fn with_label(self, text: &str) -> Self {
        self.push(Self::label(CODE_LABEL, text, None))
    }

    /// Hidden options that show up once the input holds `reveal_on`.
    pub fn with_options(self, reveal_on: &str, texts: &[&str]) -> Self {
        self.state.lock().unwrap().reveal_on = Some(reveal_on.to_uppercase());
        texts.iter().enumerate().fold(self, |page, (i, text)| {
            let mut option = Element::new(&format!("option-{i}"), Kind::Option);
            option.text = text.to_string();
            option.visible = false;
            page.push(option)
        })
    }

    /// What ArrowDown followed by Enter puts in the input.
    pub fn with_keyboard_pick(self, value: &str) -> Self {
        self.state.lock().unwrap().keyboard_pick = Some(value.to_string());
        self
    }

    pub fn with_checkbox(self, id: &str, checked: bool) -> Self {
        let label_id = format!("label-{id}");
        self.with_unlabeled_checkbox(id, checked)
            .push(Self::label(&label_id, id, Some(id)))
    }

    pub fn with_unlabeled_checkbox(self, id: &str, checked: bool) -> Self {
        let mut checkbox = Element::new(id, Kind::Checkbox);
        checkbox.checked = checked;
        self.push(checkbox)
    }

    pub fn with_radio(self, id: &str, group: &str, checked: bool) -> Self {
        let mut radio = Element::new(id, Kind::Radio);
        radio.checked = checked;
        radio.group = Some(group.to_string());
        let label_id = format!("label-{id}");
        self.push(radio).push(Self::label(&label_id, id, Some(id)))
    }

    pub fn with_nav_link(self, href: &str) -> Self {
        let count = {
            let state = self.state.lock().unwrap();
            state.elements.iter().filter(|e| e.kind == Kind::Link).count()
        };
        let mut link = Element::new(&format!("link-{count}"), Kind::Link);
        link.href = href.to_string();
        self.push(link)
    }

    /// Simulate the host moving to another screen.
    pub fn set_path(&self, path: &str) {
        self.state.lock().unwrap().path = path.to_string();
    }

    pub fn current(&self) -> String {
        self.state.lock().unwrap().path.clone()
    }

    pub fn path_reads(&self) -> usize {
        self.state.lock().unwrap().path_reads
    }

    pub fn query_count(&self) -> usize {
        self.state.lock().unwrap().queries
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.state.lock().unwrap().keys.clone()
    }

    pub fn value_writes(&self) -> usize {
        self.state.lock().unwrap().value_writes
    }

    pub fn code_value(&self) -> String {
        let state = self.state.lock().unwrap();
        state
            .find(CODE_INPUT)
            .map(|e| e.value.clone())
            .unwrap_or_default()
    }

    pub fn is_checked_now(&self, id: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.find(id).is_some_and(|e| e.checked)
    }
}

fn element<'a>(state: &'a mut State, el: &ElementId) -> Result<&'a mut Element, PageError> {
    state
        .find_mut(&el.0)
        .ok_or_else(|| PageError::Detached(el.clone()))
}

#[async_trait]
impl Page for FakePage {
    async fn current_path(&self) -> Result<String, PageError> {
        let mut state = self.state.lock().unwrap();
        state.path_reads += 1;
        Ok(state.path.clone())
    }

    async fn query(&self, query: &Query) -> Result<Option<ElementId>, PageError> {
        let mut state = self.state.lock().unwrap();
        state.queries += 1;
        let state = &*state;
        let found = match query {
            Query::LabelText(re) => state
                .visible()
                .find(|e| e.kind == Kind::Label && re.is_match(&e.text)),
            Query::InputForLabel(label) => state
                .find(&label.0)
                .and_then(|l| l.target.as_deref())
                .and_then(|target| state.visible().find(|e| e.id == target && e.kind == Kind::Input)),
            Query::ById(id) => state.visible().find(|e| &e.id == id),
            Query::LabelFor(id) => state
                .visible()
                .find(|e| e.kind == Kind::Label && e.target.as_deref() == Some(id.as_str())),
            Query::OptionText(re) => state
                .visible()
                .find(|e| e.kind == Kind::Option && re.is_match(&e.text)),
            Query::NavLink(re) => state
                .visible()
                .find(|e| e.kind == Kind::Link && re.is_match(&e.href)),
        };
        Ok(found.map(|e| ElementId(e.id.clone())))
    }

    async fn value(&self, el: &ElementId) -> Result<String, PageError> {
        let mut state = self.state.lock().unwrap();
        Ok(element(&mut state, el)?.value.clone())
    }

    async fn is_checked(&self, el: &ElementId) -> Result<bool, PageError> {
        let mut state = self.state.lock().unwrap();
        Ok(element(&mut state, el)?.checked)
    }

    async fn focus(&self, el: &ElementId) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        element(&mut state, el).map(|_| ())
    }

    async fn set_value(&self, el: &ElementId, value: &str) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        element(&mut state, el)?.value = value.to_string();
        state.value_writes += 1;
        let reveal = state
            .reveal_on
            .as_ref()
            .is_some_and(|needle| value.to_uppercase().contains(needle.as_str()));
        if reveal {
            for option in state.elements.iter_mut().filter(|e| e.kind == Kind::Option) {
                option.visible = true;
            }
        }
        Ok(())
    }

    async fn press_key(&self, el: &ElementId, key: Key) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        element(&mut state, el)?;
        state.keys.push(key);
        match key {
            Key::Backspace => element(&mut state, el)?.value.clear(),
            Key::ArrowDown => state.armed = true,
            Key::Enter if state.armed => {
                state.armed = false;
                if let Some(pick) = state.keyboard_pick.clone() {
                    element(&mut state, el)?.value = pick;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn activate(&self, el: &ElementId) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        let clicked = element(&mut state, el)?.clone();
        state.clicks.push(clicked.id.clone());
        match clicked.kind {
            Kind::Label => {
                let Some(target) = clicked.target else {
                    return Ok(());
                };
                let Some(control) = state.find(&target).cloned() else {
                    return Ok(());
                };
                match control.kind {
                    Kind::Checkbox => {
                        if let Some(c) = state.find_mut(&target) {
                            c.checked = !c.checked;
                        }
                    }
                    Kind::Radio => {
                        for e in state.elements.iter_mut() {
                            if e.kind == Kind::Radio && e.group == control.group {
                                e.checked = e.id == target;
                            }
                        }
                    }
                    _ => {}
                }
            }
            Kind::Option => {
                if let Some(input) = state.find_mut(CODE_INPUT) {
                    input.value = clicked.text.clone();
                }
                for option in state.elements.iter_mut().filter(|e| e.kind == Kind::Option) {
                    option.visible = false;
                }
            }
            Kind::Link => state.path = clicked.href.clone(),
            Kind::Input | Kind::Checkbox | Kind::Radio => {}
        }
        Ok(())
    }
}
