//! In-memory page used by the interaction tests.
//!
//! The fixture HTML is parsed once with `scraper`; selectors run against that
//! tree while mutable state (classes, styles, labels, layout) lives in a side
//! table indexed by document order. Layout comes from `data-top` and
//! `data-height` attributes.

use scraper::{ElementRef, Html, Selector};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::dom::{
    Dom, DomEvent, EventHandler, IntersectionHandler, ListenTarget, ObserverOptions, TimerCallback,
};

#[derive(Debug, Default)]
struct ElementState {
    classes: Vec<String>,
    styles: BTreeMap<String, String>,
    text: String,
    inner_html: Option<String>,
    disabled: bool,
    top: f64,
    height: f64,
}

struct Listener {
    target: ListenTarget<usize>,
    event: &'static str,
    handler: EventHandler,
}

struct Watcher {
    targets: Vec<usize>,
    intersecting: Vec<bool>,
    options: ObserverOptions,
    handler: IntersectionHandler<usize>,
}

struct PendingTimer {
    due_ms: u64,
    seq: u64,
    callback: TimerCallback,
}

pub struct StubDom {
    html: Html,
    every_element: Selector,
    elements: RefCell<Vec<ElementState>>,
    scroll_y: Cell<f64>,
    now_ms: Cell<u64>,
    timer_seq: Cell<u64>,
    scrolled: RefCell<Vec<usize>>,
    listeners: RefCell<Vec<Listener>>,
    watchers: RefCell<Vec<Watcher>>,
    timers: RefCell<Vec<PendingTimer>>,
}

impl StubDom {
    pub fn parse(document: &str) -> Self {
        let html = Html::parse_document(document);
        let every_element = Selector::parse("*").expect("universal selector parses");
        let elements = html
            .select(&every_element)
            .map(|element| ElementState {
                classes: element.value().classes().map(ToString::to_string).collect(),
                styles: BTreeMap::new(),
                text: element.text().collect(),
                inner_html: None,
                disabled: element.value().attr("disabled").is_some(),
                top: layout_attribute(&element, "data-top"),
                height: layout_attribute(&element, "data-height"),
            })
            .collect();

        Self {
            html,
            every_element,
            elements: RefCell::new(elements),
            scroll_y: Cell::new(0.0),
            now_ms: Cell::new(0),
            timer_seq: Cell::new(0),
            scrolled: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            watchers: RefCell::new(Vec::new()),
            timers: RefCell::new(Vec::new()),
        }
    }

    /// First element matching `selector`; panics when the fixture has none.
    pub fn find(&self, selector: &str) -> usize {
        self.query_all(selector)
            .first()
            .copied()
            .unwrap_or_else(|| panic!("fixture has no element matching {selector}"))
    }

    pub fn click(&self, element: usize) -> DomEvent {
        self.dispatch(ListenTarget::Element(element), "click")
    }

    pub fn submit(&self, form: usize) -> DomEvent {
        self.dispatch(ListenTarget::Element(form), "submit")
    }

    pub fn scroll_to(&self, y: f64) {
        self.scroll_y.set(y);
        self.dispatch(ListenTarget::Window, "scroll");
    }

    /// Reports a new visible fraction for `element`. Watchers are notified
    /// only when their intersecting state flips, like the browser's
    /// threshold crossings.
    pub fn set_visibility(&self, element: usize, ratio: f64) {
        let mut watchers = self.watchers.take();

        for watcher in &mut watchers {
            let Some(slot) = watcher.targets.iter().position(|target| *target == element) else {
                continue;
            };
            let intersecting = ratio > 0.0 && ratio >= watcher.options.threshold;
            if watcher.intersecting[slot] == intersecting {
                continue;
            }
            watcher.intersecting[slot] = intersecting;
            (watcher.handler)(&element, intersecting);
        }

        let added = self.watchers.take();
        watchers.extend(added);
        *self.watchers.borrow_mut() = watchers;
    }

    /// Moves the virtual clock forward, firing due timers in order.
    pub fn advance(&self, ms: u64) {
        let until = self.now_ms.get() + ms;

        loop {
            let next = self
                .timers
                .borrow()
                .iter()
                .enumerate()
                .filter(|(_, timer)| timer.due_ms <= until)
                .min_by_key(|(_, timer)| (timer.due_ms, timer.seq))
                .map(|(index, _)| index);
            let Some(index) = next else {
                break;
            };

            let timer = self.timers.borrow_mut().remove(index);
            self.now_ms.set(timer.due_ms);
            (timer.callback)();
        }

        self.now_ms.set(until);
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn scrolled_into_view(&self) -> Vec<usize> {
        self.scrolled.borrow().clone()
    }

    pub fn has_class(&self, element: usize, class: &str) -> bool {
        self.class_count(element, class) > 0
    }

    pub fn class_count(&self, element: usize, class: &str) -> usize {
        self.elements.borrow()[element]
            .classes
            .iter()
            .filter(|candidate| candidate.as_str() == class)
            .count()
    }

    pub fn style(&self, element: usize, property: &str) -> Option<String> {
        self.elements.borrow()[element].styles.get(property).cloned()
    }

    pub fn inner_html(&self, element: usize) -> Option<String> {
        self.elements.borrow()[element].inner_html.clone()
    }

    pub fn observer_options(&self, element: usize) -> Vec<ObserverOptions> {
        self.watchers
            .borrow()
            .iter()
            .filter(|watcher| watcher.targets.contains(&element))
            .map(|watcher| watcher.options.clone())
            .collect()
    }

    fn dispatch(&self, target: ListenTarget<usize>, event: &str) -> DomEvent {
        let mut dom_event = DomEvent::default();
        let mut listeners = self.listeners.take();

        for listener in listeners
            .iter_mut()
            .filter(|listener| listener.target == target && listener.event == event)
        {
            (listener.handler)(&mut dom_event);
        }

        let added = self.listeners.take();
        listeners.extend(added);
        *self.listeners.borrow_mut() = listeners;
        dom_event
    }

    fn element_ref(&self, index: usize) -> Option<ElementRef<'_>> {
        self.html.select(&self.every_element).nth(index)
    }

    fn indexes_of<'a>(&'a self, matched: impl Iterator<Item = ElementRef<'a>>) -> Vec<usize> {
        let ids: Vec<_> = matched.map(|element| element.id()).collect();

        self.html
            .select(&self.every_element)
            .enumerate()
            .filter(|(_, element)| ids.contains(&element.id()))
            .map(|(index, _)| index)
            .collect()
    }
}

fn layout_attribute(element: &ElementRef<'_>, name: &str) -> f64 {
    element
        .value()
        .attr(name)
        .and_then(|value| value.parse().ok())
        .unwrap_or(0.0)
}

impl Dom for StubDom {
    type Element = usize;

    fn query_all(&self, selector: &str) -> Vec<usize> {
        let Ok(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        self.indexes_of(self.html.select(&selector))
    }

    fn query_within(&self, root: &usize, selector: &str) -> Option<usize> {
        let selector = Selector::parse(selector).ok()?;
        let root = self.element_ref(*root)?;
        let matched = root.select(&selector).filter(|element| element.id() != root.id());
        self.indexes_of(matched).first().copied()
    }

    fn element_by_id(&self, id: &str) -> Option<usize> {
        self.html
            .select(&self.every_element)
            .position(|element| element.value().id() == Some(id))
    }

    fn attribute(&self, element: &usize, name: &str) -> Option<String> {
        self.element_ref(*element)?
            .value()
            .attr(name)
            .map(ToString::to_string)
    }

    fn add_classes(&self, element: &usize, classes: &[String]) {
        let mut elements = self.elements.borrow_mut();
        let state = &mut elements[*element];
        for class in classes {
            if !state.classes.contains(class) {
                state.classes.push(class.clone());
            }
        }
    }

    fn remove_classes(&self, element: &usize, classes: &[String]) {
        self.elements.borrow_mut()[*element]
            .classes
            .retain(|class| !classes.contains(class));
    }

    fn set_style(&self, element: &usize, property: &str, value: &str) {
        self.elements.borrow_mut()[*element]
            .styles
            .insert(property.to_string(), value.to_string());
    }

    fn text_content(&self, element: &usize) -> String {
        self.elements.borrow()[*element].text.clone()
    }

    fn set_text_content(&self, element: &usize, text: &str) {
        let mut elements = self.elements.borrow_mut();
        let state = &mut elements[*element];
        state.text = text.to_string();
        state.inner_html = None;
    }

    fn set_inner_html(&self, element: &usize, html: &str) {
        let text = Html::parse_fragment(html).root_element().text().collect();
        let mut elements = self.elements.borrow_mut();
        let state = &mut elements[*element];
        state.text = text;
        state.inner_html = Some(html.to_string());
    }

    fn is_disabled(&self, element: &usize) -> bool {
        self.elements.borrow()[*element].disabled
    }

    fn set_disabled(&self, element: &usize, disabled: bool) {
        self.elements.borrow_mut()[*element].disabled = disabled;
    }

    fn offset_top(&self, element: &usize) -> f64 {
        self.elements.borrow()[*element].top
    }

    fn offset_height(&self, element: &usize) -> f64 {
        self.elements.borrow()[*element].height
    }

    fn scroll_y(&self) -> f64 {
        self.scroll_y.get()
    }

    fn scroll_into_view_smooth(&self, element: &usize) {
        self.scrolled.borrow_mut().push(*element);
    }

    fn listen(&self, target: ListenTarget<usize>, event: &'static str, handler: EventHandler) {
        self.listeners.borrow_mut().push(Listener {
            target,
            event,
            handler,
        });
    }

    fn observe(&self, elements: &[usize], options: &ObserverOptions, handler: IntersectionHandler<usize>) {
        self.watchers.borrow_mut().push(Watcher {
            targets: elements.to_vec(),
            intersecting: vec![false; elements.len()],
            options: options.clone(),
            handler,
        });
    }

    fn set_timeout(&self, delay_ms: u32, callback: TimerCallback) {
        let seq = self.timer_seq.get();
        self.timer_seq.set(seq + 1);
        self.timers.borrow_mut().push(PendingTimer {
            due_ms: self.now_ms.get() + u64::from(delay_ms),
            seq,
            callback,
        });
    }
}
