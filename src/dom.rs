//! The page as the interaction handlers see it.
//!
//! Handlers never touch `web_sys` directly: they query and mutate the page
//! through [`Dom`], which the browser build implements over the live document
//! and tests implement over a parsed HTML fixture.

/// Where an event listener is attached.
#[derive(Clone, Debug, PartialEq)]
pub enum ListenTarget<E> {
    Window,
    Element(E),
}

/// Per-dispatch view of an event, handed to listeners.
#[derive(Debug, Default)]
pub struct DomEvent {
    default_prevented: bool,
}

impl DomEvent {
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// Visibility watcher settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ObserverOptions {
    /// Fraction of the element's area that must be visible.
    pub threshold: f64,
    /// CSS margin applied to the viewport before intersecting.
    pub root_margin: String,
}

impl ObserverOptions {
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            root_margin: "0px 0px 0px 0px".to_string(),
        }
    }
}

pub type EventHandler = Box<dyn FnMut(&mut DomEvent)>;
pub type IntersectionHandler<E> = Box<dyn FnMut(&E, bool)>;
pub type TimerCallback = Box<dyn FnOnce()>;

pub trait Dom: 'static {
    type Element: Clone + PartialEq + 'static;

    /// All elements matching `selector`, in document order.
    fn query_all(&self, selector: &str) -> Vec<Self::Element>;
    /// First descendant of `root` matching `selector`.
    fn query_within(&self, root: &Self::Element, selector: &str) -> Option<Self::Element>;
    fn element_by_id(&self, id: &str) -> Option<Self::Element>;
    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;

    fn add_classes(&self, element: &Self::Element, classes: &[String]);
    fn remove_classes(&self, element: &Self::Element, classes: &[String]);
    fn set_style(&self, element: &Self::Element, property: &str, value: &str);

    fn text_content(&self, element: &Self::Element) -> String;
    fn set_text_content(&self, element: &Self::Element, text: &str);
    fn set_inner_html(&self, element: &Self::Element, html: &str);
    fn is_disabled(&self, element: &Self::Element) -> bool;
    fn set_disabled(&self, element: &Self::Element, disabled: bool);

    /// Layout reads, in CSS pixels.
    fn offset_top(&self, element: &Self::Element) -> f64;
    fn offset_height(&self, element: &Self::Element) -> f64;
    fn scroll_y(&self) -> f64;
    /// Animated scroll bringing the element's top to the viewport top.
    /// Returns immediately; completion is not observable.
    fn scroll_into_view_smooth(&self, element: &Self::Element);

    fn listen(&self, target: ListenTarget<Self::Element>, event: &'static str, handler: EventHandler);
    /// Registers `elements` with one watcher. The handler receives the
    /// element and whether it is currently intersecting.
    fn observe(
        &self,
        elements: &[Self::Element],
        options: &ObserverOptions,
        handler: IntersectionHandler<Self::Element>,
    );
    /// One-shot timer. Not cancellable.
    fn set_timeout(&self, delay_ms: u32, callback: TimerCallback);
}
