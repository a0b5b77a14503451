use gloo_timers::callback::Timeout;
use js_sys::{Array, Promise, Reflect};
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::{future_to_promise, JsFuture};
use web_sys::{
    window, Document, DocumentReadyState, Element, Event, EventTarget, HtmlButtonElement,
    HtmlElement, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit,
    ScrollBehavior, ScrollIntoViewOptions, ScrollLogicalPosition, Window,
};

use crate::clipboard::{copy_to_clipboard, ClipboardError, ClipboardWriter, PAGE_GLOBAL};
use crate::config::{InteractionConfig, CONFIG_ELEMENT_ID};
use crate::dom::{Dom, DomEvent, EventHandler, IntersectionHandler, ListenTarget, ObserverOptions, TimerCallback};
use crate::interactions::install;
use crate::logging::{log_event, LogLevel};

thread_local! {
    static ACTIVE_LOG_LEVEL: Cell<LogLevel> = const { Cell::new(LogLevel::Info) };
}

struct WebDom {
    window: Window,
    document: Document,
    log_level: LogLevel,
}

impl Dom for WebDom {
    type Element = Element;

    fn query_all(&self, selector: &str) -> Vec<Element> {
        let Ok(nodes) = self.document.query_selector_all(selector) else {
            return Vec::new();
        };

        (0..nodes.length())
            .filter_map(|index| nodes.get(index))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn query_within(&self, root: &Element, selector: &str) -> Option<Element> {
        root.query_selector(selector).ok().flatten()
    }

    fn element_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn attribute(&self, element: &Element, name: &str) -> Option<String> {
        element.get_attribute(name)
    }

    fn add_classes(&self, element: &Element, classes: &[String]) {
        let class_list = element.class_list();
        for class in classes {
            let _ = class_list.add_1(class);
        }
    }

    fn remove_classes(&self, element: &Element, classes: &[String]) {
        let class_list = element.class_list();
        for class in classes {
            let _ = class_list.remove_1(class);
        }
    }

    fn set_style(&self, element: &Element, property: &str, value: &str) {
        if let Some(element) = element.dyn_ref::<HtmlElement>() {
            let _ = element.style().set_property(property, value);
        }
    }

    fn text_content(&self, element: &Element) -> String {
        element.text_content().unwrap_or_default()
    }

    fn set_text_content(&self, element: &Element, text: &str) {
        element.set_text_content(Some(text));
    }

    fn set_inner_html(&self, element: &Element, html: &str) {
        element.set_inner_html(html);
    }

    fn is_disabled(&self, element: &Element) -> bool {
        match element.dyn_ref::<HtmlButtonElement>() {
            Some(button) => button.disabled(),
            None => element.has_attribute("disabled"),
        }
    }

    fn set_disabled(&self, element: &Element, disabled: bool) {
        if let Some(button) = element.dyn_ref::<HtmlButtonElement>() {
            button.set_disabled(disabled);
        } else if disabled {
            let _ = element.set_attribute("disabled", "");
        } else {
            let _ = element.remove_attribute("disabled");
        }
    }

    fn offset_top(&self, element: &Element) -> f64 {
        element
            .dyn_ref::<HtmlElement>()
            .map(|element| f64::from(element.offset_top()))
            .unwrap_or(0.0)
    }

    fn offset_height(&self, element: &Element) -> f64 {
        element
            .dyn_ref::<HtmlElement>()
            .map(|element| f64::from(element.offset_height()))
            .unwrap_or(0.0)
    }

    fn scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn scroll_into_view_smooth(&self, element: &Element) {
        let options = ScrollIntoViewOptions::new();
        options.set_behavior(ScrollBehavior::Smooth);
        options.set_block(ScrollLogicalPosition::Start);
        element.scroll_into_view_with_scroll_into_view_options(&options);
    }

    fn listen(&self, target: ListenTarget<Element>, event: &'static str, mut handler: EventHandler) {
        let callback = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let mut dom_event = DomEvent::default();
            handler(&mut dom_event);
            if dom_event.default_prevented() {
                event.prevent_default();
            }
        });

        let event_target: &EventTarget = match &target {
            ListenTarget::Window => self.window.as_ref(),
            ListenTarget::Element(element) => element.as_ref(),
        };

        if event_target
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            .is_err()
        {
            log_event(
                self.log_level,
                LogLevel::Warn,
                "listener_rejected",
                json!({ "event": event }),
            );
        }

        // listeners stay attached for the page's lifetime
        callback.forget();
    }

    fn observe(
        &self,
        elements: &[Element],
        options: &ObserverOptions,
        mut handler: IntersectionHandler<Element>,
    ) {
        let callback = Closure::<dyn FnMut(Array, IntersectionObserver)>::new(
            move |entries: Array, _observer: IntersectionObserver| {
                for entry in entries.iter() {
                    let entry: IntersectionObserverEntry = entry.unchecked_into();
                    handler(&entry.target(), entry.is_intersecting());
                }
            },
        );

        let init = IntersectionObserverInit::new();
        init.set_threshold(&JsValue::from_f64(options.threshold));
        init.set_root_margin(&options.root_margin);

        match IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init) {
            Ok(observer) => {
                for element in elements {
                    observer.observe(element);
                }
            }
            Err(_) => log_event(
                self.log_level,
                LogLevel::Warn,
                "observer_unavailable",
                json!({ "elements": elements.len() }),
            ),
        }

        callback.forget();
    }

    fn set_timeout(&self, delay_ms: u32, callback: TimerCallback) {
        let _ = Timeout::new(delay_ms, callback).forget();
    }
}

struct NavigatorClipboard;

impl ClipboardWriter for NavigatorClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let window = window().ok_or(ClipboardError::Unavailable)?;
        let promise = window.navigator().clipboard().write_text(text);

        JsFuture::from(promise)
            .await
            .map(|_| ())
            .map_err(|error| ClipboardError::Rejected(describe_js_error(&error)))
    }
}

fn describe_js_error(error: &JsValue) -> String {
    if let Some(error) = error.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }

    error.as_string().unwrap_or_else(|| format!("{error:?}"))
}

/// Backs `window.copyToClipboard(text)`. Resolves to `true`, rejects with the
/// error message.
fn copy_to_clipboard_binding(text: String) -> Promise {
    future_to_promise(async move {
        let clipboard = NavigatorClipboard;
        let log_level = ACTIVE_LOG_LEVEL.with(Cell::get);

        copy_to_clipboard(&clipboard, &text, log_level)
            .await
            .map(|()| JsValue::TRUE)
            .map_err(|error| JsValue::from_str(&error.to_string()))
    })
}

/// Module exports are only reachable through the loader's bindings object, so
/// the helper is also set on `window` for inline handlers.
fn expose_clipboard_global(window: &Window, log_level: LogLevel) {
    let binding = Closure::<dyn Fn(String) -> Promise>::new(copy_to_clipboard_binding);
    let installed = Reflect::set(
        window.as_ref(),
        &JsValue::from_str(PAGE_GLOBAL),
        binding.as_ref(),
    );

    if installed.is_err() {
        log_event(
            log_level,
            LogLevel::Warn,
            "clipboard_global_rejected",
            json!({ "name": PAGE_GLOBAL }),
        );
    }
    binding.forget();
}

fn load_config(document: &Document) -> InteractionConfig {
    let Some(source) = document
        .get_element_by_id(CONFIG_ELEMENT_ID)
        .and_then(|element| element.text_content())
    else {
        return InteractionConfig::default();
    };

    InteractionConfig::from_json(&source).unwrap_or_else(|error| {
        let defaults = InteractionConfig::default();
        log_event(
            defaults.log_level,
            LogLevel::Warn,
            "interaction_config_rejected",
            json!({ "error": error.to_string() }),
        );
        defaults
    })
}

pub fn run() {
    let Some(window) = window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };

    let config = load_config(&document);
    ACTIVE_LOG_LEVEL.with(|level| level.set(config.log_level));
    expose_clipboard_global(&window, config.log_level);

    let dom = Rc::new(WebDom {
        window,
        document: document.clone(),
        log_level: config.log_level,
    });

    if document.ready_state() != DocumentReadyState::Loading {
        install(&dom, &config);
        return;
    }

    let on_ready = Closure::once(move || {
        install(&dom, &config);
    });
    if document
        .add_event_listener_with_callback("DOMContentLoaded", on_ready.as_ref().unchecked_ref())
        .is_err()
    {
        log_event(
            LogLevel::Info,
            LogLevel::Warn,
            "ready_listener_rejected",
            json!({}),
        );
    }
    on_ready.forget();
}
