use regex::Regex;
use serde_json::json;
use std::rc::Rc;
use std::sync::OnceLock;
use thiserror::Error;

use crate::config::InteractionConfig;
use crate::dom::{Dom, DomEvent, ListenTarget, ObserverOptions};
use crate::logging::{log_event, LogLevel};

pub const ANCHOR_SELECTOR: &str = r##"a[href^="#"]"##;
pub const SECTION_SELECTOR: &str = "section[id]";
pub const NAV_LINK_SELECTOR: &str = r##"nav a[href^="#"]"##;
pub const CONTACT_FORM_SELECTOR: &str = r#"form[action*="contact"]"#;
pub const SUBMIT_BUTTON_SELECTOR: &str = r#"button[type="submit"]"#;
pub const FADE_IN_SELECTOR: &str = ".fade-in";
pub const SKILL_BAR_SELECTOR: &str = ".skill-bar";

const SENDING_LABEL_HTML: &str = concat!(
    r#"<svg class="animate-spin -ml-1 mr-3 h-5 w-5 text-white" xmlns="http://www.w3.org/2000/svg" fill="none" viewBox="0 0 24 24">"#,
    r#"<circle class="opacity-25" cx="12" cy="12" r="10" stroke="currentColor" stroke-width="4"></circle>"#,
    r#"<path class="opacity-75" fill="currentColor" d="M4 12a8 8 0 018-8V0C5.373 0 0 5.373 0 12h4zm2 5.291A7.962 7.962 0 014 12H0c0 3.042 1.135 5.824 3 7.938l3-2.647z"></path>"#,
    "</svg>",
    "Sending...",
);

/// Element id named by an in-page `href`, if any.
pub fn fragment_id(href: &str) -> Option<&str> {
    href.strip_prefix('#').filter(|id| !id.is_empty())
}

/// Starts a smooth scroll to the anchor's target. Returns `false` when the
/// fragment names no element.
pub fn scroll_to_anchor<D: Dom>(dom: &D, anchor: &D::Element) -> bool {
    let href = dom.attribute(anchor, "href").unwrap_or_default();
    let Some(target) = fragment_id(&href).and_then(|id| dom.element_by_id(id)) else {
        return false;
    };

    dom.scroll_into_view_smooth(&target);
    true
}

#[derive(Clone, Debug, PartialEq)]
pub struct SectionBounds {
    pub id: String,
    pub top: f64,
    pub height: f64,
}

impl SectionBounds {
    /// Half-open range `[top - offset, top - offset + height)`.
    pub fn contains(&self, scroll_y: f64, offset: f64) -> bool {
        let start = self.top - offset;
        scroll_y >= start && scroll_y < start + self.height
    }
}

/// The section the scroll position falls in. When ranges overlap the last
/// matching section in document order wins.
pub fn current_section(sections: &[SectionBounds], scroll_y: f64, offset: f64) -> Option<&SectionBounds> {
    sections
        .iter()
        .filter(|section| section.contains(scroll_y, offset))
        .last()
}

pub fn section_bounds<D: Dom>(dom: &D, sections: &[D::Element]) -> Vec<SectionBounds> {
    sections
        .iter()
        .filter_map(|section| {
            let id = dom.attribute(section, "id").filter(|id| !id.is_empty())?;
            Some(SectionBounds {
                id,
                top: dom.offset_top(section),
                height: dom.offset_height(section),
            })
        })
        .collect()
}

/// Moves the active classes to the link of the section in view. Links are
/// left as they are when no section is in range. Returns the active id.
pub fn highlight_nav<D: Dom>(
    dom: &D,
    sections: &[D::Element],
    links: &[D::Element],
    config: &InteractionConfig,
) -> Option<String> {
    let bounds = section_bounds(dom, sections);
    let current = current_section(&bounds, dom.scroll_y(), config.nav_offset_px)?;
    let current_href = format!("#{}", current.id);

    for link in links {
        dom.remove_classes(link, &config.active_classes);
        if dom.attribute(link, "href").as_deref() == Some(current_href.as_str()) {
            dom.add_classes(link, &config.active_classes);
        }
    }

    Some(current.id.clone())
}

/// A submit button showing the sending state, with the label to put back.
#[derive(Clone, Debug)]
pub struct PendingSubmit<E> {
    button: E,
    original_label: String,
}

impl<E: Clone + PartialEq + 'static> PendingSubmit<E> {
    /// Puts the original label back unless something already re-enabled the
    /// button. Returns whether anything changed.
    pub fn restore<D: Dom<Element = E>>(&self, dom: &D) -> bool {
        if !dom.is_disabled(&self.button) {
            return false;
        }

        dom.set_text_content(&self.button, &self.original_label);
        dom.set_disabled(&self.button, false);
        true
    }
}

pub fn begin_submit<D: Dom>(dom: &D, form: &D::Element) -> Option<PendingSubmit<D::Element>> {
    let button = dom.query_within(form, SUBMIT_BUTTON_SELECTOR)?;
    let original_label = dom.text_content(&button);

    dom.set_inner_html(&button, SENDING_LABEL_HTML);
    dom.set_disabled(&button, true);

    Some(PendingSubmit {
        button,
        original_label,
    })
}

/// CSS `transition-delay` for the element at `index`.
pub fn stagger_delay(index: usize, stagger_ms: u32) -> String {
    let millis = index as f64 * f64::from(stagger_ms);
    format!("{}s", millis / 1_000.0)
}

pub fn reveal_fade_in<D: Dom>(dom: &D, element: &D::Element, index: usize, config: &InteractionConfig) {
    dom.add_classes(element, std::slice::from_ref(&config.visible_class));
    dom.set_style(
        element,
        "transition-delay",
        &stagger_delay(index, config.fade_stagger_ms),
    );
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SkillLevelError {
    #[error("skill bar has no `{attribute}` attribute")]
    MissingAttribute { attribute: String },
    #[error("no `level: <digits>` in {value:?}")]
    NoLevel { value: String },
    #[error("skill level {digits} is out of range")]
    OutOfRange { digits: String },
}

fn level_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"level: ([0-9]+)").expect("skill level pattern compiles"))
}

pub fn parse_skill_level(value: &str) -> Result<u32, SkillLevelError> {
    let digits = level_pattern()
        .captures(value)
        .and_then(|captures| captures.get(1))
        .map(|digits| digits.as_str())
        .ok_or_else(|| SkillLevelError::NoLevel {
            value: value.to_string(),
        })?;

    digits.parse::<u32>().map_err(|_| SkillLevelError::OutOfRange {
        digits: digits.to_string(),
    })
}

/// Sets the bar's width from its level attribute. On error the element is
/// not touched.
pub fn apply_skill_level<D: Dom>(
    dom: &D,
    element: &D::Element,
    config: &InteractionConfig,
) -> Result<u32, SkillLevelError> {
    let value = dom
        .attribute(element, &config.skill_attribute)
        .ok_or_else(|| SkillLevelError::MissingAttribute {
            attribute: config.skill_attribute.clone(),
        })?;
    let level = parse_skill_level(&value)?;

    dom.set_style(element, "width", &format!("{level}%"));
    Ok(level)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub anchors: usize,
    pub sections: usize,
    pub nav_links: usize,
    pub contact_form: bool,
    pub fade_targets: usize,
    pub skill_bars: usize,
}

/// Wires every behavior onto the page. Call once, after the content is
/// parsed.
pub fn install<D: Dom>(dom: &Rc<D>, config: &InteractionConfig) -> InstallReport {
    let config = Rc::new(config.clone());
    let anchors = wire_anchor_scrolling(dom, &config);
    let (sections, nav_links) = wire_nav_highlighting(dom, &config);
    let contact_form = wire_submit_indicator(dom, &config);
    let fade_targets = wire_fade_in(dom, &config);
    let skill_bars = wire_skill_bars(dom, &config);

    let report = InstallReport {
        anchors,
        sections,
        nav_links,
        contact_form,
        fade_targets,
        skill_bars,
    };

    log_event(
        config.log_level,
        LogLevel::Info,
        "interactions_ready",
        json!({
            "anchors": report.anchors,
            "sections": report.sections,
            "navLinks": report.nav_links,
            "contactForm": report.contact_form,
            "fadeTargets": report.fade_targets,
            "skillBars": report.skill_bars,
        }),
    );

    report
}

fn wire_anchor_scrolling<D: Dom>(dom: &Rc<D>, config: &Rc<InteractionConfig>) -> usize {
    let anchors = dom.query_all(ANCHOR_SELECTOR);

    for anchor in &anchors {
        let handler_dom = Rc::clone(dom);
        let handler_anchor = anchor.clone();
        let log_level = config.log_level;

        dom.listen(
            ListenTarget::Element(anchor.clone()),
            "click",
            Box::new(move |event: &mut DomEvent| {
                event.prevent_default();
                if !scroll_to_anchor(&*handler_dom, &handler_anchor) {
                    log_event(
                        log_level,
                        LogLevel::Debug,
                        "anchor_target_missing",
                        json!({ "href": handler_dom.attribute(&handler_anchor, "href") }),
                    );
                }
            }),
        );
    }

    anchors.len()
}

fn wire_nav_highlighting<D: Dom>(dom: &Rc<D>, config: &Rc<InteractionConfig>) -> (usize, usize) {
    let sections = dom.query_all(SECTION_SELECTOR);
    let links = dom.query_all(NAV_LINK_SELECTOR);
    let counts = (sections.len(), links.len());

    let handler_dom = Rc::clone(dom);
    let config = Rc::clone(config);
    dom.listen(
        ListenTarget::Window,
        "scroll",
        Box::new(move |_event: &mut DomEvent| {
            highlight_nav(&*handler_dom, &sections, &links, &config);
        }),
    );

    counts
}

fn wire_submit_indicator<D: Dom>(dom: &Rc<D>, config: &Rc<InteractionConfig>) -> bool {
    let Some(form) = dom.query_all(CONTACT_FORM_SELECTOR).into_iter().next() else {
        return false;
    };

    let target = ListenTarget::Element(form.clone());
    let handler_dom = Rc::clone(dom);
    let config = Rc::clone(config);
    dom.listen(
        target,
        "submit",
        Box::new(move |_event: &mut DomEvent| {
            let log_level = config.log_level;
            let Some(pending) = begin_submit(&*handler_dom, &form) else {
                log_event(log_level, LogLevel::Debug, "submit_button_missing", json!({}));
                return;
            };

            let timer_dom = Rc::clone(&handler_dom);
            handler_dom.set_timeout(
                config.submit_reset_delay_ms,
                Box::new(move || {
                    if pending.restore(&*timer_dom) {
                        log_event(log_level, LogLevel::Debug, "submit_button_restored", json!({}));
                    }
                }),
            );
        }),
    );

    true
}

fn wire_fade_in<D: Dom>(dom: &Rc<D>, config: &Rc<InteractionConfig>) -> usize {
    let elements = dom.query_all(FADE_IN_SELECTOR);
    let options = ObserverOptions {
        threshold: config.fade_threshold,
        root_margin: config.fade_root_margin(),
    };

    // indexes are fixed to the collection as it was at install time
    let registered = elements.clone();
    let handler_dom = Rc::clone(dom);
    let config = Rc::clone(config);
    dom.observe(
        &elements,
        &options,
        Box::new(move |element: &D::Element, intersecting: bool| {
            if !intersecting {
                return;
            }
            let index = registered
                .iter()
                .position(|candidate| candidate == element)
                .unwrap_or(0);
            reveal_fade_in(&*handler_dom, element, index, &config);
        }),
    );

    elements.len()
}

fn wire_skill_bars<D: Dom>(dom: &Rc<D>, config: &Rc<InteractionConfig>) -> usize {
    let bars = dom.query_all(SKILL_BAR_SELECTOR);
    let options = ObserverOptions::with_threshold(config.skill_threshold);

    let handler_dom = Rc::clone(dom);
    let config = Rc::clone(config);
    dom.observe(
        &bars,
        &options,
        Box::new(move |element: &D::Element, intersecting: bool| {
            if !intersecting {
                return;
            }
            if let Err(error) = apply_skill_level(&*handler_dom, element, &config) {
                log_event(
                    config.log_level,
                    LogLevel::Warn,
                    "skill_level_unparsed",
                    json!({ "error": error.to_string() }),
                );
            }
        }),
    );

    bars.len()
}
