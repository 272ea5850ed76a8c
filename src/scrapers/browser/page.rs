//! [`PageDriver`] backed by a chromiumoxide page.
//!
//! Element paths are resolved by injected JavaScript on every call. Frames
//! are the top-level document plus every same-origin `iframe`/`frame` at any
//! depth whose document is readable; cross-origin frames cannot be searched
//! and are left out.
//!
//! A [`FrameRef`] handed out by [`ChromePage::frames`] stays bound to the
//! same frame for the life of the page. Each frame is remembered by its path
//! of `name`/`src` keys from the top document, so frames inserted later do
//! not shift it onto another document.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::scrapers::page::{ElementRef, FrameRef, PageDriver, PageError};

/// Shared helpers prepended to every script.
const RESOLVE_JS: &str = r#"
const __subframes = (doc) => Array.from(doc.querySelectorAll('iframe, frame'));
const __open = (f) => { try { return f.contentDocument; } catch (e) { return null; } };
const __step = (doc, key) => {
    const frames = __subframes(doc);
    let f = null;
    if (key.name) f = frames.find((x) => x.getAttribute('name') === key.name) || null;
    if (!f && key.src) f = frames.find((x) => x.getAttribute('src') === key.src) || null;
    if (!f && !key.name && !key.src) f = frames[key.index] || null;
    return f ? __open(f) : null;
};
const __doc = (path) => {
    let doc = document;
    for (const key of path) {
        if (!doc) return null;
        doc = __step(doc, key);
    }
    return doc;
};
const __resolve = (frame, path) => {
    let node = __doc(frame);
    for (const [sel, idx] of path) {
        if (!node) return null;
        node = node.querySelectorAll(sel)[idx] || null;
    }
    return node;
};
"#;

/// Walks every readable frame, depth first, returning key paths.
const FRAMES_JS: &str = r#"
const out = [[]];
const walk = (doc, path, depth) => {
    if (depth >= 8) return;
    __subframes(doc).forEach((f, index) => {
        const inner = __open(f);
        if (!inner) return;
        const key = {
            name: f.getAttribute('name') || '',
            src: f.getAttribute('src') || '',
            index,
        };
        const next = path.concat([key]);
        out.push(next);
        walk(inner, next, depth + 1);
    });
};
walk(document, [], 0);
return out;
"#;

/// One step from a document into one of its child frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FrameKey {
    name: String,
    src: String,
    /// Position among the parent's frames; only used when the frame has
    /// neither a name nor a src.
    index: usize,
}

impl FrameKey {
    fn same_frame(&self, other: &FrameKey) -> bool {
        if !self.name.is_empty() || !other.name.is_empty() {
            return self.name == other.name;
        }
        if !self.src.is_empty() || !other.src.is_empty() {
            return self.src == other.src;
        }
        self.index == other.index
    }
}

fn same_path(a: &[FrameKey], b: &[FrameKey]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_frame(y))
}

/// Append-only map from [`FrameRef`] to frame key path. Slot 0 is the
/// top-level document.
#[derive(Debug)]
struct FrameTable {
    paths: Vec<Vec<FrameKey>>,
}

impl FrameTable {
    fn new() -> Self {
        Self {
            paths: vec![Vec::new()],
        }
    }

    /// Refs for the frames currently on the page, reusing the ref of any
    /// frame seen before.
    fn register(&mut self, found: Vec<Vec<FrameKey>>) -> Vec<FrameRef> {
        let mut refs = Vec::with_capacity(found.len());
        for path in found {
            let slot = match self.paths.iter().position(|known| same_path(known, &path)) {
                Some(slot) => slot,
                None => {
                    self.paths.push(path);
                    self.paths.len() - 1
                }
            };
            if !refs.contains(&FrameRef(slot)) {
                refs.push(FrameRef(slot));
            }
        }
        refs
    }

    fn path(&self, frame: FrameRef) -> Option<&[FrameKey]> {
        self.paths.get(frame.0).map(Vec::as_slice)
    }
}

/// Attribute used to hand a resolved node over to CDP input events.
const FOCUS_MARKER: &str = "data-jobflow-focus";

/// A chromiumoxide page driven through JavaScript.
pub struct ChromePage {
    page: Page,
    timeout: Duration,
    frames: Mutex<FrameTable>,
}

impl ChromePage {
    pub fn new(page: Page, timeout: Duration) -> Self {
        Self {
            page,
            timeout,
            frames: Mutex::new(FrameTable::new()),
        }
    }

    pub fn inner(&self) -> &Page {
        &self.page
    }

    fn script(body: &str) -> String {
        format!("(() => {{ {} {} }})()", RESOLVE_JS, body)
    }

    /// JSON key path of a frame previously returned by `frames`.
    fn frame_path(&self, frame: FrameRef) -> Result<String, PageError> {
        let table = self.frames.lock().unwrap_or_else(|e| e.into_inner());
        let path = table
            .path(frame)
            .ok_or_else(|| PageError::Detached(format!("unknown frame {}", frame.0)))?;
        serde_json::to_string(path).map_err(|e| PageError::Script(e.to_string()))
    }

    fn bind_element(&self, element: &ElementRef) -> Result<String, PageError> {
        let path = serde_json::to_string(&element.path).unwrap_or_else(|_| "[]".to_string());
        Ok(format!(
            "const el = __resolve({}, {});",
            self.frame_path(element.frame)?,
            path
        ))
    }

    fn quote(value: &str) -> String {
        serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
    }

    async fn eval<T: DeserializeOwned>(&self, body: &str) -> Result<T, PageError> {
        let result = tokio::time::timeout(self.timeout, self.page.evaluate(Self::script(body)))
            .await
            .map_err(|_| PageError::Script("timed out".to_string()))?
            .map_err(|e| PageError::Script(e.to_string()))?;
        result
            .into_value()
            .map_err(|e| PageError::Script(e.to_string()))
    }

    /// Run an action against an element; the body must return a boolean
    /// that is false when the element is missing.
    async fn act(&self, element: &ElementRef, body: &str) -> Result<(), PageError> {
        let script = format!("{} if (!el) return false; {}", self.bind_element(element)?, body);
        if self.eval::<bool>(&script).await? {
            Ok(())
        } else {
            Err(PageError::Detached(element.to_string()))
        }
    }

    /// Mark a main-document element so CDP can address it by selector.
    async fn with_marked<F, Fut>(&self, element: &ElementRef, action: F) -> Result<(), PageError>
    where
        F: FnOnce(chromiumoxide::Element) -> Fut + Send,
        Fut: std::future::Future<Output = Result<(), PageError>> + Send,
    {
        self.act(
            element,
            &format!("el.setAttribute('{}', '1'); return true;", FOCUS_MARKER),
        )
        .await?;

        let found = self
            .page
            .find_element(format!("[{}]", FOCUS_MARKER))
            .await
            .map_err(|e| PageError::Detached(e.to_string()));
        let result = match found {
            Ok(handle) => action(handle).await,
            Err(e) => Err(e),
        };

        let cleanup = format!(
            "document.querySelectorAll('[{0}]').forEach(n => n.removeAttribute('{0}')); return true;",
            FOCUS_MARKER
        );
        if let Err(e) = self.eval::<bool>(&cleanup).await {
            debug!("Failed to clear focus marker: {}", e);
        }
        result
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn goto(&self, url: &str) -> Result<(), PageError> {
        tokio::time::timeout(self.timeout, self.page.goto(url))
            .await
            .map_err(|_| PageError::Navigation(format!("timed out loading {}", url)))?
            .map_err(|e| PageError::Navigation(e.to_string()))?;

        // goto resolves on the load event; single-page apps keep rendering after it
        let ready = r#"
            return new Promise((resolve) => {
                if (document.readyState !== 'loading') {
                    resolve(document.readyState);
                } else {
                    document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                    setTimeout(() => resolve('timeout'), 10000);
                }
            });
        "#;
        match self.eval::<String>(ready).await {
            Ok(state) => debug!("Page ready state: {}", state),
            Err(e) => debug!("Could not check ready state: {}", e),
        }
        Ok(())
    }

    async fn frames(&self) -> Result<Vec<FrameRef>, PageError> {
        let found: Vec<Vec<FrameKey>> = self.eval(FRAMES_JS).await?;
        let mut table = self.frames.lock().unwrap_or_else(|e| e.into_inner());
        Ok(table.register(found))
    }

    async fn query_all(
        &self,
        frame: FrameRef,
        selector: &str,
    ) -> Result<Vec<ElementRef>, PageError> {
        let count: usize = self
            .eval(&format!(
                "const root = __doc({}); if (!root) return 0; return root.querySelectorAll({}).length;",
                self.frame_path(frame)?,
                Self::quote(selector)
            ))
            .await?;
        Ok((0..count)
            .map(|i| ElementRef::root(frame, selector, i))
            .collect())
    }

    async fn query_within(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, PageError> {
        let found: Option<bool> = self
            .eval(&format!(
                "{} if (!el) return null; return el.querySelector({}) !== null;",
                self.bind_element(parent)?,
                Self::quote(selector)
            ))
            .await?;
        match found {
            None => Err(PageError::Detached(parent.to_string())),
            Some(true) => Ok(Some(parent.child(selector, 0))),
            Some(false) => Ok(None),
        }
    }

    async fn text(&self, element: &ElementRef) -> Result<Option<String>, PageError> {
        self.eval(&format!(
            "{} if (!el) return null; return (el.innerText || el.textContent || '').trim();",
            self.bind_element(element)?
        ))
        .await
    }

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        self.eval(&format!(
            "{} if (!el) return null; return el.getAttribute({});",
            self.bind_element(element)?,
            Self::quote(name)
        ))
        .await
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<(), PageError> {
        self.act(
            element,
            "el.scrollIntoView({ block: 'end', behavior: 'instant' }); return true;",
        )
        .await
    }

    async fn scroll_by(&self, element: &ElementRef, pixels: i64) -> Result<(), PageError> {
        self.act(element, &format!("el.scrollTop += {}; return true;", pixels))
            .await
    }

    async fn click(&self, element: &ElementRef) -> Result<(), PageError> {
        self.act(element, "el.click(); return true;").await
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), PageError> {
        self.act(
            element,
            "el.focus(); if ('value' in el) { el.value = ''; \
             el.dispatchEvent(new Event('input', { bubbles: true })); } return true;",
        )
        .await?;

        if element.frame == FrameRef::MAIN {
            let text = text.to_string();
            return self
                .with_marked(element, |handle| async move {
                    handle
                        .click()
                        .await
                        .map_err(|e| PageError::Script(e.to_string()))?;
                    handle
                        .type_str(&text)
                        .await
                        .map_err(|e| PageError::Script(e.to_string()))?;
                    Ok(())
                })
                .await;
        }

        // CDP input targets the main frame; set the value directly inside sub-frames
        self.act(
            element,
            &format!(
                "el.value = {}; \
                 el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                 el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true;",
                Self::quote(text)
            ),
        )
        .await
    }

    async fn press_key(&self, element: &ElementRef, key: &str) -> Result<(), PageError> {
        if element.frame == FrameRef::MAIN {
            let key = key.to_string();
            return self
                .with_marked(element, |handle| async move {
                    handle
                        .press_key(&key)
                        .await
                        .map_err(|e| PageError::Script(e.to_string()))?;
                    Ok(())
                })
                .await;
        }

        self.act(
            element,
            &format!(
                "const key = {}; \
                 for (const type of ['keydown', 'keypress', 'keyup']) {{ \
                     el.dispatchEvent(new KeyboardEvent(type, {{ key, bubbles: true }})); \
                 }} \
                 if (key === 'Enter' && el.form && el.form.requestSubmit) el.form.requestSubmit(); \
                 return true;",
                Self::quote(key)
            ),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str, src: &str, index: usize) -> FrameKey {
        FrameKey {
            name: name.to_string(),
            src: src.to_string(),
            index,
        }
    }

    #[test]
    fn test_inserted_frame_does_not_shift_refs() {
        let mut table = FrameTable::new();
        let results = vec![key("results", "/jobs/list", 0)];
        let first = table.register(vec![Vec::new(), results.clone()]);
        assert_eq!(first, vec![FrameRef(0), FrameRef(1)]);

        // An ad frame lands in front of the results frame
        let moved = vec![key("results", "/jobs/list", 1)];
        let ad = vec![key("", "https://ads.example/slot", 0)];
        let second = table.register(vec![Vec::new(), ad, moved]);
        assert_eq!(second, vec![FrameRef(0), FrameRef(2), FrameRef(1)]);
        assert_eq!(table.path(FrameRef(1)).unwrap()[0].name, "results");
    }

    #[test]
    fn test_nested_frames_get_their_own_refs() {
        let mut table = FrameTable::new();
        let outer = vec![key("shell", "", 0)];
        let inner = vec![key("shell", "", 0), key("", "/jobs/embed", 0)];
        let refs = table.register(vec![Vec::new(), outer, inner]);
        assert_eq!(refs.len(), 3);
        assert_eq!(table.path(refs[2]).unwrap().len(), 2);
        assert!(table.path(FrameRef(7)).is_none());
    }

    #[test]
    fn test_unnamed_frames_match_by_position() {
        assert!(key("", "", 2).same_frame(&key("", "", 2)));
        assert!(!key("", "", 2).same_frame(&key("", "", 3)));
        assert!(key("", "/a", 0).same_frame(&key("", "/a", 4)));
        assert!(!key("a", "/x", 0).same_frame(&key("b", "/x", 0)));
    }
}
