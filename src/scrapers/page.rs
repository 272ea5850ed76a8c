//! The page operations the extraction engine needs from a browser.
//!
//! Elements are addressed by path rather than by live handle: a frame plus a
//! chain of `(selector, index)` steps. The listing DOM is re-rendered while
//! scrolling, so every operation re-resolves its path against the current
//! document instead of holding on to nodes that may have been replaced.

use std::time::Duration;

use async_trait::async_trait;

/// Errors raised by a page driver.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("script evaluation failed: {0}")]
    Script(String),
    /// The element path no longer resolves to a node.
    #[error("element is no longer attached: {0}")]
    Detached(String),
    #[error("browser unavailable: {0}")]
    Unavailable(String),
}

/// A document within the page. Frame 0 is the top-level document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRef(pub usize);

impl FrameRef {
    pub const MAIN: FrameRef = FrameRef(0);
}

/// Path to an element: `frame`, then the `index`-th match of each selector
/// evaluated inside the previous step's node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub frame: FrameRef,
    pub path: Vec<(String, usize)>,
}

impl ElementRef {
    pub fn root(frame: FrameRef, selector: &str, index: usize) -> Self {
        Self {
            frame,
            path: vec![(selector.to_string(), index)],
        }
    }

    pub fn child(&self, selector: &str, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push((selector.to_string(), index));
        Self {
            frame: self.frame,
            path,
        }
    }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame {}", self.frame.0)?;
        for (selector, index) in &self.path {
            write!(f, " > {}[{}]", selector, index)?;
        }
        Ok(())
    }
}

/// Browser page operations used by extraction.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate the page and wait for the document to become interactive.
    async fn goto(&self, url: &str) -> Result<(), PageError>;

    /// Every document reachable from the page, main document first.
    async fn frames(&self) -> Result<Vec<FrameRef>, PageError>;

    /// All elements in `frame` matching `selector`, in document order.
    async fn query_all(&self, frame: FrameRef, selector: &str)
        -> Result<Vec<ElementRef>, PageError>;

    /// First descendant of `parent` matching `selector`.
    async fn query_within(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, PageError>;

    /// Rendered text of an element, `None` when it is detached.
    async fn text(&self, element: &ElementRef) -> Result<Option<String>, PageError>;

    async fn attribute(&self, element: &ElementRef, name: &str)
        -> Result<Option<String>, PageError>;

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<(), PageError>;

    /// Scroll a scrollable element down by `pixels`.
    async fn scroll_by(&self, element: &ElementRef, pixels: i64) -> Result<(), PageError>;

    async fn click(&self, element: &ElementRef) -> Result<(), PageError>;

    /// Focus an input, clear it and type `text`.
    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), PageError>;

    /// Press a named key (e.g. `"Enter"`) with `element` focused.
    async fn press_key(&self, element: &ElementRef, key: &str) -> Result<(), PageError>;

    /// Give the page time to render. Fakes may return immediately.
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// First element in `frame` matching `selector`.
    async fn query_first(
        &self,
        frame: FrameRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, PageError> {
        Ok(self.query_all(frame, selector).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_paths() {
        let card = ElementRef::root(FrameRef(1), ".card", 3);
        let title = card.child("h3 a", 0);
        assert_eq!(title.frame, FrameRef(1));
        assert_eq!(title.path.len(), 2);
        assert_eq!(title.to_string(), "frame 1 > .card[3] > h3 a[0]");
    }
}
