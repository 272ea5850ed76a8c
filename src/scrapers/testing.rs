//! In-memory page for exercising extraction without a browser.
//!
//! A [`FakePage`] holds one or more frames. A frame renders a window of
//! result cards that grows when scrolled; when a render window is set, cards
//! that scroll out of it are dropped and the remaining ones shift index, the
//! same way the real list recycles nodes. Selectors are matched exactly.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::listing::ExtractionConfig;
use super::page::{ElementRef, FrameRef, PageDriver, PageError};

#[derive(Debug, Clone)]
struct FakeNode {
    selector: String,
    text: String,
    attrs: HashMap<String, String>,
}

/// One result card.
#[derive(Debug, Clone, Default)]
pub struct FakeCard {
    attrs: HashMap<String, String>,
    nodes: Vec<FakeNode>,
}

impl FakeCard {
    /// A card carrying `data-job-id`.
    pub fn new(id: &str) -> Self {
        Self::default().with_attr("data-job-id", id)
    }

    /// A skeleton card with no id and no content.
    pub fn placeholder() -> Self {
        Self::default()
    }

    /// A fully rendered card using the default markup.
    pub fn listing(id: &str, title: &str, company: &str) -> Self {
        let href = format!("/jobs/view/{}/?refId=test", id);
        Self::new(id)
            .with_node(".job-card-list__title", title, &[])
            .with_node("a.job-card-list__title", title, &[("href", href.as_str())])
            .with_node(".job-card-container__company-name", company, &[])
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_node(mut self, selector: &str, text: &str, attrs: &[(&str, &str)]) -> Self {
        self.nodes.push(FakeNode {
            selector: selector.to_string(),
            text: text.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        self
    }
}

/// One document of the fake page.
#[derive(Debug, Clone)]
pub struct FakeFrame {
    item_selector: String,
    cards: Vec<FakeCard>,
    visible: usize,
    reveal_per_scroll: usize,
    window: Option<usize>,
    controls: Vec<String>,
}

impl FakeFrame {
    /// A frame rendering all of `cards` at once.
    pub fn new(item_selector: &str, cards: Vec<FakeCard>) -> Self {
        let visible = cards.len();
        Self {
            item_selector: item_selector.to_string(),
            cards,
            visible,
            reveal_per_scroll: 0,
            window: None,
            controls: Vec::new(),
        }
    }

    /// A frame holding only the default keyword and location inputs.
    pub fn search_form() -> Self {
        let config = ExtractionConfig::default();
        let mut frame = Self::new("", Vec::new());
        frame.controls.extend(config.title_inputs.into_iter().take(1));
        frame.controls.extend(config.location_inputs.into_iter().take(1));
        frame
    }

    /// Render `initial` cards, then `per_scroll` more on every scroll.
    pub fn lazy(mut self, initial: usize, per_scroll: usize) -> Self {
        self.visible = initial.min(self.cards.len());
        self.reveal_per_scroll = per_scroll;
        self
    }

    /// Keep at most `size` cards attached, dropping the oldest.
    pub fn recycling(mut self, size: usize) -> Self {
        self.window = Some(size);
        self
    }

    /// Add an element matched by exact selector (inputs, containers, buttons).
    pub fn with_control(mut self, selector: &str) -> Self {
        self.controls.push(selector.to_string());
        self
    }

    fn rendered_start(&self) -> usize {
        match self.window {
            Some(size) => self.visible.saturating_sub(size),
            None => 0,
        }
    }

    fn reveal(&mut self) {
        self.visible = (self.visible + self.reveal_per_scroll).min(self.cards.len());
    }
}

#[derive(Debug, Default)]
struct FakeState {
    frames: Vec<FakeFrame>,
    url: Option<String>,
    typed: Vec<(String, String)>,
    keys: Vec<String>,
    clicks: Vec<String>,
    scrolls: usize,
}

/// What an element path resolves to.
enum Target<'a> {
    Card(&'a FakeCard),
    Node(&'a FakeNode),
    Control,
}

/// Scriptable [`PageDriver`].
#[derive(Debug, Default)]
pub struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new(frames: Vec<FakeFrame>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                frames,
                ..Default::default()
            }),
        }
    }

    /// Search form and results in the main document.
    pub fn single_frame(item_selector: &str, cards: Vec<FakeCard>) -> Self {
        let mut frame = FakeFrame::search_form();
        frame.item_selector = item_selector.to_string();
        frame.visible = cards.len();
        frame.cards = cards;
        Self::new(vec![frame])
    }

    /// Search form and `results` in the main document.
    pub fn with_results(results: FakeFrame) -> Self {
        let mut frame = results;
        frame.controls.extend(FakeFrame::search_form().controls);
        Self::new(vec![frame])
    }

    pub fn url(&self) -> Option<String> {
        self.lock().url.clone()
    }

    pub fn scroll_count(&self) -> usize {
        self.lock().scrolls
    }

    /// `(selector, text)` pairs typed into inputs.
    pub fn typed(&self) -> Vec<(String, String)> {
        self.lock().typed.clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn resolve<'a>(state: &'a FakeState, element: &ElementRef) -> Result<Target<'a>, PageError> {
        let detached = || PageError::Detached(element.to_string());
        let frame = state.frames.get(element.frame.0).ok_or_else(detached)?;
        let (selector, index) = element.path.first().ok_or_else(detached)?;

        if frame.controls.iter().any(|c| c == selector) {
            return Ok(Target::Control);
        }
        if *selector != frame.item_selector {
            return Err(detached());
        }

        let position = frame.rendered_start() + index;
        if position >= frame.visible {
            return Err(detached());
        }
        let card = &frame.cards[position];

        match element.path.get(1) {
            None => Ok(Target::Card(card)),
            Some((node_selector, node_index)) => card
                .nodes
                .iter()
                .filter(|n| &n.selector == node_selector)
                .nth(*node_index)
                .map(Target::Node)
                .ok_or_else(detached),
        }
    }

    fn frame_of(element: &ElementRef) -> usize {
        element.frame.0
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> Result<(), PageError> {
        self.lock().url = Some(url.to_string());
        Ok(())
    }

    async fn frames(&self) -> Result<Vec<FrameRef>, PageError> {
        Ok((0..self.lock().frames.len()).map(FrameRef).collect())
    }

    async fn query_all(
        &self,
        frame: FrameRef,
        selector: &str,
    ) -> Result<Vec<ElementRef>, PageError> {
        let state = self.lock();
        let Some(doc) = state.frames.get(frame.0) else {
            return Ok(Vec::new());
        };
        if !doc.item_selector.is_empty() && selector == doc.item_selector {
            let rendered = doc.visible - doc.rendered_start();
            return Ok((0..rendered)
                .map(|i| ElementRef::root(frame, selector, i))
                .collect());
        }
        if doc.controls.iter().any(|c| c == selector) {
            return Ok(vec![ElementRef::root(frame, selector, 0)]);
        }
        Ok(Vec::new())
    }

    async fn query_within(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> Result<Option<ElementRef>, PageError> {
        let state = self.lock();
        match Self::resolve(&state, parent)? {
            Target::Card(card) if card.nodes.iter().any(|n| n.selector == selector) => {
                Ok(Some(parent.child(selector, 0)))
            }
            _ => Ok(None),
        }
    }

    async fn text(&self, element: &ElementRef) -> Result<Option<String>, PageError> {
        let state = self.lock();
        Ok(match Self::resolve(&state, element)? {
            Target::Card(card) => Some(
                card.nodes
                    .iter()
                    .map(|n| n.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Target::Node(node) => Some(node.text.clone()),
            Target::Control => Some(String::new()),
        })
    }

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        let state = self.lock();
        Ok(match Self::resolve(&state, element)? {
            Target::Card(card) => card.attrs.get(name).cloned(),
            Target::Node(node) => node.attrs.get(name).cloned(),
            Target::Control => None,
        })
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<(), PageError> {
        let mut state = self.lock();
        Self::resolve(&state, element)?;
        state.scrolls += 1;
        let frame = Self::frame_of(element);
        state.frames[frame].reveal();
        Ok(())
    }

    async fn scroll_by(&self, element: &ElementRef, _pixels: i64) -> Result<(), PageError> {
        let mut state = self.lock();
        Self::resolve(&state, element)?;
        state.scrolls += 1;
        let frame = Self::frame_of(element);
        state.frames[frame].reveal();
        Ok(())
    }

    async fn click(&self, element: &ElementRef) -> Result<(), PageError> {
        let mut state = self.lock();
        Self::resolve(&state, element)?;
        state.clicks.push(element.to_string());
        Ok(())
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), PageError> {
        let mut state = self.lock();
        Self::resolve(&state, element)?;
        let selector = element
            .path
            .first()
            .map(|(s, _)| s.clone())
            .unwrap_or_default();
        state.typed.push((selector, text.to_string()));
        Ok(())
    }

    async fn press_key(&self, element: &ElementRef, key: &str) -> Result<(), PageError> {
        let mut state = self.lock();
        Self::resolve(&state, element)?;
        state.keys.push(key.to_string());
        Ok(())
    }

    async fn pause(&self, _duration: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recycled_cards_shift_index() {
        let cards = (0..6).map(|i| FakeCard::new(&i.to_string())).collect();
        let frame = FakeFrame::new(".card", cards).lazy(3, 2).recycling(3);
        let page = FakePage::new(vec![frame]);

        let first = ElementRef::root(FrameRef::MAIN, ".card", 0);
        assert_eq!(
            page.attribute(&first, "data-job-id").await.unwrap().as_deref(),
            Some("0")
        );

        page.scroll_into_view(&first).await.unwrap();
        assert_eq!(
            page.attribute(&first, "data-job-id").await.unwrap().as_deref(),
            Some("2")
        );
        assert_eq!(page.query_all(FrameRef::MAIN, ".card").await.unwrap().len(), 3);

        let gone = ElementRef::root(FrameRef::MAIN, ".card", 5);
        assert!(matches!(
            page.text(&gone).await,
            Err(PageError::Detached(_))
        ));
    }
}
