//! Named field locators.
//!
//! Each field of a result card has an ordered list of locators. The first
//! locator whose value passes the field's plausibility rule wins, so markup
//! changes on the site degrade one strategy at a time instead of breaking
//! the whole card.

use serde::{Deserialize, Serialize};

use crate::scrapers::page::{ElementRef, PageDriver, PageError};

/// A field read from a result card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    /// Link to the listing itself (read from `href`).
    Link,
    Company,
    /// Link to the company's profile page.
    CompanyLink,
    Location,
    Posted,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Link => "link",
            Self::Company => "company",
            Self::CompanyLink => "company_link",
            Self::Location => "location",
            Self::Posted => "posted",
        }
    }

    /// Whether `value` is believable for this field.
    pub fn is_plausible(&self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        match self {
            Self::Title | Self::Company => value.chars().count() <= 300,
            Self::Link | Self::CompanyLink => {
                !value.starts_with('#') && !value.starts_with("javascript:")
            }
            // Posting-age text ("3 days ago") sits in the same metadata list
            Self::Location => {
                let lower = value.to_lowercase();
                !lower.contains("ago") && !lower.contains("day")
            }
            Self::Posted => true,
        }
    }
}

/// One named way of finding a field inside a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub name: String,
    pub selector: String,
    /// Read this attribute instead of the element text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Locator {
    pub fn text(name: &str, selector: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            attribute: None,
        }
    }

    pub fn attr(name: &str, selector: &str, attribute: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            attribute: Some(attribute.to_string()),
        }
    }

    /// Read this locator's raw value inside `item`.
    pub async fn read<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        item: &ElementRef,
    ) -> Result<Option<String>, PageError> {
        let Some(element) = page.query_within(item, &self.selector).await? else {
            return Ok(None);
        };
        match self.attribute {
            Some(ref name) => page.attribute(&element, name).await,
            None => page.text(&element).await,
        }
    }
}

/// The winning locator and its cleaned value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    pub locator: String,
    pub value: String,
}

/// Ordered locators for one field.
#[derive(Debug, Clone)]
pub struct FieldStrategy {
    pub field: Field,
    pub locators: Vec<Locator>,
}

impl FieldStrategy {
    pub fn new(field: Field, locators: Vec<Locator>) -> Self {
        Self { field, locators }
    }

    /// Try each locator in order and return the first plausible value.
    pub async fn extract<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        item: &ElementRef,
    ) -> Result<Option<FieldMatch>, PageError> {
        for locator in &self.locators {
            let Some(raw) = locator.read(page, item).await? else {
                continue;
            };
            let value = clean_text(&raw);
            if self.field.is_plausible(&value) {
                return Ok(Some(FieldMatch {
                    locator: locator.name.clone(),
                    value,
                }));
            }
        }
        Ok(None)
    }
}

/// First non-empty line with whitespace collapsed.
///
/// Card titles are often rendered twice (visible and screen-reader text),
/// which shows up as repeated lines in `innerText`.
pub fn clean_text(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|line| !line.is_empty())
        .unwrap_or_default()
}

pub fn default_title_locators() -> Vec<Locator> {
    vec![
        Locator::text("card-list-title", ".job-card-list__title"),
        Locator::text("control-title", "a[data-control-name=\"job_card_title\"]"),
        Locator::text("container-link", ".job-card-container__link"),
        Locator::text("heading-link", "h3 a"),
        Locator::text("generic-title", ".job-title"),
    ]
}

pub fn default_link_locators() -> Vec<Locator> {
    vec![
        Locator::attr("card-list-title", "a.job-card-list__title", "href"),
        Locator::attr("container-link", "a.job-card-container__link", "href"),
        Locator::attr(
            "control-title",
            "a[data-control-name=\"job_card_title\"]",
            "href",
        ),
        Locator::attr("heading-link", "h3 a", "href"),
        Locator::attr("view-link", "a[href*=\"/jobs/view/\"]", "href"),
    ]
}

pub fn default_company_locators() -> Vec<Locator> {
    vec![
        Locator::text("company-name", ".job-card-container__company-name"),
        Locator::text("subtitle", ".artdeco-entity-lockup__subtitle"),
        Locator::text(
            "primary-description",
            ".job-card-container__primary-description",
        ),
        Locator::text("test-id", "[data-test-id=\"job-card-company-name\"]"),
        Locator::text("generic-company", ".job-card-company-name"),
    ]
}

pub fn default_company_link_locators() -> Vec<Locator> {
    vec![
        Locator::attr(
            "company-name-link",
            "a.job-card-container__company-name",
            "href",
        ),
        Locator::attr("company-path", "a[href*=\"/company/\"]", "href"),
    ]
}

pub fn default_location_locators() -> Vec<Locator> {
    vec![
        Locator::text("metadata-item", ".job-card-container__metadata-item"),
        Locator::text("metadata-list", ".job-card-container__metadata-wrapper li"),
        Locator::text("caption", ".artdeco-entity-lockup__caption"),
        Locator::text("test-id", "[data-test-id=\"job-card-location\"]"),
        Locator::text("generic-location", ".job-card-location"),
    ]
}

pub fn default_posted_locators() -> Vec<Locator> {
    vec![
        Locator::attr("time-datetime", "time", "datetime"),
        Locator::text("listed-time", ".job-card-container__listed-time"),
        Locator::text("time-text", "time"),
        Locator::text("test-id", "[data-test-id=\"job-card-posted-date\"]"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::page::FrameRef;
    use crate::scrapers::testing::{FakeCard, FakePage};

    fn first_card() -> ElementRef {
        ElementRef::root(FrameRef::MAIN, ".job-card-container", 0)
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(
            clean_text("\n  Senior   Engineer \nSenior Engineer with verification"),
            "Senior Engineer"
        );
        assert_eq!(clean_text("   \n  "), "");
    }

    #[test]
    fn test_location_rejects_posting_age() {
        assert!(Field::Location.is_plausible("Berlin, Germany (Remote)"));
        assert!(!Field::Location.is_plausible("3 days ago"));
        assert!(!Field::Location.is_plausible("Posted today"));
        assert!(!Field::Title.is_plausible("   "));
        assert!(!Field::Link.is_plausible("javascript:void(0)"));
    }

    #[tokio::test]
    async fn test_each_title_locator_matches_its_markup() {
        for locator in default_title_locators() {
            let card = FakeCard::new("1").with_node(&locator.selector, "Rust Engineer", &[]);
            let page = FakePage::single_frame(".job-card-container", vec![card]);
            let value = locator.read(&page, &first_card()).await.unwrap();
            assert_eq!(value.as_deref(), Some("Rust Engineer"), "{}", locator.name);
        }
    }

    #[tokio::test]
    async fn test_each_company_locator_matches_its_markup() {
        for locator in default_company_locators() {
            let card = FakeCard::new("1").with_node(&locator.selector, "Acme", &[]);
            let page = FakePage::single_frame(".job-card-container", vec![card]);
            let value = locator.read(&page, &first_card()).await.unwrap();
            assert_eq!(value.as_deref(), Some("Acme"), "{}", locator.name);
        }
    }

    #[tokio::test]
    async fn test_attribute_locator_reads_attribute() {
        let card = FakeCard::new("1").with_node("time", "2 days ago", &[("datetime", "2024-05-01")]);
        let page = FakePage::single_frame(".job-card-container", vec![card]);
        let strategy = FieldStrategy::new(Field::Posted, default_posted_locators());
        let found = strategy
            .extract(&page, &first_card())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.locator, "time-datetime");
        assert_eq!(found.value, "2024-05-01");
    }

    #[tokio::test]
    async fn test_strategy_falls_through_implausible_values() {
        let card = FakeCard::new("1")
            .with_node(".job-card-container__metadata-item", "1 day ago", &[])
            .with_node("[data-test-id=\"job-card-location\"]", "Lisbon", &[]);
        let page = FakePage::single_frame(".job-card-container", vec![card]);
        let strategy = FieldStrategy::new(Field::Location, default_location_locators());

        let found = strategy
            .extract(&page, &first_card())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.locator, "test-id");
        assert_eq!(found.value, "Lisbon");
    }

    #[tokio::test]
    async fn test_strategy_without_match() {
        let card = FakeCard::new("1");
        let page = FakePage::single_frame(".job-card-container", vec![card]);
        let strategy = FieldStrategy::new(Field::Company, default_company_locators());
        assert!(strategy
            .extract(&page, &first_card())
            .await
            .unwrap()
            .is_none());
    }
}
