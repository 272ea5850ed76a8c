//! Extraction configuration.
//!
//! Every selector the engine uses lives here so that markup changes on the
//! site can be handled from the config file.

use serde::{Deserialize, Serialize};

use super::locators::{
    default_company_link_locators, default_company_locators, default_link_locators,
    default_location_locators, default_posted_locators, default_title_locators, Locator,
};

/// Ordered locators per card field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldLocators {
    #[serde(default = "default_title_locators")]
    pub title: Vec<Locator>,
    #[serde(default = "default_link_locators")]
    pub link: Vec<Locator>,
    #[serde(default = "default_company_locators")]
    pub company: Vec<Locator>,
    #[serde(default = "default_company_link_locators")]
    pub company_link: Vec<Locator>,
    #[serde(default = "default_location_locators")]
    pub location: Vec<Locator>,
    #[serde(default = "default_posted_locators")]
    pub posted: Vec<Locator>,
}

impl Default for FieldLocators {
    fn default() -> Self {
        Self {
            title: default_title_locators(),
            link: default_link_locators(),
            company: default_company_locators(),
            company_link: default_company_link_locators(),
            location: default_location_locators(),
            posted: default_posted_locators(),
        }
    }
}

/// How the extraction engine finds, scrolls and reads the result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Page holding the search inputs.
    #[serde(default = "default_search_url")]
    pub search_url: String,
    /// Base for resolving relative links.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Keyword input candidates, in order.
    #[serde(default = "default_title_inputs")]
    pub title_inputs: Vec<String>,
    /// Location input candidates, in order.
    #[serde(default = "default_location_inputs")]
    pub location_inputs: Vec<String>,
    /// Result card selectors. The first one with matches in any frame is used.
    #[serde(default = "default_item_selectors")]
    pub item_selectors: Vec<String>,
    /// Scrollable list containers, used when a card cannot be scrolled into view.
    #[serde(default = "default_list_containers")]
    pub list_containers: Vec<String>,
    /// "Show more results" buttons, clicked when present.
    #[serde(default = "default_show_more")]
    pub show_more_buttons: Vec<String>,
    /// Card attributes holding a stable listing id, in order.
    #[serde(default = "default_id_attributes")]
    pub id_attributes: Vec<String>,
    /// Filter button selector; `{value}` is replaced by the filter value.
    #[serde(default = "default_filter_template")]
    pub filter_template: String,
    #[serde(default)]
    pub fields: FieldLocators,
    /// Container scroll increment in pixels.
    #[serde(default = "default_scroll_step")]
    pub scroll_step_px: i64,
    /// Consecutive scroll steps without a new listing before giving up.
    #[serde(default = "default_max_stalled")]
    pub max_stalled_steps: u32,
    /// Hard bound on scroll steps per run.
    #[serde(default = "default_max_scroll_steps")]
    pub max_scroll_steps: u32,
    /// How many times to look for results after submitting the search.
    #[serde(default = "default_result_poll_attempts")]
    pub result_poll_attempts: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Wait after each scroll for lazy content to render.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Wait after typing into a typeahead input.
    #[serde(default = "default_typing_delay_ms")]
    pub typing_delay_ms: u64,
}

fn default_search_url() -> String {
    "https://www.linkedin.com/jobs/".to_string()
}

fn default_base_url() -> String {
    "https://www.linkedin.com".to_string()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn default_title_inputs() -> Vec<String> {
    strings(&[
        "input[componentkey=\"jobSearchBox\"]",
        "input[placeholder*=\"Title, skill or Company\"]",
        "input[aria-label*=\"Search by title\"]",
        "input[data-testid=\"typeahead-input\"][placeholder*=\"Title\"]",
        "input[placeholder*=\"Title\"]",
    ])
}

fn default_location_inputs() -> Vec<String> {
    strings(&[
        "input[placeholder*=\"City, state, or zip code\"]",
        "input[aria-label*=\"City\"]",
        "input[data-testid=\"typeahead-input\"][placeholder*=\"City\"]",
        "input[placeholder*=\"City\"]",
        "input[placeholder*=\"Location\"]",
    ])
}

fn default_item_selectors() -> Vec<String> {
    strings(&[
        ".job-card-container",
        ".jobs-search-results__list-item",
        "li[data-occludable-job-id]",
        "[data-test-id=\"job-card\"]",
    ])
}

fn default_list_containers() -> Vec<String> {
    strings(&[
        ".jobs-search-results-list",
        ".jobs-search-results__list",
        ".scaffold-layout__list",
        "ul.scaffold-layout__list-container",
        "[data-test-id=\"job-list\"]",
    ])
}

fn default_show_more() -> Vec<String> {
    strings(&[
        "button.infinite-scroller__show-more-button",
        "button[aria-label*=\"See more jobs\"]",
    ])
}

fn default_id_attributes() -> Vec<String> {
    strings(&["data-job-id", "data-occludable-job-id", "data-entity-urn"])
}

fn default_filter_template() -> String {
    "button[aria-label*=\"{value}\"]".to_string()
}

fn default_scroll_step() -> i64 {
    500
}

fn default_max_stalled() -> u32 {
    3
}

fn default_max_scroll_steps() -> u32 {
    50
}

fn default_result_poll_attempts() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_typing_delay_ms() -> u64 {
    500
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            base_url: default_base_url(),
            title_inputs: default_title_inputs(),
            location_inputs: default_location_inputs(),
            item_selectors: default_item_selectors(),
            list_containers: default_list_containers(),
            show_more_buttons: default_show_more(),
            id_attributes: default_id_attributes(),
            filter_template: default_filter_template(),
            fields: FieldLocators::default(),
            scroll_step_px: default_scroll_step(),
            max_stalled_steps: default_max_stalled(),
            max_scroll_steps: default_max_scroll_steps(),
            result_poll_attempts: default_result_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_ms: default_settle_ms(),
            typing_delay_ms: default_typing_delay_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_override_from_toml() {
        let config: ExtractionConfig = toml::from_str(
            r#"
            max_stalled_steps = 5

            [[fields.title]]
            name = "new-title"
            selector = ".job-card-v2__title"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_stalled_steps, 5);
        assert_eq!(config.fields.title.len(), 1);
        assert_eq!(config.fields.title[0].name, "new-title");
        assert_eq!(config.fields.company, default_company_locators());
        assert_eq!(config.scroll_step_px, 500);
    }
}
