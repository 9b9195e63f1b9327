//! Condition types for post-action verification

use crate::errors::GateError;
use action_primitives::{BrowserDriver, DriverError, Selector};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Predicate over page state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// An element matching the selector exists
    ElementPresent(Selector),

    /// No element matches the selector
    ElementAbsent(Selector),

    /// Current URL contains substring
    UrlContains(String),

    /// Current URL equals string
    UrlEquals(String),

    /// Current URL matches regex pattern
    UrlMatches(String),

    /// Document title contains substring
    TitleContains(String),
}

impl Condition {
    /// Compile the condition into a probe, rejecting invalid patterns early.
    pub fn prepare(&self) -> Result<ConditionProbe, GateError> {
        match self {
            Condition::ElementPresent(selector) | Condition::ElementAbsent(selector)
                if selector.is_empty() =>
            {
                Err(GateError::InvalidSpec(format!("empty selector in {}", self)))
            }
            Condition::UrlMatches(pattern) => {
                let regex = Regex::new(pattern).map_err(|err| {
                    GateError::InvalidSpec(format!("invalid URL pattern '{}': {}", pattern, err))
                })?;
                Ok(ConditionProbe {
                    condition: self.clone(),
                    regex: Some(regex),
                })
            }
            _ => Ok(ConditionProbe {
                condition: self.clone(),
                regex: None,
            }),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::ElementPresent(selector) => write!(f, "element present {}", selector),
            Condition::ElementAbsent(selector) => write!(f, "element absent {}", selector),
            Condition::UrlContains(value) => write!(f, "url contains '{}'", value),
            Condition::UrlEquals(value) => write!(f, "url equals '{}'", value),
            Condition::UrlMatches(value) => write!(f, "url matches /{}/", value),
            Condition::TitleContains(value) => write!(f, "title contains '{}'", value),
        }
    }
}

/// Prepared condition, evaluated once per poll
#[derive(Debug, Clone)]
pub struct ConditionProbe {
    condition: Condition,
    regex: Option<Regex>,
}

impl ConditionProbe {
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Evaluate against the current page once, without waiting.
    pub async fn check(&self, driver: &dyn BrowserDriver) -> Result<bool, DriverError> {
        match &self.condition {
            Condition::ElementPresent(selector) => {
                Ok(driver.find_element(selector).await?.is_some())
            }
            Condition::ElementAbsent(selector) => {
                Ok(driver.find_element(selector).await?.is_none())
            }
            Condition::UrlContains(value) => Ok(driver.current_url().await?.contains(value.as_str())),
            Condition::UrlEquals(value) => Ok(driver.current_url().await? == *value),
            Condition::UrlMatches(_) => {
                let url = driver.current_url().await?;
                Ok(self.regex.as_ref().map(|r| r.is_match(&url)).unwrap_or(false))
            }
            Condition::TitleContains(value) => Ok(driver.title().await?.contains(value.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::testing::ScriptedDriver;
    use std::time::Duration;

    #[test]
    fn invalid_regex_is_rejected() {
        let err = Condition::UrlMatches("app-(manager".to_string())
            .prepare()
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidSpec(_)));
        assert!(Condition::ElementPresent(Selector::css("")).prepare().is_err());
    }

    #[test]
    fn deserializes_from_snake_case() {
        let condition: Condition =
            serde_json::from_str(r#"{"element_present":{"class":"el-message__content"}}"#).unwrap();
        assert_eq!(
            condition,
            Condition::ElementPresent(Selector::class_name("el-message__content"))
        );
        let condition: Condition = serde_json::from_str(r#"{"url_contains":"/app-manager"}"#).unwrap();
        assert_eq!(condition.to_string(), "url contains '/app-manager'");
    }

    #[tokio::test(start_paused = true)]
    async fn url_conditions_follow_the_page() {
        let driver = ScriptedDriver::new()
            .with_url_after("https://admin.example.test/app-manager/home", Duration::ZERO);

        let contains = Condition::UrlContains("app-manager".to_string()).prepare().unwrap();
        let matches = Condition::UrlMatches(r"/app-manager/\w+$".to_string())
            .prepare()
            .unwrap();
        let equals = Condition::UrlEquals("https://admin.example.test/login".to_string())
            .prepare()
            .unwrap();

        assert!(contains.check(&driver).await.unwrap());
        assert!(matches.check(&driver).await.unwrap());
        assert!(!equals.check(&driver).await.unwrap());
    }

    #[tokio::test]
    async fn element_conditions_use_lookup() {
        let driver = ScriptedDriver::new()
            .with_element(Selector::xpath("/html/body/div[5]"))
            .with_title("Supplier management");
        let present = Condition::ElementPresent(Selector::xpath("/html/body/div[5]"))
            .prepare()
            .unwrap();
        let absent = Condition::ElementAbsent(Selector::css(".el-loading-mask"))
            .prepare()
            .unwrap();
        let title = Condition::TitleContains("Supplier".to_string()).prepare().unwrap();

        assert!(present.check(&driver).await.unwrap());
        assert!(absent.check(&driver).await.unwrap());
        assert!(title.check(&driver).await.unwrap());
    }
}
