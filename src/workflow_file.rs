//! YAML workflow files
//!
//! ```yaml
//! name: Create supplier
//! label: Create-Supplier
//! steps:
//!   - name: Open login page
//!     evidence_label: login_page
//!     navigate:
//!       url: https://admin.example.test/login
//!   - name: Solve CAPTCHA
//!     pause:
//!       prompt: Enter the CAPTCHA, then press Enter
//!   - name: Click add
//!     interact:
//!       locator:
//!         primary: { css: "#add" }
//!       action: { kind: click }
//!       verification:
//!         primary: { element_present: { xpath: "/html/body/div[5]" } }
//!         fallbacks:
//!           - element_present: { class: el-message__content }
//! ```
//!
//! Placeholders are expanded in every string value once, at load time.
//! Budgets left out are filled from the config defaults, so the loaded
//! workflow carries all of them explicitly.

use crate::config::StepDefaults;
use crate::errors::{Result, UiflowError};
use crate::placeholders::Expander;
use action_flow::{RetryPolicy, StepSpec, Workflow};
use action_gate::{Condition, VerificationSpec};
use action_locator::Locator;
use action_primitives::{Action, Selector};
use rand::Rng;
use serde::Deserialize;
use serde_yaml::Value;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkflowFile {
    name: String,
    #[serde(default)]
    label: Option<String>,
    steps: Vec<StepEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StepEntry {
    name: String,
    #[serde(default)]
    evidence_label: Option<String>,
    #[serde(default)]
    post_action_wait_ms: Option<u64>,
    #[serde(default)]
    retry: Option<RetryPolicy>,
    #[serde(default)]
    navigate: Option<NavigateEntry>,
    #[serde(default)]
    interact: Option<InteractEntry>,
    #[serde(default)]
    verify: Option<VerificationEntry>,
    #[serde(default)]
    pause: Option<PauseEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NavigateEntry {
    url: String,
    #[serde(default)]
    verification: Option<VerificationEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InteractEntry {
    locator: LocatorEntry,
    action: Action,
    #[serde(default)]
    verification: Option<VerificationEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LocatorEntry {
    primary: Selector,
    #[serde(default)]
    fallbacks: Vec<Selector>,
    #[serde(default)]
    timeout_ms_primary: Option<u64>,
    #[serde(default)]
    timeout_ms_fallback: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VerificationEntry {
    primary: Condition,
    #[serde(default)]
    fallbacks: Vec<Condition>,
    #[serde(default)]
    timeout_ms_primary: Option<u64>,
    #[serde(default)]
    timeout_ms_fallback: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PauseEntry {
    prompt: String,
}

impl LocatorEntry {
    fn lower(self, defaults: &StepDefaults) -> Locator {
        let locator = Locator::new(
            self.primary,
            self.timeout_ms_primary.unwrap_or(defaults.timeout_ms_primary),
        )
        .with_fallback_timeout(self.timeout_ms_fallback.unwrap_or(defaults.timeout_ms_fallback));
        self.fallbacks
            .into_iter()
            .fold(locator, |locator, selector| locator.with_fallback(selector))
    }
}

impl VerificationEntry {
    fn lower(self, defaults: &StepDefaults) -> VerificationSpec {
        let spec = VerificationSpec::new(
            self.primary,
            self.timeout_ms_primary.unwrap_or(defaults.timeout_ms_primary),
        )
        .with_fallback_timeout(self.timeout_ms_fallback.unwrap_or(defaults.timeout_ms_fallback));
        self.fallbacks
            .into_iter()
            .fold(spec, |spec, condition| spec.with_fallback(condition))
    }
}

impl StepEntry {
    fn lower(self, defaults: &StepDefaults) -> std::result::Result<StepSpec, String> {
        let declared = [
            self.navigate.is_some(),
            self.interact.is_some(),
            self.verify.is_some(),
            self.pause.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if declared != 1 {
            return Err(format!(
                "expected exactly one of navigate, interact, verify or pause, found {}",
                declared
            ));
        }

        let name = self.name;
        let mut post_wait = self.post_action_wait_ms.unwrap_or(defaults.post_action_wait_ms);
        let mut step = if let Some(nav) = self.navigate {
            let step = StepSpec::navigate(name, nav.url);
            match nav.verification {
                Some(verification) => step.with_verification(verification.lower(defaults)),
                None => step,
            }
        } else if let Some(interact) = self.interact {
            let step = StepSpec::interact(name, interact.locator.lower(defaults), interact.action);
            match interact.verification {
                Some(verification) => step.with_verification(verification.lower(defaults)),
                None => step,
            }
        } else if let Some(verification) = self.verify {
            post_wait = self.post_action_wait_ms.unwrap_or(0);
            StepSpec::verify(name, verification.lower(defaults))
        } else if let Some(pause) = self.pause {
            post_wait = 0;
            StepSpec::pause(name, pause.prompt)
        } else {
            return Err("step kind missing".to_string());
        };

        step = step.with_post_action_wait(post_wait);
        if let Some(label) = self.evidence_label {
            step = step.with_evidence_label(label);
        }
        if let Some(retry) = self.retry {
            step = step.with_retry(retry);
        }
        Ok(step)
    }
}

fn expand_strings<R: Rng>(value: &mut Value, expander: &mut Expander<R>) -> Result<()> {
    match value {
        Value::String(text) => {
            *text = expander.expand(text)?;
        }
        Value::Sequence(items) => {
            for item in items {
                expand_strings(item, expander)?;
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                expand_strings(item, expander)?;
            }
        }
        Value::Tagged(tagged) => expand_strings(&mut tagged.value, expander)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

/// Parse, expand and validate a workflow document.
///
/// `source` only names the document in error messages.
pub fn parse_workflow<R: Rng>(
    text: &str,
    source: &Path,
    defaults: &StepDefaults,
    expander: &mut Expander<R>,
) -> Result<Workflow> {
    let mut document: Value = serde_yaml::from_str(text)
        .map_err(|err| UiflowError::workflow(source, err.to_string()))?;
    expand_strings(&mut document, expander)?;
    let file: WorkflowFile = serde_yaml::from_value(document)
        .map_err(|err| UiflowError::workflow(source, err.to_string()))?;

    let label = file.label.unwrap_or_else(|| file.name.clone());
    let mut workflow = Workflow::new(file.name, label);
    for (index, entry) in file.steps.into_iter().enumerate() {
        let step_name = entry.name.clone();
        let step = entry.lower(defaults).map_err(|reason| {
            UiflowError::workflow(
                source,
                format!("step {} ('{}'): {}", index + 1, step_name, reason),
            )
        })?;
        workflow = workflow.with_step(step);
    }

    workflow
        .validate()
        .map_err(|err| UiflowError::workflow(source, err.to_string()))?;
    debug!(
        workflow = %workflow.name,
        steps = workflow.steps.len(),
        "Workflow file parsed"
    );
    Ok(workflow)
}

/// Read a workflow file from disk.
pub async fn load_workflow(path: &Path, defaults: &StepDefaults) -> Result<Workflow> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| UiflowError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_workflow(&text, path, defaults, &mut Expander::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_flow::StepKind;
    use action_gate::MatchedCondition;
    use chrono::{Local, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    const ADD_SUPPLIER: &str = r##"
name: Create supplier
label: Create-Supplier
steps:
  - name: Open login page
    evidence_label: login_page
    navigate:
      url: https://admin.example.test/login
  - name: Solve CAPTCHA
    pause:
      prompt: Enter the CAPTCHA, then press Enter
  - name: Type supplier name
    evidence_label: supplier_name
    interact:
      locator:
        primary: { xpath: "//input[@placeholder='Name']" }
        timeout_ms_primary: 5000
      action: { kind: type, text: "MY-S-${timestamp}" }
  - name: Save
    post_action_wait_ms: 500
    retry: { policy: retry, max_attempts: 2, backoff_ms: 250 }
    interact:
      locator:
        primary: { css: "#save" }
        fallbacks:
          - { class: btn-save }
      action: { kind: click }
      verification:
        primary: { element_present: { xpath: "/html/body/div[5]" } }
        fallbacks:
          - element_present: { class: el-message__content }
        timeout_ms_primary: 1000
  - name: Back on list
    verify:
      primary: { url_contains: "/suppliers" }
"##;

    fn parse(text: &str) -> Result<Workflow> {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let mut expander = Expander::with_parts(now, StdRng::seed_from_u64(1));
        parse_workflow(
            text,
            Path::new("add_supplier.yaml"),
            &StepDefaults::default(),
            &mut expander,
        )
    }

    #[test]
    fn lowers_every_step_kind() {
        let workflow = parse(ADD_SUPPLIER).unwrap();
        assert_eq!(workflow.label, "Create-Supplier");
        let kinds: Vec<&str> = workflow.steps.iter().map(|s| s.kind.name()).collect();
        assert_eq!(kinds, vec!["navigate", "pause", "interact", "interact", "verify"]);

        let captcha = &workflow.steps[1];
        assert_eq!(captcha.evidence_label, "Solve CAPTCHA");
        assert_eq!(captcha.post_action_wait_ms, 0);

        match &workflow.steps[2].kind {
            StepKind::Interact { locator, action, .. } => {
                assert_eq!(locator.timeout_ms_primary, 5000);
                assert_eq!(
                    action,
                    &Action::Type {
                        text: "MY-S-20240309_140507".to_string()
                    }
                );
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn omitted_budgets_come_from_defaults() {
        let workflow = parse(ADD_SUPPLIER).unwrap();
        let save = &workflow.steps[3];
        assert_eq!(save.post_action_wait_ms, 500);
        assert_eq!(
            save.retry,
            RetryPolicy::Retry {
                max_attempts: 2,
                backoff_ms: 250
            }
        );
        let spec = save.kind.verification().unwrap();
        assert_eq!(spec.primary_budget(), Duration::from_millis(1000));
        assert_eq!(spec.fallback_budget(), Duration::from_millis(1000));
        assert_eq!(
            spec.candidates().map(|(which, _)| which).collect::<Vec<_>>(),
            vec![MatchedCondition::Primary, MatchedCondition::Fallback(0)]
        );

        let back = &workflow.steps[4];
        assert_eq!(back.post_action_wait_ms, 0);
        assert_eq!(
            back.kind.verification().unwrap().primary_budget(),
            Duration::from_millis(10_000)
        );
        assert_eq!(workflow.steps[0].post_action_wait_ms, 1000);
    }

    #[test]
    fn step_with_two_kinds_is_rejected() {
        let err = parse(
            r#"
name: Broken
steps:
  - name: Both
    navigate: { url: "https://example.test" }
    pause: { prompt: wait }
"#,
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("step 1 ('Both')"), "{err}");
        assert!(err.contains("exactly one"), "{err}");
    }

    #[test]
    fn unknown_fields_and_bad_key_presses_are_rejected() {
        assert!(parse("name: X\nsteps:\n  - name: A\n    navigte: { url: x }\n").is_err());
        let err = parse(
            r##"
name: Zero presses
steps:
  - name: Pick option
    interact:
      locator: { primary: { css: "#q" } }
      action: { kind: press_key, key: ArrowDown, repeat: 0 }
"##,
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("step 1 ('Pick option')"), "{err}");
    }

    #[test]
    fn empty_text_is_a_valid_type_payload() {
        let workflow = parse(
            r##"
name: Empty text
steps:
  - name: Type
    interact:
      locator: { primary: { css: "#q" } }
      action: { kind: type, text: "" }
"##,
        )
        .unwrap();
        match &workflow.steps[0].kind {
            StepKind::Interact { action, .. } => assert_eq!(
                action,
                &Action::Type {
                    text: String::new()
                }
            ),
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
