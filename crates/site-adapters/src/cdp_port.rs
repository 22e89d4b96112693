use std::sync::Arc;

use async_trait::async_trait;
use cdp_adapter::{AdapterError, AdapterErrorKind, Cdp, KeyPress, PageId};
use serde_json::Value;

use crate::ports::{DomPort, SubmitState};
use crate::scripts;

/// [`DomPort`] backed by `Runtime.evaluate` and CDP input events.
pub struct CdpDomPort {
    cdp: Arc<dyn Cdp>,
}

impl CdpDomPort {
    pub fn new(cdp: Arc<dyn Cdp>) -> Self {
        Self { cdp }
    }

    async fn eval(&self, page: PageId, script: String) -> Result<Value, AdapterError> {
        self.cdp.evaluate_script(page, &script).await
    }
}

fn unexpected(op: &str, value: Value) -> AdapterError {
    AdapterError::new(AdapterErrorKind::Internal)
        .with_hint(format!("{op} returned an unexpected value"))
        .with_data(value)
}

fn parse_submit_state(value: Value) -> Result<SubmitState, AdapterError> {
    let state = value.get("state").and_then(Value::as_str);
    let selector = value
        .get("selector")
        .and_then(Value::as_str)
        .map(str::to_string);
    match (state, selector) {
        (Some("missing"), _) => Ok(SubmitState::Missing),
        (Some("enabled"), Some(sel)) => Ok(SubmitState::Enabled(sel)),
        (Some("disabled"), Some(sel)) => Ok(SubmitState::Disabled(sel)),
        _ => Err(unexpected("submit_state", value)),
    }
}

#[async_trait]
impl DomPort for CdpDomPort {
    async fn probe(
        &self,
        page: PageId,
        selectors: &[String],
    ) -> Result<Option<String>, AdapterError> {
        match self.eval(page, scripts::probe(selectors)).await? {
            Value::Null => Ok(None),
            Value::String(sel) => Ok(Some(sel)),
            other => Err(unexpected("probe", other)),
        }
    }

    async fn set_value(&self, page: PageId, selector: &str, text: &str) -> Result<(), AdapterError> {
        self.eval(page, scripts::set_value(selector, text)).await?;
        Ok(())
    }

    async fn clear_editor(&self, page: PageId, selector: &str) -> Result<(), AdapterError> {
        self.eval(page, scripts::clear_editor(selector)).await?;
        Ok(())
    }

    async fn exec_insert(
        &self,
        page: PageId,
        selector: &str,
        text: &str,
    ) -> Result<bool, AdapterError> {
        let value = self.eval(page, scripts::exec_insert(selector, text)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn paste(&self, page: PageId, selector: &str, text: &str) -> Result<(), AdapterError> {
        self.eval(page, scripts::paste(selector, text)).await?;
        Ok(())
    }

    async fn native_insert(&self, page: PageId, text: &str) -> Result<(), AdapterError> {
        self.cdp.insert_text(page, text).await
    }

    async fn read_text(&self, page: PageId, selector: &str) -> Result<String, AdapterError> {
        match self.eval(page, scripts::read_text(selector)).await? {
            Value::String(text) => Ok(text),
            Value::Null => Ok(String::new()),
            other => Err(unexpected("read_text", other)),
        }
    }

    async fn submit_state(
        &self,
        page: PageId,
        selectors: &[String],
    ) -> Result<SubmitState, AdapterError> {
        let value = self.eval(page, scripts::submit_state(selectors)).await?;
        parse_submit_state(value)
    }

    async fn click(&self, page: PageId, selector: &str) -> Result<bool, AdapterError> {
        let value = self.eval(page, scripts::click(selector)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn press_enter(&self, page: PageId, selector: &str) -> Result<(), AdapterError> {
        // Key events go to whatever has focus, so a missed focus is not fatal here.
        self.focus(page, selector).await?;
        self.cdp.dispatch_key(page, &KeyPress::enter()).await
    }

    async fn focus(&self, page: PageId, selector: &str) -> Result<bool, AdapterError> {
        let value = self.eval(page, scripts::focus(selector)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn submit_state_parses_all_shapes() {
        assert_eq!(
            parse_submit_state(json!({"state": "missing"})).unwrap(),
            SubmitState::Missing
        );
        assert_eq!(
            parse_submit_state(json!({"state": "enabled", "selector": "#send"})).unwrap(),
            SubmitState::Enabled("#send".into())
        );
        assert_eq!(
            parse_submit_state(json!({"state": "disabled", "selector": "#send"})).unwrap(),
            SubmitState::Disabled("#send".into())
        );
        let err = parse_submit_state(json!(true)).unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Internal);
    }
}
