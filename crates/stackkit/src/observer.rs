//! Fetch the current state of a stack

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::retry::BackoffRetrier;
use crate::types::ObservedState;
use serde_json::Value;

/// Reads remote stack state through the retrier.
pub struct StackObserver<'a, P: Provider + ?Sized> {
    provider: &'a P,
    retrier: &'a BackoffRetrier,
}

impl<'a, P: Provider + ?Sized> StackObserver<'a, P> {
    pub fn new(provider: &'a P, retrier: &'a BackoffRetrier) -> Self {
        Self { provider, retrier }
    }

    /// Observe a stack by name.
    ///
    /// A missing stack is a normal observation, not an error. The describe
    /// record and the template come from two calls and are only as
    /// consistent as the provider makes them.
    pub fn observe(&self, name: &str) -> Result<ObservedState> {
        let description = match self.retrier.invoke(|| self.provider.describe_stack(name)) {
            Ok(description) => description,
            Err(e) if e.is_not_found() => {
                log::debug!("Stack {name} does not exist");
                return Ok(ObservedState::absent());
            }
            Err(Error::Provider(source)) => {
                return Err(Error::Observe {
                    name: name.to_string(),
                    source,
                });
            }
            Err(e) => return Err(e),
        };

        let body = match self.retrier.invoke(|| self.provider.get_template(name)) {
            Ok(body) => body,
            Err(Error::Provider(source)) => {
                return Err(Error::Observe {
                    name: name.to_string(),
                    source,
                });
            }
            Err(e) => return Err(e),
        };
        let template: Value = serde_json::from_str(&body)?;

        log::debug!(
            "Observed stack {} in status {}",
            description.name,
            description.status
        );

        Ok(ObservedState {
            exists: true,
            stack_id: Some(description.stack_id),
            template: Some(template),
            parameters: description.parameters,
            outputs: description.outputs,
            status: Some(description.status),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCategory, ProviderError};
    use crate::testing::{RecordingSleeper, ScriptedProvider, stack};
    use crate::types::RetryConfig;
    use serde_json::json;
    use std::sync::Arc;

    fn retrier() -> BackoffRetrier {
        BackoffRetrier::new(RetryConfig::default(), Arc::new(RecordingSleeper::default()))
    }

    #[test]
    fn test_missing_stack_is_absent() {
        let provider = ScriptedProvider::new();
        let retrier = retrier();

        let observed = StackObserver::new(&provider, &retrier)
            .observe("web")
            .unwrap();
        assert!(!observed.exists);
        assert_eq!(observed, ObservedState::absent());
        assert_eq!(provider.count("template"), 0);
    }

    #[test]
    fn test_existing_stack() {
        let mut description = stack("web", "CREATE_COMPLETE");
        description.parameters.insert("KeyName".into(), "ops".into());
        description.outputs.insert("Url".into(), "http://web".into());

        let provider = ScriptedProvider::new()
            .on_describe(vec![Ok(description)])
            .on_template(vec![Ok(r#"{"Resources": {"A": 1}}"#.into())]);
        let retrier = retrier();

        let observed = StackObserver::new(&provider, &retrier)
            .observe("web")
            .unwrap();
        assert!(observed.exists);
        assert_eq!(observed.template, Some(json!({"Resources": {"A": 1}})));
        assert_eq!(observed.parameters.get("KeyName").unwrap(), "ops");
        assert_eq!(observed.outputs.get("Url").unwrap(), "http://web");
        assert_eq!(observed.status.as_deref(), Some("CREATE_COMPLETE"));
        assert_eq!(observed.stack_id.as_deref(), Some("arn:stack/web/1"));
    }

    #[test]
    fn test_other_errors_are_fatal() {
        let provider = ScriptedProvider::new().on_describe(vec![Err(ProviderError::new(
            "AccessDenied",
            "User is not authorized",
        ))]);
        let retrier = retrier();

        let err = StackObserver::new(&provider, &retrier)
            .observe("web")
            .unwrap_err();
        assert!(matches!(err, Error::Observe { ref name, .. } if name == "web"));
        assert_eq!(err.category(), ErrorCategory::Other);
    }

    #[test]
    fn test_throttled_describe_is_retried() {
        let provider = ScriptedProvider::new().on_describe(vec![
            Err(ProviderError::throttled()),
            Err(ProviderError::stack_missing("web")),
        ]);
        let retrier = retrier();

        let observed = StackObserver::new(&provider, &retrier)
            .observe("web")
            .unwrap();
        assert!(!observed.exists);
        assert_eq!(provider.count("describe"), 2);
    }

    #[test]
    fn test_invalid_template_body() {
        let provider = ScriptedProvider::new()
            .on_describe(vec![Ok(stack("web", "CREATE_COMPLETE"))])
            .on_template(vec![Ok("Resources: {}".into())]);
        let retrier = retrier();

        let err = StackObserver::new(&provider, &retrier)
            .observe("web")
            .unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }
}
