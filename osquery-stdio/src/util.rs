use thrift::{ApplicationError, ApplicationErrorKind};

pub trait OptionToThriftResult<T> {
    /// Treat `None` as a reply that lacked its result field.
    fn ok_or_missing_result<F>(self, err_fn: F) -> thrift::Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> OptionToThriftResult<T> for Option<T> {
    fn ok_or_missing_result<F>(self, err_fn: F) -> thrift::Result<T>
    where
        F: FnOnce() -> String,
    {
        self.ok_or_else(|| {
            thrift::Error::Application(ApplicationError::new(
                ApplicationErrorKind::MissingResult,
                err_fn(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_or_missing_result_with_some() {
        let value: Option<i32> = Some(42);
        let result = value.ok_or_missing_result(|| "should not be called".to_string());
        assert_eq!(result.ok(), Some(42));
    }

    #[test]
    fn test_ok_or_missing_result_with_none() {
        let value: Option<i32> = None;
        let result = value.ok_or_missing_result(|| "no result received for query".to_string());

        assert!(
            matches!(
                &result,
                Err(thrift::Error::Application(app_err))
                    if app_err.kind == ApplicationErrorKind::MissingResult
                    && app_err.message == "no result received for query"
            ),
            "Expected Application error with MissingResult kind"
        );
    }

    #[test]
    fn test_ok_or_missing_result_closure_not_evaluated() {
        let mut called = false;
        let value: Option<i32> = Some(42);

        let result = value.ok_or_missing_result(|| {
            called = true;
            String::new()
        });

        assert!(!called, "Error function should not be called for Some");
        assert!(result.is_ok());
    }
}
