use crate::error::QueryError;

/// The state of a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    /// Nothing is cached yet and a fetch is running.
    Loading,
    /// Query succeeded with data.
    Success {
        /// The data returned by the query.
        data: T,
        /// Whether the data is stale and will be refetched on next observation.
        is_stale: bool,
    },
    /// The last fetch failed after exhausting its retries.
    Error(QueryError),
}

impl<T> QueryState<T> {
    /// Returns the data if the query succeeded, otherwise `None`.
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Returns the error if the query failed, otherwise `None`.
    pub const fn error(&self) -> Option<&QueryError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// A query result delivered to an observer.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    /// The current state of the query.
    pub state: QueryState<T>,
}

impl<T> QueryResult<T> {
    /// Returns the data if the query succeeded, otherwise `None`.
    pub const fn data(&self) -> Option<&T> {
        self.state.data()
    }

    /// Returns the error if the query failed, otherwise `None`.
    pub const fn error(&self) -> Option<&QueryError> {
        self.state.error()
    }

    /// Returns `true` if the query is currently loading.
    pub const fn is_loading(&self) -> bool {
        matches!(self.state, QueryState::Loading)
    }

    /// Returns `true` if the query succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.state, QueryState::Success { .. })
    }

    /// Returns `true` if the query failed.
    pub const fn is_error(&self) -> bool {
        matches!(self.state, QueryState::Error(_))
    }

    /// Returns `true` if the query data is stale.
    pub const fn is_stale(&self) -> bool {
        matches!(self.state, QueryState::Success { is_stale: true, .. })
    }
}

impl<T> From<QueryState<T>> for QueryResult<T> {
    fn from(state: QueryState<T>) -> Self {
        Self { state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_result_data() {
        let result = QueryResult::from(QueryState::Success {
            data: 42,
            is_stale: false,
        });
        assert_eq!(result.data(), Some(&42));

        let result: QueryResult<i32> = QueryState::Loading.into();
        assert_eq!(result.data(), None);

        let result: QueryResult<i32> =
            QueryState::Error(QueryError::FetchError("error".to_string())).into();
        assert_eq!(result.data(), None);
        assert_eq!(
            result.error(),
            Some(&QueryError::FetchError("error".to_string()))
        );
    }

    #[test]
    fn test_query_result_predicates() {
        let loading: QueryResult<i32> = QueryState::Loading.into();
        assert!(loading.is_loading());
        assert!(!loading.is_success());
        assert!(!loading.is_error());
        assert!(!loading.is_stale());

        let success = QueryResult::from(QueryState::Success {
            data: 42,
            is_stale: false,
        });
        assert!(!success.is_loading());
        assert!(success.is_success());
        assert!(!success.is_error());
        assert!(!success.is_stale());

        let stale = QueryResult::from(QueryState::Success {
            data: 42,
            is_stale: true,
        });
        assert!(stale.is_success());
        assert!(stale.is_stale());

        let error: QueryResult<i32> = QueryState::Error(QueryError::Unauthenticated).into();
        assert!(!error.is_loading());
        assert!(!error.is_success());
        assert!(error.is_error());
        assert!(!error.is_stale());
    }
}
