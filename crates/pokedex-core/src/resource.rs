/// Result wrapper handed to the presentation layer.
///
/// `Loading` may already carry cached data so the caller can show something
/// while the network request is in flight; `Error` carries whatever data we
/// still have so a failed refresh doesn't blank the screen.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource<T> {
    Loading(Option<T>),
    Success(T),
    Error { message: String, data: Option<T> },
}

impl<T> Resource<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Resource::Error {
            message: message.into(),
            data: None,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Resource::Loading(data) => data.as_ref(),
            Resource::Success(data) => Some(data),
            Resource::Error { data, .. } => data.as_ref(),
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Resource::Loading(data) => data,
            Resource::Success(data) => Some(data),
            Resource::Error { data, .. } => data,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Resource::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Resource::Success(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Resource::Loading(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Resource<U> {
        match self {
            Resource::Loading(data) => Resource::Loading(data.map(f)),
            Resource::Success(data) => Resource::Success(f(data)),
            Resource::Error { message, data } => Resource::Error {
                message,
                data: data.map(f),
            },
        }
    }
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Resource::Loading(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_keeps_stale_data() {
        let resource = Resource::Error {
            message: "Network error: timed out".to_string(),
            data: Some(7),
        };
        assert_eq!(resource.data(), Some(&7));
        assert_eq!(resource.message(), Some("Network error: timed out"));
        assert!(!resource.is_success());
    }

    #[test]
    fn test_map_preserves_variant() {
        assert_eq!(Resource::Loading(Some(2)).map(|n| n * 10), Resource::Loading(Some(20)));
        assert_eq!(Resource::Success(2).map(|n| n + 1), Resource::Success(3));
        assert_eq!(
            Resource::<i32>::error("boom").map(|n| n + 1),
            Resource::Error { message: "boom".into(), data: None }
        );
    }

    #[test]
    fn test_default_is_empty_loading() {
        let resource: Resource<String> = Resource::default();
        assert!(resource.is_loading());
        assert!(resource.into_data().is_none());
    }
}
