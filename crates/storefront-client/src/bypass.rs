//! Routes that skip token management.
//!
//! The refresh, logout and guest-session endpoints must never trigger a
//! refresh themselves, nor be retried on 401.

use url::Url;

#[derive(Debug, Clone, Default)]
pub struct BypassRoutes {
    suffixes: Vec<String>,
}

impl BypassRoutes {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = paths
            .into_iter()
            .map(|p| normalize(p.as_ref()))
            .filter(|p| p != "/")
            .collect();
        Self { suffixes }
    }

    /// Whether the (resolved or relative) URL ends in one of the bypass paths.
    /// Query strings and trailing slashes are ignored.
    pub fn matches(&self, url: &str) -> bool {
        let path = normalize(&path_of(url));
        self.suffixes.iter().any(|suffix| path.ends_with(suffix.as_str()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.suffixes.iter().map(String::as_str)
    }
}

fn path_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => parsed.path().to_string(),
        _ => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

fn normalize(path: &str) -> String {
    format!("/{}", path.trim_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes() -> BypassRoutes {
        BypassRoutes::new(["/auth/refresh", "auth/logout/", "/auth/guest"])
    }

    #[test]
    fn test_matches_absolute_urls() {
        let routes = routes();
        assert!(routes.matches("https://shop.example.com/api/auth/refresh"));
        assert!(routes.matches("https://shop.example.com/api/auth/logout/?all=true"));
        assert!(!routes.matches("https://shop.example.com/api/products"));
    }

    #[test]
    fn test_matches_relative_urls() {
        let routes = routes();
        assert!(routes.matches("/auth/guest"));
        assert!(routes.matches("auth/refresh?x=1"));
        assert!(!routes.matches("/auth/refresh-settings"));
    }

    #[test]
    fn test_empty_paths_are_ignored() {
        let routes = BypassRoutes::new(["", "/"]);
        assert_eq!(routes.paths().count(), 0);
        assert!(!routes.matches("/anything"));
    }
}
