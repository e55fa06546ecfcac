use std::sync::Arc;

use reqwest::{Url, cookie::Jar};

/// Name of the cookie carrying the bearer token.
pub const TOKEN_COOKIE: &str = "token";

/// Client-side storage for credentials presented to the backend.
pub trait CredentialStore: Send + Sync + 'static {
    fn store(&self, name: &str, value: &str);
    fn remove(&self, name: &str);
}

impl<T: CredentialStore> CredentialStore for Arc<T> {
    fn store(&self, name: &str, value: &str) {
        (**self).store(name, value);
    }

    fn remove(&self, name: &str) {
        (**self).remove(name);
    }
}

/// Credentials kept as cookies in a jar shared with an HTTP client.
#[derive(Clone)]
pub struct CookieCredentials {
    jar: Arc<Jar>,
    url: Url,
}

impl CookieCredentials {
    /// Store cookies in `jar`, scoped to `url`.
    pub fn new(jar: Arc<Jar>, url: Url) -> Self {
        Self { jar, url }
    }
}

impl CredentialStore for CookieCredentials {
    fn store(&self, name: &str, value: &str) {
        self.jar
            .add_cookie_str(&format!("{name}={value}; Path=/; SameSite=Lax"), &self.url);
    }

    /// Overwrite with an already expired cookie so the jar drops it.
    fn remove(&self, name: &str) {
        self.jar
            .add_cookie_str(&format!("{name}=; Path=/; Max-Age=0"), &self.url);
    }
}

#[cfg(test)]
mod tests {
    use reqwest::cookie::CookieStore;

    use super::*;

    #[test]
    fn stores_and_removes_cookie_for_base_url() {
        let jar = Arc::new(Jar::default());
        let url = Url::parse("http://localhost:3000/").unwrap();
        let credentials = CookieCredentials::new(jar.clone(), url.clone());

        credentials.store(TOKEN_COOKIE, "abc");
        let header = jar.cookies(&url.join("/api/games").unwrap()).unwrap();
        assert_eq!(header.to_str().unwrap(), "token=abc");

        credentials.remove(TOKEN_COOKIE);
        assert!(jar.cookies(&url).is_none());
    }
}
