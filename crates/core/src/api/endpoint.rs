use serde_json::Value;

/// HTTP verbs understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Description of one request target relative to the API root.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    /// Path appended to the API root, without a leading slash.
    pub path: String,
    /// HTTP verb.
    pub method: HttpMethod,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Query parameters in the order they are written to the URL.
    pub query: Vec<(String, String)>,
    /// Optional JSON body.
    pub body: Option<Value>,
}

impl Endpoint {
    /// A `GET` with the default JSON content type and no query.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Get,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            query: Vec::new(),
            body: None,
        }
    }

    /// Append a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Value of the first query parameter named `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Paged game listing, optionally filtered by a search string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamesEndpoint {
    /// 1-based page number.
    pub page: u32,
    /// Games per page.
    pub page_size: u32,
    /// Server-side search text.
    pub search: Option<String>,
}

impl GamesEndpoint {
    /// Build the request target, authenticating with `api_key`.
    pub fn endpoint(&self, api_key: &str) -> Endpoint {
        let endpoint = Endpoint::get("games")
            .with_query("page_size", self.page_size)
            .with_query("page", self.page)
            .with_query("key", api_key);
        match self.search.as_deref() {
            Some(search) => endpoint.with_query("search", search),
            None => endpoint,
        }
    }
}

/// Details of a single game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameDetailEndpoint {
    /// Remote identifier.
    pub game_id: i64,
}

impl GameDetailEndpoint {
    /// Build the request target, authenticating with `api_key`.
    pub fn endpoint(&self, api_key: &str) -> Endpoint {
        Endpoint::get(format!("games/{}", self.game_id)).with_query("key", api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_endpoint_orders_parameters() {
        let endpoint = GamesEndpoint {
            page: 3,
            page_size: 20,
            search: None,
        }
        .endpoint("abc");

        assert_eq!(endpoint.path, "games");
        assert_eq!(endpoint.method, HttpMethod::Get);
        let keys: Vec<_> = endpoint.query.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, ["page_size", "page", "key"]);
        assert_eq!(endpoint.query_value("page"), Some("3"));
        assert_eq!(endpoint.query_value("search"), None);
    }

    #[test]
    fn list_endpoint_carries_search() {
        let endpoint = GamesEndpoint {
            page: 1,
            page_size: 20,
            search: Some("witcher".to_string()),
        }
        .endpoint("abc");
        assert_eq!(endpoint.query_value("search"), Some("witcher"));
    }

    #[test]
    fn detail_endpoint_embeds_id() {
        let endpoint = GameDetailEndpoint { game_id: 3498 }.endpoint("abc");
        assert_eq!(endpoint.path, "games/3498");
        assert_eq!(endpoint.query, vec![("key".to_string(), "abc".to_string())]);
    }
}
