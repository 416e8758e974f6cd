//! Typed request parameters for the two proxied operations.
//!
//! Named fields cover what the proxy itself reads; every other upstream
//! parameter is carried verbatim in `extra` and forwarded untouched.

use crate::error::ProxyError;
use std::collections::{BTreeMap, HashMap};

/// Parameters never forwarded upstream nor used for keying: the upstream
/// credential and the client access key.
pub const CONTROL_PARAMS: &[&str] = &["key", "api_key"];

/// Parameters of an upstream `search` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub q: Option<String>,
    pub order: Option<String>,
    pub result_type: Option<String>,
    /// Raw `maxResults` value; kept as text so keying sees what the client sent
    pub max_results: Option<String>,
    pub region_code: Option<String>,
    pub page_token: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl SearchRequest {
    pub fn from_query(mut query: HashMap<String, String>) -> Self {
        for control in CONTROL_PARAMS {
            query.remove(*control);
        }

        Self {
            q: query.remove("q"),
            order: query.remove("order"),
            result_type: query.remove("type"),
            max_results: query.remove("maxResults"),
            region_code: query.remove("regionCode"),
            page_token: query.remove("pageToken"),
            extra: query.into_iter().collect(),
        }
    }

    /// Full forwarded parameter set, sorted by name.
    pub fn params(&self) -> BTreeMap<String, String> {
        let mut params = self.extra.clone();
        let named = [
            ("q", &self.q),
            ("order", &self.order),
            ("type", &self.result_type),
            ("maxResults", &self.max_results),
            ("regionCode", &self.region_code),
            ("pageToken", &self.page_token),
        ];
        for (name, value) in named {
            if let Some(value) = value {
                params.insert(name.to_string(), value.clone());
            }
        }
        params
    }

    /// `maxResults` as a number, `None` when absent or unparsable.
    pub fn requested_max_results(&self) -> Option<u32> {
        self.max_results.as_deref().and_then(|v| v.trim().parse().ok())
    }
}

/// Parameters of an upstream `videos` call for a single id.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRequest {
    pub id: String,
    pub extra: BTreeMap<String, String>,
}

impl VideoRequest {
    pub fn from_query(mut query: HashMap<String, String>) -> Result<Self, ProxyError> {
        for control in CONTROL_PARAMS {
            query.remove(*control);
        }

        let id = query
            .remove("id")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(ProxyError::MissingParameter("id"))?;

        Ok(Self {
            id,
            extra: query.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn search_lifts_named_fields_and_strips_credentials() {
        let req = SearchRequest::from_query(query(&[
            ("q", "rust"),
            ("order", "date"),
            ("type", "video"),
            ("maxResults", "10"),
            ("part", "snippet"),
            ("key", "secret"),
            ("api_key", "client"),
        ]));

        assert_eq!(req.q.as_deref(), Some("rust"));
        assert_eq!(req.order.as_deref(), Some("date"));
        assert_eq!(req.result_type.as_deref(), Some("video"));
        assert_eq!(req.requested_max_results(), Some(10));
        assert_eq!(req.extra.len(), 1);
        assert_eq!(req.extra["part"], "snippet");

        let params = req.params();
        assert!(!params.contains_key("key"));
        assert!(!params.contains_key("api_key"));
        assert_eq!(params["type"], "video");
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn unparsable_max_results_is_none() {
        let req = SearchRequest::from_query(query(&[("maxResults", "lots")]));
        assert_eq!(req.requested_max_results(), None);
        assert_eq!(req.params()["maxResults"], "lots");
    }

    #[test]
    fn video_requires_id() {
        let err = VideoRequest::from_query(query(&[("part", "snippet")])).unwrap_err();
        assert!(matches!(err, ProxyError::MissingParameter("id")));

        let err = VideoRequest::from_query(query(&[("id", "  ")])).unwrap_err();
        assert!(matches!(err, ProxyError::MissingParameter("id")));
    }

    #[test]
    fn video_strips_id_and_credentials_from_extra() {
        let req = VideoRequest::from_query(query(&[
            ("id", "dQw4w9WgXcQ"),
            ("part", "snippet,statistics"),
            ("key", "secret"),
        ]))
        .unwrap();

        assert_eq!(req.id, "dQw4w9WgXcQ");
        assert_eq!(req.extra.len(), 1);
        assert_eq!(req.extra["part"], "snippet,statistics");
    }
}
