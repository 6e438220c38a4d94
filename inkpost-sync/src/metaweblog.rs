//! MetaWeblog API client over XML-RPC.
//!
//! Transport is a blocking `ureq` agent; every call is a single POST of a
//! `methodCall` document. Fault classification happens here and nowhere else:
//!
//! | fault code | method                   | classified as       |
//! |------------|--------------------------|---------------------|
//! | 0          | any                      | `MalformedContent`  |
//! | 500        | `newPost`                | `RateLimited`       |
//! | 500        | `editPost`, throttle msg | `RateLimited`       |
//! | 500        | `editPost`, otherwise    | `NotFound`          |
//! | 500        | `deletePost` / `getPost` | `NotFound`          |
//! | other      | any                      | `Fault`             |

use std::collections::BTreeMap;
use std::time::Duration;

use inkpost_core::{Config, PostId};

use crate::remote::{PostContent, PostSummary, RemoteContentClient, RemoteError, RemotePost};
use crate::xmlrpc::{encode_call, parse_response, MethodResponse, Value};

const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    NewPost,
    EditPost,
    DeletePost,
    GetPost,
    GetRecentPosts,
}

impl Method {
    fn name(self) -> &'static str {
        match self {
            Method::NewPost => "metaWeblog.newPost",
            Method::EditPost => "metaWeblog.editPost",
            Method::DeletePost => "blogger.deletePost",
            Method::GetPost => "metaWeblog.getPost",
            Method::GetRecentPosts => "metaWeblog.getRecentPosts",
        }
    }
}

/// Fragments of the fault strings hosts send when throttling posts.
const THROTTLE_MARKERS: &[&str] = &["秒内只能", "稍候", "rate limit", "too many", "too frequent"];

fn is_throttle(message: &str) -> bool {
    let lower = message.to_lowercase();
    THROTTLE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Map a fault from `method` onto the error taxonomy.
///
/// Hosts answer 500 both for throttling and for an unknown post id, so an
/// `editPost` 500 is only a rate limit when its message says so.
fn classify_fault(method: Method, code: i64, message: String) -> RemoteError {
    match (code, method) {
        (0, _) => RemoteError::MalformedContent(message),
        (500, Method::NewPost) => RemoteError::RateLimited(message),
        (500, Method::EditPost) if is_throttle(&message) => RemoteError::RateLimited(message),
        (500, Method::EditPost | Method::DeletePost | Method::GetPost) => {
            RemoteError::NotFound(message)
        }
        (code, _) => RemoteError::Fault { code, message },
    }
}

/// Account details for a MetaWeblog endpoint.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub blog_id: String,
    pub app_key: String,
    pub username: String,
    pub password: String,
}

pub struct MetaWeblogClient {
    endpoint: String,
    credentials: Credentials,
    default_categories: Vec<String>,
    agent: ureq::Agent,
}

impl MetaWeblogClient {
    pub fn new(endpoint: impl Into<String>, credentials: Credentials) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_read(TIMEOUT)
            .timeout_write(TIMEOUT)
            .build();
        Self {
            endpoint: endpoint.into(),
            credentials,
            default_categories: Vec::new(),
            agent,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let credentials = Credentials {
            blog_id: config.blog_id.clone(),
            app_key: config.app_key.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        };
        Self::new(config.blog_url.clone(), credentials)
            .with_default_categories(config.categories.clone())
    }

    /// Categories prepended to every published post.
    pub fn with_default_categories(mut self, categories: Vec<String>) -> Self {
        self.default_categories = categories;
        self
    }

    fn call(&self, method: Method, params: &[Value]) -> Result<Value, RemoteError> {
        tracing::debug!("{} -> {}", method.name(), self.endpoint);
        let body = encode_call(method.name(), params);
        let response = match self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "text/xml; charset=utf-8")
            .send_string(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                return Err(RemoteError::Transport(format!(
                    "{} answered HTTP {code} ({})",
                    self.endpoint,
                    response.status_text()
                )))
            }
            Err(err) => {
                return Err(RemoteError::Transport(format!(
                    "request to {} failed: {err}",
                    self.endpoint
                )))
            }
        };
        let text = response
            .into_string()
            .map_err(|e| RemoteError::Transport(format!("failed reading response body: {e}")))?;

        match parse_response(&text)? {
            MethodResponse::Success(value) => Ok(value),
            MethodResponse::Fault { code, message } => {
                tracing::debug!("{} fault {code}: {message}", method.name());
                Err(classify_fault(method, code, message))
            }
        }
    }

    fn auth(&self) -> [Value; 2] {
        [
            Value::from(self.credentials.username.as_str()),
            Value::from(self.credentials.password.as_str()),
        ]
    }

    fn post_struct(&self, post: &PostContent) -> Value {
        let mut categories = self.default_categories.clone();
        for category in &post.categories {
            if !categories.contains(category) {
                categories.push(category.clone());
            }
        }
        let mut members = BTreeMap::new();
        members.insert("title".to_string(), Value::from(post.title.as_str()));
        members.insert("description".to_string(), Value::from(post.body.as_str()));
        members.insert(
            "categories".to_string(),
            Value::Array(categories.into_iter().map(Value::String).collect()),
        );
        members.insert("mt_keywords".to_string(), Value::from(post.tags.join(",")));
        Value::Struct(members)
    }
}

fn post_id(value: &Value) -> Result<PostId, RemoteError> {
    value
        .text()
        .map(PostId::from)
        .ok_or_else(|| RemoteError::Protocol(format!("expected a post id, got {value:?}")))
}

fn member_text(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::text)
}

fn categories(value: &Value) -> Vec<String> {
    match value.get("categories") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::text).collect(),
        _ => Vec::new(),
    }
}

impl RemoteContentClient for MetaWeblogClient {
    fn create(&mut self, post: &PostContent) -> Result<PostId, RemoteError> {
        let [user, pass] = self.auth();
        let value = self.call(
            Method::NewPost,
            &[
                Value::from(self.credentials.blog_id.as_str()),
                user,
                pass,
                self.post_struct(post),
                Value::Bool(true),
            ],
        )?;
        let id = post_id(&value)?;
        tracing::info!("published '{}' as post {id}", post.title);
        Ok(id)
    }

    fn update(&mut self, id: &PostId, post: &PostContent) -> Result<bool, RemoteError> {
        let [user, pass] = self.auth();
        let value = self.call(
            Method::EditPost,
            &[
                Value::from(id.as_str()),
                user,
                pass,
                self.post_struct(post),
                Value::Bool(true),
            ],
        )?;
        Ok(value.as_bool().unwrap_or(true))
    }

    fn delete(&mut self, id: &PostId) -> Result<bool, RemoteError> {
        let [user, pass] = self.auth();
        let value = self.call(
            Method::DeletePost,
            &[
                Value::from(self.credentials.app_key.as_str()),
                Value::from(id.as_str()),
                user,
                pass,
                Value::Bool(true),
            ],
        )?;
        Ok(value.as_bool().unwrap_or(true))
    }

    fn fetch(&mut self, id: &PostId) -> Result<RemotePost, RemoteError> {
        let [user, pass] = self.auth();
        let value = self.call(Method::GetPost, &[Value::from(id.as_str()), user, pass])?;
        Ok(RemotePost {
            id: member_text(&value, "postid").map(PostId::from).unwrap_or_else(|| id.clone()),
            title: member_text(&value, "title").unwrap_or_default(),
            body: member_text(&value, "description").unwrap_or_default(),
            categories: categories(&value),
            link: member_text(&value, "link"),
            created: member_text(&value, "dateCreated"),
        })
    }

    fn list_recent(&mut self, limit: usize) -> Result<Vec<PostSummary>, RemoteError> {
        let [user, pass] = self.auth();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let value = self.call(
            Method::GetRecentPosts,
            &[
                Value::from(self.credentials.blog_id.as_str()),
                user,
                pass,
                Value::Int(limit),
            ],
        )?;
        let Value::Array(items) = value else {
            return Err(RemoteError::Protocol("getRecentPosts did not return an array".into()));
        };
        items
            .iter()
            .map(|item| {
                let id = item
                    .get("postid")
                    .ok_or_else(|| RemoteError::Protocol("post without postid".into()))
                    .and_then(post_id)?;
                Ok(PostSummary {
                    id,
                    title: member_text(item, "title").unwrap_or_default(),
                    created: member_text(item, "dateCreated"),
                    link: member_text(item, "link"),
                })
            })
            .collect()
    }
}
