use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One prior turn of the conversation as the inference service sees it.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct TranscriptMessage {
    pub role: Role,
    pub content: String,
}

impl TranscriptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A single inference call: the new query plus the history that precedes it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    pub query: String,
    /// Identity forwarded to the backend
    pub user: String,
    pub messages: Vec<TranscriptMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ChatRequest {
    pub fn new(
        query: impl Into<String>,
        user: impl Into<String>,
        messages: Vec<TranscriptMessage>,
    ) -> Self {
        Self {
            query: query.into(),
            user: user.into(),
            messages,
            image_url: None,
        }
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }
}

/// A citation attached to an answer. Unknown fields are kept as-is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ResourceRepr")]
pub struct Resource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResourceRepr {
    Url(String),
    Full {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        snippet: Option<String>,
        #[serde(flatten)]
        extra: serde_json::Map<String, serde_json::Value>,
    },
}

impl From<ResourceRepr> for Resource {
    fn from(repr: ResourceRepr) -> Self {
        match repr {
            ResourceRepr::Url(url) => Resource {
                url: Some(url),
                ..Default::default()
            },
            ResourceRepr::Full {
                title,
                url,
                snippet,
                extra,
            } => Resource {
                title,
                url,
                snippet,
                extra,
            },
        }
    }
}

/// An image returned alongside an answer. A bare string is read as the url.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ImageRefRepr")]
pub struct ImageRef {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImageRefRepr {
    Url(String),
    Full {
        url: String,
        #[serde(default, alias = "alt")]
        caption: Option<String>,
    },
}

impl From<ImageRefRepr> for ImageRef {
    fn from(repr: ImageRefRepr) -> Self {
        match repr {
            ImageRefRepr::Url(url) => ImageRef { url, caption: None },
            ImageRefRepr::Full { url, caption } => ImageRef { url, caption },
        }
    }
}

/// The normalized result of a successful inference call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantAnswer {
    pub answer: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub grounding: bool,
}

impl AssistantAnswer {
    pub fn text(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_missing_image() {
        let request = ChatRequest::new(
            "What is Rust?",
            "alice@example.com",
            vec![TranscriptMessage::new(Role::User, "hello")],
        );
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("image_url").is_none());
        assert_eq!(value["messages"][0]["role"], "user");

        let with_image = request.with_image_url(Some("https://img/x.png".to_string()));
        let value = serde_json::to_value(&with_image).unwrap();
        assert_eq!(value["image_url"], "https://img/x.png");
    }

    #[test]
    fn test_image_ref_accepts_string_or_object() {
        let images: Vec<ImageRef> = serde_json::from_value(json!([
            "https://a/1.png",
            {"url": "https://a/2.png", "caption": "two"},
            {"url": "https://a/3.png", "alt": "three"}
        ]))
        .unwrap();

        assert_eq!(images[0].url, "https://a/1.png");
        assert_eq!(images[0].caption, None);
        assert_eq!(images[1].caption.as_deref(), Some("two"));
        assert_eq!(images[2].caption.as_deref(), Some("three"));
    }

    #[test]
    fn test_resource_keeps_unknown_fields() {
        let resource: Resource = serde_json::from_value(json!({
            "title": "Rust Book",
            "url": "https://doc.rust-lang.org/book/",
            "score": 0.92
        }))
        .unwrap();

        assert_eq!(resource.title.as_deref(), Some("Rust Book"));
        assert_eq!(resource.extra.get("score"), Some(&json!(0.92)));

        let back = serde_json::to_value(&resource).unwrap();
        assert_eq!(back["score"], json!(0.92));
        assert!(back.get("snippet").is_none());
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert!(serde_json::from_str::<Role>("\"system\"").is_err());
    }
}
