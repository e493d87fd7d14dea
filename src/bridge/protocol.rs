//! Messages exchanged with the privileged rendering context.
//!
//! Every request travels in an [`Envelope`] carrying a fresh correlation id;
//! the matching [`Inbound::Response`] echoes it. Replies may arrive in any
//! order. Binary data never crosses the boundary raw: files travel as
//! [`SerializedFile`] data URLs.

use crate::config::RenderOptions;
use crate::file::SerializedFile;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request for the privileged context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "camelCase")]
pub enum Request {
    /// Run a whole file conversion inside the privileged context.
    FileToImage { file: SerializedFile },
    /// Render an HTML fragment to a PNG data URL.
    ConvertHtmlToImage { html: String, options: RenderOptions },
    /// Render markdown to HTML.
    RenderMarkdownToHtml { markdown: String },
    /// List the extensions the privileged context's registry supports.
    SupportedFormats,
}

impl Request {
    /// Wire name of the action, for logs and errors.
    pub fn action(&self) -> &'static str {
        match self {
            Request::FileToImage { .. } => "fileToImage",
            Request::ConvertHtmlToImage { .. } => "convertHtmlToImage",
            Request::RenderMarkdownToHtml { .. } => "renderMarkdownToHtml",
            Request::SupportedFormats => "supportedFormats",
        }
    }
}

/// A request plus its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub request: Request,
}

impl Envelope {
    pub fn new(request: Request) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
        }
    }
}

/// The answer to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Reply {
    /// Converted file, or the conversion error in serialized form.
    #[serde(rename_all = "camelCase")]
    File { file: SerializedFile },
    /// PNG data URL; `None` when the surface had nothing to capture.
    #[serde(rename_all = "camelCase")]
    Image { data_url: Option<String> },
    Html { html: String },
    Formats { extensions: Vec<String> },
    /// The request failed inside the privileged context.
    Error { message: String },
}

/// Messages from the privileged context to whoever is listening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inbound {
    /// Sent once, right after the context's handlers are installed.
    OffscreenReady,
    Response { id: Uuid, reply: Reply },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::SourceFile;

    #[test]
    fn requests_carry_action_discriminant() {
        let env = Envelope::new(Request::RenderMarkdownToHtml {
            markdown: "# x".into(),
        });
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["request"]["action"], "renderMarkdownToHtml");
        assert_eq!(json["request"]["payload"]["markdown"], "# x");
        assert!(json["id"].is_string());

        let back: Envelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn unit_request_has_no_payload() {
        let json = serde_json::to_value(Request::SupportedFormats).unwrap();
        assert_eq!(json, serde_json::json!({ "action": "supportedFormats" }));
    }

    #[test]
    fn ready_signal_and_responses_decode() {
        let ready: Inbound = serde_json::from_str(r#"{"type":"offscreenReady"}"#).unwrap();
        assert_eq!(ready, Inbound::OffscreenReady);

        let id = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"response","id":"{id}","reply":{{"kind":"image","dataUrl":null}}}}"#
        );
        let resp: Inbound = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            resp,
            Inbound::Response {
                id,
                reply: Reply::Image { data_url: None }
            }
        );
    }

    #[test]
    fn file_requests_travel_as_data_urls() {
        let file = SourceFile::new("a.txt", b"hi".to_vec());
        let req = Request::FileToImage {
            file: SerializedFile::from_file(&file),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json["payload"]["file"]["dataUrl"],
            "data:text/plain;base64,aGk="
        );
        assert_eq!(req.action(), "fileToImage");
    }
}
