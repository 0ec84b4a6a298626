use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<&'a JsonValue>,

    pub disable_web_page_preview: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramResponse {
    pub ok: bool,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub error_code: Option<u16>,

    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}
