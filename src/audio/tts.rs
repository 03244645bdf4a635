use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;
use serde_json::json;

use crate::{
    config::VoiceParams,
    error::{ReelError, ReelResult},
};

pub const DEFAULT_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
pub const API_KEY_ENV: &str = "GOOGLE_TTS_API_KEY";

/// Text-to-speech backend: `(text, voice) -> encoded audio bytes`.
pub trait SpeechEngine {
    fn name(&self) -> &'static str;

    /// Extension of the files written for this engine's output.
    fn file_extension(&self) -> &'static str {
        "mp3"
    }

    fn synthesize(&self, text: &str, voice: &VoiceParams) -> ReelResult<Vec<u8>>;
}

/// Google Cloud Text-to-Speech over its REST endpoint, MP3 output.
pub struct GoogleTts {
    api_key: String,
    endpoint: String,
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

impl GoogleTts {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Build from the API key in `GOOGLE_TTS_API_KEY`.
    pub fn from_env() -> ReelResult<Self> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(ReelError::config(format!(
                "{API_KEY_ENV} is not set; it is required for speech synthesis"
            ))),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn request_body(text: &str, voice: &VoiceParams) -> serde_json::Value {
        let mut voice_json = json!({
            "languageCode": voice.language_code,
            "ssmlGender": voice.ssml_gender.as_str(),
        });
        if let Some(name) = &voice.name {
            voice_json["name"] = json!(name);
        }
        json!({
            "input": { "text": text },
            "voice": voice_json,
            "audioConfig": { "audioEncoding": "MP3" },
        })
    }
}

impl SpeechEngine for GoogleTts {
    fn name(&self) -> &'static str {
        "google-tts"
    }

    fn synthesize(&self, text: &str, voice: &VoiceParams) -> ReelResult<Vec<u8>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Goog-Api-Key", &self.api_key)
            .json(&Self::request_body(text, voice))
            .send()
            .map_err(|e| ReelError::synthesis(format!("tts request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ReelError::synthesis(format!(
                "tts api returned {status}: {}",
                body.trim()
            )));
        }

        let parsed: SynthesizeResponse = response
            .json()
            .map_err(|e| ReelError::synthesis(format!("tts response parse failed: {e}")))?;
        let encoded = parsed
            .audio_content
            .ok_or_else(|| ReelError::synthesis("tts response has no audioContent"))?;
        general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ReelError::synthesis(format!("failed to decode base64 audio: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SsmlGender;

    #[test]
    fn request_body_carries_voice_selection() {
        let voice = VoiceParams {
            language_code: "en-GB".to_string(),
            name: Some("en-GB-Neural2-B".to_string()),
            ssml_gender: SsmlGender::Male,
        };
        let body = GoogleTts::request_body("I am lost.", &voice);
        assert_eq!(body["input"]["text"], "I am lost.");
        assert_eq!(body["voice"]["languageCode"], "en-GB");
        assert_eq!(body["voice"]["name"], "en-GB-Neural2-B");
        assert_eq!(body["voice"]["ssmlGender"], "MALE");
        assert_eq!(body["audioConfig"]["audioEncoding"], "MP3");
    }

    #[test]
    fn unnamed_voice_omits_name() {
        let voice = VoiceParams {
            language_code: "en-US".to_string(),
            name: None,
            ssml_gender: SsmlGender::Neutral,
        };
        let body = GoogleTts::request_body("x", &voice);
        assert!(body["voice"].get("name").is_none());
        assert_eq!(body["voice"]["ssmlGender"], "NEUTRAL");
    }

    #[test]
    fn response_decodes_audio_content() {
        let parsed: SynthesizeResponse =
            serde_json::from_str(r#"{"audioContent": "SUQz"}"#).unwrap();
        let bytes = general_purpose::STANDARD
            .decode(parsed.audio_content.unwrap())
            .unwrap();
        assert_eq!(bytes, b"ID3");
    }
}
