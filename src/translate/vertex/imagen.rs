//! Image generation on Vertex.
//!
//! Imagen models take a `predict` request; Gemini image models generate
//! through the chat endpoint, so their image requests are rewritten into a
//! canonical chat request and sent down the normal `generateContent` path.

use super::request::openai_to_vertex;
use super::response::collect_part;
use super::types::{
    GenerateContentResponse, PredictInstance, PredictParameters, PredictRequest, PredictResponse,
};
use crate::error::{parse_payload, Payload, Result};
use crate::translate::helpers::{target_model, Clock, SystemClock};
use crate::translate::openai_types::{
    ChatCompletionRequest, ChatMessage, ExtraBody, GenerationConfigOverride, ImageConfigHint,
    ImageData, ImageGenerationRequest, ImagesResponse, Role,
};

pub const MAX_SAMPLE_COUNT: u32 = 10;
const DEFAULT_ASPECT_RATIO: &str = "1:1";
const DEFAULT_SAFETY_FILTER: &str = "block_medium_and_above";
const HD_SAFETY_FILTER: &str = "block_low_and_above";
const PERSON_GENERATION: &str = "allow_adult";

/// Convert a canonical image-generation body for `model`.
///
/// Gemini models get a `generateContent` body; everything else gets an
/// Imagen `predict` body.
///
/// # Errors
/// Returns [`TranslateError::Parse`](crate::TranslateError::Parse) if `body`
/// is not a valid image request.
pub fn image_request_to_vertex(body: &[u8], model: &str) -> Result<Vec<u8>> {
    let req: ImageGenerationRequest = parse_payload(body, Payload::CanonicalImageRequest)?;
    let model = target_model(model, req.model.as_deref().unwrap_or_default());
    let out = if is_gemini_model(&model) {
        serde_json::to_vec(&openai_to_vertex(&image_request_to_chat(&req, &model), &model))?
    } else {
        serde_json::to_vec(&openai_to_imagen(&req))?
    };
    Ok(out)
}

/// Convert the Vertex reply to an image request back into a canonical images response.
///
/// # Errors
/// Returns [`TranslateError::Parse`](crate::TranslateError::Parse) if `body`
/// does not match the response shape expected for `model`.
pub fn image_response_from_vertex(body: &[u8], model: &str) -> Result<Vec<u8>> {
    let translated = if is_gemini_model(model) {
        let resp: GenerateContentResponse = parse_payload(body, Payload::VertexResponse)?;
        gemini_to_images(&resp, &SystemClock)
    } else {
        let resp: PredictResponse = parse_payload(body, Payload::VertexImageResponse)?;
        imagen_to_openai(&resp, &SystemClock)
    };
    Ok(serde_json::to_vec(&translated)?)
}

pub fn is_gemini_model(model: &str) -> bool {
    model.to_ascii_lowercase().contains("gemini")
}

pub fn openai_to_imagen(req: &ImageGenerationRequest) -> PredictRequest {
    let hd = req
        .quality
        .as_deref()
        .is_some_and(|q| q.eq_ignore_ascii_case("hd"));
    PredictRequest {
        instances: vec![PredictInstance {
            prompt: req.prompt.clone(),
        }],
        parameters: PredictParameters {
            sample_count: sample_count(req.n),
            aspect_ratio: aspect_ratio(req.size.as_deref()).to_string(),
            safety_filter_level: if hd {
                HD_SAFETY_FILTER
            } else {
                DEFAULT_SAFETY_FILTER
            }
            .to_string(),
            person_generation: PERSON_GENERATION.to_string(),
        },
    }
}

/// Rewrite an image request as the chat request a Gemini image model expects.
pub fn image_request_to_chat(req: &ImageGenerationRequest, model: &str) -> ChatCompletionRequest {
    let count = sample_count(req.n);
    ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![ChatMessage::text(Role::User, req.prompt.clone())],
        n: (count > 1).then_some(count),
        modalities: Some(vec!["image".to_string(), "text".to_string()]),
        user: req.user.clone(),
        extra_body: Some(ExtraBody {
            generation_config: Some(GenerationConfigOverride {
                image_config: Some(ImageConfigHint {
                    aspect_ratio: Some(aspect_ratio(req.size.as_deref()).to_string()),
                    image_size: req.size.as_deref().and_then(image_size_hint).map(str::to_string),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn imagen_to_openai(resp: &PredictResponse, clock: &dyn Clock) -> ImagesResponse {
    let data = resp
        .predictions
        .iter()
        .filter_map(|p| {
            let bytes = p.bytes_base64_encoded.as_ref()?;
            Some(ImageData::base64(bytes.clone(), p.mime_type.clone()))
        })
        .collect();
    ImagesResponse {
        created: clock.now(),
        data,
    }
}

/// Collect the inline images from every candidate of a Gemini response.
pub fn gemini_to_images(resp: &GenerateContentResponse, clock: &dyn Clock) -> ImagesResponse {
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut data = Vec::new();
    for candidate in &resp.candidates {
        for part in candidate.parts() {
            collect_part(part, &mut text, &mut reasoning, &mut data);
        }
    }
    if !text.is_empty() {
        if let Some(first) = data.first_mut() {
            first.revised_prompt = Some(text);
        }
    }
    ImagesResponse {
        created: clock.now(),
        data,
    }
}

/// Requested image count clamped to `1..=10`.
pub fn sample_count(n: Option<i64>) -> u32 {
    match n {
        Some(n) if n > i64::from(MAX_SAMPLE_COUNT) => MAX_SAMPLE_COUNT,
        Some(n) if n > 0 => n as u32,
        _ => 1,
    }
}

pub fn aspect_ratio(size: Option<&str>) -> &'static str {
    match size.map(str::trim) {
        Some("1024x1024" | "512x512" | "256x256") => "1:1",
        Some("1792x1024") => "16:9",
        Some("1024x1792") => "9:16",
        Some("1024x768" | "1536x1024") => "4:3",
        Some("768x1024" | "1024x1536") => "3:4",
        _ => DEFAULT_ASPECT_RATIO,
    }
}

/// Gemini's logical size bucket for a `WxH` size, from its longest side.
pub fn image_size_hint(size: &str) -> Option<&'static str> {
    let (w, h) = size.trim().split_once(['x', 'X'])?;
    let longest = w.trim().parse::<u32>().ok()?.max(h.trim().parse::<u32>().ok()?);
    Some(match longest {
        0..=1792 => "1K",
        1793..=3072 => "2K",
        _ => "4K",
    })
}
