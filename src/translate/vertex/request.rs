//! Translate canonical Chat Completions requests into Vertex `generateContent` requests.
//!
//! The system instruction has a single slot: every system or developer
//! message overwrites it with its first text fragment, so the last one wins.
//! Tool-role messages become plain `user` text turns.

use tracing::debug;

use super::schema::{translate_parameters, translate_schema};
use super::types::{
    Content, FunctionCallingConfig, FunctionDeclaration, GenerateContentRequest, GenerationConfig,
    ImageConfig, Part, ThinkingConfig, Tool, ToolConfig,
};
use crate::error::{parse_payload, Payload, Result};
use crate::translate::content::text_fragments;
use crate::translate::helpers::{parse_arguments, target_model};
use crate::translate::media::{
    audio_mime_type, classify_url, file_mime_type, mime_type_from_url, normalize_base64,
    video_mime_type, MediaSource, OCTET_STREAM,
};
use crate::translate::openai_types::{
    ChatCompletionRequest, ChatMessage, ContentBlock, MessageContent, ResponseFormat,
    Role as CanonicalRole,
};

/// Convert a canonical request body into a Vertex `generateContent` body.
///
/// # Errors
/// Returns [`TranslateError::Parse`](crate::TranslateError::Parse) if `body`
/// is not a valid canonical request.
pub fn request_to_vertex(body: &[u8], model: &str) -> Result<Vec<u8>> {
    let req: ChatCompletionRequest = parse_payload(body, Payload::CanonicalRequest)?;
    let translated = openai_to_vertex(&req, model);
    Ok(serde_json::to_vec(&translated)?)
}

/// Pure function: canonical request in, Vertex request out.
///
/// The model id is not part of the Vertex body; it only decides whether a
/// caller-supplied response MIME type is honored.
pub fn openai_to_vertex(req: &ChatCompletionRequest, model: &str) -> GenerateContentRequest {
    let mut system_instruction = None;
    let mut contents = Vec::new();

    for msg in &req.messages {
        if msg.role.is_instruction() {
            if let Some(first) = text_fragments(msg.content.as_ref()).first() {
                system_instruction = Some(Content {
                    role: None,
                    parts: vec![Part::text(*first)],
                });
            }
            continue;
        }
        if let Some(content) = translate_message(msg) {
            contents.push(content);
        }
    }

    let model = target_model(model, &req.model);
    let generation_config = build_generation_config(req, &model);

    GenerateContentRequest {
        contents,
        system_instruction,
        generation_config: (generation_config != GenerationConfig::default())
            .then_some(generation_config),
        tools: translate_tools(req),
        tool_config: req.tool_choice.as_ref().and_then(translate_tool_choice),
    }
}

fn translate_message(msg: &ChatMessage) -> Option<Content> {
    let role = match msg.role {
        CanonicalRole::Assistant => "model",
        _ => "user",
    };

    let mut parts: Vec<Part> = match msg.role {
        CanonicalRole::Tool => text_fragments(msg.content.as_ref())
            .into_iter()
            .map(Part::text)
            .collect(),
        _ => translate_content(msg.content.as_ref()),
    };

    if msg.role == CanonicalRole::Assistant {
        for call in msg.tool_calls.iter().flatten() {
            parts.push(Part::function_call(
                call.function.name.clone(),
                parse_arguments(&call.function.arguments),
            ));
        }
    }

    if parts.is_empty() {
        debug!(role = ?msg.role, "dropping message with no translatable content");
        return None;
    }

    Some(Content {
        role: Some(role.to_string()),
        parts,
    })
}

fn translate_content(content: Option<&MessageContent>) -> Vec<Part> {
    match content {
        Some(MessageContent::Text(text)) if !text.is_empty() => vec![Part::text(text.clone())],
        Some(MessageContent::Blocks(blocks)) => blocks.iter().filter_map(translate_block).collect(),
        _ => Vec::new(),
    }
}

fn translate_block(block: &ContentBlock) -> Option<Part> {
    match block {
        ContentBlock::Text { text } if !text.is_empty() => Some(Part::text(text.clone())),
        ContentBlock::ImageUrl { image_url } => {
            media_part(&image_url.url, image_url.format.as_deref())
        }
        ContentBlock::File { file } => media_part(file.url()?, file.format.as_deref()),
        ContentBlock::VideoUrl { video_url } => {
            let format = video_url.format.as_deref().map(|f| {
                if f.contains('/') {
                    f.to_string()
                } else {
                    video_mime_type(f).to_string()
                }
            });
            media_part(&video_url.url, format.as_deref())
        }
        ContentBlock::InputAudio { input_audio } => match normalize_base64(&input_audio.data) {
            Some(data) => Some(Part::inline(audio_mime_type(&input_audio.format), data)),
            None => {
                debug!("dropping input_audio block with invalid base64");
                None
            }
        },
        other => {
            debug!(block = ?other, "content block has no Vertex representation");
            None
        }
    }
}

/// Data URLs become inline parts; `http(s)://` and `file://` URLs become file
/// references typed by `format`, then the URL's extension.
fn media_part(url: &str, format: Option<&str>) -> Option<Part> {
    match classify_url(url) {
        MediaSource::Inline(data) => Some(Part::inline(data.mime_type, data.data)),
        MediaSource::Remote(uri) => Some(Part::file(file_mime_type(uri, format), uri)),
        MediaSource::Unsupported => {
            debug!(
                known_extension = mime_type_from_url(url).is_some(),
                "dropping unsupported media URL"
            );
            None
        }
    }
}

fn build_generation_config(req: &ChatCompletionRequest, model: &str) -> GenerationConfig {
    let mut config = GenerationConfig {
        temperature: req.temperature,
        top_p: req.top_p,
        candidate_count: req.n,
        max_output_tokens: req.max_completion_tokens.or(req.max_tokens),
        seed: req.seed,
        frequency_penalty: req.frequency_penalty,
        presence_penalty: req.presence_penalty,
        stop_sequences: req.stop.as_ref().map(|s| s.to_vec()),
        ..Default::default()
    };

    let extra = req.extra_body.as_ref();
    let overrides = extra.and_then(|e| e.generation_config.as_ref());

    if let Some(overrides) = overrides {
        if overrides.temperature.is_some() {
            config.temperature = overrides.temperature;
        }
        if overrides.seed.is_some() {
            config.seed = overrides.seed;
        }
        config.top_k = overrides.top_k;
        if !model.contains("image") {
            config.response_mime_type = overrides.response_mime_type.clone();
        }
        config.image_config = overrides.image_config.as_ref().map(|hint| ImageConfig {
            aspect_ratio: hint.aspect_ratio.clone(),
            image_size: hint.image_size.clone(),
        });
    }

    let modalities = collect_modalities([
        req.modalities.as_deref(),
        extra.and_then(|e| e.modalities.as_deref()),
        overrides.and_then(|g| g.response_modalities.as_deref()),
    ]);
    if !modalities.is_empty() {
        config.response_modalities = Some(modalities);
    }

    if let Some(format) = &req.response_format {
        apply_response_format(&mut config, format);
    }

    config.thinking_config = req
        .reasoning_effort
        .as_deref()
        .and_then(thinking_config);

    config
}

/// Upper-cased, de-duplicated union of every modality list, in first-seen order.
fn collect_modalities(sources: [Option<&[String]>; 3]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for modality in sources.into_iter().flatten().flatten() {
        let upper = modality.trim().to_ascii_uppercase();
        if !upper.is_empty() && !out.contains(&upper) {
            out.push(upper);
        }
    }
    out
}

fn apply_response_format(config: &mut GenerationConfig, format: &ResponseFormat) {
    match format.format_type.as_str() {
        "json_object" => {
            config.response_mime_type = Some("application/json".to_string());
        }
        "json_schema" => {
            config.response_mime_type = Some("application/json".to_string());
            config.response_schema = format
                .json_schema
                .as_ref()
                .and_then(|s| s.schema.as_ref())
                .map(translate_schema);
        }
        _ => {}
    }
}

/// Thinking budget for a canonical `reasoning_effort`.
pub fn thinking_config(effort: &str) -> Option<ThinkingConfig> {
    let budget = match effort.to_ascii_lowercase().as_str() {
        "none" => 0,
        "low" => 1024,
        "medium" => 8192,
        "high" => 24576,
        other => {
            debug!(effort = other, "unknown reasoning_effort");
            return None;
        }
    };
    Some(ThinkingConfig {
        thinking_budget: budget,
        include_thoughts: budget > 0,
    })
}

fn translate_tools(req: &ChatCompletionRequest) -> Option<Vec<Tool>> {
    let declarations: Vec<FunctionDeclaration> = req
        .tools
        .iter()
        .flatten()
        .filter(|tool| tool.tool_type == "function")
        .map(|tool| FunctionDeclaration {
            name: tool.function.name.clone(),
            description: tool.function.description.clone(),
            parameters: translate_parameters(tool.function.parameters.as_ref()),
        })
        .collect();

    if declarations.is_empty() {
        return None;
    }
    Some(vec![Tool {
        function_declarations: declarations,
    }])
}

fn translate_tool_choice(choice: &serde_json::Value) -> Option<ToolConfig> {
    let (mode, allowed) = match choice {
        serde_json::Value::String(s) => match s.as_str() {
            "auto" => ("AUTO", None),
            "none" => ("NONE", None),
            "required" => ("ANY", None),
            _ => return None,
        },
        serde_json::Value::Object(map) => {
            let name = map
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(serde_json::Value::as_str)?;
            ("ANY", Some(vec![name.to_string()]))
        }
        _ => return None,
    };
    Some(ToolConfig {
        function_calling_config: FunctionCallingConfig {
            mode: mode.to_string(),
            allowed_function_names: allowed,
        },
    })
}
