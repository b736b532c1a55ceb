//! Request → wire payload adaptation.
//!
//! Every call builds a fresh JSON value; the inbound request is only ever
//! borrowed, so the legacy text merge can never leak into a later attempt.

use crate::models::{
    Attempt, EndpointVersion, GenerationConfig, GenerationRequest, Instruction, Message,
    PayloadShape,
};
use serde_json::{json, Map, Value};

/// Template used to fold the system instruction into the first user turn.
pub const LEGACY_INSTRUCTION_TEMPLATE: &str =
    "[System Instructions]\n{{instruction}}\n\n[User Request]\n{{original}}";

/// Field names of one endpoint dialect.
struct Dialect {
    system_instruction: &'static str,
    generation_config: &'static str,
    response_mime_type: &'static str,
    response_schema: &'static str,
}

const V1_DIALECT: Dialect = Dialect {
    system_instruction: "system_instruction",
    generation_config: "generation_config",
    response_mime_type: "response_mime_type",
    response_schema: "response_schema",
};

const V1BETA_DIALECT: Dialect = Dialect {
    system_instruction: "systemInstruction",
    generation_config: "generationConfig",
    response_mime_type: "responseMimeType",
    response_schema: "responseSchema",
};

fn dialect(version: EndpointVersion) -> &'static Dialect {
    match version {
        EndpointVersion::V1 => &V1_DIALECT,
        EndpointVersion::V1Beta => &V1BETA_DIALECT,
    }
}

/// Build the exact payload `attempt` expects for `request`.
pub fn adapt(request: &GenerationRequest, attempt: &Attempt) -> Value {
    let dialect = dialect(attempt.endpoint_version);
    match attempt.payload_shape {
        PayloadShape::Modern => modern_payload(request, dialect),
        PayloadShape::Legacy => legacy_payload(request, dialect),
    }
}

fn modern_payload(request: &GenerationRequest, dialect: &Dialect) -> Value {
    let mut payload = Map::new();
    payload.insert("contents".to_string(), contents_value(&request.contents));

    if let Some(instruction) = &request.system_instruction {
        payload.insert(
            dialect.system_instruction.to_string(),
            instruction_value(instruction),
        );
    }

    if let Some(config) = request
        .generation_config
        .as_ref()
        .and_then(|config| modern_config(config, dialect))
    {
        payload.insert(dialect.generation_config.to_string(), config);
    }

    Value::Object(payload)
}

fn legacy_payload(request: &GenerationRequest, dialect: &Dialect) -> Value {
    let instruction = request
        .system_instruction
        .as_ref()
        .map(Instruction::text)
        .unwrap_or_default();

    let mut contents = contents_value(&request.contents);
    if !instruction.is_empty() {
        merge_instruction(&mut contents, &instruction);
    }

    let mut payload = Map::new();
    payload.insert("contents".to_string(), contents);

    // Temperature is the only setting legacy candidates accept.
    if let Some(temperature) = request
        .generation_config
        .as_ref()
        .and_then(|config| config.temperature)
    {
        payload.insert(
            dialect.generation_config.to_string(),
            json!({ "temperature": temperature }),
        );
    }

    Value::Object(payload)
}

fn contents_value(contents: &[Message]) -> Value {
    Value::Array(
        contents
            .iter()
            .map(|message| {
                json!({
                    "role": message.role,
                    "parts": message
                        .parts
                        .iter()
                        .map(|part| json!({ "text": part.text }))
                        .collect::<Vec<_>>(),
                })
            })
            .collect(),
    )
}

fn instruction_value(instruction: &Instruction) -> Value {
    json!({
        "parts": instruction
            .parts
            .iter()
            .map(|part| json!({ "text": part.text }))
            .collect::<Vec<_>>(),
    })
}

fn modern_config(config: &GenerationConfig, dialect: &Dialect) -> Option<Value> {
    let mut out = Map::new();
    if let Some(temperature) = config.temperature {
        out.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(mime) = &config.response_mime_type {
        out.insert(dialect.response_mime_type.to_string(), json!(mime));
    }
    if let Some(schema) = &config.response_schema {
        out.insert(dialect.response_schema.to_string(), schema.clone());
    }
    (!out.is_empty()).then_some(Value::Object(out))
}

/// Fold `instruction` into the first part of the first message of an
/// already-copied `contents` array.
fn merge_instruction(contents: &mut Value, instruction: &str) {
    let Some(first_message) = contents.get_mut(0) else {
        return;
    };
    let Some(parts) = first_message.get_mut("parts").and_then(Value::as_array_mut) else {
        return;
    };

    let original = parts
        .first()
        .and_then(|part| part.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let merged = legacy_text(instruction, &original);

    match parts.first_mut() {
        Some(part) => part["text"] = Value::String(merged),
        None => parts.push(json!({ "text": merged })),
    }
}

/// Render [`LEGACY_INSTRUCTION_TEMPLATE`].
pub fn legacy_text(instruction: &str, original: &str) -> String {
    LEGACY_INSTRUCTION_TEMPLATE
        .replace("{{instruction}}", instruction)
        .replace("{{original}}", original)
}
