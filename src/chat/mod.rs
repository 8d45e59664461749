//! In-character chat with saved personas
//!
//! A single persona answers with its full record and the recent
//! conversation in the system prompt. A batch question goes to the first
//! `max_personas` entries of a saved batch on a pool sized to the rate
//! limit; each persona's failure is recorded in its own reply.

use crate::error::{CompletionError, DispatchError, GenerationError};
use crate::generation::{panic_message, PersonaRecord, RateLimiter};
use crate::llm::{CompletionRequest, CompletionService};
use crate::store::{Batch, PersonaEntry};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// Turns of history included in a one-to-one chat prompt
pub const HISTORY_TURNS: usize = 10;

pub const CHAT_TEMPERATURE: f64 = 0.7;
pub const CHAT_MAX_TOKENS: u32 = 200;
/// Batch answers are one or two sentences
pub const BATCH_MAX_TOKENS: u32 = 100;

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Persona,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn persona(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Persona,
            content: content.into(),
        }
    }
}

/// The handful of traits a chat prompt names explicitly
struct Profile {
    name: String,
    age: String,
    occupation: String,
    income: String,
    experience: String,
    personality: Vec<String>,
}

impl Profile {
    fn of(persona: &PersonaRecord) -> Self {
        let personality = persona
            .get("banking_persona")
            .and_then(|b| b.get("personality_traits"))
            .and_then(Value::as_array)
            .map(|traits| traits.iter().filter_map(display).collect())
            .unwrap_or_default();

        Self {
            name: field(persona, &[&["basic_info", "name"], &["name"]]),
            age: field(persona, &[&["basic_info", "age"], &["age"]]),
            occupation: field(persona, &[&["professional", "job_title"], &["occupation"]]),
            income: field(persona, &[&["financial", "disposable_income_category"]]),
            experience: field(persona, &[&["financial", "financial_experience"]]),
            personality,
        }
    }
}

fn display(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First path that resolves to a displayable value
fn field(persona: &PersonaRecord, paths: &[&[&str]]) -> String {
    paths
        .iter()
        .find_map(|path| {
            let (first, rest) = path.split_first()?;
            let mut value = persona.get(*first)?;
            for key in rest {
                value = value.get(*key)?;
            }
            display(value)
        })
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn record_json(persona: &PersonaRecord, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(persona)
    } else {
        serde_json::to_string(persona)
    };
    // A map of JSON values always serializes
    rendered.unwrap_or_default()
}

/// System prompt for a one-to-one conversation. Only the last
/// `HISTORY_TURNS` turns are included.
pub fn persona_system_prompt(entry: &PersonaEntry, history: &[ChatTurn]) -> String {
    let profile = Profile::of(&entry.persona);
    let personality = if profile.personality.is_empty() {
        "not specified".to_string()
    } else {
        profile.personality.join(", ")
    };
    let recent = &history[history.len().saturating_sub(HISTORY_TURNS)..];
    let conversation = recent
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                ChatRole::User => "User",
                ChatRole::Persona => "Persona",
            };
            format!("{}: {}", speaker, turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are {name}, a {age}-year-old person living in Switzerland.

YOUR IDENTITY:
- Occupation: {occupation}
- Disposable income: {income} CHF
- Financial experience: {experience}
- Personality: {personality}

YOUR FULL RECORD:
{record}

BEHAVIOUR:
- Always answer as this person, in the first person
- Use the specific details from your record
- Stay consistent with your personality and background
- Refer to your own financial situation and experience
- Keep answers short (1-3 sentences)

CONVERSATION SO FAR:
{conversation}

Now answer as {name} to the following question or statement:",
        name = profile.name,
        age = profile.age,
        occupation = profile.occupation,
        income = profile.income,
        experience = profile.experience,
        personality = personality,
        record = record_json(&entry.persona, true),
        conversation = conversation,
    )
}

/// System prompt for one persona answering a question put to a whole batch
pub fn batch_system_prompt(entry: &PersonaEntry, question: &str) -> String {
    let profile = Profile::of(&entry.persona);
    format!(
        "You are {name}, {age} years old, {occupation} from Switzerland.

YOUR PROFILE:
- Income: {income}
- Financial experience: {experience}
- Your full record: {record}

RULES:
- Answer as {name} in one or two short sentences
- Give your personal opinion based on your profile
- Be direct and honest
- No greetings or pleasantries

Question: {question}
Answer as {name}:",
        name = profile.name,
        age = profile.age,
        occupation = profile.occupation,
        income = profile.income,
        experience = profile.experience,
        record = record_json(&entry.persona, false),
        question = question,
    )
}

fn complete(
    service: &dyn CompletionService,
    limiter: &RateLimiter,
    request: &CompletionRequest,
) -> Result<String, CompletionError> {
    limiter.acquire();
    let answer = service.complete(request)?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(CompletionError::EmptyResponse);
    }
    Ok(answer.to_string())
}

/// One conversational reply from `entry` to `message`, given the turns so far
pub fn reply(
    entry: &PersonaEntry,
    history: &[ChatTurn],
    message: &str,
    service: &dyn CompletionService,
    limiter: &RateLimiter,
) -> Result<String, CompletionError> {
    let mut turns = history.to_vec();
    turns.push(ChatTurn::user(message));

    let request = CompletionRequest {
        prompt: message.to_string(),
        system_prompt: persona_system_prompt(entry, &turns),
        temperature: CHAT_TEMPERATURE,
        max_tokens: CHAT_MAX_TOKENS,
    };
    complete(service, limiter, &request)
}

/// One persona's answer to a batch question
#[derive(Debug)]
pub struct ChatReply {
    /// Position of the persona in the batch
    pub position: usize,
    pub name: String,
    pub occupation: String,
    pub answer: Result<String, GenerationError>,
}

impl ChatReply {
    pub fn is_success(&self) -> bool {
        self.answer.is_ok()
    }
}

/// Put `question` to the first `max_personas` personas of `batch`.
///
/// Replies come back in batch order. A blank question asks nobody.
pub fn ask_batch(
    batch: &Batch,
    question: &str,
    max_personas: usize,
    service: &dyn CompletionService,
    limiter: &RateLimiter,
) -> Result<Vec<ChatReply>, DispatchError> {
    let question = question.trim();
    let asked = batch.personas.len().min(max_personas);
    if question.is_empty() || asked == 0 {
        return Ok(Vec::new());
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(limiter.max_per_window())
        .thread_name(|i| format!("chat-worker-{}", i))
        .build()?;

    let start = Instant::now();
    let replies = pool.install(|| {
        batch.personas[..asked]
            .par_iter()
            .with_max_len(1)
            .enumerate()
            .map(|(position, entry)| ask_one(position, entry, question, service, limiter))
            .collect::<Vec<_>>()
    });

    let answered = replies.iter().filter(|r| r.is_success()).count();
    log::info!(
        "Asked {} personas in {:?}: {} answered, {} failed",
        asked,
        start.elapsed(),
        answered,
        asked - answered
    );
    Ok(replies)
}

fn ask_one(
    position: usize,
    entry: &PersonaEntry,
    question: &str,
    service: &dyn CompletionService,
    limiter: &RateLimiter,
) -> ChatReply {
    let profile = Profile::of(&entry.persona);
    let request = CompletionRequest {
        prompt: question.to_string(),
        system_prompt: batch_system_prompt(entry, question),
        temperature: CHAT_TEMPERATURE,
        max_tokens: BATCH_MAX_TOKENS,
    };

    let answer = panic::catch_unwind(AssertUnwindSafe(|| complete(service, limiter, &request)))
        .map_err(|payload| GenerationError::Panicked(panic_message(payload.as_ref())))
        .and_then(|result| result.map_err(GenerationError::from));
    if let Err(e) = &answer {
        log::warn!("Persona {} ({}) did not answer: {}", position + 1, profile.name, e);
    }

    ChatReply {
        position,
        name: profile.name,
        occupation: profile.occupation,
        answer,
    }
}
