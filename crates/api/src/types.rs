//! Data Transfer Objects matching the backend's wire schema.
//!
//! Field names use `camelCase` on the wire and `snake_case` in Rust code
//! via `#[serde(rename_all = "camelCase")]`.  Wire shapes are owned by the
//! backend; every optional field tolerates absence with `#[serde(default)]`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pl_domain::chat::{
    Attachment, Conversation, ConversationKind, Entity, MemoryItem, Message, Role,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// `"normal"` or `"multi_entity"`.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConversationDto> for Conversation {
    fn from(dto: ConversationDto) -> Self {
        let kind = match dto.kind.as_deref() {
            Some("multi_entity") => ConversationKind::MultiEntity,
            _ => ConversationKind::Normal,
        };
        Conversation {
            id: dto.id,
            title: dto.title,
            kind,
            participants: dto.participants,
            archived: dto.archived,
            created_at: dto.created_at,
            updated_at: dto.updated_at,
        }
    }
}

/// GET /api/conversations — response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListDto {
    pub conversations: Vec<ConversationDto>,
    #[serde(default)]
    pub count: u32,
}

/// GET /api/conversations/{id} — response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetailDto {
    pub conversation: ConversationDto,
    #[serde(default)]
    pub messages: Vec<MessageDto>,
}

/// POST /api/conversations — request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub kind: String,
    /// Participant entity ids; ≥2 entries for multi-entity conversations,
    /// exactly one for normal ones.
    pub participants: Vec<String>,
}

/// PATCH /api/conversations/{id} — request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConversationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    #[serde(default)]
    pub id: Option<String>,
    /// `"human"` or `"assistant"`.
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub incomplete: bool,
    pub created_at: DateTime<Utc>,
}

impl From<MessageDto> for Message {
    fn from(dto: MessageDto) -> Self {
        let role = match dto.role.as_str() {
            "assistant" => Role::Assistant,
            _ => Role::Human,
        };
        Message {
            id: dto.id,
            role,
            content: dto.content,
            entity_id: dto.entity_id,
            incomplete: dto.incomplete,
            created_at: dto.created_at,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entities & chat configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDto {
    pub id: String,
    pub label: String,
    pub provider: String,
    pub default_model: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl From<EntityDto> for Entity {
    fn from(dto: EntityDto) -> Self {
        Entity {
            id: dto.id,
            label: dto.label,
            provider: dto.provider,
            default_model: dto.default_model,
            system_prompt: dto.system_prompt,
        }
    }
}

/// GET /api/entities — response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityListDto {
    pub entities: Vec<EntityDto>,
}

/// GET /api/chat/config — response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfigDto {
    #[serde(default)]
    pub providers: Vec<ProviderModelsDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderModelsDto {
    pub provider: String,
    #[serde(default)]
    pub models: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memories
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryDto {
    pub id: String,
    #[serde(default)]
    pub role: Option<String>,
    pub content: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub retrieval_count: u32,
    #[serde(default)]
    pub entity_id: Option<String>,
}

impl From<MemoryDto> for MemoryItem {
    fn from(dto: MemoryDto) -> Self {
        MemoryItem {
            id: dto.id,
            role: dto.role.unwrap_or_default(),
            content: dto.content,
            score: dto.score,
            retrieval_count: dto.retrieval_count,
            entity_id: dto.entity_id,
        }
    }
}

/// GET /api/memories and /api/memories/search — response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryListDto {
    pub memories: Vec<MemoryDto>,
    #[serde(default)]
    pub count: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming send / regenerate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// POST /api/chat/send — request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub conversation_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentDto>,
    /// Responding entity, required by the backend in multi-entity
    /// conversations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responder_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// POST /api/chat/continue — request body.
///
/// A continuation turn: another responder replies to the same user
/// message, so no content is carried.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueRequest {
    pub conversation_id: String,
    pub responder_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// POST /api/chat/regenerate — request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateRequest {
    pub conversation_id: String,
    /// The user message whose reply is being regenerated.
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responder_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDto {
    pub name: String,
    pub media_type: String,
    pub data: String,
}

impl From<&Attachment> for AttachmentDto {
    fn from(a: &Attachment) -> Self {
        AttachmentDto {
            name: a.name.clone(),
            media_type: a.media_type.clone(),
            data: a.data.clone(),
        }
    }
}
