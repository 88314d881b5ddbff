//! Data models for decks and cards

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named collection of cards owned by its creator.
///
/// Decks carry no study statistics; those live in per-user progress records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub creator_id: Uuid,
    /// Card ids in study order
    #[serde(default)]
    pub card_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deck {
    pub fn new(creator_id: Uuid, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description: None,
            creator_id,
            card_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Type of card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardType {
    /// Free-form question and answer
    Basic,
    /// Answer must be one of the options
    MultipleChoice,
    /// Answer is "true" or "false"
    TrueFalse,
}

impl Default for CardType {
    fn default() -> Self {
        Self::Basic
    }
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::MultipleChoice => "multipleChoice",
            Self::TrueFalse => "trueFalse",
        }
    }
}

impl std::str::FromStr for CardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "multipleChoice" => Ok(Self::MultipleChoice),
            "trueFalse" => Ok(Self::TrueFalse),
            other => Err(format!("Unknown card type: {}", other)),
        }
    }
}

/// Metadata of an image attached to a card. The image itself is hosted
/// elsewhere; only its location and description are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardImage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// A single study unit belonging to a deck
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Uuid,
    pub deck_id: Uuid,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub card_type: CardType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<CardImage>,
    #[serde(default)]
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn new(deck_id: Uuid, content: CardContent) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            deck_id,
            question: content.question,
            answer: content.answer,
            card_type: content.card_type,
            options: content.options,
            image: content.image,
            position: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Deck together with its cards in study order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckWithCards {
    pub deck: Deck,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeckRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeckRequest {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDeckRequest {
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderCardsRequest {
    pub card_ids: Vec<Uuid>,
}

/// Card fields as submitted by a client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardContent {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub card_type: CardType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub image: Option<CardImage>,
}

/// Partial card update; missing fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCardRequest {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub card_type: Option<CardType>,
    pub options: Option<Vec<String>>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub image: Option<Option<CardImage>>,
}

impl UpdateCardRequest {
    /// Merge onto the existing card's content.
    pub fn apply_to(self, card: &Card) -> CardContent {
        CardContent {
            question: self.question.unwrap_or_else(|| card.question.clone()),
            answer: self.answer.unwrap_or_else(|| card.answer.clone()),
            card_type: self.card_type.unwrap_or(card.card_type),
            options: self.options.unwrap_or_else(|| card.options.clone()),
            image: self.image.unwrap_or_else(|| card.image.clone()),
        }
    }
}

const MAX_OPTIONS: usize = 8;
const MAX_TEXT_LEN: usize = 4000;

/// Validate a deck name and return its trimmed form.
pub fn validate_deck_name(name: &str) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err("Deck name must be 1-100 characters".to_string());
    }
    Ok(name.to_string())
}

impl CardContent {
    /// Check the content against its card type and normalize it.
    ///
    /// Multiple-choice answers must match one of 2-8 distinct options;
    /// true/false cards get the fixed option pair and a lowercase answer.
    pub fn validate(mut self, max_image_bytes: u64) -> Result<Self, String> {
        self.question = self.question.trim().to_string();
        self.answer = self.answer.trim().to_string();

        if self.question.is_empty() {
            return Err("Question must not be empty".to_string());
        }
        if self.answer.is_empty() {
            return Err("Answer must not be empty".to_string());
        }
        if self.question.len() > MAX_TEXT_LEN || self.answer.len() > MAX_TEXT_LEN {
            return Err(format!("Question and answer are limited to {} bytes", MAX_TEXT_LEN));
        }

        match self.card_type {
            CardType::Basic => {
                if !self.options.is_empty() {
                    return Err("Basic cards do not take options".to_string());
                }
            }
            CardType::MultipleChoice => {
                let options: Vec<String> = self.options.iter().map(|o| o.trim().to_string()).collect();
                if options.len() < 2 || options.len() > MAX_OPTIONS {
                    return Err(format!("Multiple choice cards need 2-{} options", MAX_OPTIONS));
                }
                if options.iter().any(|o| o.is_empty()) {
                    return Err("Options must not be empty".to_string());
                }
                for (i, option) in options.iter().enumerate() {
                    if options[..i].contains(option) {
                        return Err(format!("Duplicate option: {}", option));
                    }
                }
                if !options.contains(&self.answer) {
                    return Err("Answer must be one of the options".to_string());
                }
                self.options = options;
            }
            CardType::TrueFalse => {
                let answer = self.answer.to_lowercase();
                if answer != "true" && answer != "false" {
                    return Err("True/false answers must be 'true' or 'false'".to_string());
                }
                self.answer = answer;
                self.options = vec!["true".to_string(), "false".to_string()];
            }
        }

        if let Some(image) = &self.image {
            if image.url.trim().is_empty() {
                return Err("Image url must not be empty".to_string());
            }
            if let Some(mime) = &image.mime_type {
                if !mime.starts_with("image/") {
                    return Err(format!("Unsupported image type: {}", mime));
                }
            }
            if image.size_bytes.map_or(false, |size| size > max_image_bytes) {
                return Err(format!("Images are limited to {} bytes", max_image_bytes));
            }
        }

        Ok(self)
    }
}
