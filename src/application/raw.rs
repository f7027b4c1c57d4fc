//! Raw remote message shapes and their adaptation into export records.
//!
//! Field names follow the TL schema as the gateway renders it to JSON
//! (`_` carries the constructor name for entities).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ExportRecord, MediaKind, TextEntity};

/// A message as returned by `messages.getHistory`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: i64,
    /// Marked peer id of the chat the message belongs to.
    pub peer_id: i64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub from_id: Option<i64>,
    #[serde(default)]
    pub sender: Option<RawSender>,
    #[serde(default)]
    pub reply_to: Option<RawReplyHeader>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub entities: Vec<RawEntity>,
    #[serde(default)]
    pub media: Option<RawMedia>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSender {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReplyHeader {
    #[serde(default)]
    pub reply_to_msg_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntity {
    #[serde(rename = "_")]
    pub kind: String,
    pub offset: i32,
    pub length: i32,
    #[serde(default)]
    pub url: Option<String>,
}

/// Media slots; more than one may be filled for the same message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMedia {
    #[serde(default)]
    pub photo: Option<RawFile>,
    #[serde(default)]
    pub video: Option<RawFile>,
    #[serde(default)]
    pub document: Option<RawFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFile {
    pub id: i64,
}

impl RawMessage {
    /// Adapts the raw message into the log's record shape.
    #[must_use]
    pub fn into_record(self) -> ExportRecord {
        let (media_type, media_file_id) = self
            .media
            .as_ref()
            .and_then(classify_media)
            .map_or((None, None), |(kind, id)| (Some(kind), Some(id)));

        let sender_username = self
            .sender
            .as_ref()
            .and_then(|s| s.username.clone())
            .filter(|name| !name.is_empty());

        ExportRecord {
            msg_id: self.id,
            chat_id: self.peer_id,
            date: self.date,
            sender_id: self.from_id.or_else(|| self.sender.as_ref().map(|s| s.id)),
            sender_username,
            reply_to: self.reply_to.and_then(|r| r.reply_to_msg_id),
            text: self.message,
            entities: self.entities.iter().filter_map(convert_entity).collect(),
            media_type,
            media_file_id,
        }
    }
}

/// Photo, then video, then document; first match wins.
fn classify_media(media: &RawMedia) -> Option<(MediaKind, String)> {
    if let Some(photo) = &media.photo {
        return Some((MediaKind::Photo, photo.id.to_string()));
    }
    if let Some(video) = &media.video {
        return Some((MediaKind::Video, video.id.to_string()));
    }
    media
        .document
        .as_ref()
        .map(|doc| (MediaKind::Doc, doc.id.to_string()))
}

/// Maps the recognized entity kinds; everything else is dropped.
fn convert_entity(raw: &RawEntity) -> Option<TextEntity> {
    let (offset, length) = (raw.offset, raw.length);

    let entity = match raw.kind.as_str() {
        "messageEntityBold" => TextEntity::Bold { offset, length },
        "messageEntityItalic" => TextEntity::Italic { offset, length },
        "messageEntityCode" => TextEntity::Code { offset, length },
        "messageEntityPre" => TextEntity::Pre { offset, length },
        "messageEntityTextUrl" => match &raw.url {
            Some(url) => TextEntity::TextUrl {
                offset,
                length,
                url: url.clone(),
            },
            None => {
                tracing::debug!(offset, length, "Dropping text_url entity without url");
                return None;
            }
        },
        other => {
            tracing::trace!(kind = other, "Dropping unsupported entity");
            return None;
        }
    };

    Some(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(id: i64) -> RawMessage {
        RawMessage {
            id,
            peer_id: -100_777,
            date: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            from_id: Some(11),
            sender: Some(RawSender {
                id: 11,
                username: Some("bob".into()),
            }),
            reply_to: None,
            message: "hi".into(),
            entities: Vec::new(),
            media: None,
        }
    }

    fn entity(kind: &str) -> RawEntity {
        RawEntity {
            kind: kind.into(),
            offset: 1,
            length: 2,
            url: None,
        }
    }

    #[test]
    fn test_basic_fields() {
        let mut message = raw(9);
        message.reply_to = Some(RawReplyHeader {
            reply_to_msg_id: Some(3),
        });

        let record = message.into_record();
        assert_eq!(record.msg_id, 9);
        assert_eq!(record.chat_id, -100_777);
        assert_eq!(record.sender_id, Some(11));
        assert_eq!(record.sender_username.as_deref(), Some("bob"));
        assert_eq!(record.reply_to, Some(3));
        assert_eq!(record.text, "hi");
        assert!(record.media_type.is_none());
        assert!(record.media_file_id.is_none());
    }

    #[test]
    fn test_media_priority_photo_first() {
        let mut message = raw(1);
        message.media = Some(RawMedia {
            photo: Some(RawFile { id: 10 }),
            video: Some(RawFile { id: 20 }),
            document: Some(RawFile { id: 30 }),
        });

        let record = message.into_record();
        assert_eq!(record.media_type, Some(MediaKind::Photo));
        assert_eq!(record.media_file_id.as_deref(), Some("10"));
    }

    #[test]
    fn test_media_priority_video_over_document() {
        let mut message = raw(1);
        message.media = Some(RawMedia {
            photo: None,
            video: Some(RawFile { id: 20 }),
            document: Some(RawFile { id: 30 }),
        });

        let record = message.into_record();
        assert_eq!(record.media_type, Some(MediaKind::Video));
        assert_eq!(record.media_file_id.as_deref(), Some("20"));
    }

    #[test]
    fn test_document_only() {
        let mut message = raw(1);
        message.media = Some(RawMedia {
            document: Some(RawFile { id: 30 }),
            ..RawMedia::default()
        });
        assert_eq!(message.into_record().media_type, Some(MediaKind::Doc));
    }

    #[test]
    fn test_unknown_entity_dropped() {
        let mut message = raw(1);
        message.entities = vec![
            entity("messageEntityBold"),
            entity("messageEntityMentionName"),
            entity("messageEntitySpoiler"),
            RawEntity {
                url: Some("https://rust-lang.org".into()),
                ..entity("messageEntityTextUrl")
            },
        ];

        let record = message.into_record();
        assert_eq!(
            record.entities,
            vec![
                TextEntity::Bold {
                    offset: 1,
                    length: 2
                },
                TextEntity::TextUrl {
                    offset: 1,
                    length: 2,
                    url: "https://rust-lang.org".into()
                },
            ]
        );
    }

    #[test]
    fn test_missing_username_is_null() {
        let mut message = raw(1);
        message.sender = Some(RawSender {
            id: 11,
            username: None,
        });
        assert!(message.clone().into_record().sender_username.is_none());

        message.sender = None;
        message.from_id = None;
        let record = message.into_record();
        assert!(record.sender_username.is_none());
        assert!(record.sender_id.is_none());
    }

    #[test]
    fn test_deserialize_gateway_json() {
        let json = r#"{
            "id": 5,
            "peer_id": -1001,
            "date": 1714557600,
            "message": "hello",
            "entities": [{"_": "messageEntityItalic", "offset": 0, "length": 5}],
            "media": {"photo": {"id": 77}}
        }"#;
        let message: RawMessage = serde_json::from_str(json).unwrap();
        let record = message.into_record();
        assert_eq!(record.date, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        assert_eq!(record.media_type, Some(MediaKind::Photo));
        assert_eq!(record.entities.len(), 1);
    }
}
