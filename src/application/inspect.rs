//! Summary statistics over an export log.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{ExportRecord, MediaKind};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogInspection {
    pub records: usize,
    pub min_id: Option<i64>,
    pub max_id: Option<i64>,
    pub first_date: Option<DateTime<Utc>>,
    pub last_date: Option<DateTime<Utc>>,
    pub senders: usize,
    pub replies: usize,
    pub photos: usize,
    pub videos: usize,
    pub documents: usize,
    /// Whether ids follow the newest-first then oldest-first layout without repeats.
    pub ordered: bool,
}

impl LogInspection {
    #[must_use]
    pub fn from_records(records: &[ExportRecord]) -> Self {
        let mut inspection = Self {
            records: records.len(),
            ordered: is_monotonic(records),
            ..Self::default()
        };
        let mut senders = HashSet::new();

        for record in records {
            inspection.min_id = Some(inspection.min_id.map_or(record.msg_id, |m| m.min(record.msg_id)));
            inspection.max_id = Some(inspection.max_id.map_or(record.msg_id, |m| m.max(record.msg_id)));
            inspection.first_date = Some(inspection.first_date.map_or(record.date, |d| d.min(record.date)));
            inspection.last_date = Some(inspection.last_date.map_or(record.date, |d| d.max(record.date)));

            if let Some(sender) = record.sender_id {
                senders.insert(sender);
            }
            if record.reply_to.is_some() {
                inspection.replies += 1;
            }
            match record.media_type {
                Some(MediaKind::Photo) => inspection.photos += 1,
                Some(MediaKind::Video) => inspection.videos += 1,
                Some(MediaKind::Doc) => inspection.documents += 1,
                None => {}
            }
        }

        inspection.senders = senders.len();
        inspection
    }
}

/// Fresh passes write newest-first and resumed passes oldest-first, so a log
/// is either one run or a descending run followed by an ascending one.
fn is_monotonic(records: &[ExportRecord]) -> bool {
    let ids: Vec<i64> = records.iter().map(|r| r.msg_id).collect();
    let descending_end = ids.windows(2).take_while(|w| w[0] > w[1]).count() + 1;
    let head_max = ids.first().copied();

    ids.get(descending_end.min(ids.len())..)
        .unwrap_or_default()
        .iter()
        .try_fold(head_max, |prev, &id| match prev {
            Some(p) if id <= p => None,
            _ => Some(Some(id)),
        })
        .is_some()
}
