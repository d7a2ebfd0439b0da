//! Claim list filtering and recency ordering.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::backend::types::{ClaimStatus, ClaimThread};
use crate::sync::LastMessageInfo;

/// Search text plus an optional status, as typed in the claims screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimFilter {
  pub text: String,
  pub status: Option<ClaimStatus>,
}

impl ClaimFilter {
  pub fn is_empty(&self) -> bool {
    self.text.trim().is_empty() && self.status.is_none()
  }

  /// Case-insensitive match on order id, customer name or claim content.
  pub fn matches(&self, claim: &ClaimThread) -> bool {
    if let Some(status) = self.status {
      if claim.status != status {
        return false;
      }
    }

    let needle = self.text.trim().to_lowercase();
    if needle.is_empty() {
      return true;
    }

    let order_hit = claim
      .order_id
      .map(|id| id.to_string().contains(&needle))
      .unwrap_or(false);
    let name_hit = claim
      .public_profile
      .as_ref()
      .map(|p| {
        [&p.first_name, &p.last_name]
          .into_iter()
          .flatten()
          .any(|part| part.to_lowercase().contains(&needle))
      })
      .unwrap_or(false);
    let content_hit = claim
      .content
      .as_deref()
      .map(|c| c.to_lowercase().contains(&needle))
      .unwrap_or(false);

    order_hit || name_hit || content_hit
  }
}

/// When the claim last saw activity: its channel's last message, or the
/// claim's own creation time when the channel is silent or missing.
pub fn recency(claim: &ClaimThread, index: &HashMap<i64, LastMessageInfo>) -> DateTime<Utc> {
  claim
    .channel_id
    .and_then(|id| index.get(&id))
    .and_then(|info| info.timestamp)
    .unwrap_or(claim.created_at)
}

/// Claims passing `filter`, most recently active first.
pub fn sorted_claims<'a>(
  claims: &'a [ClaimThread],
  filter: &ClaimFilter,
  index: &HashMap<i64, LastMessageInfo>,
) -> Vec<&'a ClaimThread> {
  let mut visible: Vec<&ClaimThread> = claims.iter().filter(|c| filter.matches(c)).collect();
  visible.sort_by(|a, b| {
    recency(b, index)
      .cmp(&recency(a, index))
      .then_with(|| b.claim_id.cmp(&a.claim_id))
  });
  visible
}

/// Distinct chat channels of `claims`, for batching last-message lookups.
pub fn channel_ids(claims: &[ClaimThread]) -> Vec<i64> {
  let mut ids: Vec<i64> = claims.iter().filter_map(|c| c.channel_id).collect();
  ids.sort_unstable();
  ids.dedup();
  ids
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::types::PublicProfile;
  use crate::sync::relative_time;
  use chrono::TimeZone;

  fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 5, hour, 0, 0).unwrap()
  }

  fn claim(claim_id: i64, channel_id: Option<i64>, created_hour: u32) -> ClaimThread {
    ClaimThread {
      claim_id,
      claim_slug: None,
      order_id: Some(4400 + claim_id),
      user_id: None,
      channel_id,
      status: ClaimStatus::OpenUnprocessed,
      content: None,
      created_at: at(created_hour),
      public_profile: None,
    }
  }

  fn last(hour: u32) -> LastMessageInfo {
    LastMessageInfo {
      message: "hi".to_string(),
      relative_time: relative_time(at(12), at(hour)),
      timestamp: Some(at(hour)),
    }
  }

  #[test]
  fn test_sorted_by_last_message() {
    let claims = vec![claim(2, Some(20), 1), claim(1, Some(10), 1)];
    let index = HashMap::from([(10, last(10)), (20, last(9))]);

    let ids: Vec<i64> = sorted_claims(&claims, &ClaimFilter::default(), &index)
      .iter()
      .map(|c| c.claim_id)
      .collect();
    assert_eq!(ids, vec![1, 2]);
  }

  #[test]
  fn test_silent_channels_fall_back_to_created_at() {
    let claims = vec![
      claim(1, Some(10), 8),
      claim(2, None, 11),
      claim(3, Some(30), 2),
    ];
    let index = HashMap::from([(10, last(9)), (30, LastMessageInfo::none())]);

    let ids: Vec<i64> = sorted_claims(&claims, &ClaimFilter::default(), &index)
      .iter()
      .map(|c| c.claim_id)
      .collect();
    assert_eq!(ids, vec![2, 1, 3]);
  }

  #[test]
  fn test_filter_text_and_status() {
    let mut ada = claim(1, None, 1);
    ada.public_profile = Some(PublicProfile {
      first_name: Some("Ada".to_string()),
      last_name: Some("Lovelace".to_string()),
      avatar: None,
    });
    ada.status = ClaimStatus::Resolved;
    let mut other = claim(2, None, 1);
    other.content = Some("Parcel arrived damaged".to_string());

    let by_name = ClaimFilter {
      text: "love".to_string(),
      status: None,
    };
    assert!(by_name.matches(&ada));
    assert!(!by_name.matches(&other));

    let by_order = ClaimFilter {
      text: "4402".to_string(),
      status: None,
    };
    assert!(by_order.matches(&other));

    let by_content = ClaimFilter {
      text: "DAMAGED".to_string(),
      status: None,
    };
    assert!(by_content.matches(&other));

    let resolved_only = ClaimFilter {
      text: String::new(),
      status: Some(ClaimStatus::Resolved),
    };
    assert!(resolved_only.matches(&ada));
    assert!(!resolved_only.matches(&other));
  }

  #[test]
  fn test_channel_ids_distinct() {
    let claims = vec![claim(1, Some(5), 1), claim(2, None, 1), claim(3, Some(5), 1), claim(4, Some(2), 1)];
    assert_eq!(channel_ids(&claims), vec![2, 5]);
  }
}
