//! Points ledger models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Why a ledger entry was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointsType {
    Workout,
    Challenge,
    Invite,
    /// Points redeemed in a store sale (debits)
    Sale,
    Review,
    Bonus,
}

impl PointsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointsType::Workout => "WORKOUT",
            PointsType::Challenge => "CHALLENGE",
            PointsType::Invite => "INVITE",
            PointsType::Sale => "SALE",
            PointsType::Review => "REVIEW",
            PointsType::Bonus => "BONUS",
        }
    }
}

impl std::fmt::Display for PointsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PointsType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "WORKOUT" => Ok(PointsType::Workout),
            "CHALLENGE" => Ok(PointsType::Challenge),
            "INVITE" => Ok(PointsType::Invite),
            "SALE" => Ok(PointsType::Sale),
            "REVIEW" => Ok(PointsType::Review),
            "BONUS" => Ok(PointsType::Bonus),
            _ => Err(format!("Unknown points type: {}", s)),
        }
    }
}

/// Immutable ledger entry. Positive for awards, negative for spending.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PointsHistoryEntry {
    pub id: i64,
    pub user_id: String,
    pub points: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub entry_type: String,
    pub description: String,
    pub reference: Option<String>,
    pub created_at: String,
}

/// Result of a ledger write: the appended entry and the balance after it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerUpdate {
    pub entry: PointsHistoryEntry,
    pub balance: i64,
    pub level: String,
}

/// One page of a member's history, newest first
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub items: Vec<PointsHistoryEntry>,
    /// Pass back as `cursor` to fetch the next page
    pub next_cursor: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user_id: String,
    pub points: i64,
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub cursor: Option<i64>,
}

/// Admin request to award points to a member
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPointsRequest {
    pub user_id: String,
    pub points: i64,
    #[serde(rename = "type")]
    pub points_type: PointsType,
    pub description: String,
    pub reference: Option<String>,
}

/// Member request to spend their own points
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendPointsRequest {
    pub points: i64,
    pub description: String,
    pub reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_type_roundtrip() {
        for t in [
            PointsType::Workout,
            PointsType::Challenge,
            PointsType::Invite,
            PointsType::Sale,
            PointsType::Review,
            PointsType::Bonus,
        ] {
            assert_eq!(t.as_str().parse::<PointsType>(), Ok(t));
        }
        assert_eq!("bonus".parse::<PointsType>(), Ok(PointsType::Bonus));
        assert!("REFUND".parse::<PointsType>().is_err());
    }

    #[test]
    fn test_add_points_request_deserializes_type() {
        let req: AddPointsRequest = serde_json::from_str(
            r#"{"userId":"u1","points":50,"type":"CHALLENGE","description":"Spring challenge"}"#,
        )
        .unwrap();
        assert_eq!(req.points_type, PointsType::Challenge);
        assert!(req.reference.is_none());
    }
}
