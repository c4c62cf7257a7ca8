use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::{new_id, now_rfc3339, StoreError, StoreResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub goal_amount: f64,
    pub deadline: String,
    pub created_by: String,
    pub created_at: String,
}

pub struct CampaignTotals {
    pub campaign: CampaignRecord,
    pub raised_amount: f64,
    pub donation_count: i64,
}

const CAMPAIGN_SELECT: &str = "SELECT
    id, title, description, goal_amount, deadline, created_by, created_at
FROM fundraising_campaigns";

fn row_to_campaign(r: &rusqlite::Row<'_>) -> rusqlite::Result<CampaignRecord> {
    Ok(CampaignRecord {
        id: r.get(0)?,
        title: r.get(1)?,
        description: r.get(2)?,
        goal_amount: r.get(3)?,
        deadline: r.get(4)?,
        created_by: r.get(5)?,
        created_at: r.get(6)?,
    })
}

pub fn get(conn: &Connection, id: &str) -> StoreResult<CampaignRecord> {
    let sql = format!("{CAMPAIGN_SELECT} WHERE id = ?");
    conn.query_row(&sql, [id], row_to_campaign)
        .optional()?
        .ok_or(StoreError::NotFound("campaign"))
}

pub fn create(
    conn: &Connection,
    title: &str,
    description: &str,
    goal_amount: f64,
    deadline: &str,
    created_by: &str,
) -> StoreResult<CampaignRecord> {
    let id = new_id();
    conn.execute(
        "INSERT INTO fundraising_campaigns(id, title, description, goal_amount, deadline, created_by, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![id, title, description, goal_amount, deadline, created_by, now_rfc3339()],
    )?;
    get(conn, &id)
}

pub fn donate(
    conn: &Connection,
    campaign_id: &str,
    donor_uid: &str,
    amount: f64,
) -> StoreResult<CampaignTotals> {
    get(conn, campaign_id)?;
    conn.execute(
        "INSERT INTO donations(id, campaign_id, donor_uid, amount, created_at)
         VALUES(?, ?, ?, ?, ?)",
        params![new_id(), campaign_id, donor_uid, amount, now_rfc3339()],
    )?;
    totals_for(conn, campaign_id)
}

pub fn totals_for(conn: &Connection, campaign_id: &str) -> StoreResult<CampaignTotals> {
    let campaign = get(conn, campaign_id)?;
    let (raised_amount, donation_count): (f64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0), COUNT(*) FROM donations WHERE campaign_id = ?",
        [campaign_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(CampaignTotals {
        campaign,
        raised_amount,
        donation_count,
    })
}

pub fn list(conn: &Connection) -> StoreResult<Vec<CampaignTotals>> {
    let sql = format!("{CAMPAIGN_SELECT} ORDER BY deadline, id");
    let mut stmt = conn.prepare(&sql)?;
    let campaigns = stmt
        .query_map([], row_to_campaign)?
        .collect::<Result<Vec<_>, _>>()?;
    let mut out = Vec::with_capacity(campaigns.len());
    for campaign in campaigns {
        let (raised_amount, donation_count): (f64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0), COUNT(*) FROM donations WHERE campaign_id = ?",
            [&campaign.id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        out.push(CampaignTotals {
            campaign,
            raised_amount,
            donation_count,
        });
    }
    Ok(out)
}
