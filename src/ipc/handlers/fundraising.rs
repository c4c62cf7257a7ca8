use chrono::NaiveDate;
use serde_json::json;

use crate::calc;
use crate::ipc::error::ApiError;
use crate::ipc::helpers::{
    conn_of, optional_str, required_date, required_f64, required_str, respond, session_of, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::store::fundraising::{self, CampaignTotals};

fn totals_json(totals: &CampaignTotals) -> Result<serde_json::Value, ApiError> {
    let mut value = to_json(&totals.campaign)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("raisedAmount".to_string(), json!(totals.raised_amount));
        obj.insert(
            "progressPercent".to_string(),
            json!(calc::campaign_progress(
                totals.raised_amount,
                totals.campaign.goal_amount
            )),
        );
        obj.insert("donationCount".to_string(), json!(totals.donation_count));
    }
    Ok(value)
}

fn create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let title = required_str(params, "title")?;
    let description = optional_str(params, "description").unwrap_or_default();
    let goal_amount = required_f64(params, "goalAmount")?;
    if goal_amount <= 0.0 {
        return Err(ApiError::bad_params("goalAmount must be positive"));
    }
    let deadline = required_date(params, "deadline")?;
    let campaign = fundraising::create(
        conn,
        &title,
        &description,
        goal_amount,
        &deadline,
        &session.uid,
    )?;
    let totals = fundraising::totals_for(conn, &campaign.id)?;
    Ok(json!({ "campaign": totals_json(&totals)? }))
}

fn donate(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let session = session_of(state)?;
    let campaign_id = required_str(params, "campaignId")?;
    let amount = required_f64(params, "amount")?;
    if amount <= 0.0 {
        return Err(ApiError::bad_params("amount must be positive"));
    }

    let campaign = fundraising::get(conn, &campaign_id)?;
    let closed = NaiveDate::parse_from_str(&campaign.deadline, "%Y-%m-%d")
        .map(|deadline| deadline < chrono::Local::now().date_naive())
        .unwrap_or(false);
    if closed {
        return Err(ApiError::new(
            "conflict",
            format!("campaign closed on {}", campaign.deadline),
        ));
    }

    let totals = fundraising::donate(conn, &campaign_id, &session.uid, amount)?;
    Ok(json!({ "campaign": totals_json(&totals)? }))
}

fn list(state: &AppState) -> Result<serde_json::Value, ApiError> {
    let conn = conn_of(state)?;
    let campaigns = fundraising::list(conn)?;
    let mut out = Vec::with_capacity(campaigns.len());
    for totals in &campaigns {
        out.push(totals_json(totals)?);
    }
    Ok(json!({ "campaigns": out }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "fundraising.create" => Some(respond(&req.id, create(state, &req.params))),
        "fundraising.donate" => Some(respond(&req.id, donate(state, &req.params))),
        "fundraising.list" => Some(respond(&req.id, list(state))),
        _ => None,
    }
}
