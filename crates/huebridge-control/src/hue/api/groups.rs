use super::client::HueClient;
use super::error::HueError;
use crate::hue::models::RemoteGroup;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// V1 API structures
#[derive(Deserialize, Debug)]
struct V1Group {
    name: String,
    #[serde(default)]
    lights: Vec<String>,
    #[serde(rename = "type")]
    group_type: String,
}

#[derive(Serialize)]
struct StreamBody {
    stream: StreamAction,
}

#[derive(Serialize)]
struct StreamAction {
    active: bool,
}

fn entertainment_groups(groups: BTreeMap<String, V1Group>) -> Vec<RemoteGroup> {
    groups
        .into_iter()
        .filter(|(_, g)| g.group_type == "Entertainment")
        .map(|(id, g)| RemoteGroup {
            id,
            name: g.name,
            lights: g.lights,
        })
        .collect()
}

/// Fetches all entertainment groups (rooms) from the v1 API.
pub async fn get_entertainment_groups(client: &HueClient) -> Result<Vec<RemoteGroup>, HueError> {
    let groups: BTreeMap<String, V1Group> = client.get("groups").await?;
    Ok(entertainment_groups(groups))
}

/// Activates or deactivates streaming for an entertainment group.
/// Uses the v1 API with {"stream": {"active": true|false}}.
pub async fn set_stream_active(
    client: &HueClient,
    group_id: &str,
    active: bool,
) -> Result<(), HueError> {
    let body = StreamBody {
        stream: StreamAction { active },
    };
    client.put(&format!("groups/{}", group_id), &body).await?;
    Ok(())
}
