use super::client::HueClient;
use super::error::HueError;
use crate::hue::models::LightInfo;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Deserialize, Debug)]
struct V1Light {
    name: String,
}

fn sorted_lights(lights: BTreeMap<String, V1Light>) -> Vec<LightInfo> {
    let mut result: Vec<LightInfo> = lights
        .into_iter()
        .map(|(id, l)| LightInfo { id, name: l.name })
        .collect();
    // Numeric order, so "10" comes after "9"
    result.sort_by_key(|l| (l.id.parse::<u32>().unwrap_or(u32::MAX), l.id.clone()));
    result
}

/// Lists every light known to the bridge
pub async fn get_all_lights(client: &HueClient) -> Result<Vec<LightInfo>, HueError> {
    let lights: BTreeMap<String, V1Light> = client.get("lights").await?;
    Ok(sorted_lights(lights))
}

/// Flash a light once (for identifying it)
pub async fn flash_light(client: &HueClient, light_id: &str) -> Result<(), HueError> {
    client
        .put(
            &format!("lights/{}/state", light_id),
            &json!({ "alert": "select" }),
        )
        .await?;
    Ok(())
}

/// Rename a light
pub async fn rename_light(client: &HueClient, light_id: &str, name: &str) -> Result<(), HueError> {
    client
        .put(&format!("lights/{}", light_id), &json!({ "name": name }))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lights_sorted_numerically() {
        let json = json!({
            "10": { "name": "Spot", "type": "Extended color light" },
            "2": { "name": "Strip", "type": "Color light" },
            "9": { "name": "Bulb", "type": "Extended color light" }
        });
        let lights: BTreeMap<String, V1Light> = serde_json::from_value(json).unwrap();
        let ids: Vec<String> = sorted_lights(lights).into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["2", "9", "10"]);
    }
}
