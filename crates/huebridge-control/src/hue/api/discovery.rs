use super::error::HueError;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone)]
pub struct DiscoveredBridge {
    #[serde(rename = "internalipaddress")]
    pub ip: String,
    pub id: String,
    /// Bridge name, filled in for reachable bridges
    #[serde(skip)]
    pub name: Option<String>,
}

#[derive(Deserialize)]
struct PublicConfig {
    name: String,
}

/// Discover Hue Bridges using the meethue.com N-UPnP API
/// Returns all discovered bridges, reachable ones first
pub async fn discover_bridges() -> Result<Vec<DiscoveredBridge>, HueError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(HueError::Network)?;

    let resp = client.get("https://discovery.meethue.com").send().await?;

    let devices: Vec<DiscoveredBridge> = resp.json().await?;

    if devices.is_empty() {
        return Err(HueError::DiscoveryFailed);
    }

    let mut reachable = Vec::new();
    let mut unreachable = Vec::new();

    for mut device in devices {
        match bridge_name(&device.ip).await {
            Some(name) => {
                device.name = Some(name);
                reachable.push(device);
            }
            None => unreachable.push(device),
        }
    }

    reachable.extend(unreachable);
    Ok(reachable)
}

/// Fetch the bridge name from its public config, `None` if unreachable
async fn bridge_name(ip: &str) -> Option<String> {
    let client = Client::builder()
        .timeout(Duration::from_secs(3))
        .danger_accept_invalid_certs(true)
        .build()
        .ok()?;

    let url = format!("https://{}/api/0/config", ip);
    let config: PublicConfig = client.get(&url).send().await.ok()?.json().await.ok()?;
    Some(config.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_discovery_response() {
        let json = json!([
            { "id": "001788fffe100491", "internalipaddress": "192.168.2.23", "port": 443 }
        ]);
        let bridges: Vec<DiscoveredBridge> = serde_json::from_value(json).unwrap();
        assert_eq!(bridges.len(), 1);
        assert_eq!(bridges[0].ip, "192.168.2.23");
        assert!(bridges[0].name.is_none());
    }
}
