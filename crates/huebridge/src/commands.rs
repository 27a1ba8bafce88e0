//! Administrative subcommands (everything except `run`)

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use huebridge_control::hue::api::{discovery, groups, lights, HueClient, HueError};
use huebridge_control::hue::{LightInfo, RemoteGroup};

use crate::config::Config;

/// Application name registered on the bridge
const DEVICE_TYPE: &str = "artnet-hue-entertainment#cli";

/// Gap between lights when pinging all of them
const PING_ALL_GAP: Duration = Duration::from_millis(1500);

fn client(config: &Config) -> Result<HueClient> {
    let hue = config.hue_config()?;
    HueClient::new(&hue).context("Failed to create Hue API client")
}

pub async fn discover() -> Result<()> {
    println!("Discovering bridges...");
    let bridges = match discovery::discover_bridges().await {
        Ok(bridges) => bridges,
        Err(HueError::DiscoveryFailed) => {
            println!("No bridges found.");
            return Ok(());
        }
        Err(e) => return Err(e).context("Bridge discovery failed"),
    };

    println!("Found bridges:");
    for bridge in &bridges {
        match &bridge.name {
            Some(name) => println!(" - {}: {}", bridge.ip, name),
            None => println!(" - {}: (unreachable, id {})", bridge.ip, bridge.id),
        }
    }
    println!();
    println!("To use any of these bridges, press the link button on the bridge and run:");
    println!("$ artnet-hue-entertainment pair --ip <ip address>");
    Ok(())
}

pub async fn pair(config_path: &Path, mut config: Config, ip: &str) -> Result<()> {
    info!("Pairing with Hue bridge at {}", ip);
    let credentials = HueClient::register_user(ip, DEVICE_TYPE)
        .await
        .context("Error while pairing")?;

    config.apply_pairing(credentials);
    config.save(config_path)?;
    println!("Hue setup was successful! Credentials are saved. You can run the server now.");
    Ok(())
}

pub async fn list_rooms(config: &Config) -> Result<()> {
    let client = client(config)?;
    let rooms = groups::get_entertainment_groups(&client)
        .await
        .context("Failed to list entertainment rooms")?;

    println!("Available entertainment rooms:");
    for room in &rooms {
        println!("{}", format_room(room));
    }
    Ok(())
}

pub async fn list_lights(config: &Config) -> Result<()> {
    let client = client(config)?;
    let all = lights::get_all_lights(&client)
        .await
        .context("Failed to list lights")?;

    println!("Available lights:");
    for light in &all {
        println!(" - Light {}: {}", light.id, light.name);
    }
    Ok(())
}

/// Flash one light, or every light one after another for `"all"`.
pub async fn ping_light(config: &Config, id: &str) -> Result<()> {
    let client = client(config)?;

    if id != "all" {
        lights::flash_light(&client, id)
            .await
            .context("Error while pinging light")?;
        println!("Light {} pinged.", id);
        return Ok(());
    }

    let all = lights::get_all_lights(&client)
        .await
        .context("Failed to list lights")?;
    for light in &all {
        lights::flash_light(&client, &light.id)
            .await
            .context("Error while pinging light")?;
        println!("Light {} pinged.", light.id);
        tokio::time::sleep(PING_ALL_GAP).await;
    }
    Ok(())
}

pub async fn rename_lights_after_id(config: &Config) -> Result<()> {
    let client = client(config)?;
    let all = lights::get_all_lights(&client)
        .await
        .context("Failed to list lights")?;

    for light in &all {
        let Some(name) = new_name(light) else {
            println!("Light {} already has the correct name.", light.id);
            continue;
        };
        println!("Renaming light {} to {}", light.name, name);
        if let Err(e) = lights::rename_light(&client, &light.id, &name).await {
            warn!("Failed to rename light {}: {}", light.id, e);
        }
    }
    Ok(())
}

fn format_room(room: &RemoteGroup) -> String {
    format!(
        " - Room {}: {} (Lights: {})",
        room.id,
        room.name,
        room.lights.join(", ")
    )
}

/// `Light <id>`, or `None` if the light is already named that way
fn new_name(light: &LightInfo) -> Option<String> {
    let name = format!("Light {}", light.id);
    (light.name != name).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_room() {
        let room = RemoteGroup {
            id: "200".to_string(),
            name: "Stage".to_string(),
            lights: vec!["1".to_string(), "4".to_string()],
        };
        assert_eq!(format_room(&room), " - Room 200: Stage (Lights: 1, 4)");
    }

    #[test]
    fn test_rename_skips_lights_named_after_id() {
        let named = LightInfo {
            id: "3".to_string(),
            name: "Light 3".to_string(),
        };
        let unnamed = LightInfo {
            id: "4".to_string(),
            name: "Hue color lamp 1".to_string(),
        };
        assert_eq!(new_name(&named), None);
        assert_eq!(new_name(&unnamed), Some("Light 4".to_string()));
    }
}
