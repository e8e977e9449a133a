use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, SupportedStreamConfig};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

// Looks a device up by name, or falls back to the host default.
pub fn get_or_default_input(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    match device_name {
        None => host
            .default_input_device()
            .context("No default input device"),
        Some(target) => host
            .input_devices()
            .context("Failed to enumerate input devices")?
            .find(|device| device.name().is_ok_and(|name| name == target))
            .with_context(|| format!("No input device named {target:?}")),
    }
}

// Same as the input lookup, for output devices.
pub fn get_or_default_output(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    match device_name {
        None => host
            .default_output_device()
            .context("No default output device"),
        Some(target) => host
            .output_devices()
            .context("Failed to enumerate output devices")?
            .find(|device| device.name().is_ok_and(|name| name == target))
            .with_context(|| format!("No output device named {target:?}")),
    }
}

fn describe(
    device: &Device,
    config: Result<SupportedStreamConfig, cpal::DefaultStreamConfigError>,
    default_name: Option<&str>,
) -> Option<String> {
    let name = device.name().ok()?;
    let mut line = match config {
        Ok(config) => format!(
            " * {}({}ch, {}hz)",
            name,
            config.channels(),
            config.sample_rate().0
        ),
        Err(_) => format!(" * {} (no default config)", name),
    };
    if default_name == Some(name.as_str()) {
        line.push_str(" [default]");
    }
    Some(line)
}

/// One line per input device with its default channel count and rate.
pub fn get_available_inputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }
    let host = get_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let lines: Vec<String> = host
        .input_devices()
        .context("Failed to enumerate input devices")?
        .filter_map(|device| {
            let config = device.default_input_config();
            describe(&device, config, default_name.as_deref())
        })
        .collect();
    Ok(lines.join("\n"))
}

/// One line per output device with its default channel count and rate.
pub fn get_available_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    let lines: Vec<String> = host
        .output_devices()
        .context("Failed to enumerate output devices")?
        .filter_map(|device| {
            let config = device.default_output_config();
            describe(&device, config, default_name.as_deref())
        })
        .collect();
    Ok(lines.join("\n"))
}
