use serialport::{SerialPortInfo, SerialPortType};
use std::collections::HashSet;

/// Return a sorted list of available ports as (port_name, port_type_string).
pub fn enumerate_ports() -> Vec<(String, String)> {
    let raw = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            log::warn!("Failed to enumerate serial ports: {e}");
            Vec::new()
        }
    };
    sort_and_dedup_ports(raw)
        .into_iter()
        .map(|p| {
            let kind = describe_port_type(&p.port_type);
            (p.port_name, kind)
        })
        .collect()
}

fn describe_port_type(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(info) => {
            let mut out = format!("USB {:04x}:{:04x}", info.vid, info.pid);
            if let Some(product) = &info.product {
                out.push(' ');
                out.push_str(product);
            }
            out
        }
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::Unknown => "Unknown".to_string(),
    }
}

/// USB adapters first, then CDC-ACM, then on-board UARTs.
fn priority(name: &str) -> u8 {
    let n = name.to_lowercase();
    if n.contains("usb") {
        0
    } else if n.contains("acm") {
        1
    } else if n.contains("ttys") || n.contains("serial") || n.starts_with("com") {
        2
    } else {
        10
    }
}

pub(crate) fn sort_and_dedup_ports(raw: Vec<SerialPortInfo>) -> Vec<SerialPortInfo> {
    let mut seen = HashSet::new();
    let mut ports: Vec<SerialPortInfo> = raw
        .into_iter()
        .filter(|p| seen.insert(p.port_name.clone()))
        .collect();
    ports.sort_by(|a, b| {
        priority(&a.port_name)
            .cmp(&priority(&b.port_name))
            .then_with(|| a.port_name.cmp(&b.port_name))
    });
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(name: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::Unknown,
        }
    }

    #[test]
    fn usb_and_acm_come_first() {
        let input = vec![
            make("/dev/ttyS1"),
            make("/dev/ttyUSB0"),
            make("/dev/ttyACM0"),
            make("/dev/ttyS0"),
            make("/dev/ttyUSB0"),
        ];
        let names: Vec<_> = sort_and_dedup_ports(input)
            .into_iter()
            .map(|p| p.port_name)
            .collect();
        assert_eq!(
            names,
            vec!["/dev/ttyUSB0", "/dev/ttyACM0", "/dev/ttyS0", "/dev/ttyS1"]
        );
    }
}
