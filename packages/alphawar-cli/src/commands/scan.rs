use crate::cli::ScanArgs;
use crate::exit_codes;
use crate::output;
use alphawar_rs::{assign_ports, BuiltinLibrary, DeviceInfo, SessionFactory};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct ScanOutput {
    devices: Vec<DeviceInfo>,
    player1: Option<String>,
    player2: Option<String>,
}

pub fn execute(args: ScanArgs) -> i32 {
    let factory = SessionFactory::new(Arc::new(BuiltinLibrary));
    let devices = match factory.discover() {
        Ok(devices) => devices,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    let ports: Vec<String> = devices.iter().map(|d| d.port.clone()).collect();
    let [player1, player2] = assign_ports(&[None, None], [true, true], &ports);
    let result = ScanOutput {
        devices,
        player1,
        player2,
    };

    if args.json {
        return output::print_json(&result, false);
    }

    if result.devices.is_empty() {
        println!("No compatible devices found.");
        return exit_codes::SUCCESS;
    }

    println!(
        "{:<16} {:<10} {:<20} {}",
        "PORT", "VID:PID", "SERIAL", "DESCRIPTION"
    );
    println!("{}", "-".repeat(64));
    for device in &result.devices {
        println!(
            "{:<16} {:04x}:{:04x}  {:<20} {}",
            device.port,
            device.usb_id.vid,
            device.usb_id.pid,
            device.serial_number.as_deref().unwrap_or("-"),
            device.description.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!(
        "Player 1: {}",
        result.player1.as_deref().unwrap_or("unassigned")
    );
    println!(
        "Player 2: {}",
        result.player2.as_deref().unwrap_or("unassigned")
    );

    exit_codes::SUCCESS
}
