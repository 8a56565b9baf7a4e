//! Host capability detection for the `check` report.
//!
//! A proctored sitting needs a camera, a microphone, and a graphical session
//! that can hold fullscreen. These checks look at the machine the CLI runs
//! on; they do not open any device.

use std::path::Path;

/// A host capability a proctored exam may need.
#[derive(Debug, Clone)]
pub struct Capability {
    pub name: &'static str,
    pub description: &'static str,
    pub available: bool,
    pub required: bool,
    pub fix_instructions: Option<&'static str>,
}

/// Check all capabilities.
pub fn check_capabilities() -> Vec<Capability> {
    let capabilities = vec![check_camera(), check_microphone(), check_display()];
    for cap in &capabilities {
        tracing::debug!(name = cap.name, available = cap.available, "Capability checked");
    }
    capabilities
}

/// Whether every required capability is present.
pub fn all_required_available(capabilities: &[Capability]) -> bool {
    capabilities
        .iter()
        .filter(|c| c.required)
        .all(|c| c.available)
}

fn check_camera() -> Capability {
    let available = (0..16).any(|idx| Path::new(&format!("/dev/video{idx}")).exists());
    Capability {
        name: "Camera",
        description: "Video device for proctoring",
        available,
        required: true,
        fix_instructions: (!available)
            .then_some("Connect a webcam and verify /dev/video* exists (v4l2-ctl --list-devices)"),
    }
}

fn check_microphone() -> Capability {
    let available = Path::new("/dev/snd").exists();
    Capability {
        name: "Microphone",
        description: "Audio capture for proctoring",
        available,
        required: false,
        fix_instructions: (!available).then_some("Connect a microphone or enable the sound card"),
    }
}

fn check_display() -> Capability {
    let available = std::env::var("WAYLAND_DISPLAY").is_ok() || std::env::var("DISPLAY").is_ok();
    Capability {
        name: "Graphical Session",
        description: "Display server able to hold the exam in fullscreen",
        available,
        required: true,
        fix_instructions: (!available)
            .then_some("Run the exam from a graphical desktop session (GNOME, KDE, etc.)"),
    }
}

/// Print a user-friendly capability report.
pub fn print_capability_report(capabilities: &[Capability]) {
    println!("Proctoring capabilities:");
    println!("{}", "-".repeat(60));

    for cap in capabilities {
        let status = match (cap.available, cap.required) {
            (true, _) => "[OK]",
            (false, true) => "[MISSING - REQUIRED]",
            (false, false) => "[MISSING - OPTIONAL]",
        };
        println!("  {} {}: {}", status, cap.name, cap.description);
        if let Some(fix) = cap.fix_instructions {
            println!("    Fix: {fix}");
        }
    }
}
