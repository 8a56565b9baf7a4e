//! Check capture and display capabilities.

use vigil_platform::capabilities::{
    all_required_available, check_capabilities, print_capability_report,
};

pub fn run() -> anyhow::Result<()> {
    println!("Vigil System Check");
    println!("{}", "=".repeat(50));

    let capabilities = check_capabilities();
    print_capability_report(&capabilities);

    println!();
    if all_required_available(&capabilities) {
        println!("All required capabilities are available. Ready for proctored exams.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}
