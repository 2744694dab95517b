//! Check command implementation.
//!
//! Verifies that process data can be read and reports the host constants.

use std::path::Path;

use anyhow::bail;
use tensorscan::config::{validate_effective_config, Config};
use tensorscan::{system, Filter, Snapshotter, METRIC_COUNT};

pub fn command_check(config: &Config) -> anyhow::Result<()> {
    println!("🔍 tensorscan - System Check");
    println!("============================");

    let mut all_ok = true;

    if config.fixture_file.is_none() {
        let root = config
            .proc_root
            .clone()
            .unwrap_or_else(|| Path::new("/proc").to_path_buf());
        println!("\n📁 Checking {} filesystem...", root.display());
        if root.exists() {
            println!("   ✅ {} accessible", root.display());
        } else {
            println!("   ❌ {} not found", root.display());
            all_ok = false;
        }
    }

    println!("\n📊 Checking snapshot capture...");
    match super::build_driver(config) {
        Ok(driver) => {
            let snapshotter = Snapshotter::new(driver);
            let mut out = vec![0.0; METRIC_COUNT];
            let total = snapshotter.snapshot_absolute(&mut out, 1, METRIC_COUNT, None);
            if total > 0 {
                println!("   ✅ {} processes visible", total);
            } else {
                println!("   ❌ No processes could be captured");
                all_ok = false;
            }

            if config.fixture_file.is_none() {
                let own = std::process::id();
                let filter = Filter::new().whitelist([own]);
                let mut pid_out = vec![0.0; 1];
                let found =
                    snapshotter.snapshot_filtered(&mut out, 1, METRIC_COUNT, Some(&mut pid_out), &filter);
                if found == 1 && pid_out[0] as u32 == own {
                    println!("   ✅ Own process {} captured", own);
                } else {
                    println!("   ❌ Own process {} could not be captured", own);
                    all_ok = false;
                }
            }
        }
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    println!("\n🖥️  Host");
    let constants = system::host_constants();
    println!("   Clock ticks/s: {}", system::clock_ticks_per_second());
    println!("   Tick:          {} ns", constants.tick_ns);
    println!("   Page size:     {} bytes", constants.page_size);
    println!("   Cores:         {}", system::core_count());
    println!("   Memory:        {} MB", system::mem_total_bytes() / 1024 / 1024);
    println!("   CPU ticks:     {}", system::total_cpu_ticks());

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        bail!("system check failed")
    }
}
