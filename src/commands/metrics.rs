//! Metrics command implementation.
//!
//! Lists the matrix columns in positional order.

use tensorscan::Metric;

pub fn command_metrics() -> anyhow::Result<()> {
    println!("{:>5}  {:<20} {:<10} {:<9}", "index", "column", "alias", "kind");
    for m in Metric::ALL {
        println!(
            "{:>5}  {:<20} {:<10} {:<9}",
            m.index(),
            m.name(),
            m.alias(),
            format!("{:?}", m.kind()).to_lowercase()
        );
    }
    Ok(())
}
